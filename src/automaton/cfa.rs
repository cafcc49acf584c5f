//! Control-flow automaton: locations, transitions and member variables
//!
//! Locations and transitions live in per-automaton arenas addressed by
//! [`LocId`] and [`TransitionId`]. Adjacency lists hold ids, and only the
//! graph-mutation methods on [`Cfa`] touch them, which keeps every location's
//! incoming/outgoing lists consistent with the transition set.

use super::{CfaId, LocId, TransitionId};
use crate::error::Error;
use crate::expr::{ExprBuilder, ExprRef};
use crate::types::{Context, Type, Variable};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Ordinary or error location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// Regular control point
    State,
    /// Reaching this location is a property violation
    Error,
}

/// Control point of an automaton
#[derive(Debug, Clone)]
pub struct Location {
    id: LocId,
    kind: LocationKind,
    incoming: Vec<TransitionId>,
    outgoing: Vec<TransitionId>,
}

impl Location {
    fn new(id: LocId, kind: LocationKind) -> Self {
        Self {
            id,
            kind,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Id, unique within the owning automaton
    pub fn id(&self) -> LocId {
        self.id
    }

    /// Location kind
    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    /// Check if this is an error location
    pub fn is_error(&self) -> bool {
        self.kind == LocationKind::Error
    }

    /// Transitions ending here
    pub fn incoming(&self) -> &[TransitionId] {
        &self.incoming
    }

    /// Transitions starting here
    pub fn outgoing(&self) -> &[TransitionId] {
        &self.outgoing
    }

    fn is_isolated(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty()
    }
}

/// `variable := value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableAssignment {
    variable: Variable,
    value: ExprRef,
}

impl VariableAssignment {
    /// Create an assignment
    pub fn new(variable: Variable, value: ExprRef) -> Self {
        Self { variable, value }
    }

    /// Assigned variable
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    /// Assigned value
    pub fn value(&self) -> &ExprRef {
        &self.value
    }
}

impl fmt::Display for VariableAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} := {}", self.variable, self.value)
    }
}

/// Effect of a transition
#[derive(Debug, Clone)]
pub enum TransitionKind {
    /// Guarded parallel assignment; an assume edge has no assignments
    Assign {
        /// Ordered assignments
        assignments: Vec<VariableAssignment>,
    },
    /// Call of another automaton
    Call {
        /// Called automaton
        callee: CfaId,
        /// Callee input := caller expression, one per callee input
        input_args: Vec<VariableAssignment>,
        /// Caller variable := callee output expression
        output_args: Vec<VariableAssignment>,
    },
}

/// Directed guarded edge
#[derive(Debug, Clone)]
pub struct Transition {
    id: TransitionId,
    source: Option<LocId>,
    target: Option<LocId>,
    guard: ExprRef,
    kind: TransitionKind,
}

impl Transition {
    /// Id, unique within the owning automaton
    pub fn id(&self) -> TransitionId {
        self.id
    }

    /// Source location; `None` once disconnected
    pub fn source(&self) -> Option<LocId> {
        self.source
    }

    /// Target location; `None` once disconnected
    pub fn target(&self) -> Option<LocId> {
        self.target
    }

    /// Boolean guard
    pub fn guard(&self) -> &ExprRef {
        &self.guard
    }

    /// Effect
    pub fn kind(&self) -> &TransitionKind {
        &self.kind
    }

    /// Assignment edge (including assume edges)
    pub fn is_assign(&self) -> bool {
        matches!(self.kind, TransitionKind::Assign { .. })
    }

    /// Assignment edge without assignments
    pub fn is_assume(&self) -> bool {
        matches!(&self.kind, TransitionKind::Assign { assignments } if assignments.is_empty())
    }

    /// Call edge
    pub fn is_call(&self) -> bool {
        matches!(self.kind, TransitionKind::Call { .. })
    }

    /// Assignments of an assign edge; empty for calls
    pub fn assignments(&self) -> &[VariableAssignment] {
        match &self.kind {
            TransitionKind::Assign { assignments } => assignments,
            TransitionKind::Call { .. } => &[],
        }
    }

    /// Callee of a call edge
    pub fn callee(&self) -> Option<CfaId> {
        match &self.kind {
            TransitionKind::Call { callee, .. } => Some(*callee),
            TransitionKind::Assign { .. } => None,
        }
    }

    /// Both endpoints are set
    pub fn is_connected(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }
}

/// One control-flow automaton
#[derive(Debug, Clone)]
pub struct Cfa {
    id: CfaId,
    name: String,
    ctx: Arc<Context>,
    entry: LocId,
    exit: LocId,
    locations: Vec<Option<Location>>,
    error_locations: Vec<LocId>,
    error_codes: FxHashMap<LocId, ExprRef>,
    transitions: Vec<Option<Transition>>,
    inputs: Vec<Variable>,
    locals: Vec<Variable>,
    outputs: Vec<Variable>,
    symbol_names: FxHashMap<Variable, String>,
    tmp: u32,
}

impl Cfa {
    pub(crate) fn new(id: CfaId, name: String, ctx: Arc<Context>) -> Self {
        let mut cfa = Self {
            id,
            name,
            ctx,
            entry: LocId(0),
            exit: LocId(0),
            locations: Vec::new(),
            error_locations: Vec::new(),
            error_codes: FxHashMap::default(),
            transitions: Vec::new(),
            inputs: Vec::new(),
            locals: Vec::new(),
            outputs: Vec::new(),
            symbol_names: FxHashMap::default(),
            tmp: 0,
        };

        cfa.entry = cfa.create_location();
        cfa.exit = cfa.create_location();
        cfa
    }

    /// Id within the owning system
    pub fn id(&self) -> CfaId {
        self.id
    }

    /// Automaton name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning context
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Entry location; never removed
    pub fn entry(&self) -> LocId {
        self.entry
    }

    /// Exit location; never removed
    pub fn exit(&self) -> LocId {
        self.exit
    }

    // Location and edge construction
    //-------------------------------------------------------------------------

    fn next_location_id(&self) -> LocId {
        LocId(self.locations.len() as u32)
    }

    /// Add an ordinary location
    pub fn create_location(&mut self) -> LocId {
        let id = self.next_location_id();
        self.locations.push(Some(Location::new(id, LocationKind::State)));
        id
    }

    /// Add an error location
    pub fn create_error_location(&mut self) -> LocId {
        let id = self.next_location_id();
        self.locations.push(Some(Location::new(id, LocationKind::Error)));
        self.error_locations.push(id);
        id
    }

    /// Look up a location by id
    pub fn location(&self, id: LocId) -> Option<&Location> {
        self.locations.get(id.index()).and_then(Option::as_ref)
    }

    fn location_mut(&mut self, id: LocId) -> Option<&mut Location> {
        self.locations.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Live locations in creation order
    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter().flatten()
    }

    /// Number of live locations
    pub fn num_locations(&self) -> usize {
        self.locations().count()
    }

    /// Error locations in creation order
    pub fn error_locations(&self) -> &[LocId] {
        &self.error_locations
    }

    /// Look up a transition by id
    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(id.index()).and_then(Option::as_ref)
    }

    fn transition_mut(&mut self, id: TransitionId) -> Option<&mut Transition> {
        self.transitions.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Live transitions in creation order, including disconnected ones not yet swept
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().flatten()
    }

    /// Number of live transitions
    pub fn num_transitions(&self) -> usize {
        self.transitions().count()
    }

    fn insert_transition(
        &mut self,
        source: LocId,
        target: LocId,
        guard: Option<ExprRef>,
        kind: TransitionKind,
    ) -> TransitionId {
        assert!(
            self.location(source).is_some(),
            "source {} is not a location of '{}'",
            source,
            self.name
        );
        assert!(
            self.location(target).is_some(),
            "target {} is not a location of '{}'",
            target,
            self.name
        );

        let guard = guard.unwrap_or_else(|| ExprBuilder::new(self.ctx.clone()).true_lit());
        assert!(guard.ty().is_bool(), "transition guard must be Bool");

        let id = TransitionId(self.transitions.len() as u32);
        self.transitions.push(Some(Transition {
            id,
            source: Some(source),
            target: Some(target),
            guard,
            kind,
        }));

        if let Some(loc) = self.location_mut(source) {
            loc.outgoing.push(id);
        }
        if let Some(loc) = self.location_mut(target) {
            loc.incoming.push(id);
        }

        id
    }

    /// Add an assignment edge. A missing guard defaults to `true`.
    pub fn create_assign_transition(
        &mut self,
        source: LocId,
        target: LocId,
        guard: Option<ExprRef>,
        assignments: Vec<VariableAssignment>,
    ) -> TransitionId {
        self.insert_transition(source, target, guard, TransitionKind::Assign { assignments })
    }

    /// Add an assume edge (assignment edge with no assignments)
    pub fn create_assume_transition(
        &mut self,
        source: LocId,
        target: LocId,
        guard: ExprRef,
    ) -> TransitionId {
        self.create_assign_transition(source, target, Some(guard), Vec::new())
    }

    /// Add a call edge. The caller has already checked the argument count
    /// against the callee's inputs.
    pub(crate) fn insert_call_transition(
        &mut self,
        source: LocId,
        target: LocId,
        guard: Option<ExprRef>,
        callee: CfaId,
        input_args: Vec<VariableAssignment>,
        output_args: Vec<VariableAssignment>,
    ) -> TransitionId {
        self.insert_transition(
            source,
            target,
            guard,
            TransitionKind::Call {
                callee,
                input_args,
                output_args,
            },
        )
    }

    /// Attach the error-code expression of an error location
    ///
    /// # Panics
    /// If `location` is not an error location of this automaton.
    pub fn add_error_code(&mut self, location: LocId, code: ExprRef) {
        assert!(
            self.location(location).is_some_and(Location::is_error),
            "{} is not an error location",
            location
        );
        self.error_codes.insert(location, code);
    }

    /// Error-code expression of an error location, if one was attached
    ///
    /// # Panics
    /// If `location` is not an error location of this automaton.
    pub fn error_code_expr(&self, location: LocId) -> Option<&ExprRef> {
        assert!(
            self.location(location).is_some_and(Location::is_error),
            "{} is not an error location",
            location
        );
        self.error_codes.get(&location)
    }

    // Member variables
    //-------------------------------------------------------------------------

    /// Declare an input variable
    pub fn create_input(&mut self, name: &str, ty: Type) -> Variable {
        let variable = self.create_member_variable(name, ty);
        self.inputs.push(variable.clone());
        variable
    }

    /// Declare a local variable
    pub fn create_local(&mut self, name: &str, ty: Type) -> Variable {
        let variable = self.create_member_variable(name, ty);
        self.locals.push(variable.clone());
        variable
    }

    /// Declare a local named `name`, adopting the context variable of that
    /// qualified name when it has type `ty` and no automaton copy of this one
    /// has claimed it yet. Repeated flattening of clones of one system then
    /// reuses the same variables.
    pub(crate) fn reuse_or_create_local(&mut self, name: &str, ty: Type) -> Variable {
        let qualified = format!("{}/{}", self.name, name);
        if let Some(existing) = self.ctx.get_variable(&qualified) {
            if existing.ty() == &ty && !self.symbol_names.contains_key(&existing) {
                self.symbol_names.insert(existing.clone(), name.to_string());
                self.locals.push(existing.clone());
                return existing;
            }
        }
        self.create_local(name, ty)
    }

    /// Mark an existing member variable as an output
    ///
    /// # Panics
    /// If `variable` is not an input or local of this automaton.
    pub fn add_output(&mut self, variable: Variable) {
        assert!(
            self.symbol_names.contains_key(&variable),
            "{} is not a member of '{}'",
            variable,
            self.name
        );
        if !self.outputs.contains(&variable) {
            self.outputs.push(variable);
        }
    }

    fn create_member_variable(&mut self, name: &str, ty: Type) -> Variable {
        let base_name = format!("{}/{}", self.name, name);
        let mut candidate = base_name.clone();

        let variable = loop {
            match self.ctx.create_variable(candidate.clone(), ty.clone()) {
                Ok(variable) => break variable,
                Err(Error::DuplicateVariable { .. }) => {
                    candidate = format!("{}_{}", base_name, self.tmp);
                    self.tmp += 1;
                }
                Err(e) => panic!("cannot declare '{}': {}", candidate, e),
            }
        };

        self.symbol_names.insert(variable.clone(), name.to_string());
        variable
    }

    /// Input variables in declaration order
    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    /// Local variables in declaration order
    pub fn locals(&self) -> &[Variable] {
        &self.locals
    }

    /// Output variables in declaration order
    pub fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    /// Number of inputs
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Position of `variable` among the inputs
    pub fn input_index(&self, variable: &Variable) -> Option<usize> {
        self.inputs.iter().position(|v| v == variable)
    }

    /// Position of `variable` among the outputs
    pub fn output_index(&self, variable: &Variable) -> Option<usize> {
        self.outputs.iter().position(|v| v == variable)
    }

    /// Check if `variable` is an output
    pub fn is_output(&self, variable: &Variable) -> bool {
        self.outputs.contains(variable)
    }

    /// Simple (unqualified) name of a member variable
    pub fn simple_name(&self, variable: &Variable) -> Option<&str> {
        self.symbol_names.get(variable).map(String::as_str)
    }

    fn find_in(&self, list: &[Variable], name: &str) -> Option<Variable> {
        let qualified = format!("{}/{}", self.name, name);
        let variable = self.ctx.get_variable(&qualified)?;
        list.contains(&variable).then_some(variable)
    }

    /// Input by simple name
    pub fn find_input_by_name(&self, name: &str) -> Option<Variable> {
        self.find_in(&self.inputs, name)
    }

    /// Local by simple name
    pub fn find_local_by_name(&self, name: &str) -> Option<Variable> {
        self.find_in(&self.locals, name)
    }

    /// Output by simple name
    pub fn find_output_by_name(&self, name: &str) -> Option<Variable> {
        self.find_in(&self.outputs, name)
    }

    /// Input or local by simple name
    pub fn find_variable_by_name(&self, name: &str) -> Option<Variable> {
        self.find_input_by_name(name)
            .or_else(|| self.find_local_by_name(name))
    }

    // Transformations
    //-------------------------------------------------------------------------

    /// Sever every transition touching `location`.
    ///
    /// Each edge loses its reference to `location` and leaves the far
    /// endpoint's adjacency list; the edges stay in the automaton until
    /// [`clear_disconnected_elements`](Self::clear_disconnected_elements).
    pub fn disconnect_location(&mut self, location: LocId) {
        let (incoming, outgoing) = match self.location_mut(location) {
            Some(loc) => (
                std::mem::take(&mut loc.incoming),
                std::mem::take(&mut loc.outgoing),
            ),
            None => return,
        };

        for edge in incoming {
            let source = self.transition_mut(edge).and_then(|t| {
                t.target = None;
                t.source
            });
            if let Some(source) = source.filter(|s| *s != location) {
                if let Some(loc) = self.location_mut(source) {
                    loc.outgoing.retain(|e| *e != edge);
                }
            }
        }

        for edge in outgoing {
            let target = self.transition_mut(edge).and_then(|t| {
                t.source = None;
                t.target
            });
            if let Some(target) = target.filter(|t| *t != location) {
                if let Some(loc) = self.location_mut(target) {
                    loc.incoming.retain(|e| *e != edge);
                }
            }
        }
    }

    /// Remove one edge from both endpoints and clear its endpoint references
    pub fn disconnect_edge(&mut self, edge: TransitionId) {
        let (source, target) = match self.transition_mut(edge) {
            Some(t) => (t.source.take(), t.target.take()),
            None => return,
        };

        if let Some(loc) = source.and_then(|s| self.location_mut(s)) {
            loc.outgoing.retain(|e| *e != edge);
        }
        if let Some(loc) = target.and_then(|t| self.location_mut(t)) {
            loc.incoming.retain(|e| *e != edge);
        }
    }

    /// Locations reachable from the entry by forward traversal
    pub fn reachable_locations(&self) -> Vec<LocId> {
        let mut visited = vec![false; self.locations.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::from([self.entry]);
        visited[self.entry.index()] = true;

        while let Some(current) = queue.pop_front() {
            order.push(current);
            let Some(loc) = self.location(current) else {
                continue;
            };
            for edge in &loc.outgoing {
                if let Some(next) = self.transition(*edge).and_then(Transition::target) {
                    if !visited[next.index()] {
                        visited[next.index()] = true;
                        queue.push_back(next);
                    }
                }
            }
        }

        order
    }

    /// Drop every location not reachable from the entry, with its edges.
    ///
    /// Marks first, then disconnects, then sweeps.
    pub fn remove_unreachable_locations(&mut self) {
        let mut reachable = vec![false; self.locations.len()];
        for loc in self.reachable_locations() {
            reachable[loc.index()] = true;
        }

        let unreachable: Vec<LocId> = self
            .locations()
            .map(Location::id)
            .filter(|id| !reachable[id.index()])
            .collect();

        tracing::debug!(
            cfa = %self.name,
            count = unreachable.len(),
            "disconnecting unreachable locations"
        );

        for loc in unreachable {
            self.disconnect_location(loc);
        }

        self.clear_disconnected_elements();
    }

    /// Sweep isolated locations and endpoint-less transitions.
    ///
    /// The entry and exit locations are kept even when isolated.
    pub fn clear_disconnected_elements(&mut self) {
        let (entry, exit) = (self.entry, self.exit);

        let mut removed_locations = Vec::new();
        for slot in self.locations.iter_mut() {
            let sweep = matches!(
                slot,
                Some(loc) if loc.is_isolated() && loc.id != entry && loc.id != exit
            );
            if sweep {
                if let Some(loc) = slot.take() {
                    removed_locations.push(loc.id);
                }
            }
        }

        for loc in &removed_locations {
            self.error_codes.remove(loc);
        }
        self.error_locations
            .retain(|loc| !removed_locations.contains(loc));

        let mut removed_transitions = 0;
        for slot in self.transitions.iter_mut() {
            if slot.as_ref().is_some_and(|t| !t.is_connected()) {
                *slot = None;
                removed_transitions += 1;
            }
        }

        tracing::debug!(
            cfa = %self.name,
            locations = removed_locations.len(),
            transitions = removed_transitions,
            "cleared disconnected elements"
        );
    }
}
