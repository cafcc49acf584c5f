//! Call flattening
//!
//! External model checkers understand a single automaton. [`inline_calls`]
//! copies every callee reachable from the main automaton into it and records
//! where each copy came from, so a counterexample over the flattened
//! automaton can be mapped back onto the original program.

use super::{
    AutomataSystem, Cfa, CfaId, LocId, LocationKind, LocationRef, TransitionId, TransitionKind,
    VariableAssignment,
};
use crate::error::{Error, Result};
use crate::expr::{rewrite::substitute, ExprBuilder, ExprRef};
use crate::types::Variable;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Copy → original correspondence produced by [`inline_calls`]
#[derive(Debug, Clone)]
pub struct InlineMap {
    main: CfaId,
    locations: FxHashMap<LocId, LocationRef>,
    variables: FxHashMap<Variable, Variable>,
}

impl InlineMap {
    /// Empty map for an automaton without calls
    pub fn new(main: CfaId) -> Self {
        Self {
            main,
            locations: FxHashMap::default(),
            variables: FxHashMap::default(),
        }
    }

    /// Flattened automaton
    pub fn main(&self) -> CfaId {
        self.main
    }

    /// Original location of a location of the flattened automaton
    pub fn original_location(&self, loc: LocId) -> LocationRef {
        self.locations
            .get(&loc)
            .copied()
            .unwrap_or(LocationRef::new(self.main, loc))
    }

    /// Original variable of a variable of the flattened automaton
    pub fn original_variable(&self, variable: &Variable) -> Variable {
        self.variables
            .get(variable)
            .cloned()
            .unwrap_or_else(|| variable.clone())
    }

    /// Check if `loc` is an inlined copy
    pub fn is_inlined_location(&self, loc: LocId) -> bool {
        self.locations.contains_key(&loc)
    }

    /// Check if `variable` is an inlined copy
    pub fn is_inlined_variable(&self, variable: &Variable) -> bool {
        self.variables.contains_key(variable)
    }

    /// Number of copied locations
    pub fn num_inlined_locations(&self) -> usize {
        self.locations.len()
    }

    /// Number of copied variables
    pub fn num_inlined_variables(&self) -> usize {
        self.variables.len()
    }
}

struct PendingCall {
    edge: TransitionId,
    chain: Vec<CfaId>,
}

struct CallSite {
    source: LocId,
    target: LocId,
    guard: ExprRef,
    callee: CfaId,
    input_args: Vec<VariableAssignment>,
    output_args: Vec<VariableAssignment>,
}

/// Flatten every call of the main automaton into it.
///
/// Nested calls are expanded transitively. Callee automata are left
/// untouched; only the main automaton is rewritten.
pub fn inline_calls(system: &mut AutomataSystem) -> Result<InlineMap> {
    let main = system.main_automaton().ok_or(Error::NoMainAutomaton)?;
    let builder = ExprBuilder::new(system.context().clone());
    let mut map = InlineMap::new(main);

    let mut worklist: Vec<PendingCall> = system
        .cfa(main)
        .transitions()
        .filter(|t| t.is_call() && t.is_connected())
        .map(|t| PendingCall {
            edge: t.id(),
            chain: vec![main],
        })
        .collect();
    worklist.reverse();

    let mut inlined = 0usize;
    while let Some(PendingCall { edge, chain }) = worklist.pop() {
        let Some(site) = call_site(system.cfa(main), edge) else {
            continue;
        };

        if chain.contains(&site.callee) {
            return Err(Error::RecursiveCall {
                cfa: system.cfa(site.callee).name().to_string(),
            });
        }

        let callee = system.cfa(site.callee).clone();
        debug!(callee = %callee.name(), depth = chain.len(), "inlining call");

        let nested = inline_one(system.cfa_mut(main), &builder, &callee, &site, inlined, &mut map)?;

        let mut nested_chain = chain.clone();
        nested_chain.push(site.callee);
        worklist.extend(nested.into_iter().rev().map(|edge| PendingCall {
            edge,
            chain: nested_chain.clone(),
        }));

        system.cfa_mut(main).disconnect_edge(edge);
        inlined += 1;
    }

    system.cfa_mut(main).clear_disconnected_elements();
    debug!(
        calls = inlined,
        locations = map.num_inlined_locations(),
        variables = map.num_inlined_variables(),
        "inlining finished"
    );

    Ok(map)
}

fn call_site(cfa: &Cfa, edge: TransitionId) -> Option<CallSite> {
    let transition = cfa.transition(edge)?;
    match transition.kind() {
        TransitionKind::Call {
            callee,
            input_args,
            output_args,
        } => Some(CallSite {
            source: transition.source()?,
            target: transition.target()?,
            guard: transition.guard().clone(),
            callee: *callee,
            input_args: input_args.clone(),
            output_args: output_args.clone(),
        }),
        TransitionKind::Assign { .. } => None,
    }
}

/// Copy `callee` into `main` at `site`; returns the call edges copied along
fn inline_one(
    main: &mut Cfa,
    builder: &ExprBuilder,
    callee: &Cfa,
    site: &CallSite,
    serial: usize,
    map: &mut InlineMap,
) -> Result<Vec<TransitionId>> {
    let prefix = format!("{}{}", callee.name(), serial);

    let mut rename: FxHashMap<Variable, ExprRef> = FxHashMap::default();
    let mut copies: FxHashMap<Variable, Variable> = FxHashMap::default();
    let scope = format!("{}/", callee.name());
    for original in callee.inputs().iter().chain(callee.locals()) {
        // The qualified name stays unique when simple names repeat
        let simple = original.name().strip_prefix(&scope).unwrap_or(original.name());
        let copy =
            main.reuse_or_create_local(&format!("{}_{}", prefix, simple), original.ty().clone());
        rename.insert(original.clone(), builder.var_ref(&copy));
        copies.insert(original.clone(), copy.clone());
        map.variables.insert(copy, original.clone());
    }

    let copy_var = |v: &Variable| copies.get(v).cloned().unwrap_or_else(|| v.clone());

    let mut locations: FxHashMap<LocId, LocId> = FxHashMap::default();
    for loc in callee.locations() {
        let copy = match loc.kind() {
            LocationKind::Error => {
                let copy = main.create_error_location();
                if let Some(code) = callee.error_code_expr(loc.id()) {
                    main.add_error_code(copy, substitute(builder, code, &rename)?);
                }
                copy
            }
            LocationKind::State => main.create_location(),
        };
        locations.insert(loc.id(), copy);
        map.locations
            .insert(copy, LocationRef::new(callee.id(), loc.id()));
    }

    let mut nested_calls = Vec::new();
    for transition in callee.transitions() {
        let (Some(source), Some(target)) = (transition.source(), transition.target()) else {
            continue;
        };
        let (source, target) = (locations[&source], locations[&target]);
        let guard = substitute(builder, transition.guard(), &rename)?;

        match transition.kind() {
            TransitionKind::Assign { assignments } => {
                let assignments = assignments
                    .iter()
                    .map(|a| {
                        Ok(VariableAssignment::new(
                            copy_var(a.variable()),
                            substitute(builder, a.value(), &rename)?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                main.create_assign_transition(source, target, Some(guard), assignments);
            }
            TransitionKind::Call {
                callee: nested,
                input_args,
                output_args,
            } => {
                let input_args = input_args
                    .iter()
                    .map(|a| {
                        Ok(VariableAssignment::new(
                            a.variable().clone(),
                            substitute(builder, a.value(), &rename)?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let output_args = output_args
                    .iter()
                    .map(|a| VariableAssignment::new(copy_var(a.variable()), a.value().clone()))
                    .collect();
                let id = main.insert_call_transition(
                    source,
                    target,
                    Some(guard),
                    *nested,
                    input_args,
                    output_args,
                );
                nested_calls.push(id);
            }
        }
    }

    let entry_bindings = site
        .input_args
        .iter()
        .map(|a| VariableAssignment::new(copy_var(a.variable()), a.value().clone()))
        .collect();
    main.create_assign_transition(
        site.source,
        locations[&callee.entry()],
        Some(site.guard.clone()),
        entry_bindings,
    );

    let exit_bindings = site
        .output_args
        .iter()
        .map(|a| {
            Ok(VariableAssignment::new(
                a.variable().clone(),
                substitute(builder, a.value(), &rename)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    main.create_assign_transition(
        locations[&callee.exit()],
        site.target,
        None,
        exit_bindings,
    );

    Ok(nested_calls)
}
