//! Collection of automata sharing one context

use super::{Cfa, CfaId, LocId, TransitionId, VariableAssignment};
use crate::expr::ExprRef;
use crate::types::Context;
use std::sync::Arc;

/// Owns every automaton of a program and designates the main one
#[derive(Debug, Clone)]
pub struct AutomataSystem {
    ctx: Arc<Context>,
    automata: Vec<Cfa>,
    main: Option<CfaId>,
}

impl AutomataSystem {
    /// Empty system over `ctx`
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            ctx,
            automata: Vec::new(),
            main: None,
        }
    }

    /// Shared context
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Create an automaton with fresh entry and exit locations
    pub fn create_cfa(&mut self, name: impl Into<String>) -> CfaId {
        let id = CfaId(self.automata.len() as u32);
        self.automata.push(Cfa::new(id, name.into(), self.ctx.clone()));
        id
    }

    /// Automaton by id
    ///
    /// # Panics
    /// If `id` does not belong to this system.
    pub fn cfa(&self, id: CfaId) -> &Cfa {
        &self.automata[id.index()]
    }

    /// Mutable automaton by id
    ///
    /// # Panics
    /// If `id` does not belong to this system.
    pub fn cfa_mut(&mut self, id: CfaId) -> &mut Cfa {
        &mut self.automata[id.index()]
    }

    /// Automaton by id, `None` if foreign
    pub fn get(&self, id: CfaId) -> Option<&Cfa> {
        self.automata.get(id.index())
    }

    /// All automata in creation order
    pub fn automata(&self) -> impl Iterator<Item = &Cfa> {
        self.automata.iter()
    }

    /// Number of automata
    pub fn num_automata(&self) -> usize {
        self.automata.len()
    }

    /// First automaton named `name`
    pub fn automaton_by_name(&self, name: &str) -> Option<CfaId> {
        self.automata
            .iter()
            .find(|cfa| cfa.name() == name)
            .map(Cfa::id)
    }

    /// Designate the main automaton
    ///
    /// # Panics
    /// If `id` does not belong to this system.
    pub fn set_main_automaton(&mut self, id: CfaId) {
        assert!(
            id.index() < self.automata.len(),
            "{} is not part of this system",
            id
        );
        self.main = Some(id);
    }

    /// The main automaton, if one was designated
    pub fn main_automaton(&self) -> Option<CfaId> {
        self.main
    }

    /// Add a call edge in `caller` invoking `callee`.
    ///
    /// `inputs` assign the callee's inputs from caller expressions,
    /// `outputs` assign caller variables from callee outputs. A missing guard
    /// defaults to `true`.
    ///
    /// # Panics
    /// If the number of input arguments differs from the callee's input count.
    #[allow(clippy::too_many_arguments)]
    pub fn create_call_transition(
        &mut self,
        caller: CfaId,
        source: LocId,
        target: LocId,
        guard: Option<ExprRef>,
        callee: CfaId,
        inputs: Vec<VariableAssignment>,
        outputs: Vec<VariableAssignment>,
    ) -> TransitionId {
        let expected = self.cfa(callee).num_inputs();
        assert_eq!(
            inputs.len(),
            expected,
            "call of '{}' needs {} input arguments",
            self.cfa(callee).name(),
            expected
        );

        self.cfa_mut(caller)
            .insert_call_transition(source, target, guard, callee, inputs, outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprBuilder;

    #[test]
    fn test_main_and_lookup() {
        let mut system = AutomataSystem::new(Arc::new(Context::new()));
        let main = system.create_cfa("main");
        let f = system.create_cfa("f");

        assert_eq!(system.main_automaton(), None);
        system.set_main_automaton(main);
        assert_eq!(system.main_automaton(), Some(main));
        assert_eq!(system.automaton_by_name("f"), Some(f));
        assert_eq!(system.automaton_by_name("g"), None);
    }

    #[test]
    fn test_call_transition() {
        let ctx = Arc::new(Context::new());
        let b = ExprBuilder::new(ctx.clone());
        let mut system = AutomataSystem::new(ctx.clone());
        let main = system.create_cfa("main");
        let f = system.create_cfa("f");
        let a = system.cfa_mut(f).create_input("a", ctx.int_type());

        let (entry, exit) = (system.cfa(main).entry(), system.cfa(main).exit());
        let call = system.create_call_transition(
            main,
            entry,
            exit,
            None,
            f,
            vec![VariableAssignment::new(a, b.int_lit(1))],
            vec![],
        );

        let edge = system.cfa(main).transition(call).unwrap();
        assert!(edge.is_call());
        assert_eq!(edge.callee(), Some(f));
    }

    #[test]
    #[should_panic(expected = "input arguments")]
    fn test_call_arity_mismatch() {
        let ctx = Arc::new(Context::new());
        let mut system = AutomataSystem::new(ctx.clone());
        let main = system.create_cfa("main");
        let f = system.create_cfa("f");
        system.cfa_mut(f).create_input("a", ctx.int_type());

        let (entry, exit) = (system.cfa(main).entry(), system.cfa(main).exit());
        system.create_call_transition(main, entry, exit, None, f, vec![], vec![]);
    }
}
