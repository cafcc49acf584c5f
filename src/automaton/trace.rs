//! Structured counterexample traces

use super::LocationRef;
use std::fmt;

pub use super::cfa::VariableAssignment;

/// Alternating sequence of visited locations and the assignments between them
///
/// `actions[i]` leads from `states[i]` to `states[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Trace {
    states: Vec<LocationRef>,
    actions: Vec<Vec<VariableAssignment>>,
}

impl Trace {
    /// Visited locations, initial location first
    pub fn states(&self) -> &[LocationRef] {
        &self.states
    }

    /// Assignment blocks between consecutive states
    pub fn actions(&self) -> &[Vec<VariableAssignment>] {
        &self.actions
    }

    /// Number of visited locations
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if no location was visited
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Final location
    pub fn last_state(&self) -> Option<&LocationRef> {
        self.states.last()
    }

    /// Final assignment block
    pub fn last_action(&self) -> Option<&[VariableAssignment]> {
        self.actions.last().map(Vec::as_slice)
    }

    /// Iterate `(state, action leaving it)` pairs; the final state has no action
    pub fn steps(&self) -> impl Iterator<Item = (&LocationRef, Option<&[VariableAssignment]>)> {
        self.states
            .iter()
            .enumerate()
            .map(|(i, state)| (state, self.actions.get(i).map(Vec::as_slice)))
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (state, action) in self.steps() {
            writeln!(f, "  {}", state)?;
            for assignment in action.unwrap_or_default() {
                writeln!(f, "    {}", assignment)?;
            }
        }
        Ok(())
    }
}

/// Turns reconstructed states and actions into a [`Trace`]
pub trait TraceBuilder {
    /// Assemble a trace; `actions` has one block fewer than `states`
    fn build(&self, states: Vec<LocationRef>, actions: Vec<Vec<VariableAssignment>>) -> Trace;
}

/// Keeps every state and action as reconstructed
#[derive(Debug, Clone, Copy, Default)]
pub struct CfaTraceBuilder;

impl TraceBuilder for CfaTraceBuilder {
    fn build(&self, states: Vec<LocationRef>, actions: Vec<Vec<VariableAssignment>>) -> Trace {
        debug_assert!(
            actions.len() + 1 == states.len() || states.is_empty(),
            "{} states need {} action blocks, got {}",
            states.len(),
            states.len().saturating_sub(1),
            actions.len()
        );
        Trace { states, actions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{CfaId, LocId};
    use crate::expr::ExprBuilder;
    use crate::types::Context;
    use std::sync::Arc;

    #[test]
    fn test_steps_alternate() {
        let ctx = Arc::new(Context::new());
        let b = ExprBuilder::new(ctx.clone());
        let x = ctx.create_variable("main/x", ctx.int_type()).unwrap();

        let l0 = LocationRef::new(CfaId(0), LocId(0));
        let l1 = LocationRef::new(CfaId(0), LocId(2));
        let action = vec![VariableAssignment::new(x, b.int_lit(3))];
        let trace = CfaTraceBuilder.build(vec![l0, l1], vec![action.clone()]);

        let steps: Vec<_> = trace.steps().collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0], (&l0, Some(action.as_slice())));
        assert_eq!(steps[1], (&l1, None));
        assert_eq!(trace.last_action(), Some(action.as_slice()));
        assert_eq!(trace.to_string(), "  cfa0:loc0\n    main/x := 3\n  cfa0:loc2\n");
    }
}
