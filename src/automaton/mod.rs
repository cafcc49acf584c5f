//! Control-flow automata
//!
//! An [`AutomataSystem`] owns a list of [`Cfa`]s, one of them designated as
//! main. Each automaton stores its locations and transitions in id-indexed
//! arenas; ids are only meaningful within their owning automaton, so
//! cross-automaton references use [`LocationRef`].

pub mod cfa;
pub mod dot;
pub mod inline;
pub mod system;
pub mod trace;

pub use cfa::{Cfa, Location, LocationKind, Transition, TransitionKind, VariableAssignment};
pub use inline::{inline_calls, InlineMap};
pub use system::AutomataSystem;
pub use trace::{CfaTraceBuilder, Trace, TraceBuilder};

use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Arena slot
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Automaton id within an [`AutomataSystem`]
    CfaId,
    "cfa"
);
arena_id!(
    /// Location id within a [`Cfa`]
    LocId,
    "loc"
);
arena_id!(
    /// Transition id within a [`Cfa`]
    TransitionId,
    "edge"
);

/// A location qualified by its automaton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationRef {
    /// Owning automaton
    pub cfa: CfaId,
    /// Location within it
    pub loc: LocId,
}

impl LocationRef {
    /// Qualify `loc` with `cfa`
    pub fn new(cfa: CfaId, loc: LocId) -> Self {
        Self { cfa, loc }
    }
}

impl fmt::Display for LocationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cfa, self.loc)
    }
}
