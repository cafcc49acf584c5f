//! Verification through an external model checker
//!
//! The pipeline flattens the automata system, writes the main automaton in
//! the checker's input language while recording a [`NameMapping`], runs the
//! checker under a timeout, classifies its reply and, for unsafe results,
//! rebuilds a [`Trace`] over the original program.
//!
//! ```text
//! AutomataSystem ──inline──> flat main ──CfaWriter──> model file
//!                                              │
//!                                         NameMapping
//!                                              │
//! checker reply ──classify──> Unsafe ──CexReconstructor──> Trace + code
//! ```

pub mod cex;
pub mod external;
pub mod runner;
pub mod settings;
pub mod writer;

pub use cex::{classify_output, CexError, CexReconstructor, Reconstruction, ReplyKind};
pub use external::ExternalVerifier;
pub use runner::{Invocation, ProcessRunner, RunOutcome, ToolRunner};
pub use settings::VerifierSettings;
pub use writer::{CfaWriter, NameMapping};

use crate::automaton::{AutomataSystem, Trace};
use std::fmt;

/// Error code of a verified program
pub const SUCCESS_CODE: u32 = 0;

/// Error code used when the checker cannot tell which check failed
pub const GENERAL_FAILURE_CODE: u32 = 1;

/// Outcome of one verification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// No error location is reachable
    Success,
    /// An error location is reachable
    Fail {
        /// Error code of the violated check
        code: u32,
        /// Counterexample, when one could be rebuilt
        trace: Option<Trace>,
    },
    /// The checker ran out of time and was killed
    Timeout,
    /// The checker gave no verdict
    Unknown,
    /// The checker could not be run or its reply could not be used
    InternalError(String),
}

impl VerificationResult {
    /// Failure without a counterexample
    pub fn fail(code: u32) -> Self {
        VerificationResult::Fail { code, trace: None }
    }

    /// Failure with a counterexample
    pub fn fail_with_trace(code: u32, trace: Trace) -> Self {
        VerificationResult::Fail {
            code,
            trace: Some(trace),
        }
    }

    /// Internal error with a message
    pub fn internal_error(message: impl Into<String>) -> Self {
        VerificationResult::InternalError(message.into())
    }

    /// Check if the program was proven safe
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success)
    }

    /// Check if an error location was found reachable
    pub fn is_fail(&self) -> bool {
        matches!(self, VerificationResult::Fail { .. })
    }

    /// Error code: [`SUCCESS_CODE`] for success, the violated check's code on failure
    pub fn error_code(&self) -> Option<u32> {
        match self {
            VerificationResult::Success => Some(SUCCESS_CODE),
            VerificationResult::Fail { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Counterexample of a failure
    pub fn trace(&self) -> Option<&Trace> {
        match self {
            VerificationResult::Fail { trace, .. } => trace.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationResult::Success => write!(f, "Verification successful"),
            VerificationResult::Fail { code, .. } => {
                write!(f, "Verification failed with error code {}", code)
            }
            VerificationResult::Timeout => write!(f, "Verification timed out"),
            VerificationResult::Unknown => write!(f, "Verification result unknown"),
            VerificationResult::InternalError(msg) => {
                write!(f, "Verification internal error: {}", msg)
            }
        }
    }
}

/// A verification backend
pub trait Verifier {
    /// Check whether any error location of the main automaton is reachable
    fn check(&self, system: &AutomataSystem) -> VerificationResult;
}
