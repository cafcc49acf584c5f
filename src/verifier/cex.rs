//! Counterexample reconstruction
//!
//! The checker answers with a nested-list reply:
//!
//! ```text
//! (SafetyResult Unsafe
//!   (Trace (InitLoc loc0)
//!          (CfaState loc2 (ExplState (main_x 3) (main___error_field 2)))))
//! ```
//!
//! [`classify_output`] recognizes the verdict, [`CexReconstructor`] walks the
//! trace, resolves each emitted name back to the pre-inlining program entity
//! and decodes values by the original variable's type. Anything that does not
//! fit the schema fails; nothing is guessed.

use super::writer::NameMapping;
use crate::automaton::{CfaTraceBuilder, LocationRef, Trace, TraceBuilder, VariableAssignment};
use crate::expr::{ExprBuilder, ExprRef, Literal};
use crate::parser::{parse_first, SExpr};
use crate::types::{Context, TypeKind, Variable};
use num_bigint::BigInt;
use std::sync::Arc;
use thiserror::Error;

const SAFE_MARKER: &str = "(SafetyResult Safe)";
const UNSAFE_MARKER: &str = "(SafetyResult Unsafe";
const TRACE_MARKER: &str = "(Trace";

/// Verdict found at the start of a checker reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind<'a> {
    /// `(SafetyResult Safe)`
    Safe,
    /// `(SafetyResult Unsafe ...)`, with the embedded `(Trace ...)` text if any
    Unsafe(Option<&'a str>),
    /// No known marker
    Unrecognized,
}

/// Classify the checker's standard output
pub fn classify_output(output: &str) -> ReplyKind<'_> {
    let output = output.trim_start();
    if output.starts_with(SAFE_MARKER) {
        ReplyKind::Safe
    } else if output.starts_with(UNSAFE_MARKER) {
        ReplyKind::Unsafe(output.find(TRACE_MARKER).map(|pos| output[pos..].trim()))
    } else {
        ReplyKind::Unrecognized
    }
}

/// Reconstruction failures; each carries the raw trace text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CexError {
    /// The trace text is not a well-formed nested list
    #[error("malformed counterexample: {message}")]
    Syntax {
        /// Parser diagnostic
        message: String,
        /// Raw trace text
        raw: String,
    },

    /// A fragment does not have the expected shape
    #[error("expected {expected}, found {fragment}")]
    Schema {
        /// Expected shape
        expected: String,
        /// Offending fragment
        fragment: String,
        /// Raw trace text
        raw: String,
    },

    /// A location name missing from the name mapping
    #[error("unknown location '{name}'")]
    UnknownLocation {
        /// Emitted name
        name: String,
        /// Raw trace text
        raw: String,
    },

    /// A variable name missing from the name mapping
    #[error("unknown variable '{name}'")]
    UnknownVariable {
        /// Emitted name
        name: String,
        /// Raw trace text
        raw: String,
    },

    /// A value that does not decode at the variable's type
    #[error("expected a valid {ty} value for '{variable}', found '{value}'")]
    InvalidValue {
        /// Original variable name
        variable: String,
        /// Variable type
        ty: String,
        /// Offending value
        value: String,
        /// Raw trace text
        raw: String,
    },

    /// The trace has no action block to read the error code from
    #[error("counterexample has no state after the initial location")]
    NoActions {
        /// Raw trace text
        raw: String,
    },

    /// The last action block does not assign the error field
    #[error("error field is not assigned in the last step of the counterexample")]
    MissingErrorField {
        /// Raw trace text
        raw: String,
    },

    /// The error field holds something other than a non-negative number
    #[error("error field value {value} is not a valid error code")]
    InvalidErrorField {
        /// Offending value
        value: String,
        /// Raw trace text
        raw: String,
    },
}

impl CexError {
    /// Raw trace text the error was found in
    pub fn raw(&self) -> &str {
        match self {
            CexError::Syntax { raw, .. }
            | CexError::Schema { raw, .. }
            | CexError::UnknownLocation { raw, .. }
            | CexError::UnknownVariable { raw, .. }
            | CexError::InvalidValue { raw, .. }
            | CexError::NoActions { raw }
            | CexError::MissingErrorField { raw }
            | CexError::InvalidErrorField { raw, .. } => raw,
        }
    }
}

/// Result of a successful reconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    /// Trace over the original program
    pub trace: Trace,
    /// Error code read from the last step
    pub error_code: u32,
}

/// Rebuilds traces from checker replies
pub struct CexReconstructor<'m, B: TraceBuilder = CfaTraceBuilder> {
    mapping: &'m NameMapping,
    exprs: ExprBuilder,
    trace_builder: B,
}

impl<'m> CexReconstructor<'m, CfaTraceBuilder> {
    /// Reconstructor resolving names through `mapping`
    pub fn new(ctx: Arc<Context>, mapping: &'m NameMapping) -> Self {
        Self {
            mapping,
            exprs: ExprBuilder::new(ctx),
            trace_builder: CfaTraceBuilder,
        }
    }
}

impl<'m, B: TraceBuilder> CexReconstructor<'m, B> {
    /// Use another trace builder
    pub fn with_trace_builder<C: TraceBuilder>(self, trace_builder: C) -> CexReconstructor<'m, C> {
        CexReconstructor {
            mapping: self.mapping,
            exprs: self.exprs,
            trace_builder,
        }
    }

    /// Rebuild the trace and error code from `(Trace ...)` text
    pub fn reconstruct(&self, text: &str) -> Result<Reconstruction, CexError> {
        let walk = TraceWalk {
            mapping: self.mapping,
            exprs: &self.exprs,
            raw: text,
        };

        let tree = parse_first(text).map_err(|e| CexError::Syntax {
            message: e.to_string(),
            raw: text.to_string(),
        })?;

        let (states, actions) = walk.trace(&tree)?;
        let error_code = walk.error_code(&actions)?;

        Ok(Reconstruction {
            trace: self.trace_builder.build(states, actions),
            error_code,
        })
    }
}

struct TraceWalk<'a> {
    mapping: &'a NameMapping,
    exprs: &'a ExprBuilder,
    raw: &'a str,
}

type Steps = (Vec<LocationRef>, Vec<Vec<VariableAssignment>>);

impl TraceWalk<'_> {
    fn schema(&self, expected: &str, fragment: &SExpr) -> CexError {
        CexError::Schema {
            expected: expected.to_string(),
            fragment: fragment.to_string(),
            raw: self.raw.to_string(),
        }
    }

    fn trace(&self, tree: &SExpr) -> Result<Steps, CexError> {
        let items = match tree.as_list() {
            Some(items) if tree.is_form("Trace") => items,
            _ => return Err(self.schema("(Trace ...)", tree)),
        };

        let init = items
            .get(1)
            .ok_or_else(|| self.schema("(InitLoc <name>)", tree))?;
        let init_name = match init.as_list() {
            Some([_, SExpr::Atom(name)]) if init.is_form("InitLoc") => name,
            _ => return Err(self.schema("(InitLoc <name>)", init)),
        };

        let mut states = vec![self.location(init_name)?];
        let mut actions = Vec::new();

        for item in &items[2..] {
            match item.head() {
                Some("CfaAction") => continue,
                Some("CfaState") => {}
                _ => return Err(self.schema("(CfaState ...)", item)),
            }

            let elems = item.as_list().unwrap_or_default();
            let name = match elems.get(1) {
                // The checker may synthesize unnamed locations
                Some(SExpr::List(_)) => continue,
                Some(SExpr::Atom(name)) => name,
                None => return Err(self.schema("(CfaState <name> (ExplState ...))", item)),
            };
            if self.mapping.is_error_sink(name) {
                continue;
            }

            let action = match elems {
                [_, _, expl] if expl.is_form("ExplState") => self.action(expl)?,
                _ => return Err(self.schema("(CfaState <name> (ExplState ...))", item)),
            };

            states.push(self.location(name)?);
            actions.push(action);
        }

        Ok((states, actions))
    }

    fn location(&self, name: &str) -> Result<LocationRef, CexError> {
        self.mapping
            .original_location(name)
            .ok_or_else(|| CexError::UnknownLocation {
                name: name.to_string(),
                raw: self.raw.to_string(),
            })
    }

    fn action(&self, expl: &SExpr) -> Result<Vec<VariableAssignment>, CexError> {
        let pairs = expl.as_list().unwrap_or_default();
        pairs[1..]
            .iter()
            .map(|pair| match pair.as_list() {
                Some([SExpr::Atom(name), SExpr::Atom(value)]) => self.assignment(name, value),
                _ => Err(self.schema("(<variable> <value>)", pair)),
            })
            .collect()
    }

    fn assignment(&self, name: &str, value: &str) -> Result<VariableAssignment, CexError> {
        let variable = self
            .mapping
            .original_variable(name)
            .ok_or_else(|| CexError::UnknownVariable {
                name: name.to_string(),
                raw: self.raw.to_string(),
            })?;

        let literal = self
            .decode(&variable, value)
            .ok_or_else(|| CexError::InvalidValue {
                variable: variable.name().to_string(),
                ty: variable.ty().to_string(),
                value: value.to_string(),
                raw: self.raw.to_string(),
            })?;

        Ok(VariableAssignment::new(variable, literal))
    }

    fn decode(&self, variable: &Variable, value: &str) -> Option<ExprRef> {
        match variable.ty().kind() {
            TypeKind::Int => value.parse::<i64>().ok().map(|v| self.exprs.int_lit(v)),
            TypeKind::Bv { width } => value
                .parse::<BigInt>()
                .ok()
                .map(|v| self.exprs.bv_lit_signed(&v, *width)),
            TypeKind::Bool if value.eq_ignore_ascii_case("true") => Some(self.exprs.true_lit()),
            TypeKind::Bool if value.eq_ignore_ascii_case("false") => Some(self.exprs.false_lit()),
            _ => None,
        }
    }

    fn error_code(&self, actions: &[Vec<VariableAssignment>]) -> Result<u32, CexError> {
        let last = actions.last().ok_or_else(|| CexError::NoActions {
            raw: self.raw.to_string(),
        })?;

        let missing = || CexError::MissingErrorField {
            raw: self.raw.to_string(),
        };
        let field = self.mapping.error_field().ok_or_else(missing)?;
        let assignment = last
            .iter()
            .find(|a| a.variable() == field)
            .ok_or_else(missing)?;

        let invalid = || CexError::InvalidErrorField {
            value: assignment.value().to_string(),
            raw: self.raw.to_string(),
        };
        match assignment.value().as_literal() {
            // Wider codes keep their low 32 bits
            Some(Literal::Bv { value, .. }) => Ok(value.iter_u32_digits().next().unwrap_or(0)),
            Some(Literal::Int(v)) => u32::try_from(*v).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{CfaId, InlineMap, LocId};

    #[test]
    fn test_classify_output() {
        assert_eq!(classify_output("(SafetyResult Safe)\n"), ReplyKind::Safe);
        assert_eq!(classify_output("(SafetyResult Unsafe)"), ReplyKind::Unsafe(None));
        assert_eq!(
            classify_output("(SafetyResult Unsafe\n (Trace (InitLoc a)))\n"),
            ReplyKind::Unsafe(Some("(Trace (InitLoc a)))"))
        );
        assert_eq!(classify_output("Exception in thread"), ReplyKind::Unrecognized);
        assert_eq!(classify_output(""), ReplyKind::Unrecognized);
    }

    fn mapping(ctx: &Arc<Context>) -> (NameMapping, Variable, Variable) {
        let x = ctx.create_variable("main/x", ctx.int_type()).unwrap();
        let err = ctx.create_variable("main/err", ctx.bv_type(8)).unwrap();
        let mut mapping = NameMapping::new(InlineMap::new(CfaId(0)));
        mapping.insert_location("L0", LocId(0));
        mapping.insert_location("L1", LocId(2));
        mapping.insert_variable("x", x.clone());
        mapping.insert_variable("err", err.clone());
        mapping.set_error_field(err.clone());
        (mapping, x, err)
    }

    #[test]
    fn test_bool_decoding_case_insensitive() {
        let ctx = Arc::new(Context::new());
        let (mut mapping, _, _) = mapping(&ctx);
        let flag = ctx.create_variable("main/flag", ctx.bool_type()).unwrap();
        mapping.insert_variable("flag", flag.clone());

        let rec = CexReconstructor::new(ctx.clone(), &mapping)
            .reconstruct("(Trace (InitLoc L0) (CfaState L1 (ExplState (flag TRUE) (err 1))))")
            .unwrap();
        let action = rec.trace.last_action().unwrap();
        assert_eq!(action[0].value().as_literal(), Some(&Literal::Bool(true)));
        assert_eq!(rec.error_code, 1);
    }

    #[test]
    fn test_negative_bv_wraps() {
        let ctx = Arc::new(Context::new());
        let (mapping, _, err) = mapping(&ctx);
        let rec = CexReconstructor::new(ctx.clone(), &mapping)
            .reconstruct("(Trace (InitLoc L0) (CfaState L1 (ExplState (err -1))))")
            .unwrap();
        let value = rec.trace.last_action().unwrap()[0].clone();
        assert_eq!(value.variable(), &err);
        assert_eq!(rec.error_code, 255);
    }

    #[test]
    fn test_wide_bv_error_code_truncated() {
        let ctx = Arc::new(Context::new());
        let (mut mapping, _, _) = mapping(&ctx);
        let wide = ctx.create_variable("main/wide_err", ctx.bv_type(64)).unwrap();
        mapping.insert_variable("wide", wide.clone());
        mapping.set_error_field(wide);

        let rec = CexReconstructor::new(ctx.clone(), &mapping)
            .reconstruct("(Trace (InitLoc L0) (CfaState L1 (ExplState (wide 4294967298))))")
            .unwrap();
        assert_eq!(rec.error_code, 2);

        let rec = CexReconstructor::new(ctx, &mapping)
            .reconstruct("(Trace (InitLoc L0) (CfaState L1 (ExplState (wide 0))))")
            .unwrap();
        assert_eq!(rec.error_code, 0);
    }

    #[test]
    fn test_deeply_nested_reply_rejected() {
        let ctx = Arc::new(Context::new());
        let (mapping, _, _) = mapping(&ctx);
        let text = format!(
            "(Trace (InitLoc L0) {}{}",
            "(".repeat(200_000),
            ")".repeat(200_001)
        );
        let err = CexReconstructor::new(ctx, &mapping)
            .reconstruct(&text)
            .unwrap_err();
        assert!(matches!(err, CexError::Syntax { .. }));
    }

    #[test]
    fn test_unknown_variable() {
        let ctx = Arc::new(Context::new());
        let (mapping, _, _) = mapping(&ctx);
        let err = CexReconstructor::new(ctx, &mapping)
            .reconstruct("(Trace (InitLoc L0) (CfaState L1 (ExplState (y 1))))")
            .unwrap_err();
        assert!(matches!(err, CexError::UnknownVariable { ref name, .. } if name == "y"));
    }

    #[test]
    fn test_action_blocks_skipped() {
        let ctx = Arc::new(Context::new());
        let (mapping, _, _) = mapping(&ctx);
        let rec = CexReconstructor::new(ctx, &mapping)
            .reconstruct(
                "(Trace (InitLoc L0) (CfaAction (x := 3)) (CfaState L1 (ExplState (x 3) (err 4))))",
            )
            .unwrap();
        assert_eq!(rec.trace.len(), 2);
        assert_eq!(rec.error_code, 4);
    }

    #[test]
    fn test_not_a_trace() {
        let ctx = Arc::new(Context::new());
        let (mapping, _, _) = mapping(&ctx);
        let err = CexReconstructor::new(ctx, &mapping)
            .reconstruct("(Other)")
            .unwrap_err();
        assert!(matches!(err, CexError::Schema { .. }));
        assert_eq!(err.raw(), "(Other)");
    }
}
