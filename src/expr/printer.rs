//! Expression rendering
//!
//! Two styles share one recursive walk: `Readable` for diagnostics and
//! `Display`, `Model` for the external tool's input language. Variable names
//! can be replaced through a namer callback, which the model writer uses to
//! emit sanitized names.

use super::{BinaryOp, Expr, ExprData, Literal};
use crate::types::Variable;
use std::fmt::{self, Write};

/// Output syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStyle {
    /// Infix notation for humans
    Readable,
    /// Input syntax of the external model checker
    Model,
}

/// Renders expressions in a given style
pub struct ExprPrinter<'a> {
    style: PrintStyle,
    namer: Option<&'a dyn Fn(&Variable) -> String>,
}

impl<'a> ExprPrinter<'a> {
    /// Printer using qualified variable names
    pub fn new(style: PrintStyle) -> Self {
        Self { style, namer: None }
    }

    /// Use `namer` to print variable references
    pub fn with_namer(mut self, namer: &'a dyn Fn(&Variable) -> String) -> Self {
        self.namer = Some(namer);
        self
    }

    /// Render into a fresh string
    pub fn print(&self, expr: &Expr) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write(&mut out, expr);
        out
    }

    /// Render into any formatter sink
    pub fn write(&self, out: &mut dyn Write, expr: &Expr) -> fmt::Result {
        match expr.data() {
            ExprData::Literal(lit) => self.write_literal(out, lit),
            ExprData::VarRef(var) => match self.namer {
                Some(namer) => write!(out, "{}", namer(var)),
                None => write!(out, "{}", var.name()),
            },
            ExprData::Not(operand) => {
                write!(out, "(not ")?;
                self.write(out, operand)?;
                write!(out, ")")
            }
            ExprData::Binary { op, left, right } => {
                write!(out, "(")?;
                self.write(out, left)?;
                write!(out, " {} ", self.operator(*op))?;
                self.write(out, right)?;
                write!(out, ")")
            }
            ExprData::Select {
                cond,
                then_expr,
                else_expr,
            } => {
                write!(out, "(if ")?;
                self.write(out, cond)?;
                write!(out, " then ")?;
                self.write(out, then_expr)?;
                write!(out, " else ")?;
                self.write(out, else_expr)?;
                write!(out, ")")
            }
            ExprData::TupleConstruct(members) => {
                write!(out, "(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(out, ", ")?;
                    }
                    self.write(out, member)?;
                }
                write!(out, ")")
            }
            ExprData::TupleSelect { tuple, index } => {
                self.write(out, tuple)?;
                write!(out, ".{}", index)
            }
        }
    }

    fn write_literal(&self, out: &mut dyn Write, lit: &Literal) -> fmt::Result {
        match (self.style, lit) {
            (PrintStyle::Model, Literal::Bv { width, value }) => {
                write!(out, "{}'d{}", width, value)
            }
            (PrintStyle::Model, Literal::Int(v)) if *v < 0 => write!(out, "(- {})", -(*v as i128)),
            _ => write!(out, "{}", lit),
        }
    }

    fn operator(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => match self.style {
                PrintStyle::Readable => "!=",
                PrintStyle::Model => "/=",
            },
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }
}
