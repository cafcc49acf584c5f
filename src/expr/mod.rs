//! # Expression IR
//!
//! Immutable, typed expression nodes shared through [`ExprRef`] handles.
//! Nodes are created only through [`ExprBuilder`], which checks operand types
//! and hash-conses the result in the owning [`Context`](crate::types::Context):
//! building the same structure twice returns the same handle, so `==` on
//! handles is an identity check.
//!
//! ## Kinds
//!
//! | Class | Kinds | Operands |
//! |-------|-------|----------|
//! | Nullary | `Literal`, `VarRef` | 0 |
//! | Unary | `Not` | 1 |
//! | Arithmetic | `Add`, `Sub`, `Mul`, `Div` | 2 |
//! | Logic | `And`, `Or`, `Xor` | 2 |
//! | Compare | `Eq`, `NotEq`, `Lt`, `LtEq`, `Gt`, `GtEq` | 2 |
//! | Ternary | `Select` | 3 (condition, then, else) |
//! | Tuple | `TupleConstruct`, `TupleSelect` | n / 1 |
//!
//! The interning table holds weak references only. A node lives as long as
//! some consumer holds its handle; a later request for the same structure
//! after every handle was dropped builds a fresh node.

pub mod builder;
pub mod printer;
pub mod rewrite;

pub use builder::ExprBuilder;
pub use printer::{ExprPrinter, PrintStyle};
pub use rewrite::substitute;

use crate::types::{Type, Variable};
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Kind tag of an expression node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    // Nullary
    /// Constant value
    Literal,
    /// Reference to a variable
    VarRef,

    // Unary logic
    /// Negation
    Not,

    // Binary arithmetic
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,

    // Binary logic
    /// Conjunction
    And,
    /// Disjunction
    Or,
    /// Exclusive or
    Xor,

    // Compare
    /// Equality
    Eq,
    /// Disequality
    NotEq,
    /// Less than
    Lt,
    /// Less than or equal
    LtEq,
    /// Greater than
    Gt,
    /// Greater than or equal
    GtEq,

    // Ternary
    /// If-then-else
    Select,

    // Tuples
    /// Tuple value from its members
    TupleConstruct,
    /// Projection of one tuple member
    TupleSelect,
}

impl ExprKind {
    /// Literal or variable reference
    pub fn is_nullary(&self) -> bool {
        matches!(self, ExprKind::Literal | ExprKind::VarRef)
    }

    /// Single operand kinds
    pub fn is_unary(&self) -> bool {
        matches!(self, ExprKind::Not | ExprKind::TupleSelect)
    }

    /// `+ - * /`
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            ExprKind::Add | ExprKind::Sub | ExprKind::Mul | ExprKind::Div
        )
    }

    /// `and or xor`
    pub fn is_logic(&self) -> bool {
        matches!(self, ExprKind::And | ExprKind::Or | ExprKind::Xor)
    }

    /// Comparisons, all producing Bool
    pub fn is_compare(&self) -> bool {
        matches!(
            self,
            ExprKind::Eq
                | ExprKind::NotEq
                | ExprKind::Lt
                | ExprKind::LtEq
                | ExprKind::Gt
                | ExprKind::GtEq
        )
    }

    /// Name of the kind, as used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Literal => "Literal",
            ExprKind::VarRef => "VarRef",
            ExprKind::Not => "Not",
            ExprKind::Add => "Add",
            ExprKind::Sub => "Sub",
            ExprKind::Mul => "Mul",
            ExprKind::Div => "Div",
            ExprKind::And => "And",
            ExprKind::Or => "Or",
            ExprKind::Xor => "Xor",
            ExprKind::Eq => "Eq",
            ExprKind::NotEq => "NotEq",
            ExprKind::Lt => "Lt",
            ExprKind::LtEq => "LtEq",
            ExprKind::Gt => "Gt",
            ExprKind::GtEq => "GtEq",
            ExprKind::Select => "Select",
            ExprKind::TupleConstruct => "TupleConstruct",
            ExprKind::TupleSelect => "TupleSelect",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Conjunction
    And,
    /// Disjunction
    Or,
    /// Exclusive or
    Xor,
    /// Equality
    Eq,
    /// Disequality
    NotEq,
    /// Less than
    Lt,
    /// Less than or equal
    LtEq,
    /// Greater than
    Gt,
    /// Greater than or equal
    GtEq,
}

impl BinaryOp {
    /// Kind tag of nodes built from this operator
    pub fn kind(&self) -> ExprKind {
        match self {
            BinaryOp::Add => ExprKind::Add,
            BinaryOp::Sub => ExprKind::Sub,
            BinaryOp::Mul => ExprKind::Mul,
            BinaryOp::Div => ExprKind::Div,
            BinaryOp::And => ExprKind::And,
            BinaryOp::Or => ExprKind::Or,
            BinaryOp::Xor => ExprKind::Xor,
            BinaryOp::Eq => ExprKind::Eq,
            BinaryOp::NotEq => ExprKind::NotEq,
            BinaryOp::Lt => ExprKind::Lt,
            BinaryOp::LtEq => ExprKind::LtEq,
            BinaryOp::Gt => ExprKind::Gt,
            BinaryOp::GtEq => ExprKind::GtEq,
        }
    }
}

/// Constant values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// Boolean constant
    Bool(bool),
    /// Integer constant
    Int(i64),
    /// Bit-vector constant, always below `2^width`
    Bv {
        /// Width in bits
        width: u32,
        /// Unsigned value
        value: BigUint,
    },
}

impl Literal {
    /// Unsigned numeric value, saturating at `u64::MAX`.
    /// Negative integers and booleans have no unsigned value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Literal::Bool(_) => None,
            Literal::Int(v) => u64::try_from(*v).ok(),
            Literal::Bv { value, .. } => Some(value.to_u64().unwrap_or(u64::MAX)),
        }
    }

    /// Boolean value, if this is a boolean literal
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Bv { width, value } => write!(f, "{}bv{}", value, width),
        }
    }
}

/// Payload of an expression node
#[derive(Debug, Clone)]
pub enum ExprData {
    /// Constant
    Literal(Literal),
    /// Variable reference
    VarRef(Variable),
    /// Negation
    Not(ExprRef),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: ExprRef,
        /// Right operand
        right: ExprRef,
    },
    /// If-then-else
    Select {
        /// Boolean condition
        cond: ExprRef,
        /// Value when the condition holds
        then_expr: ExprRef,
        /// Value otherwise
        else_expr: ExprRef,
    },
    /// Tuple from its members
    TupleConstruct(Vec<ExprRef>),
    /// Tuple member projection
    TupleSelect {
        /// Tuple-typed operand
        tuple: ExprRef,
        /// Member index
        index: usize,
    },
}

/// Typed expression node. The type is fixed at construction.
#[derive(Debug)]
pub struct Expr {
    data: ExprData,
    ty: Type,
}

impl Expr {
    pub(crate) fn new(data: ExprData, ty: Type) -> Self {
        Self { data, ty }
    }

    /// Payload for exhaustive matching
    pub fn data(&self) -> &ExprData {
        &self.data
    }

    /// Resolved type
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Kind tag
    pub fn kind(&self) -> ExprKind {
        match &self.data {
            ExprData::Literal(_) => ExprKind::Literal,
            ExprData::VarRef(_) => ExprKind::VarRef,
            ExprData::Not(_) => ExprKind::Not,
            ExprData::Binary { op, .. } => op.kind(),
            ExprData::Select { .. } => ExprKind::Select,
            ExprData::TupleConstruct(_) => ExprKind::TupleConstruct,
            ExprData::TupleSelect { .. } => ExprKind::TupleSelect,
        }
    }

    /// Operands in order; empty for nullary nodes
    pub fn operands(&self) -> Vec<&ExprRef> {
        match &self.data {
            ExprData::Literal(_) | ExprData::VarRef(_) => Vec::new(),
            ExprData::Not(operand) => vec![operand],
            ExprData::Binary { left, right, .. } => vec![left, right],
            ExprData::Select {
                cond,
                then_expr,
                else_expr,
            } => vec![cond, then_expr, else_expr],
            ExprData::TupleConstruct(members) => members.iter().collect(),
            ExprData::TupleSelect { tuple, .. } => vec![tuple],
        }
    }

    /// Number of operands
    pub fn num_operands(&self) -> usize {
        self.operands().len()
    }

    /// Literal payload, if any
    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.data {
            ExprData::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Referenced variable, if this is a VarRef
    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.data {
            ExprData::VarRef(var) => Some(var),
            _ => None,
        }
    }

    /// Check if this node is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self.data, ExprData::Literal(_))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ExprPrinter::new(PrintStyle::Readable).write(f, self)
    }
}

/// Shared handle to an interned expression node. Compared by identity.
#[derive(Clone)]
pub struct ExprRef(Arc<Expr>);

impl ExprRef {
    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Number of live handles to this node
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Deref for ExprRef {
    type Target = Expr;

    fn deref(&self) -> &Expr {
        &self.0
    }
}

impl PartialEq for ExprRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ExprRef {}

impl Hash for ExprRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for ExprRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ExprRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structural key of a node. Operands are identified by address; a live
/// entry keeps its operands alive, so an address cannot be reused while the
/// entry can still be upgraded.
#[derive(PartialEq, Eq, Hash)]
enum ExprKey {
    Literal(Literal),
    VarRef(Variable),
    Not(usize),
    Binary(BinaryOp, usize, usize),
    Select(usize, usize, usize),
    Tuple(Type, Vec<usize>),
    TupleSelect(usize, usize),
}

impl ExprKey {
    fn of(expr: &Expr) -> Self {
        match &expr.data {
            ExprData::Literal(lit) => ExprKey::Literal(lit.clone()),
            ExprData::VarRef(var) => ExprKey::VarRef(var.clone()),
            ExprData::Not(operand) => ExprKey::Not(operand.addr()),
            ExprData::Binary { op, left, right } => {
                ExprKey::Binary(*op, left.addr(), right.addr())
            }
            ExprData::Select {
                cond,
                then_expr,
                else_expr,
            } => ExprKey::Select(cond.addr(), then_expr.addr(), else_expr.addr()),
            ExprData::TupleConstruct(members) => ExprKey::Tuple(
                expr.ty.clone(),
                members.iter().map(ExprRef::addr).collect(),
            ),
            ExprData::TupleSelect { tuple, index } => ExprKey::TupleSelect(tuple.addr(), *index),
        }
    }
}

const MIN_PURGE_THRESHOLD: usize = 1024;

struct TableState {
    map: FxHashMap<ExprKey, Weak<Expr>>,
    purge_at: usize,
}

/// Weak hash-consing table owned by a context
pub(crate) struct ExprTable {
    state: Mutex<TableState>,
}

impl ExprTable {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                map: FxHashMap::default(),
                purge_at: MIN_PURGE_THRESHOLD,
            }),
        }
    }

    /// Return the live node equal to `expr`, or register `expr` as the new one
    pub(crate) fn intern(&self, expr: Expr) -> ExprRef {
        let key = ExprKey::of(&expr);
        let mut state = self.state.lock();

        if let Some(existing) = state.map.get(&key).and_then(Weak::upgrade) {
            return ExprRef(existing);
        }

        let node = Arc::new(expr);
        state.map.insert(key, Arc::downgrade(&node));

        if state.map.len() >= state.purge_at {
            state.map.retain(|_, entry| entry.strong_count() > 0);
            state.purge_at = (state.map.len() * 2).max(MIN_PURGE_THRESHOLD);
        }

        ExprRef(node)
    }

    /// Number of nodes still alive
    pub(crate) fn live_count(&self) -> usize {
        self.state
            .lock()
            .map
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }
}
