//! # Type System
//!
//! Closed set of expression types. Every [`Type`] is a handle to a canonical
//! instance owned by a [`Context`]: requesting the same shape twice from one
//! context yields the same instance, so `==` on types is an identity check.
//!
//! ```text
//! Primitive:  Bool | Int | Bv(width) | Float(precision) | Real
//! Composite:  Array(index, elem) | Tuple(t1, t2, ...) | Function(result, params)
//! ```
//!
//! ```rust
//! use cfa_core::types::Context;
//!
//! let ctx = Context::new();
//! let a = ctx.bv_type(32);
//! let b = ctx.bv_type(32);
//! assert_eq!(a, b);
//! assert_eq!(a.name(), "Bv32");
//! ```

pub mod context;

pub use context::{Context, Variable};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// IEEE-754 floating point precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatPrecision {
    /// 16-bit half precision
    Half,
    /// 32-bit single precision
    Single,
    /// 64-bit double precision
    Double,
    /// 128-bit quad precision
    Quad,
}

impl FloatPrecision {
    /// Total width in bits
    pub fn width(&self) -> u32 {
        match self {
            FloatPrecision::Half => 16,
            FloatPrecision::Single => 32,
            FloatPrecision::Double => 64,
            FloatPrecision::Quad => 128,
        }
    }

    /// Width of the exponent field in bits
    pub fn exponent_width(&self) -> u32 {
        match self {
            FloatPrecision::Half => 5,
            FloatPrecision::Single => 8,
            FloatPrecision::Double => 11,
            FloatPrecision::Quad => 15,
        }
    }

    /// Width of the significand in bits, including the hidden bit
    pub fn significand_width(&self) -> u32 {
        match self {
            FloatPrecision::Half => 11,
            FloatPrecision::Single => 24,
            FloatPrecision::Double => 53,
            FloatPrecision::Quad => 113,
        }
    }

    /// Precision for a total bit width, if it is one of the IEEE formats
    pub fn from_width(width: u32) -> Option<Self> {
        match width {
            16 => Some(FloatPrecision::Half),
            32 => Some(FloatPrecision::Single),
            64 => Some(FloatPrecision::Double),
            128 => Some(FloatPrecision::Quad),
            _ => None,
        }
    }
}

/// Shape of a type. Composite shapes refer to canonical subtypes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    // === Primitives ===
    /// Boolean type
    Bool,
    /// Unbounded mathematical integer
    Int,
    /// Fixed-width bit-vector
    Bv {
        /// Width in bits (at least 1)
        width: u32,
    },
    /// Floating point number
    Float(FloatPrecision),
    /// Mathematical real
    Real,

    // === Composites ===
    /// Array from index type to element type
    Array {
        /// Index type
        index: Type,
        /// Element type
        elem: Type,
    },
    /// Tuple with at least two members
    Tuple(Vec<Type>),
    /// Function type
    Function {
        /// Result type
        result: Type,
        /// Parameter types
        params: Vec<Type>,
    },
}

/// Handle to a canonical type instance.
///
/// Equality and hashing use the identity of the instance; since a context
/// never holds two instances of one shape, identity and structural equality agree.
#[derive(Clone)]
pub struct Type(Arc<TypeKind>);

impl Type {
    pub(crate) fn from_kind(kind: TypeKind) -> Self {
        Type(Arc::new(kind))
    }

    /// The shape of this type, for exhaustive matching
    pub fn kind(&self) -> &TypeKind {
        &self.0
    }

    /// Check if this is a primitive type
    pub fn is_primitive(&self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Bool
                | TypeKind::Int
                | TypeKind::Bv { .. }
                | TypeKind::Float(_)
                | TypeKind::Real
        )
    }

    /// Check if this is a composite type
    pub fn is_composite(&self) -> bool {
        !self.is_primitive()
    }

    /// Check if this is the boolean type
    pub fn is_bool(&self) -> bool {
        matches!(self.kind(), TypeKind::Bool)
    }

    /// Check if this is the integer type
    pub fn is_int(&self) -> bool {
        matches!(self.kind(), TypeKind::Int)
    }

    /// Check if this is a bit-vector type
    pub fn is_bv(&self) -> bool {
        matches!(self.kind(), TypeKind::Bv { .. })
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self.kind(), TypeKind::Float(_))
    }

    /// Check if this is the real type
    pub fn is_real(&self) -> bool {
        matches!(self.kind(), TypeKind::Real)
    }

    /// Check if this is a tuple type
    pub fn is_tuple(&self) -> bool {
        matches!(self.kind(), TypeKind::Tuple(_))
    }

    /// Mathematical arithmetic types (Int and Real)
    pub fn is_arithmetic(&self) -> bool {
        self.is_int() || self.is_real()
    }

    /// Types accepted by `+ - * /` and the ordering comparisons
    pub fn is_numeric(&self) -> bool {
        self.is_arithmetic() || self.is_bv() || self.is_float()
    }

    /// Bit width of a bit-vector or float type
    pub fn bit_width(&self) -> Option<u32> {
        match self.kind() {
            TypeKind::Bv { width } => Some(*width),
            TypeKind::Float(precision) => Some(precision.width()),
            _ => None,
        }
    }

    /// Member types of a tuple
    pub fn tuple_members(&self) -> Option<&[Type]> {
        match self.kind() {
            TypeKind::Tuple(members) => Some(members),
            _ => None,
        }
    }

    /// Human readable type name
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeKind::Bool => write!(f, "Bool"),
            TypeKind::Int => write!(f, "Int"),
            TypeKind::Bv { width } => write!(f, "Bv{}", width),
            TypeKind::Float(precision) => write!(f, "Float{}", precision.width()),
            TypeKind::Real => write!(f, "Real"),
            TypeKind::Array { index, elem } => write!(f, "[{} -> {}]", index, elem),
            TypeKind::Tuple(members) => {
                write!(f, "(")?;
                for (i, t) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            TypeKind::Function { result, params } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        let ctx = Context::new();
        assert_eq!(ctx.bool_type().to_string(), "Bool");
        assert_eq!(ctx.bv_type(8).to_string(), "Bv8");
        assert_eq!(ctx.float_type(FloatPrecision::Double).to_string(), "Float64");
        assert_eq!(
            ctx.array_type(ctx.int_type(), ctx.bool_type())
                .unwrap()
                .to_string(),
            "[Int -> Bool]"
        );
        let tuple = ctx
            .tuple_type(vec![ctx.int_type(), ctx.bool_type()])
            .unwrap();
        assert_eq!(tuple.to_string(), "(Int, Bool)");
        assert_eq!(
            ctx.function_type(ctx.bool_type(), vec![ctx.int_type()])
                .unwrap()
                .to_string(),
            "(Int) -> Bool"
        );
    }

    #[test]
    fn test_predicates() {
        let ctx = Context::new();
        assert!(ctx.int_type().is_arithmetic());
        assert!(ctx.real_type().is_arithmetic());
        assert!(!ctx.bv_type(4).is_arithmetic());
        assert!(ctx.bv_type(4).is_numeric());
        assert!(ctx.bool_type().is_primitive());
        assert!(ctx
            .array_type(ctx.int_type(), ctx.int_type())
            .unwrap()
            .is_composite());
        assert_eq!(ctx.bv_type(12).bit_width(), Some(12));
    }

    #[test]
    fn test_float_widths() {
        assert_eq!(FloatPrecision::Single.exponent_width(), 8);
        assert_eq!(FloatPrecision::Double.significand_width(), 53);
        assert_eq!(FloatPrecision::from_width(128), Some(FloatPrecision::Quad));
        assert_eq!(FloatPrecision::from_width(80), None);
    }
}
