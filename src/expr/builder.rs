//! Type-checked expression construction

use super::{BinaryOp, Expr, ExprData, ExprRef, Literal};
use crate::error::{Error, Result};
use crate::types::{Context, Type, TypeKind, Variable};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::One;
use std::sync::Arc;

/// Builds expression nodes in one context.
///
/// Every constructor validates operand arity and types before creating a
/// node; violations are reported as [`Error::TypeMismatch`],
/// [`Error::InvalidArity`] or [`Error::IndexOutOfBounds`] and no node is built.
#[derive(Debug, Clone)]
pub struct ExprBuilder {
    ctx: Arc<Context>,
}

impl ExprBuilder {
    /// Create a builder over `ctx`
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// The owning context
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    fn make(&self, data: ExprData, ty: Type) -> ExprRef {
        self.ctx.exprs().intern(Expr::new(data, ty))
    }

    // Literals
    //-------------------------------------------------------------------------

    /// Any literal value
    pub fn literal(&self, lit: Literal) -> ExprRef {
        match lit {
            Literal::Bool(b) => self.bool_lit(b),
            Literal::Int(v) => self.int_lit(v),
            Literal::Bv { width, value } => self.bv_lit(value, width),
        }
    }

    /// Boolean literal
    pub fn bool_lit(&self, value: bool) -> ExprRef {
        self.make(ExprData::Literal(Literal::Bool(value)), self.ctx.bool_type())
    }

    /// The `true` literal
    pub fn true_lit(&self) -> ExprRef {
        self.bool_lit(true)
    }

    /// The `false` literal
    pub fn false_lit(&self) -> ExprRef {
        self.bool_lit(false)
    }

    /// Integer literal. Repeated requests for one value share a node.
    pub fn int_lit(&self, value: i64) -> ExprRef {
        self.make(ExprData::Literal(Literal::Int(value)), self.ctx.int_type())
    }

    /// Bit-vector literal, reduced modulo `2^width`
    ///
    /// # Panics
    /// If `width` is zero.
    pub fn bv_lit(&self, value: impl Into<BigUint>, width: u32) -> ExprRef {
        let modulus = BigUint::one() << width;
        let value = value.into() % modulus;
        self.make(
            ExprData::Literal(Literal::Bv { width, value }),
            self.ctx.bv_type(width),
        )
    }

    /// Bit-vector literal from a signed value: two's complement, then
    /// truncated to `width` bits
    pub fn bv_lit_signed(&self, value: &BigInt, width: u32) -> ExprRef {
        let modulus = BigInt::one() << width;
        let mut reduced = value % &modulus;
        if reduced.sign() == Sign::Minus {
            reduced += &modulus;
        }
        // `reduced` is now in [0, 2^width)
        let (_, magnitude) = reduced.into_parts();
        self.bv_lit(magnitude, width)
    }

    /// Reference to a variable
    pub fn var_ref(&self, var: &Variable) -> ExprRef {
        self.make(ExprData::VarRef(var.clone()), var.ty().clone())
    }

    // Operators
    //-------------------------------------------------------------------------

    /// Negation: Bool, or bitwise on a bit-vector
    pub fn not(&self, operand: ExprRef) -> Result<ExprRef> {
        let ty = operand.ty().clone();
        if !(ty.is_bool() || ty.is_bv()) {
            return Err(Error::type_mismatch("Bool or bit-vector", ty.name()));
        }
        Ok(self.make(ExprData::Not(operand), ty))
    }

    /// Addition
    pub fn add(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::Add, left, right)
    }

    /// Subtraction
    pub fn sub(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::Sub, left, right)
    }

    /// Multiplication
    pub fn mul(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::Mul, left, right)
    }

    /// Division
    pub fn div(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::Div, left, right)
    }

    /// Conjunction
    pub fn and(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::And, left, right)
    }

    /// Disjunction
    pub fn or(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::Or, left, right)
    }

    /// Exclusive or
    pub fn xor(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::Xor, left, right)
    }

    /// Equality
    pub fn eq(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::Eq, left, right)
    }

    /// Disequality
    pub fn not_eq(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::NotEq, left, right)
    }

    /// Less than
    pub fn lt(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::Lt, left, right)
    }

    /// Less than or equal
    pub fn lt_eq(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::LtEq, left, right)
    }

    /// Greater than
    pub fn gt(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::Gt, left, right)
    }

    /// Greater than or equal
    pub fn gt_eq(&self, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        self.binary(BinaryOp::GtEq, left, right)
    }

    /// Any binary operator.
    ///
    /// Both operands must share one type. Arithmetic and ordering need a
    /// numeric type; logic needs Bool or a bit-vector. Comparisons yield Bool,
    /// everything else yields the operand type.
    pub fn binary(&self, op: BinaryOp, left: ExprRef, right: ExprRef) -> Result<ExprRef> {
        let lty = left.ty().clone();
        let rty = right.ty();
        if &lty != rty {
            return Err(Error::type_mismatch(
                format!("{} operands of type {}", op.kind().name(), lty),
                rty.name(),
            ));
        }

        let kind = op.kind();
        let result_ty = if kind.is_arithmetic() {
            if !lty.is_numeric() {
                return Err(Error::type_mismatch("numeric operands", lty.name()));
            }
            lty
        } else if kind.is_logic() {
            if !(lty.is_bool() || lty.is_bv()) {
                return Err(Error::type_mismatch("Bool or bit-vector operands", lty.name()));
            }
            lty
        } else {
            let ordered = !matches!(op, BinaryOp::Eq | BinaryOp::NotEq);
            if ordered && !lty.is_numeric() {
                return Err(Error::type_mismatch("comparable operands", lty.name()));
            }
            self.ctx.bool_type()
        };

        Ok(self.make(ExprData::Binary { op, left, right }, result_ty))
    }

    /// If-then-else. The condition must be Bool and both branches must have
    /// the same type, which becomes the result type.
    pub fn select(
        &self,
        cond: ExprRef,
        then_expr: ExprRef,
        else_expr: ExprRef,
    ) -> Result<ExprRef> {
        if !cond.ty().is_bool() {
            return Err(Error::type_mismatch("Bool condition", cond.ty().name()));
        }
        if then_expr.ty() != else_expr.ty() {
            return Err(Error::type_mismatch(
                format!("else branch of type {}", then_expr.ty()),
                else_expr.ty().name(),
            ));
        }

        let ty = then_expr.ty().clone();
        Ok(self.make(
            ExprData::Select {
                cond,
                then_expr,
                else_expr,
            },
            ty,
        ))
    }

    // Tuples
    //-------------------------------------------------------------------------

    /// Tuple value of type `ty` from its members
    pub fn tuple(&self, ty: &Type, members: Vec<ExprRef>) -> Result<ExprRef> {
        let subtypes = match ty.kind() {
            TypeKind::Tuple(subtypes) => subtypes,
            _ => return Err(Error::type_mismatch("tuple type", ty.name())),
        };

        if subtypes.len() != members.len() {
            return Err(Error::InvalidArity {
                what: format!("tuple {}", ty),
                expected: subtypes.len(),
                got: members.len(),
            });
        }

        for (member, expected) in members.iter().zip(subtypes) {
            if member.ty() != expected {
                return Err(Error::type_mismatch(expected.name(), member.ty().name()));
            }
        }

        Ok(self.make(ExprData::TupleConstruct(members), ty.clone()))
    }

    /// Member `index` of a tuple-typed expression
    pub fn tuple_select(&self, tuple: ExprRef, index: usize) -> Result<ExprRef> {
        let member_ty = match tuple.ty().kind() {
            TypeKind::Tuple(subtypes) => match subtypes.get(index) {
                Some(ty) => ty.clone(),
                None => {
                    return Err(Error::IndexOutOfBounds {
                        index,
                        length: subtypes.len(),
                    })
                }
            },
            _ => return Err(Error::type_mismatch("tuple type", tuple.ty().name())),
        };

        Ok(self.make(ExprData::TupleSelect { tuple, index }, member_ty))
    }

    /// Build a node of the same shape as `expr` over new operands
    pub fn rebuild(&self, expr: &Expr, operands: Vec<ExprRef>) -> Result<ExprRef> {
        let arity = expr.num_operands();
        if operands.len() != arity {
            return Err(Error::InvalidArity {
                what: expr.kind().name().to_string(),
                expected: arity,
                got: operands.len(),
            });
        }

        let mut ops = operands.into_iter();
        let mut next = || {
            ops.next()
                .ok_or_else(|| Error::internal("operand list exhausted"))
        };

        match expr.data() {
            ExprData::Literal(lit) => Ok(self.literal(lit.clone())),
            ExprData::VarRef(var) => Ok(self.var_ref(var)),
            ExprData::Not(_) => self.not(next()?),
            ExprData::Binary { op, .. } => {
                let left = next()?;
                let right = next()?;
                self.binary(*op, left, right)
            }
            ExprData::Select { .. } => {
                let cond = next()?;
                let then_expr = next()?;
                let else_expr = next()?;
                self.select(cond, then_expr, else_expr)
            }
            ExprData::TupleConstruct(_) => {
                let members = std::iter::from_fn(|| next().ok()).collect();
                self.tuple(expr.ty(), members)
            }
            ExprData::TupleSelect { index, .. } => self.tuple_select(next()?, *index),
        }
    }

    /// Number of interned nodes still referenced somewhere
    pub fn live_nodes(&self) -> usize {
        self.ctx.exprs().live_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprKind;

    fn builder() -> ExprBuilder {
        ExprBuilder::new(Arc::new(Context::new()))
    }

    #[test]
    fn test_int_literal_shared() {
        let b = builder();
        let a = b.int_lit(10);
        let c = b.int_lit(10);
        assert_eq!(a, c);
        assert!(a.share_count() >= 2);
        assert_ne!(b.int_lit(10), b.int_lit(11));
    }

    #[test]
    fn test_structural_sharing() {
        let b = builder();
        let x = b
            .context()
            .create_variable("x", b.context().int_type())
            .unwrap();
        let e1 = b.add(b.var_ref(&x), b.int_lit(1)).unwrap();
        let e2 = b.add(b.var_ref(&x), b.int_lit(1)).unwrap();
        assert_eq!(e1, e2);
        assert_eq!(e1.kind(), ExprKind::Add);
        assert_eq!(e1.num_operands(), 2);
    }

    #[test]
    fn test_arithmetic_type_rules() {
        let b = builder();
        assert!(b.add(b.int_lit(1), b.true_lit()).is_err());
        assert!(b.mul(b.true_lit(), b.false_lit()).is_err());
        let sum = b.add(b.bv_lit(1u32, 8), b.bv_lit(2u32, 8)).unwrap();
        assert_eq!(sum.ty(), &b.context().bv_type(8));
        assert!(b.add(b.bv_lit(1u32, 8), b.bv_lit(2u32, 16)).is_err());
    }

    #[test]
    fn test_compare_yields_bool() {
        let b = builder();
        let lt = b.lt(b.int_lit(1), b.int_lit(2)).unwrap();
        assert!(lt.ty().is_bool());
        assert!(b.lt(b.true_lit(), b.false_lit()).is_err());
        assert!(b.eq(b.true_lit(), b.false_lit()).is_ok());
    }

    #[test]
    fn test_select_rules() {
        let b = builder();
        let sel = b.select(b.true_lit(), b.int_lit(1), b.int_lit(2)).unwrap();
        assert!(sel.ty().is_int());
        assert!(b.select(b.int_lit(0), b.int_lit(1), b.int_lit(2)).is_err());
        assert!(b.select(b.true_lit(), b.int_lit(1), b.false_lit()).is_err());
    }

    #[test]
    fn test_bv_literal_truncation() {
        let b = builder();
        let lit = b.bv_lit(300u32, 8);
        assert_eq!(lit.as_literal().and_then(Literal::as_u64), Some(44));

        let neg = b.bv_lit_signed(&BigInt::from(-1), 4);
        assert_eq!(neg.as_literal().and_then(Literal::as_u64), Some(15));
    }

    #[test]
    fn test_tuples() {
        let b = builder();
        let ctx = b.context().clone();
        let ty = ctx.tuple_type(vec![ctx.int_type(), ctx.bool_type()]).unwrap();

        let tup = b.tuple(&ty, vec![b.int_lit(3), b.true_lit()]).unwrap();
        let second = b.tuple_select(tup.clone(), 1).unwrap();
        assert!(second.ty().is_bool());

        assert_eq!(
            b.tuple_select(tup, 2).unwrap_err(),
            Error::IndexOutOfBounds {
                index: 2,
                length: 2
            }
        );
        assert!(b.tuple(&ty, vec![b.int_lit(3)]).is_err());
        assert!(b.tuple(&ty, vec![b.true_lit(), b.int_lit(3)]).is_err());
    }

    #[test]
    fn test_weak_cache_rebuilds() {
        let b = builder();
        let before = b.live_nodes();
        {
            let _tmp = b.int_lit(123_456);
            assert_eq!(b.live_nodes(), before + 1);
        }
        assert_eq!(b.live_nodes(), before);
        let again = b.int_lit(123_456);
        assert_eq!(again.as_literal(), Some(&Literal::Int(123_456)));
    }
}
