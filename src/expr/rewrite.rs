//! Variable substitution over expression DAGs

use super::{ExprBuilder, ExprData, ExprRef};
use crate::error::Result;
use crate::types::Variable;
use rustc_hash::FxHashMap;

/// Replace every reference to a key of `map` by its value.
///
/// Shared sub-expressions are rewritten once. Nodes are rebuilt through the
/// builder, so a replacement of the wrong type is rejected like any other
/// ill-typed construction.
pub fn substitute(
    builder: &ExprBuilder,
    expr: &ExprRef,
    map: &FxHashMap<Variable, ExprRef>,
) -> Result<ExprRef> {
    let mut memo = FxHashMap::default();
    rewrite(builder, expr, map, &mut memo)
}

fn rewrite(
    builder: &ExprBuilder,
    expr: &ExprRef,
    map: &FxHashMap<Variable, ExprRef>,
    memo: &mut FxHashMap<ExprRef, ExprRef>,
) -> Result<ExprRef> {
    if let Some(done) = memo.get(expr) {
        return Ok(done.clone());
    }

    let result = match expr.data() {
        ExprData::Literal(_) => expr.clone(),
        ExprData::VarRef(var) => map.get(var).cloned().unwrap_or_else(|| expr.clone()),
        _ => {
            let mut operands = Vec::with_capacity(expr.num_operands());
            let mut changed = false;
            for operand in expr.operands() {
                let new = rewrite(builder, operand, map, memo)?;
                changed |= &new != operand;
                operands.push(new);
            }

            if changed {
                builder.rebuild(expr, operands)?
            } else {
                expr.clone()
            }
        }
    };

    memo.insert(expr.clone(), result.clone());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Context;
    use std::sync::Arc;

    #[test]
    fn test_substitute_variable() {
        let b = ExprBuilder::new(Arc::new(Context::new()));
        let ctx = b.context().clone();
        let x = ctx.create_variable("f/x", ctx.int_type()).unwrap();
        let y = ctx.create_variable("main/y", ctx.int_type()).unwrap();

        let e = b.add(b.var_ref(&x), b.var_ref(&x)).unwrap();
        let mut map = FxHashMap::default();
        map.insert(x.clone(), b.var_ref(&y));

        let rewritten = substitute(&b, &e, &map).unwrap();
        let expected = b.add(b.var_ref(&y), b.var_ref(&y)).unwrap();
        assert_eq!(rewritten, expected);
    }

    #[test]
    fn test_unchanged_keeps_node() {
        let b = ExprBuilder::new(Arc::new(Context::new()));
        let e = b.lt(b.int_lit(1), b.int_lit(2)).unwrap();
        let rewritten = substitute(&b, &e, &FxHashMap::default()).unwrap();
        assert_eq!(rewritten, e);
    }

    #[test]
    fn test_ill_typed_replacement_rejected() {
        let b = ExprBuilder::new(Arc::new(Context::new()));
        let ctx = b.context().clone();
        let x = ctx.create_variable("x", ctx.int_type()).unwrap();
        let e = b.add(b.var_ref(&x), b.int_lit(1)).unwrap();

        let mut map = FxHashMap::default();
        map.insert(x, b.true_lit());
        assert!(substitute(&b, &e, &map).is_err());
    }
}
