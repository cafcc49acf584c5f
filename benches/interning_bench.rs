use cfa_core::verifier::{CexReconstructor, NameMapping};
use cfa_core::{CfaId, Context, ExprBuilder, InlineMap, LocId};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn interning_benchmark(c: &mut Criterion) {
    let ctx = Arc::new(Context::new());
    let b = ExprBuilder::new(ctx.clone());
    let x = ctx.create_variable("main/x", ctx.int_type()).unwrap();

    c.bench_function("intern int literals", |bench| {
        bench.iter(|| {
            for v in 0..100 {
                black_box(b.int_lit(black_box(v)));
            }
        })
    });

    c.bench_function("build shared guard", |bench| {
        bench.iter(|| {
            let sum = b.add(b.var_ref(&x), b.int_lit(1)).unwrap();
            black_box(b.lt(sum, b.int_lit(black_box(10))).unwrap())
        })
    });
}

fn reconstruction_benchmark(c: &mut Criterion) {
    let ctx = Arc::new(Context::new());
    let x = ctx.create_variable("main/x", ctx.int_type()).unwrap();
    let err = ctx.create_variable("main/err", ctx.bv_type(8)).unwrap();
    let mut mapping = NameMapping::new(InlineMap::new(CfaId(0)));
    mapping.insert_location("L0", LocId(0));
    mapping.insert_location("L1", LocId(1));
    mapping.insert_variable("x", x);
    mapping.insert_variable("err", err.clone());
    mapping.set_error_field(err);

    let mut cex = String::from("(Trace (InitLoc L0)");
    for i in 0..200 {
        cex.push_str(&format!(" (CfaState L1 (ExplState (x {}) (err 2)))", i));
    }
    cex.push(')');

    c.bench_function("reconstruct 200-step trace", |bench| {
        bench.iter(|| {
            CexReconstructor::new(ctx.clone(), &mapping)
                .reconstruct(black_box(&cex))
                .unwrap()
        })
    });
}

criterion_group!(benches, interning_benchmark, reconstruction_benchmark);
criterion_main!(benches);
