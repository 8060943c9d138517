use callbench::{bind, run_operation, test_func, MemberFunctor, ParamFunctor, Variant};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

const DEPTH: i32 = 10;

fn single_call_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("single call");

    group.bench_function(Variant::FunctionCall.label(), |b| {
        b.iter(|| test_func(black_box(DEPTH)))
    });

    let f = black_box(Box::new(|depth| run_operation(depth)) as Box<dyn Fn(i32)>);
    group.bench_function(Variant::DynClosure.label(), |b| {
        b.iter(|| f(black_box(DEPTH)))
    });

    let f = black_box(Box::new(bind(test_func)) as Box<dyn Fn(i32)>);
    group.bench_function(Variant::DynBind.label(), |b| b.iter(|| f(black_box(DEPTH))));

    let f = |depth| run_operation(depth);
    group.bench_function(Variant::ImplClosure.label(), |b| {
        b.iter(|| f(black_box(DEPTH)))
    });

    let f = bind(test_func);
    group.bench_function(Variant::ImplBind.label(), |b| b.iter(|| f(black_box(DEPTH))));

    let f = black_box(test_func as fn(i32));
    group.bench_function(Variant::FunctionPointer.label(), |b| {
        b.iter(|| f(black_box(DEPTH)))
    });

    let f = MemberFunctor::new(DEPTH);
    group.bench_function(Variant::FunctorMember.label(), |b| b.iter(|| f.call()));

    let f = ParamFunctor;
    group.bench_function(Variant::FunctorParam.label(), |b| {
        b.iter(|| f.call(black_box(DEPTH)))
    });

    group.finish();
}

fn measure_benchmarks(c: &mut Criterion) {
    c.bench_function("measure all variants", |b| {
        b.iter(|| {
            Variant::ALL
                .map(|v| v.measure(black_box(DEPTH), black_box(100)))
                .len()
        })
    });
}

criterion_group!(benches, single_call_benchmarks, measure_benchmarks);
criterion_main!(benches);
