use criterion::{Criterion, black_box, criterion_group, criterion_main};

use cashbook_numeric::{Denom, Numeric, Round};

fn bench_arithmetic(c: &mut Criterion) {
    let a = Numeric::new(123_456, 100);
    let b = Numeric::new(-78_901, 100);

    c.bench_function("add_fixed_cents", |bench| {
        bench.iter(|| {
            black_box(a)
                .add(&black_box(b), Denom::Fixed(100), Round::Never)
                .unwrap()
        })
    });

    c.bench_function("mul_reduce", |bench| {
        bench.iter(|| {
            black_box(a)
                .mul(&black_box(b), Denom::Reduce, Round::Bankers)
                .unwrap()
        })
    });

    c.bench_function("from_double_cents", |bench| {
        bench.iter(|| Numeric::from_double(black_box(1234.56), Denom::Fixed(100), Round::Bankers))
    });
}

criterion_group!(benches, bench_arithmetic);
criterion_main!(benches);
