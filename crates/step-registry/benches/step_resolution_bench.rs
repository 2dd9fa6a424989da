use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use step_registry::{StepArgs, StepFuture, StepLine, StepRegistry};

#[derive(Default)]
struct World {
    calls: usize,
}

fn noop(world: &mut World, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        world.calls += 1;
        Ok(())
    })
}

/// Registry shaped like a real step library: distinct literal prefixes with
/// string and integer placeholders.
fn registry(size: usize) -> StepRegistry<World> {
    let mut registry = StepRegistry::new();
    for i in 0..size {
        registry
            .step(&format!("resource {i} is created with name {{string}}"), noop)
            .expect("distinct patterns");
        registry
            .step(&format!("resource {i} responds with status {{int}}"), noop)
            .expect("distinct patterns");
    }
    registry
}

fn benchmark_step_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_resolution");

    for size in [10, 50, 200].iter() {
        let registry = registry(*size);
        let last = StepLine::new(
            "Then ",
            format!("resource {} responds with status 201", size - 1),
            "bench.feature:1",
        );
        let unmatched = StepLine::new("Then ", "nothing registered looks like this", "bench.feature:2");

        group.bench_with_input(BenchmarkId::new("last_pattern", size), &last, |b, line| {
            b.iter(|| black_box(registry.resolve(line).is_ok()));
        });
        group.bench_with_input(BenchmarkId::new("unmatched", size), &unmatched, |b, line| {
            b.iter(|| black_box(registry.resolve(line).is_err()));
        });
    }

    group.finish();
}

fn benchmark_registration(c: &mut Criterion) {
    c.bench_function("register_100_patterns", |b| {
        b.iter(|| black_box(registry(50).len()));
    });
}

criterion_group!(benches, benchmark_step_resolution, benchmark_registration);
criterion_main!(benches);
