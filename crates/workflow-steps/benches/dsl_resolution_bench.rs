use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use step_registry::StepLine;

fn benchmark_dsl_resolution(c: &mut Criterion) {
    let registry = workflow_steps::registry().expect("registry builds");
    let mut group = c.benchmark_group("dsl_resolution");

    let lines = [
        ("form_version", "I create a new version \"2.0\" for form \"leave-request\""),
        ("status", "the response status should be 201"),
        ("process_get", "GET request is made to \"/process/definitions/{definitionId}\""),
        ("message", "the response should contain \"Version already exists\""),
        ("unmatched", "nothing in the vocabulary reads like this"),
    ];

    for (name, text) in lines {
        let line = StepLine::new("When ", text, "bench.feature:1");
        group.bench_with_input(BenchmarkId::new("resolve", name), &line, |b, line| {
            b.iter(|| black_box(registry.resolve(line).is_ok()));
        });
    }

    group.finish();
}

fn benchmark_registry_build(c: &mut Criterion) {
    c.bench_function("build_workflow_registry", |b| {
        b.iter(|| black_box(workflow_steps::registry().map(|r| r.len()).unwrap_or(0)));
    });
}

criterion_group!(benches, benchmark_dsl_resolution, benchmark_registry_build);
criterion_main!(benches);
