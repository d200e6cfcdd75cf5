use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shaderbridge::{CodecProfile, Pipeline, PipelineOptions};

const SHADER: &str = r#"
struct Params {
    scale: f32,
    count: u32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read_write> values: array<f32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if id.x < params.count {
        values[id.x] = values[id.x] * params.scale;
    }
}
"#;

fn codec_benchmark(c: &mut Criterion) {
    let pipeline = Pipeline::default();
    let words = pipeline.source_to_binary(SHADER).unwrap();
    let text = pipeline.disassemble_binary(&words).unwrap();

    c.bench_function("disassemble binary", |b| {
        b.iter(|| pipeline.disassemble_binary(black_box(&words)).unwrap())
    });

    c.bench_function("assemble text", |b| {
        b.iter(|| pipeline.assemble_text(black_box(&text)).unwrap())
    });

    let friendly = Pipeline::new(PipelineOptions::with_profile(CodecProfile::Friendly));
    c.bench_function("disassemble binary (friendly)", |b| {
        b.iter(|| friendly.disassemble_binary(black_box(&words)).unwrap())
    });
}

fn source_benchmark(c: &mut Criterion) {
    let pipeline = Pipeline::default();
    let words = pipeline.source_to_binary(SHADER).unwrap();

    c.bench_function("wgsl to spirv", |b| {
        b.iter(|| pipeline.source_to_binary(black_box(SHADER)).unwrap())
    });

    c.bench_function("spirv to wgsl", |b| {
        b.iter(|| pipeline.binary_to_source(black_box(&words)).unwrap())
    });
}

criterion_group!(benches, codec_benchmark, source_benchmark);
criterion_main!(benches);
