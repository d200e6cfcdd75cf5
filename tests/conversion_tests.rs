//! End-to-end conversion tests through the public pipeline API

use shaderbridge::{
    Artifact, CodecProfile, Conversion, ErrorKind, Format, OutputKind, Payload, Pipeline,
    PipelineOptions, PipelineState, ResultCache, Stage,
};

const COMPUTE_ASM: &str = "\
OpCapability Shader
OpMemoryModel Logical GLSL450
OpEntryPoint GLCompute %1 \"main\"
OpExecutionMode %1 LocalSize 1 1 1
%2 = OpTypeVoid
%3 = OpTypeFunction %2
%1 = OpFunction %2 None %3
%4 = OpLabel
OpReturn
OpFunctionEnd
";

const MINIMAL_WGSL: &str = "@compute @workgroup_size(1) fn main() {}";

const STORAGE_WGSL: &str = r#"
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

const RENDER_WGSL: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(index) - 1);
    let y = f32(i32(index & 1u) * 2 - 1);
    return vec4<f32>(x, y, 0.0, 1.0);
}

@group(0) @binding(0) var tex: texture_2d<f32>;
@group(0) @binding(1) var samp: sampler;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, pos.xy / 256.0);
}
"#;

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn test_compute_binary_disassembles_with_entry_point() {
    let pipeline = Pipeline::default();
    let words = pipeline.assemble_text(COMPUTE_ASM).unwrap();
    let text = pipeline.disassemble_binary(&words).unwrap();

    assert!(text.contains("OpEntryPoint GLCompute %1 \"main\""));
    assert!(text.contains("OpExecutionMode %1 LocalSize 1 1 1"));

    // Same environment on both legs, so every word comes back
    assert_eq!(pipeline.assemble_text(&text).unwrap(), words);
}

#[test]
fn test_minimal_wgsl_round_trips_through_binary() {
    let pipeline = Pipeline::default();
    let words = pipeline.source_to_binary(MINIMAL_WGSL).unwrap();
    let wgsl = pipeline.binary_to_source(&words).unwrap();

    assert!(wgsl.contains("@compute @workgroup_size(1, 1, 1)"));
    assert!(wgsl.contains("fn main()"));
}

#[test]
fn test_unterminated_assembly_is_codec_error() {
    let failure = Pipeline::default()
        .assemble_text("OpCapability Shader\nOpMemoryModel Logical")
        .unwrap_err();

    assert_eq!(failure.stage, Stage::Assemble);
    assert_eq!(failure.error.kind(), ErrorKind::Codec);
    assert!(failure.diagnostics.has_errors());
}

#[test]
fn test_undeclared_identifier_is_parse_error() {
    let failure = Pipeline::default()
        .source_to_binary("@compute @workgroup_size(1) fn main() { let a = b; }")
        .unwrap_err();

    assert_eq!(failure.stage, Stage::ParseSource);
    assert_eq!(failure.error.kind(), ErrorKind::Parse);
    let first = failure.diagnostics.first_error().unwrap();
    assert!(first.location.is_some());
}

#[test]
fn test_undeclared_identifier_publishes_nothing() {
    let cache = ResultCache::new();
    let failure = Pipeline::default()
        .publish_into(
            &cache,
            Conversion::SourceToBinary,
            Payload::Text("@compute @workgroup_size(1) fn main() { let a = b; }"),
        )
        .unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::Parse);
    assert!(cache.read(OutputKind::Binary).is_none());
    assert_eq!(cache.binary_len(), 0);
    assert!(cache.last_diagnostics_text().unwrap().contains("parse-source"));
}

// =============================================================================
// ROUND-TRIP PROPERTIES
// =============================================================================

#[test]
fn test_binary_assembly_binary_keeps_instructions() {
    let pipeline = Pipeline::default();
    for source in [MINIMAL_WGSL, STORAGE_WGSL, RENDER_WGSL] {
        let original = pipeline.source_to_binary(source).unwrap();
        let text = pipeline.disassemble_binary(&original).unwrap();
        let again = pipeline.assemble_text(&text).unwrap();

        // Version and generator words come from the assembler's environment
        assert_eq!(again[0], original[0]);
        assert_eq!(again[3], original[3], "bound changed for:\n{}", source);
        assert_eq!(&again[5..], &original[5..], "instructions changed for:\n{}", source);
    }
}

#[test]
fn test_friendly_assembly_reassembles_to_equivalent_module() {
    let pipeline = Pipeline::new(PipelineOptions::with_profile(CodecProfile::Friendly));
    let reader = shaderbridge::Reader::default();

    for source in [MINIMAL_WGSL, STORAGE_WGSL, RENDER_WGSL] {
        let original = pipeline.source_to_binary(source).unwrap();
        let text = pipeline.disassemble_binary(&original).unwrap();
        let again = pipeline.assemble_text(&text).unwrap();

        // Named IDs are allocated fresh, so only the module's meaning survives
        let before = reader.parse_binary(&original).unwrap().summary();
        let after = reader.parse_binary(&again).unwrap().summary();
        assert_eq!(before, after, "summary changed for:\n{}", text);
    }
}

#[test]
fn test_byte_swapped_words_convert_like_native() {
    let pipeline = Pipeline::default();
    let words = pipeline.source_to_binary(STORAGE_WGSL).unwrap();
    let swapped: Vec<u32> = words.iter().map(|w| w.swap_bytes()).collect();

    assert_eq!(
        pipeline.binary_to_source(&swapped).unwrap(),
        pipeline.binary_to_source(&words).unwrap()
    );
}

#[test]
fn test_semantic_round_trip_preserves_summary() {
    let pipeline = Pipeline::default();
    let reader = shaderbridge::Reader::default();

    for source in [MINIMAL_WGSL, STORAGE_WGSL, RENDER_WGSL] {
        let before = reader.parse_source(source).unwrap().summary();
        let words = pipeline.source_to_binary(source).unwrap();
        let wgsl = pipeline.binary_to_source(&words).unwrap();
        let after = reader.parse_source(&wgsl).unwrap().summary();
        assert_eq!(before, after, "summary changed for:\n{}", wgsl);
    }
}

#[test]
fn test_assembly_to_source_matches_binary_to_source() {
    let pipeline = Pipeline::default();
    let words = pipeline.assemble_text(COMPUTE_ASM).unwrap();

    assert_eq!(
        pipeline.assembly_to_source(COMPUTE_ASM).unwrap(),
        pipeline.binary_to_source(&words).unwrap()
    );
}

#[test]
fn test_source_to_assembly_matches_disassembled_binary() {
    let pipeline = Pipeline::default();
    let words = pipeline.source_to_binary(STORAGE_WGSL).unwrap();

    assert_eq!(
        pipeline.source_to_assembly(STORAGE_WGSL).unwrap(),
        pipeline.disassemble_binary(&words).unwrap()
    );
}

// =============================================================================
// OPTIONS
// =============================================================================

#[test]
fn test_friendly_profile_names_types() {
    let pipeline = Pipeline::new(PipelineOptions::with_profile(CodecProfile::Friendly));
    let text = pipeline.source_to_assembly(STORAGE_WGSL).unwrap();
    assert!(text.contains("%void"));

    let plain = Pipeline::default().source_to_assembly(STORAGE_WGSL).unwrap();
    assert!(!plain.contains("%void = OpTypeVoid"));
}

#[test]
fn test_options_from_json() {
    let options = PipelineOptions::from_json(
        r#"{"binary": {"spirv_version": [1, 3]}, "validate_binary": true}"#,
    )
    .unwrap();
    let words = Pipeline::new(options).source_to_binary(MINIMAL_WGSL).unwrap();
    assert_eq!(words[1], 0x0001_0300);
}

#[test]
fn test_validation_stage_runs_when_enabled() {
    let pipeline = Pipeline::new(PipelineOptions {
        validate_binary: true,
        ..PipelineOptions::default()
    });
    let translation = pipeline
        .run(Conversion::AssemblyToSource, Payload::Text(COMPUTE_ASM))
        .unwrap();

    assert!(translation.report.stages.contains(&Stage::Validate));
    assert_eq!(translation.report.state, PipelineState::Published);
}

#[test]
fn test_validation_rejects_structurally_invalid_binary() {
    // Assembles, but a function without a terminator fails validation
    let broken = "\
OpCapability Shader
OpMemoryModel Logical GLSL450
OpEntryPoint GLCompute %1 \"main\"
OpExecutionMode %1 LocalSize 1 1 1
%2 = OpTypeVoid
%3 = OpTypeFunction %2
%1 = OpFunction %2 None %3
%4 = OpLabel
OpFunctionEnd
";
    let pipeline = Pipeline::new(PipelineOptions {
        validate_binary: true,
        ..PipelineOptions::default()
    });
    let failure = pipeline.assembly_to_source(broken).unwrap_err();

    assert_eq!(failure.stage, Stage::Validate);
    assert_eq!(failure.error.kind(), ErrorKind::Codec);
}

// =============================================================================
// CACHE AND FAILURE ISOLATION
// =============================================================================

#[test]
fn test_failed_conversion_leaves_slot_untouched() {
    let cache = ResultCache::new();
    let pipeline = Pipeline::default();

    pipeline
        .publish_into(&cache, Conversion::SourceToAssembly, Payload::Text(MINIMAL_WGSL))
        .unwrap();
    let before = cache.read(OutputKind::Assembly).unwrap();

    let failure = pipeline
        .publish_into(
            &cache,
            Conversion::SourceToAssembly,
            Payload::Text("fn main( {"),
        )
        .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Parse);

    assert_eq!(cache.read(OutputKind::Assembly).unwrap(), before);
    assert!(cache.last_diagnostics_text().unwrap().contains("parse-source"));
}

#[test]
fn test_publish_only_touches_own_kind() {
    let cache = ResultCache::new();
    let pipeline = Pipeline::default();

    pipeline
        .publish_into(&cache, Conversion::SourceToBinary, Payload::Text(MINIMAL_WGSL))
        .unwrap();
    let words = match cache.snapshot(OutputKind::Binary).unwrap() {
        Artifact::Binary(words) => words,
        other => panic!("unexpected artifact {:?}", other),
    };
    assert_eq!(cache.binary_len(), words.len());

    pipeline
        .publish_into(&cache, Conversion::BinaryToSource, Payload::Words(&words))
        .unwrap();
    assert_eq!(cache.binary_len(), words.len());
    assert!(cache.read(OutputKind::Source).is_some());
    assert!(cache.read(OutputKind::Assembly).is_none());
}

#[test]
fn test_byte_payload_accepts_little_endian_binary() {
    let pipeline = Pipeline::default();
    let words = pipeline.source_to_binary(MINIMAL_WGSL).unwrap();
    let bytes = shaderbridge::codec::words_to_bytes(&words);

    assert_eq!(Format::detect(&bytes), Some(Format::SpirvBinary));
    let translation = pipeline
        .run(Conversion::BinaryToAssembly, Payload::Bytes(&bytes))
        .unwrap();
    assert_eq!(translation.artifact.kind(), OutputKind::Assembly);
}

#[test]
fn test_detected_formats_pick_conversion() {
    let from = Format::detect(COMPUTE_ASM.as_bytes()).unwrap();
    let conversion = Conversion::between(from, Format::Wgsl).unwrap();
    assert_eq!(conversion, Conversion::AssemblyToSource);

    let err = Conversion::between(Format::SpirvAsm, Format::SpirvAsm).unwrap_err();
    assert!(err.to_string().contains("spvasm"));
}
