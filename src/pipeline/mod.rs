//! # Pipeline Orchestrator
//!
//! Composes the codec, reader and emitter into the six supported conversions
//! and publishes results into the [`ResultCache`].
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────── Codec ────────────┐
//! SPIR-V binary ◄──┤ assemble            disassemble├──► SPIR-V assembly
//!       │          └───────────────────────────────┘
//!       │ parse_binary                  emit_binary ▲
//!       ▼                                           │
//!   ShaderModule (naga Module + ModuleInfo) ────────┘
//!       │ emit_source                  parse_source ▲
//!       ▼                                           │
//!     WGSL ─────────────────────────────────────────┘
//! ```
//!
//! Each conversion runs a fixed chain; the first failing stage ends the call
//! and nothing is published.
//!
//! ## Usage
//!
//! ```ignore
//! use shaderbridge::pipeline::{Conversion, Payload, Pipeline};
//!
//! let pipeline = Pipeline::default();
//! let spirv = pipeline.source_to_binary("@compute @workgroup_size(1) fn main() {}")?;
//! let wgsl = pipeline.binary_to_source(&spirv)?;
//! ```

mod conversion;

pub use conversion::{Conversion, Format, PipelineState, Stage};

use crate::cache::{OutputKind, ResultCache, SlotView, RESULT_CACHE};
use crate::codec::{self, SpirvCodec};
use crate::config::PipelineOptions;
use crate::diagnostics::Diagnostics;
use crate::emitter::Emitter;
use crate::error::{StageFailure, StageResult};
use crate::reader::{Reader, ShaderModule};
use crate::Error;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use thiserror::Error;

/// Raw conversion input
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Bytes as received from the host: words in either byte order, or UTF-8 text
    Bytes(&'a [u8]),
    /// SPIR-V words, native or byte-swapped
    Words(&'a [u32]),
    /// Text
    Text(&'a str),
}

impl<'a> Payload<'a> {
    /// The payload as text, when it is text
    fn as_text(&self) -> Option<&'a str> {
        match *self {
            Payload::Text(text) => Some(text),
            Payload::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            Payload::Words(_) => None,
        }
    }
}

/// Conversion output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// SPIR-V assembly text
    Assembly(String),
    /// WGSL source text
    Source(String),
    /// SPIR-V binary words
    Binary(Vec<u32>),
}

impl Artifact {
    /// Cache slot this artifact belongs in
    pub fn kind(&self) -> OutputKind {
        match self {
            Artifact::Assembly(_) => OutputKind::Assembly,
            Artifact::Source(_) => OutputKind::Source,
            Artifact::Binary(_) => OutputKind::Binary,
        }
    }

    /// Text payload, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Artifact::Assembly(text) | Artifact::Source(text) => Some(text),
            Artifact::Binary(_) => None,
        }
    }

    /// Binary payload, if any
    pub fn as_words(&self) -> Option<&[u32]> {
        match self {
            Artifact::Binary(words) => Some(words),
            _ => None,
        }
    }

    /// Take the text payload
    pub fn into_text(self) -> Option<String> {
        match self {
            Artifact::Assembly(text) | Artifact::Source(text) => Some(text),
            Artifact::Binary(_) => None,
        }
    }

    /// Take the binary payload
    pub fn into_words(self) -> Option<Vec<u32>> {
        match self {
            Artifact::Binary(words) => Some(words),
            _ => None,
        }
    }
}

/// What a successful call did
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// Conversion that ran
    pub conversion: Conversion,
    /// Stages in execution order, including input decoding
    pub stages: Vec<Stage>,
    /// Final state
    pub state: PipelineState,
    /// Non-fatal records (warnings, notes)
    pub diagnostics: Diagnostics,
}

/// Successful conversion
#[derive(Debug)]
pub struct Translation {
    /// Output
    pub artifact: Artifact,
    /// Execution record
    pub report: ConversionReport,
}

/// Failed conversion
#[derive(Error, Debug, Clone)]
#[error("{conversion} failed at stage {stage}: {error}")]
pub struct Failure {
    /// Conversion that was attempted
    pub conversion: Conversion,
    /// Stage that failed
    pub stage: Stage,
    /// Classified error
    pub error: Error,
    /// Records from the failing stage
    pub diagnostics: Diagnostics,
}

impl Failure {
    fn new(conversion: Conversion, stage: Stage, failure: StageFailure) -> Self {
        Self {
            conversion,
            stage,
            error: failure.error,
            diagnostics: failure.diagnostics,
        }
    }

    /// Full text for the operator: summary line plus every record
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self);
        out.push_str(&self.diagnostics.render());
        out
    }

    /// Like [`Failure::render`], with the offending input line under each
    /// located record when the failing stage read the caller's text
    pub fn render_with_input(&self, payload: Payload<'_>) -> String {
        match payload.as_text() {
            Some(source) if self.stage.reads_input_text() => {
                let mut out = format!("{}\n", self);
                out.push_str(&self.diagnostics.render_with_source(source));
                out
            }
            _ => self.render(),
        }
    }
}

/// Value flowing between stages
enum StageValue {
    Words(Vec<u32>),
    Text(String),
    Module(ShaderModule),
}

impl StageValue {
    fn into_artifact(self, kind: OutputKind) -> Option<Artifact> {
        match (kind, self) {
            (OutputKind::Binary, StageValue::Words(words)) => Some(Artifact::Binary(words)),
            (OutputKind::Assembly, StageValue::Text(text)) => Some(Artifact::Assembly(text)),
            (OutputKind::Source, StageValue::Text(text)) => Some(Artifact::Source(text)),
            _ => None,
        }
    }
}

/// Conversion orchestrator
///
/// Holds only options; every call starts from `Idle` and owns its
/// intermediate module until it returns.
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: PipelineOptions,
    codec: SpirvCodec,
    reader: Reader,
    emitter: Emitter,
}

impl Pipeline {
    /// Create a pipeline with explicit options
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            codec: SpirvCodec::new(options.codec),
            reader: Reader::new(options.reader.clone()),
            emitter: Emitter::new(options.source, options.binary),
            options,
        }
    }

    /// Options in effect
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run a conversion without touching any cache
    pub fn run(
        &self,
        conversion: Conversion,
        payload: Payload<'_>,
    ) -> std::result::Result<Translation, Failure> {
        let started = Instant::now();
        let mut report = ConversionReport {
            conversion,
            stages: Vec::new(),
            state: PipelineState::Idle,
            diagnostics: Diagnostics::new(),
        };
        tracing::trace!(%conversion, "pipeline idle");

        let mut value = self
            .step(&mut report, Stage::Input, || decode_input(conversion, payload))
            .map_err(|failure| self.fail(&report, Stage::Input, failure))?;

        for stage in self.chain(conversion) {
            let current = value;
            value = self
                .step(&mut report, stage, || self.run_stage(stage, current))
                .map_err(|failure| self.fail(&report, stage, failure))?;

            if stage == Stage::EmitSource && self.options.verify_source_roundtrip {
                if let StageValue::Text(ref wgsl) = value {
                    self.verify_source(wgsl, &mut report.diagnostics);
                }
            }
        }

        let kind = conversion.output_kind();
        let Some(artifact) = value.into_artifact(kind) else {
            let last = report.stages.last().copied().unwrap_or(Stage::Input);
            let error = Error::emit(format!("chain ended without a {} result", kind));
            return Err(self.fail(&report, last, error.into()));
        };

        report.state = PipelineState::Published;
        tracing::debug!(
            %conversion,
            stages = report.stages.len(),
            warnings = report.diagnostics.warning_count(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "conversion finished"
        );
        Ok(Translation { artifact, report })
    }

    /// Run a conversion and publish the result into `cache`
    ///
    /// On failure the slot keeps its previous value and the rendered
    /// diagnostics are stored in the cache's diagnostics slot.
    pub fn publish_into(
        &self,
        cache: &ResultCache,
        conversion: Conversion,
        payload: Payload<'_>,
    ) -> std::result::Result<SlotView, Failure> {
        match self.run(conversion, payload) {
            Ok(translation) => Ok(cache.publish(&translation.artifact)),
            Err(failure) => {
                cache.record_failure(&failure.render_with_input(payload));
                Err(failure)
            }
        }
    }

    /// Run a conversion and publish into the process-wide cache
    pub fn convert(
        &self,
        conversion: Conversion,
        payload: Payload<'_>,
    ) -> std::result::Result<SlotView, Failure> {
        self.publish_into(&RESULT_CACHE, conversion, payload)
    }

    /// SPIR-V binary → assembly text
    pub fn disassemble_binary(&self, words: &[u32]) -> std::result::Result<String, Failure> {
        self.run_into(Conversion::BinaryToAssembly, Payload::Words(words), Artifact::into_text)
    }

    /// Assembly text → SPIR-V binary
    pub fn assemble_text(&self, text: &str) -> std::result::Result<Vec<u32>, Failure> {
        self.run_into(Conversion::AssemblyToBinary, Payload::Text(text), Artifact::into_words)
    }

    /// SPIR-V binary → WGSL
    pub fn binary_to_source(&self, words: &[u32]) -> std::result::Result<String, Failure> {
        self.run_into(Conversion::BinaryToSource, Payload::Words(words), Artifact::into_text)
    }

    /// Assembly text → WGSL
    pub fn assembly_to_source(&self, text: &str) -> std::result::Result<String, Failure> {
        self.run_into(Conversion::AssemblyToSource, Payload::Text(text), Artifact::into_text)
    }

    /// WGSL → SPIR-V binary
    pub fn source_to_binary(&self, source: &str) -> std::result::Result<Vec<u32>, Failure> {
        self.run_into(Conversion::SourceToBinary, Payload::Text(source), Artifact::into_words)
    }

    /// WGSL → assembly text
    pub fn source_to_assembly(&self, source: &str) -> std::result::Result<String, Failure> {
        self.run_into(Conversion::SourceToAssembly, Payload::Text(source), Artifact::into_text)
    }

    fn run_into<T>(
        &self,
        conversion: Conversion,
        payload: Payload<'_>,
        take: fn(Artifact) -> Option<T>,
    ) -> std::result::Result<T, Failure> {
        let translation = self.run(conversion, payload)?;
        let kind = translation.artifact.kind();
        take(translation.artifact).ok_or_else(|| {
            let last = translation.report.stages.last().copied().unwrap_or(Stage::Input);
            let error = Error::emit(format!("{} produced an unexpected {} result", conversion, kind));
            self.fail(&translation.report, last, error.into())
        })
    }

    /// Stage chain with the optional validation step spliced in
    fn chain(&self, conversion: Conversion) -> Vec<Stage> {
        let base = conversion.stages();
        if !self.options.validate_binary {
            return base.to_vec();
        }

        let mut chain = Vec::with_capacity(base.len() + 1);
        match conversion.input() {
            // Binary input is validated before anything reads it
            Format::SpirvBinary => {
                chain.push(Stage::Validate);
                chain.extend_from_slice(base);
            }
            // Assembled binary is validated right after assembly
            Format::SpirvAsm => {
                chain.push(base[0]);
                chain.push(Stage::Validate);
                chain.extend_from_slice(&base[1..]);
            }
            // WGSL was already validated by the reader
            Format::Wgsl => chain.extend_from_slice(base),
        }
        chain
    }

    fn step<F>(&self, report: &mut ConversionReport, stage: Stage, f: F) -> StageResult<StageValue>
    where
        F: FnOnce() -> StageResult<StageValue>,
    {
        let next = stage.state();
        if next != report.state {
            tracing::trace!(conversion = %report.conversion, from = ?report.state, to = ?next, "state change");
            report.state = next;
        }
        report.stages.push(stage);

        panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let message = format!("internal error in {}: {}", stage, detail);
            let error = match stage {
                Stage::Input => Error::invalid_input(message),
                Stage::Assemble | Stage::Disassemble | Stage::Validate => Error::codec(message),
                Stage::ParseBinary | Stage::ParseSource => Error::parse(message),
                Stage::EmitSource | Stage::EmitBinary => Error::emit(message),
            };
            Err(error.into())
        })
    }

    fn run_stage(&self, stage: Stage, value: StageValue) -> StageResult<StageValue> {
        match (stage, value) {
            (Stage::Disassemble, StageValue::Words(words)) => {
                self.codec.disassemble(&words).map(StageValue::Text)
            }
            (Stage::Assemble, StageValue::Text(text)) => {
                self.codec.assemble(&text).map(StageValue::Words)
            }
            (Stage::Validate, StageValue::Words(words)) => {
                self.codec.validate(&words).map(|()| StageValue::Words(words))
            }
            (Stage::ParseBinary, StageValue::Words(words)) => {
                self.reader.parse_binary(&words).map(StageValue::Module)
            }
            (Stage::ParseSource, StageValue::Text(text)) => {
                self.reader.parse_source(&text).map(StageValue::Module)
            }
            (Stage::EmitSource, StageValue::Module(module)) => {
                self.emitter.emit_source(&module).map(StageValue::Text)
            }
            (Stage::EmitBinary, StageValue::Module(module)) => {
                self.emitter.emit_binary(&module).map(StageValue::Words)
            }
            (stage, _) => Err(Error::invalid_input(format!(
                "stage {} received a value of the wrong shape",
                stage
            ))
            .into()),
        }
    }

    /// Re-read emitted WGSL; a failure is only a warning
    fn verify_source(&self, wgsl: &str, diagnostics: &mut Diagnostics) {
        match self.reader.parse_source(wgsl) {
            Ok(module) => {
                tracing::debug!(bindings = %module.summary(), "re-parsed generated WGSL");
            }
            Err(failure) => {
                tracing::warn!("failed to re-parse generated WGSL: {}", failure.error);
                diagnostics.warning(format!(
                    "generated WGSL does not re-parse: {}",
                    failure.error.message()
                ));
            }
        }
    }

    fn fail(&self, report: &ConversionReport, stage: Stage, failure: StageFailure) -> Failure {
        tracing::trace!(conversion = %report.conversion, from = ?report.state, to = ?PipelineState::Failed, "state change");
        let failure = Failure::new(report.conversion, stage, failure);
        tracing::warn!("{}", failure);
        for record in failure.diagnostics.iter() {
            tracing::debug!(conversion = %report.conversion, %stage, "{}", record);
        }
        failure
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

/// Turn the raw payload into the value the first stage expects
///
/// Binary input comes out in native word order whichever order it arrived in.
fn decode_input(conversion: Conversion, payload: Payload<'_>) -> StageResult<StageValue> {
    let value = match (conversion.input(), payload) {
        (Format::SpirvBinary, Payload::Words(words)) => {
            StageValue::Words(codec::normalize_byte_order(words.to_vec()))
        }
        (Format::SpirvBinary, Payload::Bytes(bytes)) => {
            StageValue::Words(codec::words_from_bytes(bytes)?)
        }
        (Format::SpirvBinary, Payload::Text(_)) => {
            return Err(Error::invalid_input("SPIR-V binary input given as text").into())
        }
        (_, Payload::Text(text)) => StageValue::Text(text.to_string()),
        (_, Payload::Bytes(bytes)) => std::str::from_utf8(bytes)
            .map(|text| StageValue::Text(text.to_string()))
            .map_err(|err| Error::invalid_input(format!("input is not UTF-8: {}", err)))?,
        (format, Payload::Words(_)) => {
            return Err(Error::invalid_input(format!("{} input given as words", format)).into())
        }
    };
    Ok(value)
}
