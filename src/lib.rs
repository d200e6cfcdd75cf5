//! # Shaderbridge - SPIR-V / WGSL Translation
//!
//! Converts shader programs between three representations:
//!
//! - **SPIR-V binary**: a stream of 32-bit words
//! - **SPIR-V assembly**: the textual form of the same instructions
//! - **WGSL**: WebGPU shading language source
//!
//! Binary and assembly are converted directly by the SPIRV-Tools codec. Any
//! conversion touching WGSL goes through an in-memory module (naga's IR) that
//! is validated before anything is emitted from it.
//!
//! ## Quick Start
//!
//! ```rust
//! use shaderbridge::Pipeline;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::default();
//!
//! let words = pipeline.source_to_binary("@compute @workgroup_size(1) fn main() {}")?;
//! let text = pipeline.disassemble_binary(&words)?;
//! assert!(text.contains("OpEntryPoint GLCompute"));
//!
//! let wgsl = pipeline.binary_to_source(&words)?;
//! assert!(wgsl.contains("@compute"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Hosting
//!
//! The crate builds as a `cdylib`/`staticlib` exporting the functions in
//! [`ffi`]. Results live in a process-owned [`ResultCache`]: one slot per
//! output kind, overwritten by the next conversion of that kind. Hosts that
//! convert concurrently use the caller-owned buffer API instead.
//!
//! ## Errors
//!
//! Every stage reports failures as [`Error`] plus structured
//! [`Diagnostics`]; no input aborts the process. See
//! [`pipeline::Failure`] for what a failed call carries.
//!
//! ## Logging
//!
//! The crate logs through `tracing` and never installs a subscriber.

#![allow(clippy::result_large_err)] // Failure carries its diagnostics by value

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cache;
pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod emitter;
pub mod error;
pub mod features;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod pipeline;
pub mod reader;

// Re-export main types
pub use cache::{OutputKind, OwnedBuffer, ResultCache, SlotView, RESULT_CACHE};
pub use codec::SpirvCodec;
pub use config::{CodecOptions, CodecProfile, PipelineOptions, TargetEnv};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use emitter::Emitter;
pub use error::{Error, ErrorKind, Result, StageFailure, StageResult};
pub use features::FeatureSet;
pub use pipeline::{
    Artifact, Conversion, ConversionReport, Failure, Format, Payload, Pipeline, PipelineState,
    Stage, Translation,
};
pub use reader::{ModuleSummary, Reader, ShaderModule};
