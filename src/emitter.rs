//! # Shader Emitter
//!
//! Lowers a validated [`ShaderModule`] to WGSL or SPIR-V.

use crate::config::{BinaryOptions, SourceOptions};
use crate::error::{StageFailure, StageResult};
use crate::reader::ShaderModule;
use crate::Error;

/// WGSL / SPIR-V emitter
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    source: SourceOptions,
    binary: BinaryOptions,
}

impl Emitter {
    /// Create an emitter with explicit options
    pub fn new(source: SourceOptions, binary: BinaryOptions) -> Self {
        Self { source, binary }
    }

    /// Write WGSL
    pub fn emit_source(&self, shader: &ShaderModule) -> StageResult<String> {
        let mut flags = naga::back::wgsl::WriterFlags::empty();
        if self.source.explicit_types {
            flags |= naga::back::wgsl::WriterFlags::EXPLICIT_TYPES;
        }

        naga::back::wgsl::write_string(shader.module(), shader.info(), flags)
            .map_err(|err| {
                StageFailure::from(Error::emit(format!("failed to generate WGSL: {}", err)))
            })
    }

    /// Write SPIR-V
    pub fn emit_binary(&self, shader: &ShaderModule) -> StageResult<Vec<u32>> {
        let options = self.spv_options();
        naga::back::spv::write_vec(shader.module(), shader.info(), &options, None)
            .map_err(|err| {
                StageFailure::from(Error::emit(format!("failed to generate SPIR-V: {}", err)))
            })
    }

    fn spv_options(&self) -> naga::back::spv::Options<'static> {
        let policy = self.binary.effective_bounds_check().to_naga();

        let mut flags = naga::back::spv::WriterFlags::empty();
        if self.binary.debug_info {
            flags |= naga::back::spv::WriterFlags::DEBUG;
        }
        if self.binary.adjust_coordinate_space {
            flags |= naga::back::spv::WriterFlags::ADJUST_COORDINATE_SPACE;
        }

        naga::back::spv::Options {
            lang_version: self.binary.spirv_version,
            flags,
            bounds_check_policies: naga::proc::BoundsCheckPolicies {
                index: policy,
                buffer: policy,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
