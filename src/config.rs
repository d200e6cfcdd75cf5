//! Conversion options
//!
//! Every knob the stages honour lives here and is passed explicitly per call.
//! Nothing is read from process-wide state, so two callers can translate for
//! different target environments side by side.
//!
//! All option structs deserialize from JSON with missing fields defaulted:
//!
//! ```
//! use shaderbridge::config::{CodecProfile, PipelineOptions};
//!
//! let options = PipelineOptions::from_json(r#"{ "codec": { "friendly_names": true } }"#).unwrap();
//! assert!(options.codec.friendly_names);
//! assert_eq!(options.codec.target_env, CodecProfile::Plain.options().target_env);
//! ```

use crate::features::FeatureSet;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// SPIR-V target environment used by the assembler, disassembler and validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetEnv {
    /// SPIR-V 1.0, no client API rules
    Universal1_0,
    /// SPIR-V 1.1
    Universal1_1,
    /// SPIR-V 1.2
    Universal1_2,
    /// SPIR-V 1.3
    Universal1_3,
    /// SPIR-V 1.4
    Universal1_4,
    /// SPIR-V 1.5, the newest environment SPIRV-Tools exposes here
    #[default]
    Universal1_5,
    /// Vulkan 1.0 rules (SPIR-V 1.0)
    Vulkan1_0,
    /// Vulkan 1.1 rules (SPIR-V 1.3)
    Vulkan1_1,
    /// Vulkan 1.2 rules (SPIR-V 1.5)
    Vulkan1_2,
}

impl TargetEnv {
    /// Map onto the SPIRV-Tools environment enum
    pub fn to_spirv_tools(self) -> spirv_tools::TargetEnv {
        use spirv_tools::TargetEnv as Te;
        match self {
            TargetEnv::Universal1_0 => Te::Universal_1_0,
            TargetEnv::Universal1_1 => Te::Universal_1_1,
            TargetEnv::Universal1_2 => Te::Universal_1_2,
            TargetEnv::Universal1_3 => Te::Universal_1_3,
            TargetEnv::Universal1_4 => Te::Universal_1_4,
            TargetEnv::Universal1_5 => Te::Universal_1_5,
            TargetEnv::Vulkan1_0 => Te::Vulkan_1_0,
            TargetEnv::Vulkan1_1 => Te::Vulkan_1_1,
            TargetEnv::Vulkan1_2 => Te::Vulkan_1_2,
        }
    }

    /// Highest SPIR-V version (major, minor) the environment accepts
    pub fn spirv_version(self) -> (u8, u8) {
        match self {
            TargetEnv::Universal1_0 | TargetEnv::Vulkan1_0 => (1, 0),
            TargetEnv::Universal1_1 => (1, 1),
            TargetEnv::Universal1_2 => (1, 2),
            TargetEnv::Universal1_3 | TargetEnv::Vulkan1_1 => (1, 3),
            TargetEnv::Universal1_4 => (1, 4),
            TargetEnv::Universal1_5 | TargetEnv::Vulkan1_2 => (1, 5),
        }
    }
}

/// Named codec configurations
///
/// Two assembler/disassembler setups exist in the field: the plain one (no
/// option flags) and one that renders friendly names. Both are available;
/// neither replaces the other.
///
/// Plain text reassembles to the same IDs. Friendly text names IDs, so the
/// assembler allocates fresh ones: reassembly gives an equivalent module,
/// not the same words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecProfile {
    /// Numeric IDs in disassembly, SPIR-V 1.5 universal environment
    #[default]
    Plain,
    /// Friendly names in disassembly, SPIR-V 1.4 universal environment
    Friendly,
}

impl CodecProfile {
    /// Expand the profile into concrete options
    pub fn options(self) -> CodecOptions {
        match self {
            CodecProfile::Plain => CodecOptions {
                target_env: TargetEnv::Universal1_5,
                friendly_names: false,
                preserve_numeric_ids: true,
                indent: false,
                comment: false,
            },
            CodecProfile::Friendly => CodecOptions {
                target_env: TargetEnv::Universal1_4,
                friendly_names: true,
                preserve_numeric_ids: true,
                indent: true,
                comment: false,
            },
        }
    }
}

/// Binary↔text codec options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Environment the binary is interpreted against
    pub target_env: TargetEnv,
    /// Render `%main` style names instead of `%4` where debug names exist
    pub friendly_names: bool,
    /// Keep explicit numeric IDs (`%4`) from assembly text instead of
    /// renumbering; named IDs (`%main`) are always allocated fresh
    pub preserve_numeric_ids: bool,
    /// Align instruction columns in disassembly
    pub indent: bool,
    /// Annotate disassembly with explanatory comments
    pub comment: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecProfile::Plain.options()
    }
}

/// Reader options for both WGSL and SPIR-V input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Capabilities and extensions accepted in SPIR-V input
    pub allowed_features: FeatureSet,
    /// Flip Y in vertex outputs when reading SPIR-V
    pub adjust_coordinate_space: bool,
    /// Reject SPIR-V capabilities the SPIR-V frontend does not understand
    pub strict_capabilities: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            allowed_features: FeatureSet::Everything,
            adjust_coordinate_space: false,
            strict_capabilities: false,
        }
    }
}

/// WGSL emitter options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Annotate every declaration with its type
    pub explicit_types: bool,
}

/// Bounds-check policy applied when emitting SPIR-V
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsCheck {
    /// Clamp indices into range
    #[default]
    Restrict,
    /// Out-of-range reads return zero, writes are skipped
    ReadZeroSkipWrite,
    /// No instrumentation
    Unchecked,
}

impl BoundsCheck {
    pub(crate) fn to_naga(self) -> naga::proc::BoundsCheckPolicy {
        match self {
            BoundsCheck::Restrict => naga::proc::BoundsCheckPolicy::Restrict,
            BoundsCheck::ReadZeroSkipWrite => naga::proc::BoundsCheckPolicy::ReadZeroSkipWrite,
            BoundsCheck::Unchecked => naga::proc::BoundsCheckPolicy::Unchecked,
        }
    }
}

/// SPIR-V emitter options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryOptions {
    /// SPIR-V version written into the module header
    pub spirv_version: (u8, u8),
    /// Policy for index and buffer accesses
    pub bounds_check: BoundsCheck,
    /// Turn off all bounds-check instrumentation regardless of `bounds_check`
    pub disable_robustness: bool,
    /// Emit `OpName`/`OpSource` debug instructions
    pub debug_info: bool,
    /// Flip Y in vertex outputs
    pub adjust_coordinate_space: bool,
}

impl Default for BinaryOptions {
    fn default() -> Self {
        Self {
            spirv_version: (1, 0),
            bounds_check: BoundsCheck::Restrict,
            disable_robustness: false,
            debug_info: true,
            adjust_coordinate_space: false,
        }
    }
}

impl BinaryOptions {
    /// Policy actually applied after `disable_robustness`
    pub fn effective_bounds_check(&self) -> BoundsCheck {
        if self.disable_robustness {
            BoundsCheck::Unchecked
        } else {
            self.bounds_check
        }
    }
}

/// Options for a whole conversion call
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Assembler/disassembler settings
    pub codec: CodecOptions,
    /// Reader settings
    pub reader: ReaderOptions,
    /// WGSL emitter settings
    pub source: SourceOptions,
    /// SPIR-V emitter settings
    pub binary: BinaryOptions,
    /// Run the SPIR-V validator on binaries entering the pipeline
    pub validate_binary: bool,
    /// Re-parse emitted WGSL and log its bindings
    pub verify_source_roundtrip: bool,
}

impl PipelineOptions {
    /// Options using one of the named codec profiles
    pub fn with_profile(profile: CodecProfile) -> Self {
        Self {
            codec: profile.options(),
            ..Self::default()
        }
    }

    /// Decode options from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: PipelineOptions = serde_json::from_str(json)?;
        options.check()?;
        Ok(options)
    }

    /// Encode as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reject combinations no stage can honour
    pub fn check(&self) -> Result<()> {
        let (major, minor) = self.binary.spirv_version;
        if major != 1 || minor > 5 {
            return Err(Error::Config(format!(
                "unsupported SPIR-V version {}.{}",
                major, minor
            )));
        }
        if self.binary.spirv_version > self.codec.target_env.spirv_version() {
            return Err(Error::Config(format!(
                "SPIR-V {}.{} output cannot be disassembled for target environment {:?}",
                major, minor, self.codec.target_env
            )));
        }
        Ok(())
    }
}
