//! Conversion table
//!
//! Which formats exist, which stage chain turns one into another, and the
//! state each stage puts a call in.

use crate::cache::OutputKind;
use crate::{Error, Result};
use std::fmt;

/// Shader representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// SPIR-V binary
    SpirvBinary,
    /// SPIR-V assembly text
    SpirvAsm,
    /// WGSL source text
    Wgsl,
}

impl Format {
    /// Guess the format of a raw buffer
    ///
    /// SPIR-V binary is recognised by its magic number in either byte order.
    /// UTF-8 text whose first instruction line starts with `Op` or `%id = Op`
    /// is assembly; any other UTF-8 text is taken as WGSL.
    pub fn detect(bytes: &[u8]) -> Option<Format> {
        if bytes.len() >= 4 {
            let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if word == spirv::MAGIC_NUMBER || word.swap_bytes() == spirv::MAGIC_NUMBER {
                return Some(Format::SpirvBinary);
            }
        }

        let text = std::str::from_utf8(bytes).ok()?;
        let first = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with(';') && !line.starts_with("//"));
        match first {
            Some(line) if is_assembly_line(line) => Some(Format::SpirvAsm),
            _ => Some(Format::Wgsl),
        }
    }

    /// Output kind produced when this format is the target
    pub fn output_kind(self) -> OutputKind {
        match self {
            Format::SpirvBinary => OutputKind::Binary,
            Format::SpirvAsm => OutputKind::Assembly,
            Format::Wgsl => OutputKind::Source,
        }
    }
}

fn is_assembly_line(line: &str) -> bool {
    if line.starts_with("Op") {
        return true;
    }
    match line.split_once('=') {
        Some((lhs, rhs)) => lhs.trim().starts_with('%') && rhs.trim().starts_with("Op"),
        None => false,
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::SpirvBinary => write!(f, "spirv"),
            Format::SpirvAsm => write!(f, "spvasm"),
            Format::Wgsl => write!(f, "wgsl"),
        }
    }
}

/// Supported conversion pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// SPIR-V binary → SPIR-V assembly
    BinaryToAssembly,
    /// SPIR-V assembly → SPIR-V binary
    AssemblyToBinary,
    /// SPIR-V binary → WGSL
    BinaryToSource,
    /// SPIR-V assembly → WGSL
    AssemblyToSource,
    /// WGSL → SPIR-V binary
    SourceToBinary,
    /// WGSL → SPIR-V assembly
    SourceToAssembly,
}

impl Conversion {
    /// Every conversion, in boundary code order
    pub const ALL: [Conversion; 6] = [
        Conversion::BinaryToAssembly,
        Conversion::AssemblyToBinary,
        Conversion::BinaryToSource,
        Conversion::AssemblyToSource,
        Conversion::SourceToBinary,
        Conversion::SourceToAssembly,
    ];

    /// Conversion between two formats
    pub fn between(from: Format, to: Format) -> Result<Conversion> {
        match (from, to) {
            (Format::SpirvBinary, Format::SpirvAsm) => Ok(Conversion::BinaryToAssembly),
            (Format::SpirvAsm, Format::SpirvBinary) => Ok(Conversion::AssemblyToBinary),
            (Format::SpirvBinary, Format::Wgsl) => Ok(Conversion::BinaryToSource),
            (Format::SpirvAsm, Format::Wgsl) => Ok(Conversion::AssemblyToSource),
            (Format::Wgsl, Format::SpirvBinary) => Ok(Conversion::SourceToBinary),
            (Format::Wgsl, Format::SpirvAsm) => Ok(Conversion::SourceToAssembly),
            _ => Err(Error::UnsupportedConversion {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    /// Numeric code used at the C boundary
    pub fn code(self) -> u32 {
        match self {
            Conversion::BinaryToAssembly => 0,
            Conversion::AssemblyToBinary => 1,
            Conversion::BinaryToSource => 2,
            Conversion::AssemblyToSource => 3,
            Conversion::SourceToBinary => 4,
            Conversion::SourceToAssembly => 5,
        }
    }

    /// Input format
    pub fn input(self) -> Format {
        match self {
            Conversion::BinaryToAssembly | Conversion::BinaryToSource => Format::SpirvBinary,
            Conversion::AssemblyToBinary | Conversion::AssemblyToSource => Format::SpirvAsm,
            Conversion::SourceToBinary | Conversion::SourceToAssembly => Format::Wgsl,
        }
    }

    /// Output format
    pub fn output(self) -> Format {
        match self {
            Conversion::AssemblyToBinary | Conversion::SourceToBinary => Format::SpirvBinary,
            Conversion::BinaryToAssembly | Conversion::SourceToAssembly => Format::SpirvAsm,
            Conversion::BinaryToSource | Conversion::AssemblyToSource => Format::Wgsl,
        }
    }

    /// Cache slot the result is published to
    pub fn output_kind(self) -> OutputKind {
        self.output().output_kind()
    }

    /// Stage chain, excluding input decoding and optional validation
    pub fn stages(self) -> &'static [Stage] {
        match self {
            Conversion::BinaryToAssembly => &[Stage::Disassemble],
            Conversion::AssemblyToBinary => &[Stage::Assemble],
            Conversion::BinaryToSource => &[Stage::ParseBinary, Stage::EmitSource],
            Conversion::AssemblyToSource => {
                &[Stage::Assemble, Stage::ParseBinary, Stage::EmitSource]
            }
            Conversion::SourceToBinary => &[Stage::ParseSource, Stage::EmitBinary],
            Conversion::SourceToAssembly => {
                &[Stage::ParseSource, Stage::EmitBinary, Stage::Disassemble]
            }
        }
    }
}

impl TryFrom<u32> for Conversion {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        Conversion::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| Error::invalid_input(format!("unknown conversion code {}", code)))
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.input(), self.output())
    }
}

/// One step of a conversion chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Turning the raw input buffer into words or text
    Input,
    /// Codec: assembly text → binary
    Assemble,
    /// Codec: binary → assembly text
    Disassemble,
    /// SPIR-V validator on a binary entering the pipeline
    Validate,
    /// Reader: SPIR-V → module
    ParseBinary,
    /// Reader: WGSL → module
    ParseSource,
    /// Emitter: module → WGSL
    EmitSource,
    /// Emitter: module → SPIR-V
    EmitBinary,
}

impl Stage {
    /// Pipeline state while this stage runs
    pub fn state(self) -> PipelineState {
        match self {
            Stage::Input | Stage::Assemble => PipelineState::Decoding,
            Stage::Validate => PipelineState::Validating,
            Stage::ParseBinary | Stage::ParseSource => PipelineState::Reading,
            Stage::Disassemble | Stage::EmitSource | Stage::EmitBinary => PipelineState::Emitting,
        }
    }

    /// Whether diagnostics of this stage point into the caller's input text
    pub fn reads_input_text(self) -> bool {
        matches!(self, Stage::Assemble | Stage::ParseSource)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Assemble => "assemble",
            Stage::Disassemble => "disassemble",
            Stage::Validate => "validate",
            Stage::ParseBinary => "parse-binary",
            Stage::ParseSource => "parse-source",
            Stage::EmitSource => "emit-source",
            Stage::EmitBinary => "emit-binary",
        };
        f.write_str(name)
    }
}

/// Per-call state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing has run yet
    Idle,
    /// Input decoding or assembly
    Decoding,
    /// Parsing into a module
    Reading,
    /// Optional SPIR-V validation
    Validating,
    /// Producing the output representation
    Emitting,
    /// Result is in the cache (or returned to the caller)
    Published,
    /// A stage failed; the cache was not touched
    Failed,
}
