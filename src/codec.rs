//! # SPIR-V Binary↔Text Codec
//!
//! Thin adapter over the SPIRV-Tools assembler, disassembler and validator.
//! The codec holds no state between calls: the target environment and the
//! formatting flags come in with every call through [`CodecOptions`].
//!
//! ## Usage
//!
//! ```ignore
//! use shaderbridge::codec::SpirvCodec;
//! use shaderbridge::config::CodecOptions;
//!
//! let codec = SpirvCodec::new(CodecOptions::default());
//! let words = codec.assemble(asm_text)?;
//! let text = codec.disassemble(&words)?;
//! ```

use crate::config::CodecOptions;
use crate::diagnostics::Diagnostics;
use crate::error::{StageFailure, StageResult};
use crate::{Error, Result};
use spirv_tools::assembler::{self, Assembler, AssemblerOptions, DisassembleOptions};
use spirv_tools::val::{self, Validator};

/// Byte-swapped SPIR-V magic, seen when a big-endian producer wrote the file
const SWAPPED_MAGIC: u32 = 0x0302_2307;

/// SPIR-V assembler/disassembler bound to one set of options
#[derive(Debug, Clone, Copy, Default)]
pub struct SpirvCodec {
    options: CodecOptions,
}

impl SpirvCodec {
    /// Create a codec with explicit options
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Render a binary module as assembly text
    pub fn disassemble(&self, words: &[u32]) -> StageResult<String> {
        if words.is_empty() {
            return Err(Error::codec("empty binary").into());
        }

        let assembler = assembler::create(Some(self.options.target_env.to_spirv_tools()));
        let options = DisassembleOptions {
            print: false,
            color: false,
            indent: self.options.indent,
            show_byte_offset: false,
            no_header: false,
            use_friendly_names: self.options.friendly_names,
            comment: self.options.comment,
            ..Default::default()
        };

        match assembler.disassemble(words, options) {
            Ok(Some(text)) if !text.is_empty() => Ok(text),
            Ok(_) => Err(Error::codec("disassembler produced no text").into()),
            Err(err) => Err(tool_failure("failed to disassemble SPIR-V", &err)),
        }
    }

    /// Assemble text into a binary module
    pub fn assemble(&self, text: &str) -> StageResult<Vec<u32>> {
        if text.trim().is_empty() {
            return Err(Error::codec("empty assembly text").into());
        }

        let assembler = assembler::create(Some(self.options.target_env.to_spirv_tools()));
        let options = AssemblerOptions {
            preserve_numeric_ids: self.options.preserve_numeric_ids,
        };

        match assembler.assemble(text, options) {
            Ok(binary) => Ok(binary.as_words().to_vec()),
            Err(err) => Err(tool_failure("failed to assemble SPIR-V", &err)),
        }
    }

    /// Run the SPIR-V validator for the configured environment
    pub fn validate(&self, words: &[u32]) -> StageResult<()> {
        let validator = val::create(Some(self.options.target_env.to_spirv_tools()));
        validator
            .validate(words, None)
            .map_err(|err| tool_failure("SPIR-V validation failed", &err))
    }
}

fn tool_failure(context: &str, err: &spirv_tools::error::Error) -> StageFailure {
    let diagnostics = Diagnostics::from_spirv_tools(err);
    let detail = diagnostics
        .first_error()
        .map(|d| d.to_string())
        .unwrap_or_else(|| err.to_string());
    StageFailure::new(Error::codec(format!("{}: {}", context, detail)), diagnostics)
}

/// Reinterpret a little-endian byte buffer as SPIR-V words
///
/// Modules written with the opposite endianness are swapped back so the
/// magic number reads correctly.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::codec(format!(
            "binary length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(normalize_byte_order(words))
}

/// Swap every word if the module was written with the opposite endianness
pub fn normalize_byte_order(mut words: Vec<u32>) -> Vec<u32> {
    if words.first() == Some(&SWAPPED_MAGIC) {
        for word in &mut words {
            *word = word.swap_bytes();
        }
    }
    words
}

/// Serialize words as little-endian bytes
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
