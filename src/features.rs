//! SPIR-V feature allowlist
//!
//! Scans the preamble of a SPIR-V module for `OpCapability` and
//! `OpExtension` and checks them against a [`FeatureSet`] before the module is
//! handed to the SPIR-V frontend.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of words in a SPIR-V module header
pub const HEADER_WORDS: usize = 5;

/// Capabilities and extensions a reader is allowed to accept
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// Accept anything the frontend can read
    #[default]
    Everything,
    /// Accept only the listed capabilities (e.g. `"Shader"`) and extensions
    /// (e.g. `"SPV_KHR_storage_buffer_storage_class"`)
    Only {
        /// Capability names as spelled in SPIR-V assembly
        #[serde(default)]
        capabilities: BTreeSet<String>,
        /// Extension names
        #[serde(default)]
        extensions: BTreeSet<String>,
    },
}

impl FeatureSet {
    /// Allowlist from capability and extension names
    pub fn only<C, E>(capabilities: C, extensions: E) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        FeatureSet::Only {
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    /// True if the capability may appear in input
    pub fn allows_capability(&self, name: &str) -> bool {
        match self {
            FeatureSet::Everything => true,
            FeatureSet::Only { capabilities, .. } => capabilities.contains(name),
        }
    }

    /// True if the extension may appear in input
    pub fn allows_extension(&self, name: &str) -> bool {
        match self {
            FeatureSet::Everything => true,
            FeatureSet::Only { extensions, .. } => extensions.contains(name),
        }
    }

    /// Check a module's declared features against the allowlist
    ///
    /// Returns the declared features on success so callers can log them.
    pub fn check(&self, words: &[u32]) -> Result<ModuleFeatures> {
        let features = ModuleFeatures::scan(words)?;
        if let Some(cap) = features
            .capabilities
            .iter()
            .find(|cap| !self.allows_capability(cap))
        {
            return Err(Error::parse(format!("capability {} is not allowed", cap)));
        }
        if let Some(ext) = features
            .extensions
            .iter()
            .find(|ext| !self.allows_extension(ext))
        {
            return Err(Error::parse(format!("extension {} is not allowed", ext)));
        }
        Ok(features)
    }
}

/// Header fields and features declared by a module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleFeatures {
    /// SPIR-V version (major, minor) from the header
    pub version: (u8, u8),
    /// Generator magic from the header
    pub generator: u32,
    /// ID bound from the header
    pub bound: u32,
    /// Capabilities in declaration order
    pub capabilities: Vec<String>,
    /// Extensions in declaration order
    pub extensions: Vec<String>,
}

impl ModuleFeatures {
    /// Read the header and the capability/extension preamble
    ///
    /// Stops at the first instruction that is neither a capability nor an
    /// extension. Only structural problems are errors here; anything else is
    /// left to the frontend.
    pub fn scan(words: &[u32]) -> Result<Self> {
        if words.len() < HEADER_WORDS {
            return Err(Error::parse(format!(
                "module has {} words, header needs {}",
                words.len(),
                HEADER_WORDS
            )));
        }
        if words[0] != spirv::MAGIC_NUMBER {
            return Err(Error::parse(format!(
                "bad magic number 0x{:08x}",
                words[0]
            )));
        }

        let version_word = words[1];
        let mut features = ModuleFeatures {
            version: ((version_word >> 16) as u8, (version_word >> 8) as u8),
            generator: words[2],
            bound: words[3],
            ..Default::default()
        };

        let mut offset = HEADER_WORDS;
        while offset < words.len() {
            let word = words[offset];
            let word_count = (word >> 16) as usize;
            let opcode = word & 0xffff;
            if word_count == 0 || offset + word_count > words.len() {
                return Err(Error::parse(format!(
                    "truncated instruction at word {}",
                    offset
                )));
            }
            let operands = &words[offset + 1..offset + word_count];

            match spirv::Op::from_u32(opcode) {
                Some(spirv::Op::Capability) => {
                    let value = operands.first().copied().ok_or_else(|| {
                        Error::parse(format!("OpCapability without operand at word {}", offset))
                    })?;
                    let name = match spirv::Capability::from_u32(value) {
                        Some(cap) => format!("{:?}", cap),
                        None => format!("Capability({})", value),
                    };
                    features.capabilities.push(name);
                }
                Some(spirv::Op::Extension) => {
                    features.extensions.push(decode_literal_string(operands));
                }
                // Preamble ends at the first non-feature instruction
                _ => break,
            }
            offset += word_count;
        }

        Ok(features)
    }
}

/// Decode a nul-terminated literal string packed little-endian into words
pub fn decode_literal_string(words: &[u32]) -> String {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    'outer: for word in words {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                break 'outer;
            }
            bytes.push(byte);
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_string(s: &str) -> Vec<u32> {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        bytes
            .chunks(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn module_with(capabilities: &[u32], extensions: &[&str]) -> Vec<u32> {
        let mut words = vec![spirv::MAGIC_NUMBER, 0x0001_0000, 0, 8, 0];
        for &cap in capabilities {
            words.push((2 << 16) | spirv::Op::Capability as u32);
            words.push(cap);
        }
        for ext in extensions {
            let literal = encode_string(ext);
            words.push((((literal.len() + 1) as u32) << 16) | spirv::Op::Extension as u32);
            words.extend(literal);
        }
        // OpMemoryModel Logical GLSL450
        words.push((3 << 16) | spirv::Op::MemoryModel as u32);
        words.push(0);
        words.push(1);
        words
    }

    #[test]
    fn test_scan_reads_preamble() {
        let words = module_with(
            &[spirv::Capability::Shader as u32],
            &["SPV_KHR_storage_buffer_storage_class"],
        );
        let features = ModuleFeatures::scan(&words).unwrap();

        assert_eq!(features.version, (1, 0));
        assert_eq!(features.bound, 8);
        assert_eq!(features.capabilities, vec!["Shader".to_string()]);
        assert_eq!(
            features.extensions,
            vec!["SPV_KHR_storage_buffer_storage_class".to_string()]
        );
    }

    #[test]
    fn test_everything_allows_all() {
        let words = module_with(&[spirv::Capability::Float64 as u32], &["SPV_KHR_anything"]);
        assert!(FeatureSet::Everything.check(&words).is_ok());
    }

    #[test]
    fn test_allowlist_rejects_capability() {
        let words = module_with(
            &[
                spirv::Capability::Shader as u32,
                spirv::Capability::Float64 as u32,
            ],
            &[],
        );
        let allow = FeatureSet::only(["Shader"], Vec::<String>::new());
        let err = allow.check(&words).unwrap_err();
        assert_eq!(err, Error::parse("capability Float64 is not allowed"));
    }

    #[test]
    fn test_allowlist_rejects_extension() {
        let words = module_with(&[spirv::Capability::Shader as u32], &["SPV_EXT_demo"]);
        let allow = FeatureSet::only(["Shader"], ["SPV_KHR_other"]);
        assert!(matches!(allow.check(&words), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_short_module_is_parse_error() {
        assert!(matches!(
            ModuleFeatures::scan(&[spirv::MAGIC_NUMBER, 0]),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_truncated_instruction() {
        let mut words = vec![spirv::MAGIC_NUMBER, 0x0001_0000, 0, 8, 0];
        words.push((4 << 16) | spirv::Op::Capability as u32);
        words.push(1);
        assert!(ModuleFeatures::scan(&words).is_err());
    }

    #[test]
    fn test_decode_literal_string() {
        assert_eq!(decode_literal_string(&encode_string("GLSL.std.450")), "GLSL.std.450");
        assert_eq!(decode_literal_string(&encode_string("")), "");
    }

    #[test]
    fn test_feature_set_json() {
        let json = r#"{ "only": { "capabilities": ["Shader"] } }"#;
        let set: FeatureSet = serde_json::from_str(json).unwrap();
        assert!(set.allows_capability("Shader"));
        assert!(!set.allows_extension("SPV_KHR_16bit_storage"));
    }
}
