//! # Shader Reader
//!
//! Parses WGSL or SPIR-V into a validated [`ShaderModule`], the in-memory
//! pivot between the two formats. A module only exists if it passed both the
//! frontend and naga's validator; on any failure the caller gets diagnostics
//! and nothing else.

use crate::config::ReaderOptions;
use crate::diagnostics::Diagnostics;
use crate::error::{StageFailure, StageResult};
use crate::features::FeatureSet;
use crate::Error;
use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use std::fmt;

/// A parsed and validated shader program
#[derive(Debug)]
pub struct ShaderModule {
    module: naga::Module,
    info: ModuleInfo,
}

impl ShaderModule {
    /// Underlying naga module
    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    /// Validation info needed by the backends
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Entry points and resource bindings, in a stable order
    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary::of(&self.module)
    }
}

/// WGSL / SPIR-V reader
#[derive(Debug, Clone, Default)]
pub struct Reader {
    options: ReaderOptions,
}

impl Reader {
    /// Create a reader with explicit options
    pub fn new(options: ReaderOptions) -> Self {
        Self { options }
    }

    /// Parse and validate WGSL source
    pub fn parse_source(&self, source: &str) -> StageResult<ShaderModule> {
        let module = naga::front::wgsl::parse_str(source).map_err(|err| {
            let diagnostics = Diagnostics::from_wgsl_parse(&err, source);
            StageFailure::new(Error::parse(summarize(&diagnostics, err.message())), diagnostics)
        })?;

        validate(module, Some(source))
    }

    /// Parse and validate a SPIR-V module using the reader's feature set
    pub fn parse_binary(&self, words: &[u32]) -> StageResult<ShaderModule> {
        self.parse_binary_with(words, &self.options.allowed_features)
    }

    /// Parse and validate a SPIR-V module with an explicit feature set
    pub fn parse_binary_with(
        &self,
        words: &[u32],
        features: &FeatureSet,
    ) -> StageResult<ShaderModule> {
        let declared = features.check(words)?;
        tracing::trace!(
            version = ?declared.version,
            capabilities = ?declared.capabilities,
            extensions = ?declared.extensions,
            "SPIR-V preamble accepted"
        );

        let options = naga::front::spv::Options {
            adjust_coordinate_space: self.options.adjust_coordinate_space,
            strict_capabilities: self.options.strict_capabilities,
            ..Default::default()
        };
        let module = naga::front::spv::Frontend::new(words.iter().copied(), &options)
            .parse()
            .map_err(|err| {
                let diagnostics = Diagnostics::from_error(&err);
                StageFailure::new(
                    Error::parse(format!("failed to parse SPIR-V: {}", err)),
                    diagnostics,
                )
            })?;

        validate(module, None)
    }
}

fn validate(
    module: naga::Module,
    source: Option<&str>,
) -> StageResult<ShaderModule> {
    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    match validator.validate(&module) {
        Ok(info) => Ok(ShaderModule { module, info }),
        Err(err) => {
            let diagnostics = Diagnostics::from_validation(&err, source);
            let message = format!("invalid program: {}", summarize(&diagnostics, &err.to_string()));
            Err(StageFailure::new(Error::parse(message), diagnostics))
        }
    }
}

fn summarize(diagnostics: &Diagnostics, fallback: &str) -> String {
    diagnostics
        .first_error()
        .map(|d| match d.location {
            Some(loc) => format!("{} (at {})", d.message, loc),
            None => d.message.clone(),
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Observable shape of a module: what a host binds and invokes
///
/// Two modules with equal summaries expose the same entry points and the same
/// resource binding signatures, which is what a round trip through another
/// format must preserve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSummary {
    /// Entry points sorted by (stage, name)
    pub entry_points: Vec<EntryPointSummary>,
    /// Resource bindings sorted by (group, binding)
    pub bindings: Vec<BindingSummary>,
}

/// One entry point
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryPointSummary {
    /// Pipeline stage: `vertex`, `fragment` or `compute`
    pub stage: String,
    /// Function name
    pub name: String,
    /// Workgroup size; `[0, 0, 0]` for non-compute stages
    pub workgroup_size: [u32; 3],
}

/// One bound resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BindingSummary {
    /// Bind group index
    pub group: u32,
    /// Binding index within the group
    pub binding: u32,
    /// Address space: `uniform`, `storage`, `handle`, ...
    pub space: String,
}

impl ModuleSummary {
    /// Summarize a naga module
    pub fn of(module: &naga::Module) -> Self {
        let mut entry_points: Vec<EntryPointSummary> = module
            .entry_points
            .iter()
            .map(|ep| EntryPointSummary {
                stage: format!("{:?}", ep.stage).to_lowercase(),
                name: ep.name.clone(),
                workgroup_size: ep.workgroup_size,
            })
            .collect();
        entry_points.sort();

        let mut bindings: Vec<BindingSummary> = module
            .global_variables
            .iter()
            .filter_map(|(_, var)| {
                var.binding.as_ref().map(|rb| BindingSummary {
                    group: rb.group,
                    binding: rb.binding,
                    space: address_space_name(var.space).to_string(),
                })
            })
            .collect();
        bindings.sort();

        Self {
            entry_points,
            bindings,
        }
    }

    /// Find an entry point by name
    pub fn entry_point(&self, name: &str) -> Option<&EntryPointSummary> {
        self.entry_points.iter().find(|ep| ep.name == name)
    }
}

impl fmt::Display for ModuleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ep in &self.entry_points {
            writeln!(
                f,
                "entry {} {} {:?}",
                ep.stage, ep.name, ep.workgroup_size
            )?;
        }
        for b in &self.bindings {
            writeln!(f, "binding @group({}) @binding({}) {}", b.group, b.binding, b.space)?;
        }
        Ok(())
    }
}

fn address_space_name(space: naga::AddressSpace) -> &'static str {
    match space {
        naga::AddressSpace::Uniform => "uniform",
        naga::AddressSpace::Storage { .. } => "storage",
        naga::AddressSpace::Handle => "handle",
        naga::AddressSpace::PushConstant => "push_constant",
        naga::AddressSpace::WorkGroup => "workgroup",
        naga::AddressSpace::Private => "private",
        _ => "function",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SpirvCodec;

    const BINDINGS_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> scale: f32;
@group(0) @binding(1) var<storage, read_write> data: array<f32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    data[id.x] = data[id.x] * scale;
}
"#;

    #[test]
    fn test_parse_source_minimal_compute() {
        let reader = Reader::default();
        let module = reader
            .parse_source("@compute @workgroup_size(1) fn main() {}")
            .unwrap();
        let summary = module.summary();

        assert_eq!(summary.entry_points.len(), 1);
        let ep = summary.entry_point("main").unwrap();
        assert_eq!(ep.stage, "compute");
        assert_eq!(ep.workgroup_size, [1, 1, 1]);
    }

    #[test]
    fn test_parse_source_bindings() {
        let module = Reader::default().parse_source(BINDINGS_WGSL).unwrap();
        let summary = module.summary();

        assert_eq!(summary.bindings.len(), 2);
        assert_eq!(summary.bindings[0].space, "uniform");
        assert_eq!(summary.bindings[1].space, "storage");
        assert_eq!(summary.bindings[1].binding, 1);
    }

    #[test]
    fn test_undeclared_identifier_is_parse_error() {
        let failure = Reader::default()
            .parse_source("@compute @workgroup_size(1) fn main() { let a = missing; }")
            .unwrap_err();

        assert!(matches!(failure.error, Error::Parse { .. }));
        assert!(failure.diagnostics.has_errors());
        assert!(failure.error.to_string().contains("missing"));
    }

    #[test]
    fn test_type_error_is_parse_error() {
        let failure = Reader::default()
            .parse_source("@compute @workgroup_size(1) fn main() { let a: u32 = 1.5; }")
            .unwrap_err();
        assert!(matches!(failure.error, Error::Parse { .. }));
    }

    #[test]
    fn test_parse_binary_from_assembly() {
        let asm = "\
OpCapability Shader
OpMemoryModel Logical GLSL450
OpEntryPoint GLCompute %1 \"main\"
OpExecutionMode %1 LocalSize 8 1 1
%2 = OpTypeVoid
%3 = OpTypeFunction %2
%1 = OpFunction %2 None %3
%4 = OpLabel
OpReturn
OpFunctionEnd
";
        let words = SpirvCodec::default().assemble(asm).unwrap();
        let module = Reader::default().parse_binary(&words).unwrap();
        let ep = module.summary().entry_point("main").cloned().unwrap();

        assert_eq!(ep.stage, "compute");
        assert_eq!(ep.workgroup_size, [8, 1, 1]);
    }

    #[test]
    fn test_parse_binary_rejects_disallowed_capability() {
        let asm = "\
OpCapability Shader
OpCapability Float64
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
        let words = SpirvCodec::default().assemble(asm).unwrap();
        let reader = Reader::default();
        let failure = reader
            .parse_binary_with(&words, &FeatureSet::only(["Shader"], Vec::<String>::new()))
            .unwrap_err();

        assert!(matches!(failure.error, Error::Parse { .. }));
        assert!(failure.error.to_string().contains("Float64"));
    }

    #[test]
    fn test_parse_binary_garbage() {
        let failure = Reader::default().parse_binary(&[1, 2, 3]).unwrap_err();
        assert!(matches!(failure.error, Error::Parse { .. }));
    }
}
