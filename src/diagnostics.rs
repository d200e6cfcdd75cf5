//! # Diagnostics Channel
//!
//! Structured error/warning records collected while a conversion runs.
//!
//! Each wrapped library reports problems in its own shape (naga's WGSL
//! `ParseError`, naga's `WithSpan<ValidationError>`, SPIRV-Tools'
//! `Diagnostic`). The adapters here flatten them into [`Diagnostic`] records
//! so the orchestrator can log them and hand them back to the caller as text.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Additional context attached to a preceding error or warning
    Note,
    /// Non-fatal problem; the conversion still produced a result
    Warning,
    /// The stage failed
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Position of a diagnostic inside the input text
///
/// Lines and columns are 1-based. Offsets are byte offsets into the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub column: u32,
    /// Byte offset of the span start
    pub offset: u32,
    /// Span length in bytes
    pub length: u32,
}

impl From<naga::SourceLocation> for SourceLocation {
    fn from(loc: naga::SourceLocation) -> Self {
        Self {
            line: loc.line_number,
            column: loc.line_position,
            offset: loc.offset,
            length: loc.length,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single diagnostic record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Where in the input the problem was found, if known
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    /// Error record without a location
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    /// Warning record without a location
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location: None,
        }
    }

    /// Note record without a location
    pub fn note(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Note,
            message: message.into(),
            location: None,
        }
    }

    /// Attach a location
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} at {}: {}", self.severity, loc, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Ordered diagnostics for one conversion attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.records.push(diagnostic);
    }

    /// Append an error record
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::error(message));
    }

    /// Append a warning record
    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::warning(message));
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True if any record is an error
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Number of error records
    pub fn error_count(&self) -> usize {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Number of warning records
    pub fn warning_count(&self) -> usize {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// First error message, used as the summary of a failed stage
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.records.iter().find(|d| d.severity == Severity::Error)
    }

    /// Render every record, one per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for diagnostic in &self.records {
            out.push_str(&diagnostic.to_string());
            out.push('\n');
        }
        out
    }

    /// Render with the offending source line and a caret under the column
    pub fn render_with_source(&self, source: &str) -> String {
        let lines: Vec<&str> = source.lines().collect();
        let mut out = String::new();
        for diagnostic in &self.records {
            out.push_str(&diagnostic.to_string());
            out.push('\n');
            let Some(loc) = diagnostic.location else {
                continue;
            };
            let Some(line) = lines.get((loc.line as usize).saturating_sub(1)) else {
                continue;
            };
            let gutter = format!("{:>4} | ", loc.line);
            out.push_str(&gutter);
            out.push_str(line);
            out.push('\n');
            let pad = gutter.len() + (loc.column as usize).saturating_sub(1);
            out.push_str(&" ".repeat(pad));
            out.push_str(&"^".repeat((loc.length as usize).max(1)));
            out.push('\n');
        }
        out
    }

    /// Records from a WGSL parse failure
    pub fn from_wgsl_parse(err: &naga::front::wgsl::ParseError, source: &str) -> Self {
        let mut diagnostics = Diagnostics::new();
        let mut primary = Diagnostic::error(err.message());
        if let Some(loc) = err.location(source) {
            primary = primary.at(loc.into());
        }
        diagnostics.push(primary);

        for (span, label) in err.labels() {
            if label.is_empty() {
                continue;
            }
            let mut note = Diagnostic::note(label);
            if span.is_defined() {
                note = note.at(span.location(source).into());
            }
            diagnostics.push(note);
        }
        diagnostics
    }

    /// Records from a naga validation failure
    ///
    /// `source` resolves spans to lines when the module came from WGSL.
    pub fn from_validation(
        err: &naga::WithSpan<naga::valid::ValidationError>,
        source: Option<&str>,
    ) -> Self {
        let mut diagnostics = Diagnostics::new();
        let mut primary = Diagnostic::error(error_chain(err.as_inner()));
        if let Some(loc) = source.and_then(|src| err.location(src)) {
            primary = primary.at(loc.into());
        }
        diagnostics.push(primary);

        for (span, label) in err.spans() {
            let mut note = Diagnostic::note(label.clone());
            if let Some(src) = source {
                if span.is_defined() {
                    note = note.at(span.location(src).into());
                }
            }
            diagnostics.push(note);
        }
        diagnostics
    }

    /// Records from a SPIRV-Tools failure
    ///
    /// Assembler diagnostics carry a text position, binary diagnostics a word
    /// index which is reported in the message.
    pub fn from_spirv_tools(err: &spirv_tools::error::Error) -> Self {
        let mut diagnostics = Diagnostics::new();
        match &err.diagnostic {
            Some(diag) if diag.is_text => {
                diagnostics.push(Diagnostic::error(diag.message.clone()).at(SourceLocation {
                    line: diag.line as u32 + 1,
                    column: diag.column as u32 + 1,
                    offset: diag.index as u32,
                    length: 0,
                }));
            }
            Some(diag) => {
                diagnostics.error(format!("{} (word {})", diag.message, diag.index));
            }
            None => diagnostics.error(err.to_string()),
        }
        diagnostics
    }

    /// Single error record from any displayable error
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(error_chain(err));
        diagnostics
    }
}

/// Single error record carrying the error's bare message
impl From<&Error> for Diagnostics {
    fn from(error: &Error) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(error.message());
        diagnostics
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.render().trim_end())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Join an error with its `source()` chain: "outer: inner: innermost"
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
