//! # Result Cache
//!
//! Process-owned storage for conversion outputs.
//!
//! A host calling across the C boundary cannot take ownership of a Rust
//! allocation, so every conversion result is parked in a slot owned by this
//! module and the host receives a pointer into it. There is exactly one slot
//! per [`OutputKind`]; publishing a new value of a kind replaces the previous
//! one and invalidates every pointer handed out for it.
//!
//! ## Contract
//!
//! - A [`SlotView`] stays valid until the next [`ResultCache::publish`] of the
//!   same kind. Reading twice without a publish in between yields identical
//!   views.
//! - A publish swaps the slot under a lock, so a reader never observes a
//!   half-written value. The lock does not keep an old buffer alive for a
//!   reader on another thread: the shared slots are for single-threaded,
//!   call-then-read use. Concurrent callers use [`OwnedBuffer`] instead.
//! - Failed conversions never publish, so a slot keeps its previous value.

use crate::pipeline::Artifact;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::fmt;

/// Kind of conversion output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// SPIR-V assembly text
    Assembly,
    /// WGSL source text
    Source,
    /// SPIR-V binary words
    Binary,
}

impl OutputKind {
    /// All kinds, in slot order
    pub const ALL: [OutputKind; 3] = [OutputKind::Assembly, OutputKind::Source, OutputKind::Binary];

    fn index(self) -> usize {
        match self {
            OutputKind::Assembly => 0,
            OutputKind::Source => 1,
            OutputKind::Binary => 2,
        }
    }

    /// True for the text kinds
    pub fn is_text(self) -> bool {
        !matches!(self, OutputKind::Binary)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Assembly => write!(f, "assembly"),
            OutputKind::Source => write!(f, "source"),
            OutputKind::Binary => write!(f, "binary"),
        }
    }
}

/// Slot contents. Text keeps a trailing NUL so the pointer is a C string;
/// binary is stored as words so the pointer is `u32` aligned.
enum SlotValue {
    Text(Box<[u8]>),
    Words(Box<[u32]>),
}

impl SlotValue {
    fn text(text: &str) -> Self {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        SlotValue::Text(bytes.into_boxed_slice())
    }

    fn view(&self) -> SlotView {
        match self {
            SlotValue::Text(bytes) => SlotView {
                ptr: bytes.as_ptr(),
                len: bytes.len() - 1,
            },
            SlotValue::Words(words) => SlotView {
                ptr: words.as_ptr().cast(),
                len: words.len(),
            },
        }
    }
}

/// Pointer and length into a cache slot
///
/// `len` counts bytes (excluding the NUL terminator) for text kinds and words
/// for [`OutputKind::Binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView {
    ptr: *const u8,
    len: usize,
}

impl SlotView {
    /// Start of the slot buffer
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Element count (bytes for text, words for binary)
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the published value was empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One slot per output kind plus the rendered diagnostics of the last failure
pub struct ResultCache {
    slots: [Mutex<Option<SlotValue>>; 3],
    diagnostics: Mutex<Option<Box<[u8]>>>,
}

impl ResultCache {
    /// Empty cache
    pub fn new() -> Self {
        Self {
            slots: [Mutex::new(None), Mutex::new(None), Mutex::new(None)],
            diagnostics: Mutex::new(None),
        }
    }

    /// Replace the slot for the artifact's kind and return a view of it
    ///
    /// Clears the diagnostics slot: it describes the most recent call.
    pub fn publish(&self, artifact: &Artifact) -> SlotView {
        let value = match artifact {
            Artifact::Assembly(text) | Artifact::Source(text) => SlotValue::text(text),
            Artifact::Binary(words) => SlotValue::Words(words.clone().into_boxed_slice()),
        };
        let view = value.view();
        let previous = self.slots[artifact.kind().index()].lock().replace(value);
        // Old buffer is freed outside the lock
        drop(previous);
        *self.diagnostics.lock() = None;
        view
    }

    /// View of the current slot, if anything was published
    pub fn read(&self, kind: OutputKind) -> Option<SlotView> {
        self.slots[kind.index()].lock().as_ref().map(SlotValue::view)
    }

    /// Copy of the current slot contents
    pub fn snapshot(&self, kind: OutputKind) -> Option<Artifact> {
        let slot = self.slots[kind.index()].lock();
        slot.as_ref().map(|value| match value {
            SlotValue::Text(bytes) => {
                let text = String::from_utf8_lossy(&bytes[..bytes.len() - 1]).into_owned();
                match kind {
                    OutputKind::Assembly => Artifact::Assembly(text),
                    _ => Artifact::Source(text),
                }
            }
            SlotValue::Words(words) => Artifact::Binary(words.to_vec()),
        })
    }

    /// Word count of the binary slot, zero if empty
    pub fn binary_len(&self) -> usize {
        self.read(OutputKind::Binary).map_or(0, |view| view.len())
    }

    /// Record the rendered diagnostics of a failed call
    pub fn record_failure(&self, rendered: &str) {
        let mut bytes = Vec::with_capacity(rendered.len() + 1);
        bytes.extend(rendered.bytes().filter(|&b| b != 0));
        bytes.push(0);
        *self.diagnostics.lock() = Some(bytes.into_boxed_slice());
    }

    /// NUL-terminated diagnostics of the last failure, if the last call failed
    pub fn last_diagnostics(&self) -> Option<*const u8> {
        self.diagnostics.lock().as_ref().map(|bytes| bytes.as_ptr())
    }

    /// Diagnostics of the last failure as a string
    pub fn last_diagnostics_text(&self) -> Option<String> {
        self.diagnostics
            .lock()
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(&bytes[..bytes.len() - 1]).into_owned())
    }

    /// Drop every slot
    pub fn clear(&self) {
        for slot in &self.slots {
            slot.lock().take();
        }
        self.diagnostics.lock().take();
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// Process-wide cache used by the C boundary
    pub static ref RESULT_CACHE: ResultCache = ResultCache::new();
}

/// Caller-owned conversion output or failure report
///
/// Returned by the handle-based API; never shared, so it is safe to use from
/// any number of threads at once. Text buffers carry a trailing NUL that
/// [`OwnedBuffer::len`] does not count; binary buffers hold little-endian
/// words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedBuffer {
    kind: Option<OutputKind>,
    bytes: Vec<u8>,
    len: usize,
}

impl OwnedBuffer {
    /// Take ownership of an artifact
    pub fn from_artifact(artifact: Artifact) -> Self {
        let kind = Some(artifact.kind());
        match artifact {
            Artifact::Assembly(text) | Artifact::Source(text) => {
                let mut bytes = text.into_bytes();
                let len = bytes.len();
                bytes.push(0);
                Self { kind, bytes, len }
            }
            Artifact::Binary(words) => {
                let bytes = crate::codec::words_to_bytes(&words);
                let len = bytes.len();
                Self { kind, bytes, len }
            }
        }
    }

    /// Rendered diagnostics of a failed call, NUL-terminated
    pub fn diagnostics(rendered: &str) -> Self {
        let mut bytes: Vec<u8> = rendered.bytes().filter(|&b| b != 0).collect();
        let len = bytes.len();
        bytes.push(0);
        Self {
            kind: None,
            bytes,
            len,
        }
    }

    /// Kind of output held; `None` for diagnostics
    pub fn kind(&self) -> Option<OutputKind> {
        self.kind
    }

    /// Pointer to the first byte
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for an empty payload
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload without the NUL terminator
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_reads_none() {
        let cache = ResultCache::new();
        for kind in OutputKind::ALL {
            assert!(cache.read(kind).is_none());
        }
        assert_eq!(cache.binary_len(), 0);
    }

    #[test]
    fn test_read_is_idempotent() {
        let cache = ResultCache::new();
        cache.publish(&Artifact::Source("fn main() {}".into()));

        let first = cache.read(OutputKind::Source).unwrap();
        let second = cache.read(OutputKind::Source).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 12);
    }

    #[test]
    fn test_text_slot_is_nul_terminated() {
        let cache = ResultCache::new();
        let view = cache.publish(&Artifact::Assembly("OpNop".into()));
        let bytes = unsafe { std::slice::from_raw_parts(view.as_ptr(), view.len() + 1) };
        assert_eq!(bytes, b"OpNop\0");
    }

    #[test]
    fn test_binary_slot_counts_words() {
        let cache = ResultCache::new();
        cache.publish(&Artifact::Binary(vec![0x0723_0203, 0x0001_0000, 0, 1, 0]));
        assert_eq!(cache.binary_len(), 5);

        let view = cache.read(OutputKind::Binary).unwrap();
        let words = unsafe { std::slice::from_raw_parts(view.as_ptr().cast::<u32>(), view.len()) };
        assert_eq!(words[0], 0x0723_0203);
    }

    #[test]
    fn test_last_write_wins_per_kind() {
        let cache = ResultCache::new();
        cache.publish(&Artifact::Source("first".into()));
        cache.publish(&Artifact::Assembly("asm".into()));
        cache.publish(&Artifact::Source("second".into()));

        assert_eq!(
            cache.snapshot(OutputKind::Source),
            Some(Artifact::Source("second".into()))
        );
        assert_eq!(
            cache.snapshot(OutputKind::Assembly),
            Some(Artifact::Assembly("asm".into()))
        );
    }

    #[test]
    fn test_publish_clears_failure_record() {
        let cache = ResultCache::new();
        cache.record_failure("error: bad input");
        assert_eq!(cache.last_diagnostics_text().as_deref(), Some("error: bad input"));

        cache.publish(&Artifact::Source("ok".into()));
        assert!(cache.last_diagnostics().is_none());
    }

    #[test]
    fn test_clear() {
        let cache = ResultCache::new();
        cache.publish(&Artifact::Binary(vec![1, 2]));
        cache.clear();
        assert!(cache.read(OutputKind::Binary).is_none());
    }

    #[test]
    fn test_owned_buffer_text() {
        let buffer = OwnedBuffer::from_artifact(Artifact::Source("abc".into()));
        assert_eq!(buffer.kind(), Some(OutputKind::Source));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.as_bytes(), b"abc");
        let with_nul = unsafe { std::slice::from_raw_parts(buffer.as_ptr(), 4) };
        assert_eq!(with_nul, b"abc\0");
    }

    #[test]
    fn test_owned_buffer_binary_is_le() {
        let buffer = OwnedBuffer::from_artifact(Artifact::Binary(vec![0x0723_0203]));
        assert_eq!(buffer.as_bytes(), &[0x03, 0x02, 0x23, 0x07]);
    }

    #[test]
    fn test_owned_diagnostics_buffer() {
        let buffer = OwnedBuffer::diagnostics("error: bad\0input\n");
        assert_eq!(buffer.kind(), None);
        assert_eq!(buffer.as_bytes(), b"error: badinput\n");
        let with_nul = unsafe { std::slice::from_raw_parts(buffer.as_ptr(), buffer.len() + 1) };
        assert_eq!(with_nul.last(), Some(&0));
    }
}
