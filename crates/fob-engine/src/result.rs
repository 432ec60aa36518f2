//! Build results.

use crate::message::Message;

/// A generated file. Nothing is written to disk; callers decide what to do with
/// the contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFile {
    pub path: String,
    /// Content hash, stable for identical contents
    pub hash: String,
    pub contents: Vec<u8>,
}

impl OutputFile {
    pub fn new(path: impl Into<String>, contents: Vec<u8>) -> Self {
        let hash = content_hash(&contents);
        Self {
            path: path.into(),
            hash,
            contents,
        }
    }
}

/// First 16 hex digits of the blake3 digest.
pub fn content_hash(contents: &[u8]) -> String {
    let digest = blake3::hash(contents);
    digest.to_hex()[..16].to_string()
}

/// Outcome of one build pass.
///
/// Engine failures never surface as `Err`; they are reported in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub output_files: Vec<OutputFile>,
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
}

impl BuildResult {
    pub fn from_errors(errors: Vec<Message>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        !self.errors.is_empty()
    }
}
