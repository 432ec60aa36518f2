//! Engine-native diagnostics.
//!
//! A [`Message`] is what the engine reports for errors and warnings. Messages
//! carry an optional source [`Location`] and any number of [`Note`]s, each of
//! which may point at its own location.

use std::fmt::{self, Display, Formatter};

/// A position in a source file.
///
/// Empty strings mean "not known". `suggestion` holds a fix-it replacement for
/// the span starting at `column` and running for `length` bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub namespace: String,
    /// 1-based line number
    pub line: u32,
    /// 0-based column, in bytes
    pub column: u32,
    /// Length of the highlighted span, in bytes
    pub length: u32,
    pub line_text: String,
    pub suggestion: String,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            namespace: "file".to_string(),
            line,
            column,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub fn with_line_text(mut self, line_text: impl Into<String>) -> Self {
        self.line_text = line_text.into();
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }
}

/// Additional context attached to a [`Message`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Note {
    pub text: String,
    pub location: Option<Location>,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// An error or warning produced by the engine or by a plugin hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub plugin_name: String,
    pub text: String,
    pub location: Option<Location>,
    pub notes: Vec<Note>,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_plugin_name(mut self, plugin_name: impl Into<String>) -> Self {
        self.plugin_name = plugin_name.into();
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) if !location.file.is_empty() => write!(
                f,
                "{}:{}:{}: {}",
                location.file, location.line, location.column, self.text
            ),
            _ => f.write_str(&self.text),
        }
    }
}
