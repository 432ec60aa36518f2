//! Conversion from Rolldown diagnostics to engine [`Message`]s.
//!
//! Rolldown's diagnostic types are not a stable public surface, so we work
//! from their `Debug` rendering and pull out what we can: a kind, and a file
//! path when one is mentioned.

use std::fmt::Debug;

use crate::message::{Location, Message};

/// Id assigned to every message from Rolldown, refined by [`classify`].
const ROLLDOWN_ID: &str = "rolldown";

/// Extract messages from a Rolldown error or warning.
pub fn from_rolldown(diagnostic: &dyn Debug) -> Vec<Message> {
    let rendered = format!("{diagnostic:?}");

    let parts: Vec<&str> = rendered
        .split("BatchedBuildDiagnostic")
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "(" && *s != ")")
        .collect();

    if parts.len() > 1 {
        parts.into_iter().map(message_from_text).collect()
    } else {
        vec![message_from_text(&rendered)]
    }
}

fn message_from_text(text: &str) -> Message {
    let mut msg = Message::new(text.trim()).with_id(format!("{ROLLDOWN_ID}:{}", classify(text)));
    if let Some(file) = extract_file_path(text) {
        msg = msg.with_location(Location {
            file,
            namespace: "file".to_string(),
            ..Default::default()
        });
    }
    msg
}

/// Diagnostic kind, from the names Rolldown uses for its event kinds.
fn classify(text: &str) -> &'static str {
    if text.contains("UnresolvedEntry") {
        "unresolved-entry"
    } else if text.contains("UnresolvedImport") || text.contains("Could not resolve") {
        "unresolved-import"
    } else if text.contains("MissingExport") {
        "missing-export"
    } else if text.contains("Parse") || text.contains("Syntax") || text.contains("Expected") {
        "parse-error"
    } else if text.contains("Circular") {
        "circular-dependency"
    } else if text.contains("InvalidOption") {
        "invalid-option"
    } else if text.contains("Plugin") {
        "plugin"
    } else {
        "other"
    }
}

/// Find the first quoted path with a script extension.
fn extract_file_path(text: &str) -> Option<String> {
    const EXTENSIONS: [&str; 6] = [".js", ".ts", ".jsx", ".tsx", ".mjs", ".cjs"];

    text.split(['"', '\''])
        .skip(1)
        .step_by(2)
        .find(|candidate| {
            !candidate.contains(char::is_whitespace)
                && EXTENSIONS.iter().any(|ext| candidate.ends_with(ext))
        })
        .map(str::to_string)
}
