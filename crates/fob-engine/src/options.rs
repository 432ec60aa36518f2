//! Build configuration consumed by [`Engine`](crate::Engine).

use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::message::Message;
use crate::plugin::Plugin;

/// One entry point: the module to start from and where its bundle goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub input_path: String,
    pub output_path: String,
}

impl EntryPoint {
    pub fn new(input_path: impl Into<String>, output_path: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
        }
    }

    /// Output path without its extension; the engine appends `.js`.
    pub(crate) fn output_name(&self) -> String {
        let path = Path::new(&self.output_path);
        path.with_extension("").to_string_lossy().into_owned()
    }
}

/// Options for a build or a build context.
///
/// Cloning is cheap: plugins are reference counted.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub bundle: bool,
    pub entry_points: Vec<EntryPoint>,
    pub plugins: Vec<Plugin>,
    pub working_dir: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bundle(mut self, enabled: bool) -> Self {
        self.bundle = enabled;
        self
    }

    #[must_use]
    pub fn entry_point(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.entry_points.push(EntryPoint::new(input, output));
        self
    }

    #[must_use]
    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf().clean());
        self
    }

    /// Check the options for errors that prevent creating a context.
    pub fn validate(&self) -> Result<(), Vec<Message>> {
        let mut errors = Vec::new();

        for (i, entry) in self.entry_points.iter().enumerate() {
            if entry.input_path.is_empty() {
                errors.push(
                    Message::new(format!("Entry point at index {i} has an empty input path"))
                        .with_id("invalid-entry-point"),
                );
            }
        }

        for (i, entry) in self.entry_points.iter().enumerate() {
            let name = entry.output_name();
            if self.entry_points[..i].iter().any(|e| e.output_name() == name) {
                errors.push(
                    Message::new(format!(
                        "Two entry points cannot share the output path \"{}\"",
                        entry.output_path
                    ))
                    .with_id("duplicate-output-path"),
                );
            }
        }

        for (i, plugin) in self.plugins.iter().enumerate() {
            if plugin.name().is_empty() {
                errors.push(
                    Message::new(format!("Plugin at index {i} is missing a name"))
                        .with_id("invalid-plugin"),
                );
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
