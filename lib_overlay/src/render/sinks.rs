//! Stock render sinks.
//!
//! `MemorySink` keeps the rendered state in memory and backs the test suite.
//! With the `sinks` feature, `ConsoleSink` prints every write and `FileSink`
//! mirrors each element into its own text file for capture software that
//! reads text sources from disk.

use std::collections::BTreeMap;

use crate::render::RenderSink;

/// Rendered state of one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementState {
    pub text: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub visible: Option<bool>,
    pub visibility_state: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    elements: BTreeMap<String, ElementState>,
    writes: usize,
    flushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, id: &str) -> Option<&ElementState> {
        self.elements.get(id)
    }

    pub fn elements(&self) -> &BTreeMap<String, ElementState> {
        &self.elements
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.element(id)?.text.as_deref()
    }

    pub fn attribute(&self, id: &str, attribute: &str) -> Option<&str> {
        self.element(id)?.attributes.get(attribute).map(String::as_str)
    }

    pub fn visible(&self, id: &str) -> Option<bool> {
        self.element(id)?.visible
    }

    pub fn visibility_state(&self, id: &str) -> Option<&str> {
        self.element(id)?.visibility_state.as_deref()
    }

    /// Total number of sink operations received.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    fn entry(&mut self, id: &str) -> &mut ElementState {
        self.writes += 1;
        self.elements.entry(id.to_string()).or_default()
    }
}

impl RenderSink for MemorySink {
    fn set_text(&mut self, id: &str, text: &str) {
        self.entry(id).text = Some(text.to_string());
    }

    fn set_attribute(&mut self, id: &str, attribute: &str, value: &str) {
        self.entry(id)
            .attributes
            .insert(attribute.to_string(), value.to_string());
    }

    fn set_visibility(&mut self, id: &str, visible: bool, state: &str) {
        let element = self.entry(id);
        element.visible = Some(visible);
        element.visibility_state = Some(state.to_string());
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

#[cfg(feature = "sinks")]
pub use self::console::ConsoleSink;
#[cfg(feature = "sinks")]
pub use self::file::FileSink;

#[cfg(feature = "sinks")]
mod console {
    use colored::*;

    use crate::render::RenderSink;

    /// Prints each write to stdout. Animation frames are printed too, so pair
    /// it with short animations or none.
    #[derive(Debug, Default)]
    pub struct ConsoleSink {
        quiet_frames: bool,
        last_text: std::collections::HashMap<String, String>,
    }

    impl ConsoleSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Suppresses repeated text writes with the same content.
        pub fn quiet_frames(mut self, quiet: bool) -> Self {
            self.quiet_frames = quiet;
            self
        }
    }

    impl RenderSink for ConsoleSink {
        fn set_text(&mut self, id: &str, text: &str) {
            if self.quiet_frames && self.last_text.get(id).map(String::as_str) == Some(text) {
                return;
            }
            self.last_text.insert(id.to_string(), text.to_string());
            println!("{} {} {}", id.bright_cyan(), "=".dimmed(), text.bold());
        }

        fn set_attribute(&mut self, id: &str, attribute: &str, value: &str) {
            println!(
                "{}{}{} {} {}",
                id.bright_cyan(),
                "@".dimmed(),
                attribute.yellow(),
                "=".dimmed(),
                value
            );
        }

        fn set_visibility(&mut self, id: &str, visible: bool, state: &str) {
            let marker = if visible { "shown".green() } else { "hidden".red() };
            println!("{} {} ({})", id.bright_cyan(), marker, state.dimmed());
        }
    }
}

#[cfg(feature = "sinks")]
mod file {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::render::RenderSink;

    /// Mirrors elements into `<dir>/<id>.txt`, `<dir>/<id>.<attribute>.txt`
    /// and `<dir>/<id>.visible.txt`. Writes are buffered and hit the disk on
    /// [`RenderSink::flush`], once per frame at most.
    #[derive(Debug)]
    pub struct FileSink {
        dir: PathBuf,
        pending: BTreeMap<PathBuf, String>,
    }

    impl FileSink {
        pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
            let dir = dir.into();
            fs::create_dir_all(&dir)?;
            Ok(Self {
                dir,
                pending: BTreeMap::new(),
            })
        }

        pub fn dir(&self) -> &Path {
            &self.dir
        }

        pub fn pending(&self) -> usize {
            self.pending.len()
        }

        fn file(&self, id: &str, suffix: Option<&str>) -> PathBuf {
            let mut name = sanitize(id);
            if let Some(suffix) = suffix {
                name.push('.');
                name.push_str(&sanitize(suffix));
            }
            name.push_str(".txt");
            self.dir.join(name)
        }
    }

    fn sanitize(raw: &str) -> String {
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }

    impl RenderSink for FileSink {
        fn set_text(&mut self, id: &str, text: &str) {
            let path = self.file(id, None);
            self.pending.insert(path, text.to_string());
        }

        fn set_attribute(&mut self, id: &str, attribute: &str, value: &str) {
            let path = self.file(id, Some(attribute));
            self.pending.insert(path, value.to_string());
        }

        fn set_visibility(&mut self, id: &str, _visible: bool, state: &str) {
            let path = self.file(id, Some("visible"));
            self.pending.insert(path, state.to_string());
        }

        fn flush(&mut self) {
            for (path, content) in std::mem::take(&mut self.pending) {
                if let Err(e) = fs::write(&path, content) {
                    log::warn!("Failed to write {}: {}", path.display(), e);
                }
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_tracks_state() {
        let mut sink = MemorySink::new();
        sink.set_text("artist", "BTS");
        sink.set_attribute("bg", "src", "a.jpg");
        sink.set_visibility("ifFcpp", false, "opacity:0");
        sink.flush();

        assert_eq!(sink.text("artist"), Some("BTS"));
        assert_eq!(sink.attribute("bg", "src"), Some("a.jpg"));
        assert_eq!(sink.visible("ifFcpp"), Some(false));
        assert_eq!(sink.visibility_state("ifFcpp"), Some("opacity:0"));
        assert_eq!(sink.writes(), 3);
        assert_eq!(sink.flushes(), 1);
        assert!(sink.text("missing").is_none());
    }

    #[test]
    fn test_boxed_sink_delegates() {
        let mut boxed: Box<dyn RenderSink> = Box::new(MemorySink::new());
        boxed.set_text("x", "1");
        boxed.flush();
    }
}
