//! # Render Layer
//!
//! The boundary between the pipeline and whatever actually draws the overlay.
//! The core only knows four operations: set text, set an attribute, toggle
//! visibility, and animate a number. The first three are [`RenderSink`]
//! methods; the fourth goes through an [`Animator`], whose frames are driven by
//! a timing loop the caller owns.
//!
//! ## Contained Modules:
//! - **`dispatcher`**: routes delta entries to sinks with a last-applied dedupe
//!   layer and one animation per field.
//! - **`animator`**: the `Animator` capability and the `Tweener` count-up
//!   implementation.
//! - **`sinks`**: `MemorySink`, plus `ConsoleSink` and `FileSink` behind the
//!   `sinks` feature.
//! - **`format`**: number-to-text formatting shared by sinks and animation frames.

pub mod animator;
pub mod dispatcher;
pub mod format;
pub mod sinks;

pub use animator::{Animator, Tweener};
pub use dispatcher::RenderDispatcher;
pub use sinks::MemorySink;
#[cfg(feature = "sinks")]
pub use sinks::{ConsoleSink, FileSink};

/// A render target addressed by element id.
pub trait RenderSink {
    /// Replaces the element's text content.
    fn set_text(&mut self, id: &str, text: &str);

    /// Sets one attribute (e.g. `src` of a background image).
    fn set_attribute(&mut self, id: &str, attribute: &str, value: &str);

    /// Switches the element to one of its two fixed states. `state` is the
    /// configured `on` or `off` value matching `visible`.
    fn set_visibility(&mut self, id: &str, visible: bool, state: &str);

    /// Pushes buffered writes out. Called from the frame loop, never from dispatch.
    fn flush(&mut self) {}
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn set_text(&mut self, id: &str, text: &str) {
        (**self).set_text(id, text)
    }

    fn set_attribute(&mut self, id: &str, attribute: &str, value: &str) {
        (**self).set_attribute(id, attribute, value)
    }

    fn set_visibility(&mut self, id: &str, visible: bool, state: &str) {
        (**self).set_visibility(id, visible, state)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}
