use anyhow::{Context, Result};
use lib_overlay::render::{ConsoleSink, FileSink};
use lib_overlay::{MemorySink, RenderSink};
use std::path::Path;

use crate::overlay_logic::config::SinkKind;

pub type BoxedSink = Box<dyn RenderSink + Send>;

pub fn build_sink(kind: SinkKind, output_dir: &Path) -> Result<BoxedSink> {
    let sink: BoxedSink = match kind {
        SinkKind::Console => Box::new(ConsoleSink::new().quiet_frames(true)),
        SinkKind::File => {
            let sink = FileSink::new(output_dir)
                .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;
            log::info!("Writing elements to {}", output_dir.display());
            Box::new(sink)
        }
        SinkKind::Memory => Box::new(MemorySink::new()),
    };
    Ok(sink)
}
