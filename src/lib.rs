//! EMF/WMF metafile player
//!
//! Replays Enhanced and Windows metafiles against an abstract [`Canvas`].
//! Playback runs in two passes: an optional bounding-box pre-pass that fits
//! the picture onto a requested viewport, then the replay pass that turns
//! every record into canvas calls. Windows metafiles are promoted to EMF
//! first and played through the same engine.
//!
//! [`SvgCanvas`] renders to SVG, [`Recorder`] keeps the raw call sequence.

pub mod bounds;
pub mod builder;
pub mod canvas;
pub mod dib;
pub mod emf_records;
pub mod error;
pub mod header;
pub mod mapper;
pub mod metafile;
pub mod placeable;
pub mod player;
pub mod record;
pub mod recorder;
pub mod replay;
pub mod state;
pub mod svg_writer;
pub mod text;
pub mod wmf;

#[cfg(feature = "python")]
mod python;

pub use canvas::Canvas;
pub use error::{MetafileError, MetafileResult};
pub use header::is_emf_format;
pub use mapper::Viewport;
pub use metafile::Metafile;
pub use player::{play, play_emf, play_wmf, PlayOptions, PlaySummary};
pub use recorder::{CanvasCall, Recorder};
pub use svg_writer::SvgCanvas;
pub use wmf::is_wmf_format;

type PlayFn = fn(&[u8], &mut SvgCanvas, &PlayOptions) -> MetafileResult<PlaySummary>;

/// Canvas and options for an SVG conversion
///
/// A size of at least 2 x 2 scales the picture onto it; anything smaller
/// plays unscaled at the picture's own size.
fn svg_target(width: u32, height: u32) -> (SvgCanvas, PlayOptions) {
    if width > 1 && height > 1 {
        let viewport = Viewport::from_size(
            width.min(i32::MAX as u32) as i32,
            height.min(i32::MAX as u32) as i32,
        );
        (SvgCanvas::new(width, height), PlayOptions::with_viewport(viewport))
    } else {
        (SvgCanvas::fit_to_picture(), PlayOptions::unscaled())
    }
}

fn convert_with(data: &[u8], width: u32, height: u32, play_fn: PlayFn) -> MetafileResult<String> {
    let (mut canvas, options) = svg_target(width, height);
    let summary = play_fn(data, &mut canvas, &options)?;
    log::debug!(
        "Converted {} records to SVG, {} bitmaps skipped",
        summary.records,
        summary.skipped_bitmaps
    );
    Ok(canvas.finish())
}

/// Convert EMF data to an SVG document; pass 0 x 0 to keep the picture size
pub fn convert_emf_to_svg(data: &[u8], width: u32, height: u32) -> MetafileResult<String> {
    convert_with(data, width, height, play_emf)
}

/// Convert WMF data (placeable or not) to an SVG document
pub fn convert_wmf_to_svg(data: &[u8], width: u32, height: u32) -> MetafileResult<String> {
    convert_with(data, width, height, play_wmf)
}

/// Convert EMF or WMF data, detected by signature
pub fn convert_metafile_to_svg(data: &[u8], width: u32, height: u32) -> MetafileResult<String> {
    convert_with(data, width, height, play)
}
