//! Two-pass playback
//!
//! A metafile is played by first fixing the coordinate mapping (from the
//! header box, or from a bounding-box pre-pass when the caller asks for a
//! viewport) and then replaying every record onto the canvas.

use log::debug;

use crate::bounds::measure;
use crate::canvas::{Canvas, PictureSize};
use crate::error::{MetafileError, MetafileResult};
use crate::mapper::{Mapping, Viewport};
use crate::metafile::{Metafile, SourceFormat};
use crate::replay::Replayer;
use crate::wmf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayOptions {
    /// Target rectangle in canvas units; `None` plays unscaled
    pub viewport: Option<Viewport>,
}

impl PlayOptions {
    pub fn unscaled() -> Self {
        Self::default()
    }

    pub fn with_viewport(viewport: Viewport) -> Self {
        Self {
            viewport: Some(viewport),
        }
    }
}

/// Outcome of a playback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaySummary {
    /// Records dispatched to the replay pass
    pub records: usize,
    /// Blits skipped because their bitmap is unsupported
    pub skipped_bitmaps: usize,
    /// The canvas asked to stop before the end of the stream
    pub stopped: bool,
}

/// Play an EMF byte stream
pub fn play_emf<C: Canvas + ?Sized>(data: &[u8], canvas: &mut C, options: &PlayOptions) -> MetafileResult<PlaySummary> {
    let metafile = Metafile::from_emf(data)?;
    play_metafile(&metafile, canvas, options)
}

/// Play a WMF byte stream, with or without a placeable header
pub fn play_wmf<C: Canvas + ?Sized>(data: &[u8], canvas: &mut C, options: &PlayOptions) -> MetafileResult<PlaySummary> {
    let promoted = wmf::promote(data)?;
    let metafile = Metafile::parse(&promoted, SourceFormat::Wmf)?;
    play_metafile(&metafile, canvas, options)
}

/// Play EMF or WMF input, chosen by signature
pub fn play<C: Canvas + ?Sized>(data: &[u8], canvas: &mut C, options: &PlayOptions) -> MetafileResult<PlaySummary> {
    if data.is_empty() {
        return Err(MetafileError::Empty);
    }
    if crate::header::is_emf_format(data) {
        play_emf(data, canvas, options)
    } else if wmf::is_wmf_format(data) {
        play_wmf(data, canvas, options)
    } else {
        Err(MetafileError::NotAMetafile)
    }
}

/// Mapping for a loaded metafile
///
/// The pre-pass only runs when the viewport can actually scale; otherwise
/// the header box is used as is.
pub fn mapping_for(metafile: &Metafile<'_>, options: &PlayOptions) -> Mapping {
    let header_box = metafile.header_box();
    match options.viewport.filter(Viewport::is_scalable) {
        Some(viewport) => {
            let bbox = measure(metafile.records());
            let mapping = Mapping::new(bbox, Some(viewport));
            debug!(
                "Header bounds {:?}, measured box {:?}, viewport {:?}, factors {:?}, scaling {}",
                metafile.header().bounds,
                bbox,
                viewport,
                mapping.factors(),
                mapping.is_scaling()
            );
            mapping
        }
        None => {
            debug!("Header bounds {:?}, playing unscaled in {:?}", metafile.header().bounds, header_box);
            Mapping::unscaled(header_box)
        }
    }
}

/// Play an already loaded metafile
pub fn play_metafile<C: Canvas + ?Sized>(
    metafile: &Metafile<'_>,
    canvas: &mut C,
    options: &PlayOptions,
) -> MetafileResult<PlaySummary> {
    let mapping = mapping_for(metafile, options);

    let picture = metafile.header_box();
    let (width, height) = (picture.width(), picture.height());
    let (width_mm, height_mm) = metafile.header().physical_size(width, height);
    let size = PictureSize {
        width,
        height,
        width_mm,
        height_mm,
    };
    if !canvas.on_size(&size) {
        return Err(MetafileError::SizeRejected);
    }

    let mut summary = PlaySummary::default();
    let mut replayer = Replayer::new(canvas, mapping);
    for record in metafile.records() {
        if replayer.canvas().should_stop() {
            debug!("Canvas stopped playback after {} records", summary.records);
            summary.stopped = true;
            break;
        }
        replayer.play(record);
        summary.records += 1;
    }
    summary.skipped_bitmaps = replayer.skipped_bitmaps();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EmfBuilder;
    use crate::canvas::{Color, LineCap, LineJoin, LineStyle, Pen};
    use crate::emf_records::*;
    use crate::record::{Point, Rect};
    use crate::recorder::{CanvasCall, Recorder};
    use crate::state::PS_SOLID;

    fn pen_and_line() -> Vec<u8> {
        let mut b = EmfBuilder::new(Rect::new(0, 0, 100, 50));
        b.ext_create_pen(1, PS_SOLID, 3, Color::rgb(255, 0, 0), &[])
            .move_to(Point::new(0, 0))
            .line_to(Point::new(10, 10));
        b.finish()
    }

    #[test]
    fn test_end_to_end_unscaled() {
        let data = pen_and_line();
        let mut recorder = Recorder::new();
        let summary = play_emf(&data, &mut recorder, &PlayOptions::unscaled()).unwrap();

        assert_eq!(summary.records, 4);
        assert!(!summary.stopped);
        match recorder.calls[0] {
            CanvasCall::Size(size) => assert_eq!((size.width, size.height), (100, 50)),
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            recorder.drawing_calls(),
            &[
                CanvasCall::Pen(Pen {
                    style: LineStyle::Continuous,
                    width: 3,
                    color: Color::rgb(255, 0, 0),
                    cap: Some(LineCap::Round),
                    join: Some(LineJoin::Round),
                    dashes: vec![],
                }),
                CanvasCall::Line(0, 49, 10, 39),
            ]
        );
    }

    #[test]
    fn test_scaled_playback_fits_viewport() {
        let mut b = EmfBuilder::new(Rect::new(0, 0, 1000, 1000));
        b.rectangle(Rect::new(100, 100, 199, 149));
        let data = b.finish();

        let mut recorder = Recorder::new();
        let options = PlayOptions::with_viewport(Viewport::new(0, 999, 0, 499));
        play_emf(&data, &mut recorder, &options).unwrap();
        // the measured box is 100 x 50 units, the viewport ten times that
        assert_eq!(recorder.drawing_calls(), &[CanvasCall::Box(0, 980, 10, 490)]);
    }

    #[test]
    fn test_degenerate_viewport_plays_unscaled() {
        let data = pen_and_line();
        let mut recorder = Recorder::new();
        play_emf(&data, &mut recorder, &PlayOptions::with_viewport(Viewport::new(5, 5, 0, 100))).unwrap();
        assert_eq!(recorder.drawing_calls().last(), Some(&CanvasCall::Line(0, 49, 10, 39)));
    }

    #[test]
    fn test_size_rejected_before_drawing() {
        let data = pen_and_line();
        let mut recorder = Recorder::rejecting_size();
        let result = play_emf(&data, &mut recorder, &PlayOptions::unscaled());
        assert!(matches!(result, Err(MetafileError::SizeRejected)));
        assert_eq!(recorder.calls.len(), 1);
    }

    #[test]
    fn test_stop_hook() {
        let data = pen_and_line();
        let mut recorder = Recorder::stopping_after(2);
        let summary = play_emf(&data, &mut recorder, &PlayOptions::unscaled()).unwrap();
        assert!(summary.stopped);
        // size + pen, then the stop check fires before the move-to
        assert_eq!(summary.records, 1);
        assert_eq!(recorder.calls.len(), 2);
    }

    #[test]
    fn test_malformed_stream_draws_nothing() {
        let mut b = EmfBuilder::new(Rect::new(0, 0, 10, 10));
        b.set_pixel(Point::new(1, 1), Color::BLACK)
            .record(EMR_POLYGON, &[0; 16]);
        let data = b.finish();

        let mut recorder = Recorder::new();
        let result = play_emf(&data, &mut recorder, &PlayOptions::unscaled());
        assert!(matches!(result, Err(MetafileError::MalformedRecord { .. })));
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn test_format_detection() {
        let mut recorder = Recorder::new();
        assert!(matches!(play(&[], &mut recorder, &PlayOptions::unscaled()), Err(MetafileError::Empty)));
        assert!(matches!(
            play(b"not a picture", &mut recorder, &PlayOptions::unscaled()),
            Err(MetafileError::NotAMetafile)
        ));
        assert!(play(&pen_and_line(), &mut recorder, &PlayOptions::unscaled()).is_ok());
    }
}
