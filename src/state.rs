//! Replay state and GDI style translation
//!
//! [`ReplayState`] is created fresh for every playback and threaded through
//! each dispatch. The free functions translate GDI enumerations into canvas
//! attributes; each one is a closed lookup with a fixed fallback.

use log::debug;

use crate::canvas::{
    BackOpacity, Brush, Color, FillMode, Font, Hatch, IndexedImage, InteriorStyle, LineCap, LineJoin, LineStyle,
    Pen, RgbImage, TextAlignment, WriteMode,
};
use crate::mapper::Mapping;
use crate::record::{LogBrush, LogFont, LogPen, Point, XForm};

// Pen styles
pub const PS_SOLID: u32 = 0;
pub const PS_DASH: u32 = 1;
pub const PS_DOT: u32 = 2;
pub const PS_DASHDOT: u32 = 3;
pub const PS_DASHDOTDOT: u32 = 4;
pub const PS_NULL: u32 = 5;
pub const PS_USERSTYLE: u32 = 7;
pub const PS_STYLE_MASK: u32 = 0x0000_000F;
pub const PS_ENDCAP_ROUND: u32 = 0x0000_0000;
pub const PS_ENDCAP_SQUARE: u32 = 0x0000_0100;
pub const PS_ENDCAP_FLAT: u32 = 0x0000_0200;
pub const PS_ENDCAP_MASK: u32 = 0x0000_0F00;
pub const PS_JOIN_ROUND: u32 = 0x0000_0000;
pub const PS_JOIN_BEVEL: u32 = 0x0000_1000;
pub const PS_JOIN_MITER: u32 = 0x0000_2000;
pub const PS_JOIN_MASK: u32 = 0x0000_F000;

// Brush styles and hatches
pub const BS_SOLID: u32 = 0;
pub const BS_NULL: u32 = 1;
pub const BS_HATCHED: u32 = 2;
pub const HS_HORIZONTAL: u32 = 0;
pub const HS_VERTICAL: u32 = 1;
pub const HS_FDIAGONAL: u32 = 2;
pub const HS_BDIAGONAL: u32 = 3;
pub const HS_CROSS: u32 = 4;
pub const HS_DIAGCROSS: u32 = 5;

// Text alignment
pub const TA_UPDATECP: u32 = 0x0001;

// Mix modes
pub const TRANSPARENT: u32 = 1;
pub const ALTERNATE: u32 = 1;
pub const R2_XORPEN: u32 = 7;
pub const R2_NOTXORPEN: u32 = 10;
pub const SRCINVERT: u32 = 0x0066_0046;

// World transform modes
pub const MWT_IDENTITY: u32 = 1;
pub const MWT_LEFTMULTIPLY: u32 = 2;

pub const FW_BOLD: i32 = 700;

/// First stock object handle (WHITE_BRUSH)
pub const STOCK_OBJECT_BASE: u32 = 0x8000_0000;

/// Highest object handle kept in the table
const MAX_OBJECTS: u32 = 0xFFFF;

/// Translate a pen record; `None` means a null pen
pub fn pen_from_log(pen: &LogPen<'_>, mapping: &Mapping) -> Option<Pen> {
    let style = match pen.style & PS_STYLE_MASK {
        PS_SOLID => LineStyle::Continuous,
        PS_DASH => LineStyle::Dashed,
        PS_DOT => LineStyle::Dotted,
        PS_DASHDOT => LineStyle::DashDot,
        PS_DASHDOTDOT => LineStyle::DashDotDot,
        PS_NULL => return None,
        PS_USERSTYLE if pen.extended => LineStyle::Custom,
        _ => LineStyle::Continuous,
    };

    let (cap, join, dashes) = if pen.extended {
        let dashes = if style == LineStyle::Custom {
            pen.style_entries.iter().map(|d| d.min(i32::MAX as u32) as i32).collect()
        } else {
            Vec::new()
        };
        (line_cap(pen.style), line_join(pen.style), dashes)
    } else {
        (None, None, Vec::new())
    };

    Some(Pen {
        style,
        width: mapping.w(pen.width),
        color: Color::from_colorref(pen.color),
        cap,
        join,
        dashes,
    })
}

pub fn line_cap(style: u32) -> Option<LineCap> {
    match style & PS_ENDCAP_MASK {
        PS_ENDCAP_FLAT => Some(LineCap::Flat),
        PS_ENDCAP_ROUND => Some(LineCap::Round),
        PS_ENDCAP_SQUARE => Some(LineCap::Square),
        _ => None,
    }
}

pub fn line_join(style: u32) -> Option<LineJoin> {
    match style & PS_JOIN_MASK {
        PS_JOIN_MITER => Some(LineJoin::Miter),
        PS_JOIN_BEVEL => Some(LineJoin::Bevel),
        PS_JOIN_ROUND => Some(LineJoin::Round),
        _ => None,
    }
}

pub fn hatch(hatch: u32) -> Hatch {
    match hatch {
        HS_VERTICAL => Hatch::Vertical,
        HS_FDIAGONAL => Hatch::FDiagonal,
        HS_BDIAGONAL => Hatch::BDiagonal,
        HS_CROSS => Hatch::Cross,
        HS_DIAGCROSS => Hatch::DiagCross,
        _ => Hatch::Horizontal,
    }
}

/// Brush colour always applies; other styles keep the current interior
pub fn brush_from_log(brush: &LogBrush) -> Brush {
    let interior = match brush.style {
        BS_SOLID => Some(InteriorStyle::Solid),
        BS_NULL => Some(InteriorStyle::Hollow),
        BS_HATCHED => Some(InteriorStyle::Hatched(hatch(brush.hatch))),
        _ => None,
    };
    Brush {
        color: Color::from_colorref(brush.color),
        interior,
    }
}

/// Split a SETTEXTALIGN value into the anchor and the update-position flag
///
/// Combinations without a matching anchor (e.g. right-to-left reading)
/// leave the current alignment untouched.
pub fn text_alignment(mode: u32) -> (Option<TextAlignment>, bool) {
    let update_position = mode & TA_UPDATECP != 0;
    let alignment = match mode & !TA_UPDATECP {
        0 => Some(TextAlignment::NorthWest),
        2 => Some(TextAlignment::NorthEast),
        6 => Some(TextAlignment::North),
        8 => Some(TextAlignment::SouthWest),
        10 => Some(TextAlignment::SouthEast),
        14 => Some(TextAlignment::South),
        24 => Some(TextAlignment::BaseLeft),
        26 => Some(TextAlignment::BaseRight),
        30 => Some(TextAlignment::BaseCenter),
        _ => None,
    };
    (alignment, update_position)
}

pub fn rop2_write_mode(rop2: u32) -> WriteMode {
    match rop2 {
        R2_XORPEN => WriteMode::Xor,
        R2_NOTXORPEN => WriteMode::NotXor,
        _ => WriteMode::Replace,
    }
}

/// Blits only distinguish source-invert from everything else
pub fn blit_write_mode(rop: Option<u32>) -> WriteMode {
    match rop {
        Some(SRCINVERT) => WriteMode::Xor,
        _ => WriteMode::Replace,
    }
}

pub fn back_opacity(mode: u32) -> BackOpacity {
    if mode == TRANSPARENT {
        BackOpacity::Transparent
    } else {
        BackOpacity::Opaque
    }
}

pub fn fill_mode(mode: u32) -> FillMode {
    if mode == ALTERNATE {
        FillMode::EvenOdd
    } else {
        FillMode::Winding
    }
}

pub fn font_from_log(font: &LogFont, mapping: &Mapping) -> Font {
    Font {
        face_name: font.face_name.clone(),
        bold: font.weight >= FW_BOLD,
        italic: font.italic == 1,
        underline: font.underline != 0,
        strikeout: font.strikeout != 0,
        size: mapping.h(font.height.saturating_abs()),
        orientation: (font.orientation != 0).then(|| font.orientation as f64 / 10.0),
    }
}

/// Compose two affine transforms: `a` applied first, then `b`
pub fn multiply(a: &XForm, b: &XForm) -> XForm {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

/// Fill source held by a brush object
#[derive(Debug, Clone, PartialEq)]
pub enum BrushObject {
    Plain(Brush),
    Stipple(IndexedImage),
    Pattern(RgbImage),
}

/// Object created by a record and addressable by handle
#[derive(Debug, Clone, PartialEq)]
pub enum GdiObject {
    /// `None` for a null pen
    Pen(Option<Pen>),
    Brush(BrushObject),
    Font(Font),
    Palette(Vec<Color>),
}

/// Stock object for a handle with the high bit set
pub fn stock_object(handle: u32) -> Option<GdiObject> {
    let brush = |gray: u8| {
        GdiObject::Brush(BrushObject::Plain(Brush {
            color: Color::rgb(gray, gray, gray),
            interior: Some(InteriorStyle::Solid),
        }))
    };
    match handle.checked_sub(STOCK_OBJECT_BASE)? {
        0 => Some(brush(255)),
        1 => Some(brush(0xC0)),
        2 => Some(brush(0x80)),
        3 => Some(brush(0x40)),
        4 => Some(brush(0)),
        5 => Some(GdiObject::Brush(BrushObject::Plain(Brush {
            color: Color::WHITE,
            interior: Some(InteriorStyle::Hollow),
        }))),
        6 => Some(GdiObject::Pen(Some(Pen::solid(1, Color::WHITE)))),
        7 => Some(GdiObject::Pen(Some(Pen::solid(1, Color::BLACK)))),
        8 => Some(GdiObject::Pen(None)),
        _ => None,
    }
}

/// Handle-indexed objects
#[derive(Debug, Default)]
pub struct ObjectTable {
    slots: Vec<Option<GdiObject>>,
}

impl ObjectTable {
    pub fn insert(&mut self, handle: u32, object: GdiObject) {
        if handle > MAX_OBJECTS {
            debug!("Ignoring object with out-of-range handle {:#x}", handle);
            return;
        }
        let index = handle as usize;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(object);
    }

    pub fn get(&self, handle: u32) -> Option<&GdiObject> {
        self.slots.get(handle as usize).and_then(|slot| slot.as_ref())
    }

    pub fn remove(&mut self, handle: u32) {
        if let Some(slot) = self.slots.get_mut(handle as usize) {
            *slot = None;
        }
    }
}

/// Mutable state of one replay pass
#[derive(Debug)]
pub struct ReplayState {
    pub mapping: Mapping,
    /// Current position in metafile space
    pub position: Point,
    /// Text records move the current position (TA_UPDATECP)
    pub update_position: bool,
    /// The last pen created or selected was a null pen
    pub last_pen_null: bool,
    /// Accumulated world transform, `None` for identity
    pub transform: Option<XForm>,
    pub objects: ObjectTable,
}

impl ReplayState {
    pub fn new(mapping: Mapping) -> Self {
        Self {
            mapping,
            position: Point::default(),
            update_position: false,
            last_pen_null: false,
            transform: None,
            objects: ObjectTable::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Rect, U32Array};

    fn unscaled() -> Mapping {
        Mapping::unscaled(Rect::new(0, 0, 100, 100))
    }

    fn log_pen(style: u32, extended: bool) -> LogPen<'static> {
        LogPen {
            style,
            width: 3,
            color: 0x0000_00FF,
            extended,
            style_entries: U32Array::new(&[]),
        }
    }

    #[test]
    fn test_pen_styles() {
        let m = unscaled();
        let styles = [
            (PS_SOLID, LineStyle::Continuous),
            (PS_DASH, LineStyle::Dashed),
            (PS_DOT, LineStyle::Dotted),
            (PS_DASHDOT, LineStyle::DashDot),
            (PS_DASHDOTDOT, LineStyle::DashDotDot),
            (6, LineStyle::Continuous),
        ];
        for (style, expected) in styles {
            assert_eq!(pen_from_log(&log_pen(style, false), &m).unwrap().style, expected);
        }
        assert!(pen_from_log(&log_pen(PS_NULL, false), &m).is_none());
        assert!(pen_from_log(&log_pen(PS_NULL | PS_ENDCAP_FLAT, true), &m).is_none());
    }

    #[test]
    fn test_cap_and_join_only_for_extended_pens() {
        let m = unscaled();
        let style = PS_SOLID | PS_ENDCAP_FLAT | PS_JOIN_BEVEL;
        let basic = pen_from_log(&log_pen(style, false), &m).unwrap();
        assert_eq!((basic.cap, basic.join), (None, None));

        let ext = pen_from_log(&log_pen(style, true), &m).unwrap();
        assert_eq!(ext.cap, Some(LineCap::Flat));
        assert_eq!(ext.join, Some(LineJoin::Bevel));

        let defaults = pen_from_log(&log_pen(PS_SOLID, true), &m).unwrap();
        assert_eq!(defaults.cap, Some(LineCap::Round));
        assert_eq!(defaults.join, Some(LineJoin::Round));
    }

    #[test]
    fn test_user_style_dashes() {
        let entries: Vec<u8> = [6u32, 2, 1, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
        let pen = LogPen {
            style: PS_USERSTYLE,
            width: 1,
            color: 0,
            extended: true,
            style_entries: U32Array::new(&entries),
        };
        let pen = pen_from_log(&pen, &unscaled()).unwrap();
        assert_eq!(pen.style, LineStyle::Custom);
        assert_eq!(pen.dashes, vec![6, 2, 1, 2]);
        // basic pens have no user style
        assert_eq!(pen_from_log(&log_pen(PS_USERSTYLE, false), &unscaled()).unwrap().style, LineStyle::Continuous);
    }

    #[test]
    fn test_pen_width_floor() {
        let mut pen = log_pen(PS_SOLID, false);
        pen.width = 0;
        assert_eq!(pen_from_log(&pen, &unscaled()).unwrap().width, 1);
    }

    #[test]
    fn test_brushes() {
        let solid = brush_from_log(&LogBrush { style: BS_SOLID, color: 0x00FF_0000, hatch: 0 });
        assert_eq!(solid.color, Color::rgb(0, 0, 255));
        assert_eq!(solid.interior, Some(InteriorStyle::Solid));

        let hollow = brush_from_log(&LogBrush { style: BS_NULL, color: 0, hatch: 0 });
        assert_eq!(hollow.interior, Some(InteriorStyle::Hollow));

        let hatched = brush_from_log(&LogBrush { style: BS_HATCHED, color: 0, hatch: HS_DIAGCROSS });
        assert_eq!(hatched.interior, Some(InteriorStyle::Hatched(Hatch::DiagCross)));

        // BS_PATTERN and friends only change the colour
        let other = brush_from_log(&LogBrush { style: 3, color: 0x0000_FF00, hatch: 0 });
        assert_eq!(other.interior, None);
        assert_eq!(other.color, Color::rgb(0, 255, 0));
    }

    #[test]
    fn test_hatch_table() {
        assert_eq!(hatch(HS_HORIZONTAL), Hatch::Horizontal);
        assert_eq!(hatch(HS_VERTICAL), Hatch::Vertical);
        assert_eq!(hatch(HS_FDIAGONAL), Hatch::FDiagonal);
        assert_eq!(hatch(HS_BDIAGONAL), Hatch::BDiagonal);
        assert_eq!(hatch(HS_CROSS), Hatch::Cross);
        assert_eq!(hatch(42), Hatch::Horizontal);
    }

    #[test]
    fn test_text_alignment_anchors() {
        assert_eq!(text_alignment(0), (Some(TextAlignment::NorthWest), false));
        assert_eq!(text_alignment(2), (Some(TextAlignment::NorthEast), false));
        assert_eq!(text_alignment(6), (Some(TextAlignment::North), false));
        assert_eq!(text_alignment(8), (Some(TextAlignment::SouthWest), false));
        assert_eq!(text_alignment(10), (Some(TextAlignment::SouthEast), false));
        assert_eq!(text_alignment(14), (Some(TextAlignment::South), false));
        assert_eq!(text_alignment(24), (Some(TextAlignment::BaseLeft), false));
        assert_eq!(text_alignment(26), (Some(TextAlignment::BaseRight), false));
        assert_eq!(text_alignment(30), (Some(TextAlignment::BaseCenter), false));
    }

    #[test]
    fn test_update_cp_does_not_leak_into_anchor() {
        assert_eq!(text_alignment(24 | TA_UPDATECP), (Some(TextAlignment::BaseLeft), true));
        assert_eq!(text_alignment(TA_UPDATECP), (Some(TextAlignment::NorthWest), true));
        // TA_RTLREADING has no anchor
        assert_eq!(text_alignment(256), (None, false));
    }

    #[test]
    fn test_write_modes() {
        assert_eq!(rop2_write_mode(R2_XORPEN), WriteMode::Xor);
        assert_eq!(rop2_write_mode(R2_NOTXORPEN), WriteMode::NotXor);
        assert_eq!(rop2_write_mode(13), WriteMode::Replace);
        assert_eq!(blit_write_mode(Some(SRCINVERT)), WriteMode::Xor);
        assert_eq!(blit_write_mode(Some(0x00CC_0020)), WriteMode::Replace);
        assert_eq!(blit_write_mode(None), WriteMode::Replace);
    }

    #[test]
    fn test_font_translation() {
        let log = LogFont {
            height: -24,
            weight: 700,
            italic: 1,
            underline: 1,
            orientation: 900,
            face_name: "Tahoma".into(),
            ..Default::default()
        };
        let font = font_from_log(&log, &unscaled());
        assert_eq!(font.face_name, "Tahoma");
        assert!(font.bold && font.italic && font.underline && !font.strikeout);
        assert_eq!(font.size, 24);
        assert_eq!(font.orientation, Some(90.0));

        let plain = font_from_log(&LogFont { weight: 400, italic: 2, ..Default::default() }, &unscaled());
        assert!(!plain.bold && !plain.italic);
        assert_eq!(plain.orientation, None);
        assert_eq!(plain.size, 1);
    }

    #[test]
    fn test_multiply_translation_then_scale() {
        let translate = [1.0, 0.0, 0.0, 1.0, 10.0, 5.0];
        let scale = [2.0, 0.0, 0.0, 3.0, 0.0, 0.0];
        assert_eq!(multiply(&translate, &scale), [2.0, 0.0, 0.0, 3.0, 20.0, 15.0]);
    }

    #[test]
    fn test_stock_objects() {
        assert!(matches!(
            stock_object(STOCK_OBJECT_BASE),
            Some(GdiObject::Brush(BrushObject::Plain(Brush { color: Color::WHITE, .. })))
        ));
        assert!(matches!(stock_object(STOCK_OBJECT_BASE + 8), Some(GdiObject::Pen(None))));
        assert!(stock_object(STOCK_OBJECT_BASE + 13).is_none());
        assert!(stock_object(3).is_none());
    }

    #[test]
    fn test_object_table() {
        let mut table = ObjectTable::default();
        table.insert(3, GdiObject::Pen(None));
        assert!(table.get(3).is_some());
        assert!(table.get(2).is_none());
        table.remove(3);
        assert!(table.get(3).is_none());
        table.insert(STOCK_OBJECT_BASE, GdiObject::Pen(None));
        assert!(table.get(STOCK_OBJECT_BASE).is_none());
    }
}
