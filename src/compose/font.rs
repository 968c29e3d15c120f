use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::{Face, name_id};
use usvg::fontdb;

use super::layout::TextMeasurer;
use super::{ComposeError, ComposeResult, Typeface};

/// A parsed TrueType/OpenType face at a fixed pixel size.
#[derive(Clone)]
pub struct TtfFont {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    space_advance: u16,
    family: Option<String>,
    size: f32,
}

impl TtfFont {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn typeface(&self) -> Typeface {
        Typeface {
            family: self.family.clone(),
            size: self.size,
            data: Some(self.data.clone()),
        }
    }

    fn scale(&self) -> f32 {
        self.size / f32::from(self.units_per_em.max(1))
    }

    fn to_px(&self, units: i32) -> u32 {
        (units.max(0) as f32 * self.scale()).ceil() as u32
    }
}

impl TextMeasurer for TtfFont {
    fn measure(&self, line: &str) -> ComposeResult<(u32, u32)> {
        if line.is_empty() {
            return Ok((0, 0));
        }
        let face = Face::parse(&self.data, self.face_index).map_err(|err| {
            ComposeError::MeasurementFailure {
                text: line.to_string(),
                reason: err.to_string(),
            }
        })?;

        let mut advance = 0i32;
        let mut ink_bottom: Option<i16> = None;
        for ch in line.chars() {
            let Some(glyph) = face.glyph_index(ch) else {
                if ch.is_whitespace() {
                    advance = advance.saturating_add(i32::from(self.space_advance));
                    continue;
                }
                return Err(ComposeError::MeasurementFailure {
                    text: line.to_string(),
                    reason: format!("font has no glyph for {:?}", ch),
                });
            };
            let glyph_advance = face.glyph_hor_advance(glyph).unwrap_or(self.space_advance);
            advance = advance.saturating_add(i32::from(glyph_advance));
            if let Some(bbox) = face.glyph_bounding_box(glyph) {
                ink_bottom = Some(ink_bottom.map_or(bbox.y_min, |low| low.min(bbox.y_min)));
            }
        }

        // measured from the ascender line, where each line's top is drawn
        let height = ink_bottom
            .map(|low| self.to_px(i32::from(self.ascender) - i32::from(low)))
            .unwrap_or(0);
        Ok((self.to_px(advance), height))
    }

    fn ascent(&self) -> u32 {
        self.to_px(i32::from(self.ascender))
    }

    fn descent(&self) -> u32 {
        self.to_px(-i32::from(self.descender))
    }
}

pub fn load_font(path: &Path, size: f32) -> Result<TtfFont> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_from_data(data, size)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

pub struct ResolvedOverlayFont {
    pub font: TtfFont,
    pub family: String,
}

pub fn resolve_overlay_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
    size: f32,
) -> Result<ResolvedOverlayFont> {
    if let Some(path) = font_path {
        let font = load_font(path, size)?;
        let family = font
            .family()
            .map(|name| name.to_string())
            .or_else(|| font_family.map(|name| name.to_string()))
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(ResolvedOverlayFont { font, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        return load_font_from_family(&db, family, size);
    }

    for candidate in fallback {
        if let Ok(resolved) = load_font_from_family(&db, candidate, size) {
            return Ok(resolved);
        }
    }

    Err(anyhow!("no fallback fonts found"))
}

/// First parsable face of a font file or collection.
pub fn load_font_from_data(data: Vec<u8>, size: f32) -> Result<TtfFont> {
    let data = Arc::new(data);
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    (0..count)
        .find_map(|index| parse_face(&data, index, size))
        .ok_or_else(|| anyhow!("failed to parse font data"))
}

fn parse_face(data: &Arc<Vec<u8>>, index: u32, size: f32) -> Option<TtfFont> {
    let face = Face::parse(data, index).ok()?;
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    Some(TtfFont {
        data: data.clone(),
        face_index: index,
        units_per_em,
        ascender: face.ascender(),
        descender: face.descender(),
        space_advance,
        family: extract_family_name(&face),
        size,
    })
}

fn load_font_from_family(
    db: &fontdb::Database,
    family: &str,
    size: f32,
) -> Result<ResolvedOverlayFont> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else if family.eq_ignore_ascii_case("monospace") {
        vec![fontdb::Family::Monospace]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let font = parse_face(&Arc::new(data), face_index, size)
        .ok_or_else(|| anyhow!("failed to parse font: {}", family))?;
    let resolved_family = font
        .family()
        .map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());
    Ok(ResolvedOverlayFont {
        font,
        family: resolved_family,
    })
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
