use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ttf_parser::Face as TtfFace;
use ttf_parser::name_id;

const PT_TO_MM: f32 = 25.4 / 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    ArabicRegular,
    ArabicBold,
    LatinRegular,
    LatinBold,
}

impl Face {
    pub const ALL: [Face; 4] = [
        Face::ArabicRegular,
        Face::ArabicBold,
        Face::LatinRegular,
        Face::LatinBold,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Face::ArabicRegular => "arabic-regular",
            Face::ArabicBold => "arabic-bold",
            Face::LatinRegular => "latin-regular",
            Face::LatinBold => "latin-bold",
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, Face::ArabicBold | Face::LatinBold)
    }

    fn slot(self) -> usize {
        match self {
            Face::ArabicRegular => 0,
            Face::ArabicBold => 1,
            Face::LatinRegular => 2,
            Face::LatinBold => 3,
        }
    }
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    /// Horizontal advance of every mapped code point, read once at load.
    advances: Arc<HashMap<char, u16>>,
    family: Option<String>,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .field("glyphs", &self.advances.len())
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn advance(&self, ch: char) -> u16 {
        if ch == ' ' {
            return self.space_advance;
        }
        self.advances
            .get(&ch)
            .copied()
            .unwrap_or(self.space_advance)
    }
}

pub async fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(data)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

pub fn load_font_metrics_from_data(data: Vec<u8>) -> Result<FontMetrics> {
    let face = TtfFace::parse(&data, 0).map_err(|err| anyhow!("{}", err))?;
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    let family = extract_family_name(&face);
    let advances = collect_advances(&face, space_advance);
    Ok(FontMetrics {
        data: Arc::new(data),
        units_per_em,
        space_advance,
        advances: Arc::new(advances),
        family,
    })
}

fn collect_advances(face: &TtfFace<'_>, fallback: u16) -> HashMap<char, u16> {
    let mut advances = HashMap::new();
    let Some(cmap) = face.tables().cmap else {
        return advances;
    };
    for subtable in cmap.subtables {
        if !subtable.is_unicode() {
            continue;
        }
        subtable.codepoints(|code| {
            if let Some(ch) = char::from_u32(code)
                && let Some(glyph) = subtable.glyph_index(code)
            {
                let advance = face.glyph_hor_advance(glyph).unwrap_or(fallback);
                advances.entry(ch).or_insert(advance);
            }
        });
    }
    advances
}

/// Where each face is read from.
#[derive(Debug, Clone)]
pub struct FontPaths {
    pub arabic_regular: PathBuf,
    pub arabic_bold: PathBuf,
    pub latin_regular: PathBuf,
    pub latin_bold: PathBuf,
}

impl Default for FontPaths {
    fn default() -> Self {
        Self {
            arabic_regular: PathBuf::from("fonts/Tajawal-Regular.ttf"),
            arabic_bold: PathBuf::from("fonts/Tajawal-Bold.ttf"),
            latin_regular: PathBuf::from("fonts/Inter-Regular.ttf"),
            latin_bold: PathBuf::from("fonts/Inter-Bold.ttf"),
        }
    }
}

impl FontPaths {
    pub fn path(&self, face: Face) -> &Path {
        match face {
            Face::ArabicRegular => &self.arabic_regular,
            Face::ArabicBold => &self.arabic_bold,
            Face::LatinRegular => &self.latin_regular,
            Face::LatinBold => &self.latin_bold,
        }
    }
}

/// Loaded faces; a missing slot means the face is measured by estimate and
/// drawn with a base-14 font.
#[derive(Debug, Clone, Default)]
pub struct FontSet {
    faces: [Option<FontMetrics>; 4],
}

impl FontSet {
    pub fn get(&self, face: Face) -> Option<&FontMetrics> {
        self.faces[face.slot()].as_ref()
    }

    pub fn insert(&mut self, face: Face, metrics: FontMetrics) {
        self.faces[face.slot()] = Some(metrics);
    }

    pub fn measure_mm(&self, face: Face, text: &str, font_size_pt: f32) -> f32 {
        measure_text_width_mm(text, font_size_pt, self.get(face))
    }
}

pub(crate) fn measure_text_width_mm(
    text: &str,
    font_size_pt: f32,
    font: Option<&FontMetrics>,
) -> f32 {
    if let Some(font) = font {
        let advance = text
            .chars()
            .filter(|ch| *ch != '\n')
            .fold(0u32, |sum, ch| sum.saturating_add(font.advance(ch) as u32));
        let units = font.units_per_em.max(1) as f32;
        return advance as f32 * (font_size_pt / units) * PT_TO_MM;
    }
    estimate_text_width_units(text) * font_size_pt * PT_TO_MM
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if super::layout::is_extending(ch) {
        0.0
    } else if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else {
        0.6
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units_for_width).sum()
}

fn extract_family_name(face: &TtfFace<'_>) -> Option<String> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scales_with_size() {
        let small = measure_text_width_mm("Hello", 12.0, None);
        let large = measure_text_width_mm("Hello", 24.0, None);
        assert!(small > 0.0);
        assert!((large - small * 2.0).abs() < 1e-4);
    }

    #[test]
    fn combining_marks_have_no_estimated_width() {
        let bare = measure_text_width_mm("بسم", 12.0, None);
        let marked = measure_text_width_mm("بِسْمِ", 12.0, None);
        assert!((bare - marked).abs() < 1e-4);
    }

    #[test]
    fn garbage_is_not_a_font() {
        assert!(load_font_metrics_from_data(b"not a font".to_vec()).is_err());
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = load_font_metrics(Path::new("/nonexistent/Tajawal-Regular.ttf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Tajawal-Regular.ttf"));
    }

    #[tokio::test]
    async fn loaded_font_measures_with_its_advances() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("DejaVuSans.ttf");
        let metrics = load_font_metrics(&path).await.expect("font");
        assert_eq!(metrics.family(), Some("DejaVu Sans"));

        let narrow = measure_text_width_mm("iiii", 12.0, Some(&metrics));
        let wide = measure_text_width_mm("WWWW", 12.0, Some(&metrics));
        assert!(wide > narrow * 2.0, "{} vs {}", wide, narrow);
        let doubled = measure_text_width_mm("WWWW", 24.0, Some(&metrics));
        assert!((doubled - wide * 2.0).abs() < 1e-4);
        // newlines are skipped, spaces use the space advance
        assert_eq!(
            measure_text_width_mm("W\nW", 12.0, Some(&metrics)),
            measure_text_width_mm("WW", 12.0, Some(&metrics))
        );
        assert!(measure_text_width_mm("\u{FE91}", 12.0, Some(&metrics)) > 0.0);
    }

    #[test]
    fn empty_set_measures_by_estimate() {
        let fonts = FontSet::default();
        assert!(fonts.get(Face::LatinRegular).is_none());
        assert_eq!(
            fonts.measure_mm(Face::LatinRegular, "abc", 12.0),
            measure_text_width_mm("abc", 12.0, None)
        );
    }
}
