use serde::Serialize;

use super::ReportSettings;
use super::bidi;
use super::font::{Face, FontSet};
use crate::types::TranslationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Right,
}

/// One line of text. `y_mm` is the baseline measured from the top edge and
/// `x_mm` is always the left edge, also for right-aligned lines.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub face: Face,
    pub size_pt: f32,
    pub x_mm: f32,
    pub y_mm: f32,
    pub align: Align,
    pub text: String,
    /// Shaped, visually ordered form of `text`.
    pub visual: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub x1_mm: f32,
    pub x2_mm: f32,
    pub y_mm: f32,
    pub thickness_pt: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text(TextRun),
    Rule(Rule),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &TextRun> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text(run) => Some(run),
            DrawOp::Rule(_) => None,
        })
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Rule(rule) => Some(rule),
            DrawOp::Text(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub pages: Vec<Page>,
}

impl Layout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Logical text of every line, grouped by page.
    pub fn page_lines(&self) -> Vec<Vec<&str>> {
        self.pages
            .iter()
            .map(|page| page.texts().map(|run| run.text.as_str()).collect())
            .collect()
    }
}

/// Lays results out top to bottom, starting a new page whenever the next
/// block or line would cross the bottom margin.
pub fn layout_results(
    results: &[TranslationResult],
    settings: &ReportSettings,
    fonts: &FontSet,
) -> Layout {
    let mut writer = Writer::new(settings, fonts);
    for (index, result) in results.iter().enumerate() {
        writer.write_result(index, result);
    }
    writer.finish()
}

struct Writer<'a> {
    settings: &'a ReportSettings,
    fonts: &'a FontSet,
    done: Vec<Page>,
    current: Page,
    y: f32,
}

impl<'a> Writer<'a> {
    fn new(settings: &'a ReportSettings, fonts: &'a FontSet) -> Self {
        Self {
            settings,
            fonts,
            done: Vec::new(),
            current: Page::default(),
            y: settings.margin_mm,
        }
    }

    fn finish(mut self) -> Layout {
        self.done.push(self.current);
        Layout { pages: self.done }
    }

    fn bottom(&self) -> f32 {
        self.settings.page_height_mm - self.settings.margin_mm
    }

    fn line_height(&self) -> f32 {
        self.settings.line_height_mm
    }

    fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.done.push(page);
        self.y = self.settings.margin_mm;
    }

    fn wrap(&self, face: Face, size_pt: f32, text: &str) -> Vec<String> {
        wrap_text(text, self.settings.text_width_mm(), |line| {
            self.fonts.measure_mm(face, &bidi::to_visual(line), size_pt)
        })
    }

    fn push_text(&mut self, face: Face, size_pt: f32, align: Align, y_mm: f32, text: String) {
        let visual = bidi::to_visual(&text);
        let x_mm = match align {
            Align::Left => self.settings.margin_mm,
            Align::Right => {
                let width = self.fonts.measure_mm(face, &visual, size_pt);
                self.settings.page_width_mm - self.settings.margin_mm - width
            }
        };
        self.current.ops.push(DrawOp::Text(TextRun {
            face,
            size_pt,
            x_mm,
            y_mm,
            align,
            text,
            visual,
        }));
    }

    fn write_result(&mut self, index: usize, result: &TranslationResult) {
        if index > 0 {
            self.y += self.line_height() * 2.0;
            if self.y > self.bottom() {
                self.new_page();
            }
        }
        if let Some(filename) = result.filename.as_deref() {
            self.write_title(filename);
        }
        self.write_rule();

        let body = self.settings.body_size_pt;
        match result.dua_segments() {
            Some(segments) => {
                self.write_lines(Face::ArabicRegular, body, Align::Right, segments.arabic);
                self.y += self.line_height() / 2.0;
                self.write_lines(Face::LatinRegular, body, Align::Left, segments.english);
            }
            None => {
                self.write_lines(
                    Face::LatinRegular,
                    body,
                    Align::Left,
                    &result.english_translation,
                );
            }
        }
    }

    fn write_title(&mut self, filename: &str) {
        let face = if bidi::contains_rtl(filename) {
            Face::ArabicBold
        } else {
            Face::LatinBold
        };
        let size = self.settings.title_size_pt;
        let lines = self.wrap(face, size, &format!("{}{}", self.settings.title_prefix, filename));
        let height = lines.len() as f32 * self.line_height();
        if self.y + height > self.bottom() {
            self.new_page();
        }
        let top = self.y;
        for (offset, line) in lines.into_iter().enumerate() {
            let y = top + offset as f32 * self.line_height();
            self.push_text(face, size, Align::Left, y, line);
        }
        self.y += height + self.line_height() / 2.0;
    }

    fn write_rule(&mut self) {
        if self.y + 2.0 > self.bottom() {
            self.new_page();
        }
        self.current.ops.push(DrawOp::Rule(Rule {
            x1_mm: self.settings.margin_mm,
            x2_mm: self.settings.page_width_mm - self.settings.margin_mm,
            y_mm: self.y,
            thickness_pt: self.settings.rule_thickness_pt,
        }));
        self.y += self.line_height();
    }

    fn write_lines(&mut self, face: Face, size_pt: f32, align: Align, text: &str) {
        for line in self.wrap(face, size_pt, text) {
            if self.y > self.bottom() - self.line_height() {
                self.new_page();
            }
            if !line.is_empty() {
                self.push_text(face, size_pt, align, self.y, line);
            }
            self.y += self.line_height();
        }
    }
}

/// Marks and joiners that belong to the preceding grapheme cluster.
pub(crate) fn is_extending(ch: char) -> bool {
    matches!(
        ch as u32,
        0x0300..=0x036F
            | 0x0483..=0x0489
            | 0x0591..=0x05BD
            | 0x05BF
            | 0x05C1..=0x05C2
            | 0x05C4..=0x05C5
            | 0x05C7
            | 0x0610..=0x061A
            | 0x064B..=0x065F
            | 0x0670
            | 0x06D6..=0x06DC
            | 0x06DF..=0x06E4
            | 0x06E7..=0x06E8
            | 0x06EA..=0x06ED
            | 0x200C..=0x200D
            | 0xFE00..=0xFE0F
            | 0xFE20..=0xFE2F
            | 0x1F3FB..=0x1F3FF
            | 0xE0100..=0xE01EF
    )
}

/// Splits text into grapheme clusters: a base character plus any combining
/// marks, variation selectors and zero-width-joined followers.
pub(crate) fn graphemes(text: &str) -> Vec<&str> {
    let mut clusters = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    for (offset, ch) in text.char_indices() {
        let joins = match prev {
            None => true,
            Some('\u{200D}') => true,
            Some('\r') => ch == '\n',
            Some(_) => is_extending(ch),
        };
        if !joins {
            clusters.push(&text[start..offset]);
            start = offset;
        }
        prev = Some(ch);
    }
    if start < text.len() {
        clusters.push(&text[start..]);
    }
    clusters
}

/// Wraps `text` to `max_width` as measured by `measure`. Hard newlines start
/// new lines and blank lines survive as empty strings; runs of spaces collapse.
/// A word wider than the line is broken between grapheme clusters.
pub(crate) fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut result = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);
        wrap_paragraph(paragraph, max_width, &measure, &mut result);
    }
    result
}

fn wrap_paragraph(
    paragraph: &str,
    max_width: f32,
    measure: &impl Fn(&str) -> f32,
    result: &mut Vec<String>,
) {
    let mut current = String::new();
    let mut produced = false;

    for word in paragraph.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if measure(&candidate) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            result.push(std::mem::take(&mut current));
            produced = true;
        }
        if measure(word) <= max_width {
            current = word.to_string();
            continue;
        }
        for cluster in graphemes(word) {
            let candidate = format!("{}{}", current, cluster);
            if !current.is_empty() && measure(&candidate) > max_width {
                result.push(std::mem::replace(&mut current, cluster.to_string()));
                produced = true;
            } else {
                current = candidate;
            }
        }
    }

    if !current.is_empty() || !produced {
        result.push(current);
    }
}
