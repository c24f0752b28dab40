use anyhow::{Context, Result, anyhow};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};
use std::io::{BufWriter, Cursor};

use super::ReportSettings;
use super::font::{Face, FontSet};
use super::layout::{DrawOp, Layout, Page};

struct FontRefs {
    refs: Vec<(Face, IndirectFontRef)>,
}

impl FontRefs {
    fn get(&self, face: Face) -> Result<&IndirectFontRef> {
        self.refs
            .iter()
            .find(|(candidate, _)| *candidate == face)
            .map(|(_, font)| font)
            .ok_or_else(|| anyhow!("font not registered: {}", face.as_str()))
    }
}

/// Faces that failed to load are replaced by the base-14 Helvetica family.
fn register_fonts(doc: &PdfDocumentReference, fonts: &FontSet) -> Result<FontRefs> {
    let mut refs = Vec::with_capacity(Face::ALL.len());
    for face in Face::ALL {
        let font = match fonts.get(face) {
            Some(metrics) => doc
                .add_external_font(Cursor::new(metrics.data().to_vec()))
                .map_err(|err| anyhow!("failed to embed {} font: {:?}", face.as_str(), err))?,
            None => {
                let builtin = if face.is_bold() {
                    BuiltinFont::HelveticaBold
                } else {
                    BuiltinFont::Helvetica
                };
                doc.add_builtin_font(builtin)
                    .map_err(|err| anyhow!("failed to add builtin font: {:?}", err))?
            }
        };
        refs.push((face, font));
    }
    Ok(FontRefs { refs })
}

fn draw_page(
    layer: &PdfLayerReference,
    page: &Page,
    settings: &ReportSettings,
    fonts: &FontRefs,
) -> Result<()> {
    let flip = |y_mm: f32| Mm(settings.page_height_mm - y_mm);
    for op in &page.ops {
        match op {
            DrawOp::Text(run) => {
                let font = fonts.get(run.face)?;
                layer.use_text(run.visual.clone(), run.size_pt, Mm(run.x_mm), flip(run.y_mm), font);
            }
            DrawOp::Rule(rule) => {
                layer.set_outline_thickness(rule.thickness_pt);
                layer.add_line(Line {
                    points: vec![
                        (Point::new(Mm(rule.x1_mm), flip(rule.y_mm)), false),
                        (Point::new(Mm(rule.x2_mm), flip(rule.y_mm)), false),
                    ],
                    is_closed: false,
                });
            }
        }
    }
    Ok(())
}

pub(crate) fn render_pdf(
    layout: &Layout,
    settings: &ReportSettings,
    fonts: &FontSet,
) -> Result<Vec<u8>> {
    let width = Mm(settings.page_width_mm);
    let height = Mm(settings.page_height_mm);
    let (doc, first_page, first_layer) =
        PdfDocument::new(&settings.document_title, width, height, "Layer 1");
    let refs = register_fonts(&doc, fonts)?;

    for (idx, page) in layout.pages.iter().enumerate() {
        let layer = if idx == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) =
                doc.add_page(width, height, format!("Layer {}", idx + 1));
            doc.get_page(page_index).get_layer(layer_index)
        };
        draw_page(&layer, page, settings, &refs)?;
    }

    let mut buffer = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buffer);
        doc.save(&mut writer).with_context(|| "failed to write pdf")?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::layout::layout_results;
    use crate::types::TranslationResult;

    #[test]
    fn renders_every_page() {
        let settings = ReportSettings::default();
        let fonts = FontSet::default();
        let body = vec!["line"; 120].join("\n");
        let results = vec![TranslationResult {
            id: "1".to_string(),
            filename: Some("scan.png".to_string()),
            image_data_uri: None,
            arabic_text: "نص".to_string(),
            english_translation: body,
            is_dua: false,
        }];
        let layout = layout_results(&results, &settings, &fonts);
        assert!(layout.page_count() > 1);

        let bytes = render_pdf(&layout, &settings, &fonts).expect("pdf");
        assert!(bytes.starts_with(b"%PDF"));

        let single = layout_results(&results[..0], &settings, &fonts);
        let small = render_pdf(&single, &settings, &fonts).expect("pdf");
        assert!(bytes.len() > small.len());
    }

    #[test]
    fn empty_layout_is_still_a_document() {
        let settings = ReportSettings::default();
        let fonts = FontSet::default();
        let layout = layout_results(&[], &settings, &fonts);
        let bytes = render_pdf(&layout, &settings, &fonts).expect("pdf");
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 100);
    }
}
