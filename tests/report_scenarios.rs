use tarjama::report::{Align, DrawOp, Face, FontPaths, FontSet, ReportComposer, ReportSettings};
use tarjama::types::{TranslationResult, split_dua};

fn result(filename: Option<&str>, english: &str, is_dua: bool) -> TranslationResult {
    TranslationResult {
        id: format!("{}-1", filename.unwrap_or("anon")),
        filename: filename.map(str::to_string),
        image_data_uri: None,
        arabic_text: "نص عربي".to_string(),
        english_translation: english.to_string(),
        is_dua,
    }
}

fn composer() -> ReportComposer {
    ReportComposer::new(ReportSettings::default(), FontPaths::default())
}

#[test]
fn dua_split_round_trips() {
    for text in [
        "دعاء\n\nO Allah, guide me.",
        "سطر\nسطر\n\nFirst.\n\nSecond.",
        "\n\nonly english",
    ] {
        let segments = split_dua(text).expect("separator present");
        assert_eq!(segments.join(), text);
    }
    assert!(split_dua("no separator\nhere").is_none());
}

#[test]
fn note_scenario_has_title_rule_and_left_text() {
    let composer = composer();
    let layout = composer.layout(
        &[result(Some("note.png"), "Seek knowledge from the cradle to the grave.", false)],
        &FontSet::default(),
    );
    assert_eq!(layout.page_count(), 1);

    let ops = &layout.pages[0].ops;
    assert_eq!(ops.len(), 3);
    match (&ops[0], &ops[1], &ops[2]) {
        (DrawOp::Text(title), DrawOp::Rule(_), DrawOp::Text(body)) => {
            assert_eq!(title.face, Face::LatinBold);
            assert_eq!(title.text, "Translation for: note.png");
            assert_eq!(body.align, Align::Left);
            assert_eq!(body.x_mm, composer.settings().margin_mm);
            assert_eq!(body.text, "Seek knowledge from the cradle to the grave.");
        }
        other => panic!("unexpected ops: {:?}", other),
    }
}

#[test]
fn dua_scenario_places_each_segment_on_its_side() {
    let composer = composer();
    let layout = composer.layout(
        &[result(None, "دعاء\n\nO Allah, guide me.", true)],
        &FontSet::default(),
    );
    let runs = layout.pages[0].texts().collect::<Vec<_>>();
    let right = runs
        .iter()
        .filter(|run| run.align == Align::Right)
        .map(|run| run.text.as_str())
        .collect::<Vec<_>>();
    let left = runs
        .iter()
        .filter(|run| run.align == Align::Left)
        .map(|run| run.text.as_str())
        .collect::<Vec<_>>();
    assert_eq!(right, vec!["دعاء"]);
    assert_eq!(left, vec!["O Allah, guide me."]);
}

#[test]
fn composing_twice_gives_the_same_pages() {
    let composer = composer();
    let results = (0..12)
        .map(|n| {
            result(
                Some(&format!("page-{}.png", n)),
                &"A line of translated prose that wraps. ".repeat(n + 1),
                n % 3 == 0,
            )
        })
        .collect::<Vec<_>>();
    let fonts = FontSet::default();
    let first = composer.layout(&results, &fonts);
    let second = composer.layout(&results, &fonts);
    assert!(first.page_count() > 1);
    assert_eq!(first.page_count(), second.page_count());
    assert_eq!(first.page_lines(), second.page_lines());
}

#[test]
fn many_results_break_pages_between_lines() {
    let composer = composer();
    let settings = composer.settings().clone();
    let results = (0..30)
        .map(|n| result(Some(&format!("scan-{}.jpg", n)), "One.\nTwo.\nThree.", false))
        .collect::<Vec<_>>();
    let layout = composer.layout(&results, &FontSet::default());
    assert!(layout.page_count() >= 3);

    let bottom = settings.page_height_mm - settings.margin_mm;
    for page in &layout.pages {
        for op in &page.ops {
            let y = match op {
                DrawOp::Text(run) => run.y_mm,
                DrawOp::Rule(rule) => rule.y_mm,
            };
            assert!(y >= settings.margin_mm && y <= bottom, "y = {}", y);
        }
    }
    let total = layout.page_lines().concat().len();
    assert_eq!(total, 30 * 4);
}

#[tokio::test]
async fn zero_results_still_produce_a_pdf() {
    let report = composer().compose(&[]).await.expect("compose");
    assert_eq!(report.page_count, 1);
    assert!(report.bytes.starts_with(b"%PDF"));
}

fn fixture_fonts() -> FontPaths {
    let font = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("DejaVuSans.ttf");
    FontPaths {
        arabic_regular: font.clone(),
        arabic_bold: font.clone(),
        latin_regular: font.clone(),
        latin_bold: font,
    }
}

#[tokio::test]
async fn loaded_fonts_measure_embed_and_align() {
    let settings = ReportSettings::default();
    let composer = ReportComposer::new(settings.clone(), fixture_fonts());
    let prose = "Seek knowledge from the cradle to the grave. ".repeat(6);
    let ayah = format!(
        "{}\n\nIn the name of Allah, the Most Gracious.",
        "بسم الله الرحمن الرحيم ١٢ ".repeat(5)
    );
    let results = vec![
        result(Some("note.png"), &prose, false),
        result(Some("سورة.png"), &ayah, true),
    ];

    let (fonts, warnings) = composer.load_fonts().await;
    assert!(warnings.is_empty(), "{:?}", warnings);
    assert!(fonts.get(Face::ArabicRegular).is_some());
    let estimate = FontSet::default().measure_mm(Face::LatinRegular, "Wide WWW", 12.0);
    assert_ne!(fonts.measure_mm(Face::LatinRegular, "Wide WWW", 12.0), estimate);

    let layout = composer.layout(&results, &fonts);
    let right_edge = settings.page_width_mm - settings.margin_mm;
    let mut right_runs = 0;
    for run in layout.pages.iter().flat_map(|page| page.texts()) {
        let width = fonts.measure_mm(run.face, &run.visual, run.size_pt);
        assert!(
            width <= settings.text_width_mm() + 1e-3,
            "{:?} is {} mm",
            run.text,
            width
        );
        match run.align {
            Align::Left => assert_eq!(run.x_mm, settings.margin_mm),
            Align::Right => {
                right_runs += 1;
                assert!((run.x_mm + width - right_edge).abs() < 1e-3, "{:?}", run.text);
            }
        }
    }
    assert!(right_runs > 1);

    let report = composer.compose(&results).await.expect("compose");
    assert!(report.warnings.is_empty());
    assert!(report.bytes.starts_with(b"%PDF"));
    let missing = FontPaths {
        arabic_regular: "/nonexistent/a.ttf".into(),
        arabic_bold: "/nonexistent/b.ttf".into(),
        latin_regular: "/nonexistent/c.ttf".into(),
        latin_bold: "/nonexistent/d.ttf".into(),
    };
    let builtin = ReportComposer::new(settings, missing)
        .compose(&results)
        .await
        .expect("compose");
    assert_eq!(builtin.warnings.len(), 4);
    assert!(report.bytes.len() > builtin.bytes.len());
}
