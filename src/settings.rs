use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::report::{FontPaths, ReportSettings};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:11223";

#[derive(Debug, Clone)]
pub struct Settings {
    pub report: ReportSettings,
    pub fonts: FontPaths,
    pub server_addr: String,
    pub oracle_model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            report: ReportSettings::default(),
            fonts: FontPaths::default(),
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            oracle_model: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    report: Option<ReportSection>,
    fonts: Option<FontsSection>,
    server: Option<ServerSection>,
    oracle: Option<OracleSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportSection {
    page_width_mm: Option<f32>,
    page_height_mm: Option<f32>,
    margin_mm: Option<f32>,
    line_height_mm: Option<f32>,
    title_size_pt: Option<f32>,
    body_size_pt: Option<f32>,
    rule_thickness_pt: Option<f32>,
    title_prefix: Option<String>,
    file_name: Option<String>,
    document_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FontsSection {
    arabic_regular: Option<String>,
    arabic_bold: Option<String>,
    latin_regular: Option<String>,
    latin_bold: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OracleSection {
    model: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    if let Some(extra) = extra_path
        && !extra.exists()
    {
        return Err(anyhow!("settings file not found: {}", extra.display()));
    }
    let mut settings = Settings::default();
    settings.merge_str(DEFAULT_SETTINGS_TOML, Path::new("<embedded>"))?;
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content, &path)?;
        }
    }
    Ok(settings)
}

impl Settings {
    fn merge_str(&mut self, content: &str, origin: &Path) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)
            .with_context(|| format!("failed to parse settings: {}", origin.display()))?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(report) = incoming.report {
            let target = &mut self.report;
            for (value, slot) in [
                (report.page_width_mm, &mut target.page_width_mm),
                (report.page_height_mm, &mut target.page_height_mm),
                (report.margin_mm, &mut target.margin_mm),
                (report.line_height_mm, &mut target.line_height_mm),
                (report.title_size_pt, &mut target.title_size_pt),
                (report.body_size_pt, &mut target.body_size_pt),
                (report.rule_thickness_pt, &mut target.rule_thickness_pt),
            ] {
                if let Some(value) = value
                    && value > 0.0
                {
                    *slot = value;
                }
            }
            if let Some(prefix) = report.title_prefix {
                target.title_prefix = prefix;
            }
            for (value, slot) in [
                (report.file_name, &mut target.file_name),
                (report.document_title, &mut target.document_title),
            ] {
                if let Some(value) = value
                    && !value.trim().is_empty()
                {
                    *slot = value;
                }
            }
        }
        if let Some(fonts) = incoming.fonts {
            for (value, slot) in [
                (fonts.arabic_regular, &mut self.fonts.arabic_regular),
                (fonts.arabic_bold, &mut self.fonts.arabic_bold),
                (fonts.latin_regular, &mut self.fonts.latin_regular),
                (fonts.latin_bold, &mut self.fonts.latin_bold),
            ] {
                if let Some(path) = value
                    && !path.trim().is_empty()
                {
                    *slot = PathBuf::from(path);
                }
            }
        }
        if let Some(server) = incoming.server
            && let Some(addr) = server.addr
            && !addr.trim().is_empty()
        {
            self.server_addr = addr;
        }
        if let Some(oracle) = incoming.oracle
            && let Some(model) = oracle.model
            && !model.trim().is_empty()
        {
            self.oracle_model = Some(model);
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".tarjama"))
        }
    })
}
