use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use simplelog::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::assets::AssetLocator;
use crate::reader::FitPolicy;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
pub const APP_NAME: &str = "arsip";

const DEFAULT_CATALOG: &str = "./data/publications.json";
const DEFAULT_PDF_BASE: &str = "https://pub-c06db3ecd804497e8176675294956415.r2.dev/";
const DEFAULT_THUMBNAIL_BASE: &str =
    "https://pub-c06db3ecd804497e8176675294956415.r2.dev/thumbnails/";
const DEFAULT_ISSUU_PROFILE: &str = "https://issuu.com/lpmhimmahuii/docs/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// URL or path of `publications.json`
    #[serde(default = "default_catalog")]
    pub catalog: String,

    #[serde(default = "default_pdf_base")]
    pub pdf_base: String,

    #[serde(default = "default_thumbnail_base")]
    pub thumbnail_base: String,

    /// Directory that relative catalog and document paths resolve against
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_margin_x")]
    pub fit_margin_x: f32,

    #[serde(default = "default_margin_y")]
    pub fit_margin_y: f32,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prefix for viewer links generated by `arsip sync`
    #[serde(default = "default_issuu_profile")]
    pub issuu_profile: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_catalog() -> String {
    DEFAULT_CATALOG.to_string()
}

fn default_pdf_base() -> String {
    DEFAULT_PDF_BASE.to_string()
}

fn default_thumbnail_base() -> String {
    DEFAULT_THUMBNAIL_BASE.to_string()
}

fn default_asset_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_fetch_timeout() -> u64 {
    20
}

fn default_margin_x() -> f32 {
    FitPolicy::default().margin_x
}

fn default_margin_y() -> f32 {
    FitPolicy::default().margin_y
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_issuu_profile() -> String {
    DEFAULT_ISSUU_PROFILE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            catalog: default_catalog(),
            pdf_base: default_pdf_base(),
            thumbnail_base: default_thumbnail_base(),
            asset_root: default_asset_root(),
            fetch_timeout_secs: default_fetch_timeout(),
            fit_margin_x: default_margin_x(),
            fit_margin_y: default_margin_y(),
            log_level: default_log_level(),
            issuu_profile: default_issuu_profile(),
        }
    }
}

impl Settings {
    /// Zero would disable the timeout entirely, so it is bumped to one second
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn fit_policy(&self) -> FitPolicy {
        FitPolicy {
            margin_x: self.fit_margin_x.max(0.0),
            margin_y: self.fit_margin_y.max(0.0),
            ..FitPolicy::default()
        }
    }

    pub fn asset_locator(&self) -> AssetLocator {
        AssetLocator::new(&self.pdf_base, &self.thumbnail_base)
    }

    /// Unknown level names fall back to `Info`
    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            LevelFilter::Info
        })
    }
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from `explicit` or the default location. A missing default
/// file is created with defaults; unreadable files fall back to defaults.
pub fn load_settings(explicit: Option<&Path>) -> Settings {
    if let Some(path) = explicit {
        return load_settings_from_path(path).unwrap_or_default();
    }

    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };
    if path.exists() {
        return load_settings_from_path(&path).unwrap_or_default();
    }

    info!("Settings file not found, creating with defaults at {path:?}");
    let settings = Settings::default();
    save_settings_to_file(&settings, &path);
    settings
}

pub fn load_settings_from_path(path: &Path) -> Option<Settings> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            return None;
        }
    };

    match serde_yaml::from_str::<Settings>(&content) {
        Ok(mut settings) => {
            debug!("Loaded settings from {path:?}");
            if settings.version < CURRENT_VERSION {
                migrate_settings(&mut settings);
                save_settings_to_file(&settings, path);
            }
            Some(settings)
        }
        Err(e) => {
            error!("Failed to parse settings file {path:?}: {e}");
            None
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    match fs::write(path, generate_settings_yaml(settings)) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(HEADER_TEMPLATE);
    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str("# Catalog: an http(s) URL or a path to publications.json\n");
    content.push_str(&format!("catalog: {}\n", quoted(&settings.catalog)));
    content.push_str("# Documents are fetched from <pdf_base>/<id>.pdf unless a publication sets pdf_file\n");
    content.push_str(&format!("pdf_base: {}\n", quoted(&settings.pdf_base)));
    content.push_str(&format!(
        "thumbnail_base: {}\n",
        quoted(&settings.thumbnail_base)
    ));
    content.push_str(&format!(
        "asset_root: {}\n",
        quoted(&settings.asset_root.to_string_lossy())
    ));
    content.push_str(&format!(
        "fetch_timeout_secs: {}\n",
        settings.fetch_timeout_secs
    ));
    content.push('\n');
    content.push_str("# Space kept free around a fitted page, in half-block pixels\n");
    content.push_str(&format!("fit_margin_x: {}\n", settings.fit_margin_x));
    content.push_str(&format!("fit_margin_y: {}\n", settings.fit_margin_y));
    content.push('\n');
    content.push_str("# off, error, warn, info, debug or trace\n");
    content.push_str(&format!("log_level: {}\n", quoted(&settings.log_level)));
    content.push_str(&format!(
        "issuu_profile: {}\n",
        quoted(&settings.issuu_profile)
    ));

    content
}

/// Double-quoted YAML scalar
fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

const HEADER_TEMPLATE: &str = r#"# ============================================================================
# arsip configuration
# ============================================================================
# Command line flags override the values below.

"#;
