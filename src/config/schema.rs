//! Configuration schema types for `sitepipe.toml`
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) reproduces the conventional `app/` → `dist/` layout.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Logical source and output roots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Source root, relative to the project root
    #[serde(default = "default_app")]
    pub app: PathBuf,
    /// Output root, relative to the project root
    #[serde(default = "default_dist")]
    pub dist: PathBuf,
}

fn default_app() -> PathBuf {
    PathBuf::from("app")
}

fn default_dist() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { app: default_app(), dist: default_dist() }
    }
}

/// Page templates section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Glob patterns relative to the source root
    #[serde(default = "default_template_sources")]
    pub sources: Vec<String>,
    /// Destination relative to the output root (pages live at the top level)
    #[serde(default)]
    pub dest: PathBuf,
    /// Extension given to rendered pages
    #[serde(default = "default_html_extension")]
    pub extension: String,
    /// Template compiler, fed the template on stdin. `{file}` in an argument
    /// is replaced by the template path. Empty means pages are copied as-is.
    #[serde(default = "default_template_command")]
    pub command: Vec<String>,
}

fn default_template_sources() -> Vec<String> {
    vec!["pages/**/*.pug".to_string()]
}

fn default_html_extension() -> String {
    "html".to_string()
}

fn default_template_command() -> Vec<String> {
    ["pug", "--pretty", "--path", "{file}"].iter().map(|s| s.to_string()).collect()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            sources: default_template_sources(),
            dest: PathBuf::new(),
            extension: default_html_extension(),
            command: default_template_command(),
        }
    }
}

/// Minimum browser versions used for vendor prefixing and syntax lowering.
///
/// Versions are written as `"major"` or `"major.minor"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserTargets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firefox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safari: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios_saf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samsung: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<String>,
}

impl BrowserTargets {
    /// Iterate over the configured `(browser, version)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("chrome", &self.chrome),
            ("edge", &self.edge),
            ("firefox", &self.firefox),
            ("safari", &self.safari),
            ("ios_saf", &self.ios_saf),
            ("opera", &self.opera),
            ("samsung", &self.samsung),
            ("android", &self.android),
        ]
        .into_iter()
        .filter_map(|(name, version)| version.as_deref().map(|v| (name, v)))
    }
}

fn default_browsers() -> BrowserTargets {
    BrowserTargets {
        chrome: Some("90".to_string()),
        edge: Some("90".to_string()),
        firefox: Some("88".to_string()),
        safari: Some("14".to_string()),
        ios_saf: Some("14".to_string()),
        ..BrowserTargets::default()
    }
}

/// Stylesheet section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Entry stylesheets relative to the source root
    #[serde(default = "default_style_sources")]
    pub sources: Vec<String>,
    /// Destination relative to the output root
    #[serde(default = "default_style_dest")]
    pub dest: PathBuf,
    /// Optional preprocessor fed the stylesheet on stdin (e.g. `sass --stdin`).
    /// When empty, `@import` rules are inlined by sitepipe itself.
    #[serde(default)]
    pub command: Vec<String>,
    /// Browser targets for prefixing
    #[serde(default = "default_browsers")]
    pub browsers: BrowserTargets,
}

fn default_style_sources() -> Vec<String> {
    vec!["common/styles/app.css".to_string()]
}

fn default_style_dest() -> PathBuf {
    PathBuf::from("assets/styles")
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            sources: default_style_sources(),
            dest: default_style_dest(),
            command: Vec::new(),
            browsers: default_browsers(),
        }
    }
}

/// Script section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Entry scripts relative to the source root
    #[serde(default = "default_script_sources")]
    pub sources: Vec<String>,
    /// Destination relative to the output root
    #[serde(default = "default_script_dest")]
    pub dest: PathBuf,
    /// Bundler fed each entry on stdin. Empty means entries are copied as-is.
    #[serde(default)]
    pub command: Vec<String>,
    /// Only reprocess entries modified since the previous successful run
    #[serde(default = "default_true")]
    pub incremental: bool,
}

fn default_script_sources() -> Vec<String> {
    vec!["common/scripts/*.js".to_string()]
}

fn default_script_dest() -> PathBuf {
    PathBuf::from("assets/scripts")
}

fn default_true() -> bool {
    true
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            sources: default_script_sources(),
            dest: default_script_dest(),
            command: Vec::new(),
            incremental: true,
        }
    }
}

/// Image section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Glob patterns relative to the source root
    #[serde(default = "default_image_sources")]
    pub sources: Vec<String>,
    /// Destination relative to the output root
    #[serde(default = "default_image_dest")]
    pub dest: PathBuf,
    /// JPEG quality used when optimizing (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_image_sources() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "svg", "ico"]
        .iter()
        .map(|ext| format!("common/images/**/*.{}", ext))
        .collect()
}

fn default_image_dest() -> PathBuf {
    PathBuf::from("assets/images")
}

fn default_jpeg_quality() -> u8 {
    85
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            sources: default_image_sources(),
            dest: default_image_dest(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Font section (copied verbatim)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsConfig {
    #[serde(default = "default_font_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_font_dest")]
    pub dest: PathBuf,
}

fn default_font_sources() -> Vec<String> {
    vec!["common/fonts/**/*".to_string()]
}

fn default_font_dest() -> PathBuf {
    PathBuf::from("assets/fonts")
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self { sources: default_font_sources(), dest: default_font_dest() }
    }
}

/// Icon sprite section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconsConfig {
    /// Glob patterns for SVG icons, relative to the source root
    #[serde(default = "default_icon_sources")]
    pub sources: Vec<String>,
    /// Sprite sheet path, relative to the output root
    #[serde(default = "default_sprite")]
    pub sprite: PathBuf,
    /// Generated stylesheet fragment, relative to the source root
    #[serde(default = "default_fragment")]
    pub fragment: PathBuf,
    /// Template for the fragment, relative to the source root. A built-in
    /// template is used when the file does not exist.
    #[serde(default = "default_fragment_template")]
    pub template: PathBuf,
}

fn default_icon_sources() -> Vec<String> {
    vec!["common/icons/**/*.svg".to_string()]
}

fn default_sprite() -> PathBuf {
    PathBuf::from("assets/images/icons/sprite.svg")
}

fn default_fragment() -> PathBuf {
    PathBuf::from("common/styles/helpers/sprites.css")
}

fn default_fragment_template() -> PathBuf {
    PathBuf::from("common/styles/helpers/sprite-template.css")
}

impl Default for IconsConfig {
    fn default() -> Self {
        Self {
            sources: default_icon_sources(),
            sprite: default_sprite(),
            fragment: default_fragment(),
            template: default_fragment_template(),
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Development server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

/// Complete sitepipe.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub fonts: FontsConfig,
    #[serde(default)]
    pub icons: IconsConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "styles.browsers.chrome")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sitepipe.toml: '{}' {}", self.field, self.message)
    }
}

/// Parse a `"major[.minor[.patch]]"` browser version into lightningcss's
/// packed `major << 16 | minor << 8 | patch` form.
pub fn parse_browser_version(version: &str) -> Option<u32> {
    let mut parts = version.trim().split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);
    let patch: u32 = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);
    if parts.next().is_some() || minor > 255 || patch > 255 {
        return None;
    }
    Some((major << 16) | (minor << 8) | patch)
}

/// A destination must stay inside the root it is resolved against.
fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl SiteConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: message.to_string(),
            })
        };

        if self.paths.app.as_os_str().is_empty() {
            push("paths.app", "must be a non-empty path");
        }
        if self.paths.dist.as_os_str().is_empty() {
            push("paths.dist", "must be a non-empty path");
        }
        if self.paths.app == self.paths.dist {
            push("paths.dist", "must differ from paths.app");
        }

        let globs = [
            ("templates.sources", &self.templates.sources),
            ("styles.sources", &self.styles.sources),
            ("scripts.sources", &self.scripts.sources),
            ("images.sources", &self.images.sources),
            ("fonts.sources", &self.fonts.sources),
            ("icons.sources", &self.icons.sources),
        ];
        for (field, patterns) in globs {
            if patterns.is_empty() {
                push(field, "must contain at least one glob pattern");
            }
            for pattern in patterns.iter() {
                if let Err(e) = glob::Pattern::new(pattern) {
                    push(field, &format!("invalid glob '{}': {}", pattern, e));
                }
            }
        }

        let contained = [
            ("templates.dest", &self.templates.dest),
            ("styles.dest", &self.styles.dest),
            ("scripts.dest", &self.scripts.dest),
            ("images.dest", &self.images.dest),
            ("fonts.dest", &self.fonts.dest),
            ("icons.sprite", &self.icons.sprite),
            ("icons.fragment", &self.icons.fragment),
            ("icons.template", &self.icons.template),
        ];
        for (field, path) in contained {
            if !is_contained(path) {
                push(field, "must be a relative path without '..'");
            }
        }
        if self.icons.sprite.as_os_str().is_empty() {
            push("icons.sprite", "must be a non-empty path");
        }
        if self.icons.fragment.as_os_str().is_empty() {
            push("icons.fragment", "must be a non-empty path");
        }

        if self.templates.extension.is_empty() || self.templates.extension.contains('.') {
            push("templates.extension", "must be an extension without a leading dot");
        }

        for (name, version) in self.styles.browsers.entries() {
            if parse_browser_version(version).is_none() {
                push(
                    &format!("styles.browsers.{}", name),
                    &format!("invalid version '{}', expected \"major[.minor]\"", version),
                );
            }
        }

        if !(1..=100).contains(&self.images.jpeg_quality) {
            push("images.jpeg_quality", "must be between 1 and 100");
        }

        if self.watch.debounce_ms == 0 {
            push("watch.debounce_ms", "must be a positive integer");
        }

        if self.server.host.is_empty() {
            push("server.host", "must be a non-empty host");
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
