//! Icon sprite generation.
//!
//! Combines every SVG icon into one `<symbol>` sprite sheet under the output
//! root and renders a stylesheet fragment describing the icons back into the
//! source tree, where the main stylesheet can import it.
//!
//! The fragment template uses a small mustache subset:
//!
//! ```text
//! {{#icons}}
//! .icon-{{id}} { width: {{width}}px; height: {{height}}px; }
//! {{/icons}}
//! ```
//!
//! Inside the `icons` section: `{{name}}`, `{{id}}`, `{{width}}`,
//! `{{height}}`, `{{index}}`. Anywhere: `{{sprite}}` (sprite URL relative to
//! the stylesheet destination) and `{{count}}`.

use crate::build::{
    discover_all, Asset, BuildContext, FileOutcome, Pipeline, SourceFile, TaskError, TaskReport,
};
use crate::stages::SvgMinify;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

/// Template used when the configured fragment template does not exist
pub const DEFAULT_FRAGMENT_TEMPLATE: &str = r#"/* Generated by sitepipe from {{count}} icons. Do not edit. */
:root {
  --sprite-url: url("{{sprite}}");
}
{{#icons}}
.icon-{{id}} {
  width: {{width}}px;
  height: {{height}}px;
}
{{/icons}}
"#;

static SVG_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^<svg\b([^>]*?)(/>|>(.*)</svg>)$").unwrap());
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Attributes of the icon root that do not carry over to its `<symbol>`
const DROPPED_ATTRIBUTES: &[&str] = &["xmlns", "width", "height", "viewBox", "id", "version", "x", "y"];

/// One parsed icon.
#[derive(Debug, Clone, PartialEq)]
pub struct Icon {
    /// Path below the icons glob base, without extension
    pub name: String,
    /// Symbol id
    pub id: String,
    pub view_box: String,
    pub width: f64,
    pub height: f64,
    /// Root attributes kept on the symbol (`fill`, `stroke`, ...)
    pub attributes: Vec<(String, String)>,
    /// Inner markup of the root `<svg>`
    pub body: String,
}

/// Symbol id for an icon path: `social/github.svg` → `social--github`.
pub fn icon_id(relative: &Path) -> String {
    let name = icon_name(relative);
    name.replace('/', "--")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

fn icon_name(relative: &Path) -> String {
    let stem = relative.with_extension("");
    stem.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_length(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").parse().ok().filter(|v: &f64| *v > 0.0)
}

/// Parse minified SVG markup into an [`Icon`].
pub fn parse_icon(relative: &Path, svg: &str) -> Result<Icon, String> {
    let caps = SVG_ROOT.captures(svg.trim()).ok_or("not a single <svg> element")?;
    let attrs = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(3).map_or("", |m| m.as_str()).to_string();

    let mut view_box = None;
    let mut width = None;
    let mut height = None;
    let mut attributes = Vec::new();
    for attr in ATTRIBUTE.captures_iter(attrs) {
        let key = attr.get(1).map_or("", |m| m.as_str());
        let value = attr.get(2).or_else(|| attr.get(3)).map_or("", |m| m.as_str());
        match key {
            "viewBox" => view_box = Some(value.to_string()),
            "width" => width = parse_length(value),
            "height" => height = parse_length(value),
            _ if DROPPED_ATTRIBUTES.contains(&key) || key.starts_with("xmlns:") => {}
            _ => attributes.push((key.to_string(), value.to_string())),
        }
    }

    let (view_box, width, height) = match (view_box, width, height) {
        (Some(vb), w, h) => {
            let parts: Vec<f64> = vb
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
            if parts.len() != 4 {
                return Err(format!("invalid viewBox '{}'", vb));
            }
            (vb, w.unwrap_or(parts[2]), h.unwrap_or(parts[3]))
        }
        (None, Some(w), Some(h)) => {
            (format!("0 0 {} {}", format_number(w), format_number(h)), w, h)
        }
        _ => return Err("missing viewBox and width/height".to_string()),
    };

    Ok(Icon {
        name: icon_name(relative),
        id: icon_id(relative),
        view_box,
        width,
        height,
        attributes,
        body,
    })
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Render the sprite sheet.
pub fn render_sprite(icons: &[Icon]) -> String {
    let mut out = String::from(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
    );
    out.push('\n');
    for icon in icons {
        out.push_str(&format!(r#"<symbol id="{}" viewBox="{}""#, icon.id, icon.view_box));
        for (key, value) in &icon.attributes {
            out.push_str(&format!(r#" {}="{}""#, key, value));
        }
        out.push('>');
        out.push_str(&icon.body);
        out.push_str("</symbol>\n");
    }
    out.push_str("</svg>\n");
    out
}

/// Render the stylesheet fragment from a template.
pub fn render_fragment(template: &str, icons: &[Icon], sprite_url: &str) -> String {
    const OPEN: &str = "{{#icons}}";
    const CLOSE: &str = "{{/icons}}";

    let globals = |text: &str| {
        text.replace("{{sprite}}", sprite_url).replace("{{count}}", &icons.len().to_string())
    };

    let (Some(start), Some(end)) = (template.find(OPEN), template.find(CLOSE)) else {
        return globals(template);
    };
    if end < start {
        return globals(template);
    }

    // A section on its own line does not leave a blank line behind
    let body = &template[start + OPEN.len()..end];
    let section = body.strip_prefix('\n').unwrap_or(body);
    let after = &template[end + CLOSE.len()..];
    let after = after.strip_prefix('\n').unwrap_or(after);

    let mut out = globals(&template[..start]);
    for (index, icon) in icons.iter().enumerate() {
        let block = section
            .replace("{{name}}", &icon.name)
            .replace("{{id}}", &icon.id)
            .replace("{{width}}", &format_number(icon.width))
            .replace("{{height}}", &format_number(icon.height))
            .replace("{{index}}", &index.to_string());
        out.push_str(&globals(&block));
    }
    out.push_str(&globals(after));
    out
}

/// Lexical relative path from a directory to a file, `/`-separated.
pub fn relative_url(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component> = from_dir.components().filter(|c| *c != Component::CurDir).collect();
    let to_parts: Vec<Component> = to.components().filter(|c| *c != Component::CurDir).collect();
    let common = from.iter().zip(&to_parts).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(to_parts[common..].iter().map(|c| c.as_os_str().to_string_lossy().to_string()));
    parts.join("/")
}

/// Replace `path` with `contents` through a temporary file in the same
/// directory, so readers never see a partial file.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.tmp", name));
    fs::write(&temp, contents)?;
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    Ok(())
}

/// Write `contents` unless the file already holds exactly that.
///
/// Returns whether the file was written.
fn write_if_changed(path: &Path, contents: &str) -> std::io::Result<bool> {
    match fs::read_to_string(path) {
        Ok(existing) if existing == contents => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) if e.kind() == ErrorKind::InvalidData => {}
        Err(e) => return Err(e),
    }
    write_atomic(path, contents)?;
    Ok(true)
}

/// The icons task.
#[derive(Debug, Clone)]
pub struct SpriteTask {
    source_root: PathBuf,
    sources: Vec<String>,
    sprite: PathBuf,
    fragment: PathBuf,
    template: PathBuf,
    styles_dest: PathBuf,
}

impl SpriteTask {
    pub const NAME: &'static str = "icons";

    pub fn from_context(ctx: &BuildContext) -> Self {
        let config = ctx.config();
        Self {
            source_root: ctx.app_dir(),
            sources: config.icons.sources.clone(),
            sprite: ctx.dist_path(&config.icons.sprite),
            fragment: ctx.app_path(&config.icons.fragment),
            template: ctx.app_path(&config.icons.template),
            styles_dest: ctx.dist_path(&config.styles.dest),
        }
    }

    pub fn sprite_path(&self) -> &Path {
        &self.sprite
    }

    /// Whether both generated artifacts are present.
    pub fn artifacts_exist(&self) -> bool {
        self.sprite.is_file() && self.fragment.is_file()
    }

    fn task_error_write(&self, path: &Path, source: std::io::Error) -> TaskError {
        TaskError::Write { task: Self::NAME.to_string(), path: path.to_path_buf(), source }
    }

    fn load_template(&self) -> Result<String, TaskError> {
        match fs::read_to_string(&self.template) {
            Ok(template) => Ok(template),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DEFAULT_FRAGMENT_TEMPLATE.to_string()),
            Err(source) => Err(TaskError::Read {
                task: Self::NAME.to_string(),
                path: self.template.clone(),
                source,
            }),
        }
    }

    fn parse_file(pipeline: &Pipeline, file: &SourceFile) -> Result<Icon, String> {
        let asset = Asset::read(&file.path, &file.relative).map_err(|e| format!("read failed: {}", e))?;
        let asset = pipeline.run(asset).map_err(|e| e.to_string())?;
        let text = asset.text().map_err(|_| "icon is not valid UTF-8".to_string())?;
        parse_icon(&file.relative, text)
    }

    /// Build the sprite and the fragment.
    pub fn run(&self) -> Result<TaskReport, TaskError> {
        let start = Instant::now();
        if !self.source_root.is_dir() {
            return Err(TaskError::MissingSource {
                task: Self::NAME.to_string(),
                path: self.source_root.clone(),
            });
        }

        let files = discover_all(&self.source_root, &self.sources)
            .map_err(|source| TaskError::Discovery { task: Self::NAME.to_string(), source })?;
        let pipeline = Pipeline::new().stage(SvgMinify);

        let parsed: Vec<(PathBuf, Result<Icon, String>)> = files
            .par_iter()
            .map(|file| (file.path.clone(), Self::parse_file(&pipeline, file)))
            .collect();

        let mut report = TaskReport::new(Self::NAME);
        let mut icons = Vec::new();
        let mut ids = HashSet::new();
        for (path, result) in parsed {
            let result = result.and_then(|icon| {
                if ids.insert(icon.id.clone()) {
                    Ok(icon)
                } else {
                    Err(format!("icon id '{}' is already used by another icon", icon.id))
                }
            });
            match result {
                Ok(icon) => {
                    report.add(FileOutcome::written(path, vec![self.sprite.clone()]));
                    icons.push(icon);
                }
                Err(message) => {
                    tracing::warn!(task = Self::NAME, file = %path.display(), "{}", message);
                    report.add(FileOutcome::failed(path, message));
                }
            }
        }

        write_atomic(&self.sprite, &render_sprite(&icons))
            .map_err(|e| self.task_error_write(&self.sprite, e))?;

        let sprite_url = relative_url(&self.styles_dest, &self.sprite);
        let fragment = render_fragment(&self.load_template()?, &icons, &sprite_url);
        let changed = write_if_changed(&self.fragment, &fragment)
            .map_err(|e| self.task_error_write(&self.fragment, e))?;
        tracing::debug!(
            icons = icons.len(),
            sprite = %self.sprite.display(),
            fragment = %self.fragment.display(),
            fragment_changed = changed,
            "sprite written"
        );

        report.artifacts.push(self.sprite.clone());
        report.artifacts.push(self.fragment.clone());
        Ok(report.with_duration(start.elapsed()))
    }
}
