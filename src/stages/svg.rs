//! SVG minification.

use crate::build::{Asset, Stage, StageError};
use regex::Regex;
use std::sync::LazyLock;

static XML_PROLOG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<\?xml.*?\?>").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static DOCTYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<!DOCTYPE[^>]*>").unwrap());
static METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<metadata\b.*?</metadata>|<metadata\b[^>]*/>").unwrap());
static BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());

/// Minify SVG markup.
///
/// Strips the XML prolog, comments, doctype, `<metadata>` and whitespace
/// between tags, and a leading byte order mark. Fails when the result is not
/// a single `<svg>` element.
pub fn minify_svg(text: &str) -> Result<String, String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = XML_PROLOG.replace_all(text, "");
    let text = COMMENT.replace_all(&text, "");
    let text = DOCTYPE.replace_all(&text, "");
    let text = METADATA.replace_all(&text, "");
    let text = BETWEEN_TAGS.replace_all(&text, "><");
    let text = text.trim();

    if !text.starts_with("<svg") {
        return Err("missing <svg> root element".to_string());
    }
    if !text.ends_with("</svg>") && !text.ends_with("/>") {
        return Err("unterminated <svg> element".to_string());
    }
    Ok(text.to_string())
}

/// Stage wrapper around [`minify_svg`].
#[derive(Debug, Clone, Default)]
pub struct SvgMinify;

impl Stage for SvgMinify {
    fn name(&self) -> &str {
        "svg-minify"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, StageError> {
        let text = asset.text().map_err(|_| StageError::encoding("svg-minify"))?;
        let minified = minify_svg(text).map_err(|e| StageError::transform("svg-minify", e))?;
        Ok(asset.with_contents(minified))
    }
}
