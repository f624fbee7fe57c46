//! Inline source maps for development stylesheets.
//!
//! [`SourceMapInit`] captures the original stylesheet before any
//! transformation and asks later stages to track positions; compilation
//! replaces the captured state with the map of its output. [`SourceMapWrite`]
//! appends the map to the output as a base64 data URL comment.

use crate::build::{Asset, SourceMapState, Stage, StageError};
use base64::Engine;

/// Prefix of the comment carrying the inline map
pub const SOURCE_MAP_MARKER: &str = "/*# sourceMappingURL=data:application/json;charset=utf8;base64,";

/// Starts collecting a source map.
#[derive(Debug, Clone, Default)]
pub struct SourceMapInit;

impl Stage for SourceMapInit {
    fn name(&self) -> &str {
        "sourcemap-init"
    }

    fn apply(&self, mut asset: Asset) -> Result<Asset, StageError> {
        let text = asset.text().map_err(|_| StageError::encoding("sourcemap-init"))?.to_string();
        let mut state = SourceMapState::default();
        state.add_source(source_name(&asset), text);
        asset.source_map = Some(state);
        Ok(asset)
    }
}

fn source_name(asset: &Asset) -> String {
    asset
        .source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| asset.display_name())
}

/// Appends the collected map to the stylesheet.
#[derive(Debug, Clone, Default)]
pub struct SourceMapWrite;

impl Stage for SourceMapWrite {
    fn name(&self) -> &str {
        "sourcemap-write"
    }

    fn apply(&self, mut asset: Asset) -> Result<Asset, StageError> {
        let state = asset.source_map.take().ok_or_else(|| {
            StageError::transform("sourcemap-write", "no source map was initialised")
        })?;

        let map = serde_json::json!({
            "version": 3,
            "file": asset.display_name(),
            "sources": state.sources,
            "sourcesContent": state.contents,
            "names": [],
            "mappings": state.mappings,
        });
        let encoded = base64::engine::general_purpose::STANDARD.encode(map.to_string());

        let mut contents = asset.contents;
        if !contents.ends_with(b"\n") {
            contents.push(b'\n');
        }
        contents.extend_from_slice(format!("{}{} */\n", SOURCE_MAP_MARKER, encoded).as_bytes());
        asset.contents = contents;
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::Pipeline;
    use crate::config::BrowserTargets;
    use crate::stages::CompileStyles;
    use std::fs;
    use tempfile::TempDir;

    fn decode_map(css: &str) -> serde_json::Value {
        let start = css.find(SOURCE_MAP_MARKER).unwrap() + SOURCE_MAP_MARKER.len();
        let end = css[start..].find(" */").unwrap() + start;
        let bytes = base64::engine::general_purpose::STANDARD.decode(&css[start..end]).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_init_then_write_embeds_original_source() {
        let pipeline = Pipeline::new().stage(SourceMapInit).stage(SourceMapWrite);
        let asset = Asset::new("/app/common/styles/app.css", "app.css", b"a { b: c }".to_vec());
        let out = pipeline.run(asset).unwrap();
        let css = out.text().unwrap();

        assert!(css.starts_with("a { b: c }\n"));
        let map = decode_map(css);
        assert_eq!(map["version"], 3);
        assert_eq!(map["file"], "app.css");
        assert_eq!(map["sources"][0], "app.css");
        assert_eq!(map["sourcesContent"][0], "a { b: c }");
        assert!(out.source_map.is_none());
    }

    #[test]
    fn test_compiled_stylesheet_maps_back_to_its_sources() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("base.css"), "body {\n  margin: 0;\n}\n").unwrap();
        let main = temp.path().join("app.css");
        fs::write(&main, "@import 'base.css';\n\n.app {\n  color: red;\n}\n").unwrap();

        let pipeline = Pipeline::new()
            .stage(SourceMapInit)
            .stage(CompileStyles::new(&BrowserTargets::default()))
            .stage(SourceMapWrite);
        let out = pipeline.run(Asset::read(&main, std::path::Path::new("app.css")).unwrap()).unwrap();
        let map = decode_map(out.text().unwrap());

        let mappings = map["mappings"].as_str().unwrap();
        assert!(!mappings.is_empty());
        let sources: Vec<&str> =
            map["sources"].as_array().unwrap().iter().map(|s| s.as_str().unwrap()).collect();
        assert!(sources.iter().any(|s| s.ends_with("base.css")));
        assert!(sources.iter().any(|s| s.ends_with("app.css")));
        assert!(map["sourcesContent"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c.as_str().unwrap().contains("color: red")));
    }

    #[test]
    fn test_write_without_init_fails() {
        let err = SourceMapWrite.apply(Asset::new("a.css", "a.css", b"a{}".to_vec())).unwrap_err();
        assert!(err.to_string().contains("no source map"));
    }
}
