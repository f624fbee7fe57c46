//! Stylesheet stages: compilation with import bundling and vendor prefixing,
//! and minification. Both are done by lightningcss.

use crate::build::{Asset, SourceMapState, Stage, StageError};
use crate::config::{parse_browser_version, BrowserTargets};
use lightningcss::bundler::{Bundler, FileProvider, ResolveResult, SourceProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserFlags, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};

fn is_remote(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://") || target.starts_with("//")
}

/// Candidate files for an import target, in lookup order: as written, with a
/// `.css` extension, then as an `_partial`.
fn resolve_import(dir: &Path, target: &str) -> Option<PathBuf> {
    let path = dir.join(target);
    let mut candidates = vec![path.clone()];
    if path.extension().is_none() {
        candidates.push(path.with_extension("css"));
    }
    if let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) {
        let partial = path.with_file_name(format!("_{}", name));
        if partial.extension().is_none() {
            candidates.push(partial.with_extension("css"));
        }
        candidates.push(partial);
    }
    candidates.into_iter().find(|p| p.is_file())
}

/// Feeds the bundler: the entry comes from the asset, imports from disk.
///
/// Remote imports stay external and are printed as `@import` rules.
struct ImportProvider {
    entry: PathBuf,
    entry_text: String,
    files: FileProvider,
}

impl ImportProvider {
    fn new(entry: &Path, entry_text: &str) -> Self {
        Self { entry: entry.to_path_buf(), entry_text: entry_text.to_string(), files: FileProvider::new() }
    }
}

impl SourceProvider for ImportProvider {
    type Error = io::Error;

    fn read<'a>(&'a self, file: &Path) -> Result<&'a str, Self::Error> {
        if file == self.entry {
            return Ok(&self.entry_text);
        }
        self.files.read(file)
    }

    fn resolve(&self, specifier: &str, originating_file: &Path) -> Result<ResolveResult, Self::Error> {
        if is_remote(specifier) {
            return Ok(ResolveResult::External(specifier.to_string()));
        }
        let dir = originating_file.parent().unwrap_or(Path::new(""));
        resolve_import(dir, specifier).map(ResolveResult::File).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("cannot resolve @import '{}' in {}", specifier, originating_file.display()),
            )
        })
    }
}

/// Build lightningcss targets from configured browser versions.
///
/// Unknown browsers and unparsable versions are ignored; configuration
/// validation reports them earlier.
pub fn browser_targets(config: &BrowserTargets) -> Targets {
    let mut browsers = Browsers::default();
    for (name, version) in config.entries() {
        let Some(version) = parse_browser_version(version) else {
            continue;
        };
        let slot = match name {
            "chrome" => &mut browsers.chrome,
            "edge" => &mut browsers.edge,
            "firefox" => &mut browsers.firefox,
            "safari" => &mut browsers.safari,
            "ios_saf" => &mut browsers.ios_saf,
            "opera" => &mut browsers.opera,
            "samsung" => &mut browsers.samsung,
            "android" => &mut browsers.android,
            _ => continue,
        };
        *slot = Some(version);
    }
    Targets::from(browsers)
}

fn parser_options<'i>(filename: &Path) -> ParserOptions<'i> {
    ParserOptions {
        filename: filename.to_string_lossy().to_string(),
        flags: ParserFlags::NESTING,
        ..ParserOptions::default()
    }
}

/// Minify rules for `targets` and print, recording mappings into `map`.
fn print_stylesheet(
    stage: &str,
    mut sheet: StyleSheet,
    targets: Targets,
    minify: bool,
    map: Option<&mut SourceMap>,
) -> Result<String, StageError> {
    sheet
        .minify(MinifyOptions { targets, ..MinifyOptions::default() })
        .map_err(|e| StageError::transform(stage, e.to_string()))?;
    let printed = sheet
        .to_css(PrinterOptions { minify, targets, source_map: map, ..PrinterOptions::default() })
        .map_err(|e| StageError::transform(stage, e.to_string()))?;
    Ok(printed.code)
}

/// The parts of a serialized v3 map that the state keeps.
#[derive(Deserialize)]
struct EncodedMap {
    #[serde(default)]
    mappings: String,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default, rename = "sourcesContent")]
    sources_content: Vec<Option<String>>,
}

fn map_state(map: &mut SourceMap) -> Result<SourceMapState, StageError> {
    let json = map
        .to_json(None)
        .map_err(|e| StageError::transform("compile-styles", format!("source map: {:?}", e)))?;
    let encoded: EncodedMap = serde_json::from_str(&json)
        .map_err(|e| StageError::transform("compile-styles", format!("source map: {}", e)))?;

    let mut contents: Vec<String> =
        encoded.sources_content.into_iter().map(Option::unwrap_or_default).collect();
    contents.resize(encoded.sources.len(), String::new());
    Ok(SourceMapState { sources: encoded.sources, contents, mappings: encoded.mappings })
}

/// Parses the stylesheet, inlines local `@import` rules, lowers nesting and
/// adds vendor prefixes for the configured browsers. Output stays readable.
///
/// When the asset carries a source map state, the state is replaced by the
/// map of the printed output.
#[derive(Debug, Clone)]
pub struct CompileStyles {
    targets: Targets,
    bundle: bool,
}

impl CompileStyles {
    pub fn new(browsers: &BrowserTargets) -> Self {
        Self { targets: browser_targets(browsers), bundle: true }
    }

    /// Compile the text as is, leaving `@import` rules in place. Used after
    /// an external preprocessor that resolves imports itself.
    pub fn without_bundling(mut self) -> Self {
        self.bundle = false;
        self
    }

    fn compile(
        &self,
        asset: &Asset,
        text: &str,
        mut map: Option<&mut SourceMap>,
    ) -> Result<String, StageError> {
        const STAGE: &str = "compile-styles";

        if !self.bundle {
            let sheet = StyleSheet::parse(text, parser_options(&asset.source))
                .map_err(|e| StageError::transform(STAGE, e.to_string()))?;
            if let Some(map) = map.as_deref_mut() {
                let index = map.add_source(&asset.source.to_string_lossy());
                map.set_source_content(index as usize, text)
                    .map_err(|e| StageError::transform(STAGE, format!("source map: {:?}", e)))?;
            }
            return print_stylesheet(STAGE, sheet, self.targets, false, map);
        }

        let provider = ImportProvider::new(&asset.source, text);
        let sheet = {
            let mut bundler = Bundler::new(&provider, map.as_deref_mut(), parser_options(&asset.source));
            bundler.bundle(&asset.source).map_err(|e| StageError::transform(STAGE, e.to_string()))?
        };
        print_stylesheet(STAGE, sheet, self.targets, false, map)
    }
}

impl Stage for CompileStyles {
    fn name(&self) -> &str {
        "compile-styles"
    }

    fn apply(&self, mut asset: Asset) -> Result<Asset, StageError> {
        let text = asset.text().map_err(|_| StageError::encoding("compile-styles"))?.to_string();

        if asset.source_map.is_none() {
            let code = self.compile(&asset, &text, None)?;
            return Ok(asset.with_contents(code));
        }

        let root = asset.source.parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();
        let mut map = SourceMap::new(&root);
        let code = self.compile(&asset, &text, Some(&mut map))?;
        asset.source_map = Some(map_state(&mut map)?);
        Ok(asset.with_contents(code))
    }
}

/// Minifies a compiled stylesheet.
#[derive(Debug, Clone)]
pub struct MinifyCss {
    targets: Targets,
}

impl MinifyCss {
    pub fn new(browsers: &BrowserTargets) -> Self {
        Self { targets: browser_targets(browsers) }
    }
}

impl Stage for MinifyCss {
    fn name(&self) -> &str {
        "minify-css"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, StageError> {
        let text = asset.text().map_err(|_| StageError::encoding("minify-css"))?;
        let sheet = StyleSheet::parse(text, parser_options(&asset.relative))
            .map_err(|e| StageError::transform("minify-css", e.to_string()))?;
        let code = print_stylesheet("minify-css", sheet, self.targets, true, None)?;
        Ok(asset.with_contents(code))
    }
}
