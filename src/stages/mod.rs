//! Concrete pipeline stages.
//!
//! | Stage | Used by |
//! |-------|---------|
//! | [`CommandStage`] | templates, scripts, styles (optional preprocessor) |
//! | [`Rename`] | templates |
//! | [`CompileStyles`] | styles (bundles `@import` rules) |
//! | [`MinifyCss`] | styles (production) |
//! | [`SourceMapInit`] / [`SourceMapWrite`] | styles (development) |
//! | [`OptimizeImage`] | images (production) |
//! | [`SvgMinify`] | icons |

pub mod command;
pub mod css;
pub mod optimize;
pub mod rename;
pub mod sourcemap;
pub mod svg;

pub use command::{CommandStage, FILE_PLACEHOLDER};
pub use css::{browser_targets, CompileStyles, MinifyCss};
pub use optimize::OptimizeImage;
pub use rename::Rename;
pub use sourcemap::{SourceMapInit, SourceMapWrite, SOURCE_MAP_MARKER};
pub use svg::{minify_svg, SvgMinify};
