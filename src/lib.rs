//! Sitepipe - asset build pipeline for static sites
//!
//! This library provides functionality to:
//! - Compile page templates, stylesheets and scripts from `app/` into `dist/`
//! - Copy and optimize images and fonts, and build an SVG icon sprite
//! - Re-run tasks on source changes and serve `dist/` with live reload

pub mod build;
pub mod cli;
pub mod config;
pub mod orchestrate;
pub mod server;
pub mod sprite;
pub mod stages;
pub mod tasks;
pub mod watch;
