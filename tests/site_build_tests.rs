//! Site build integration tests
//!
//! Drives whole tasks and composites against temporary projects laid out the
//! conventional way (`app/` sources, `dist/` output).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use sitepipe::build::{clear_output, BuildContext, BuildMode, ClearError};
use sitepipe::config::{load_config, SiteConfig};
use sitepipe::orchestrate::{Orchestrator, DEFAULT_GROUP, PRODUCTION_GROUP};
use sitepipe::stages::SOURCE_MAP_MARKER;
use sitepipe::tasks::{BuildTask, TaskSet};
use sitepipe::watch::{bindings_for, default_bindings};

// ============================================================================
// Test Utilities
// ============================================================================

fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// A small site: two pages, one stylesheet importing a partial and the
/// sprite fragment, two scripts, one icon, one font.
fn create_site(root: &Path) {
    let app = root.join("app");
    create_test_file(&app, "pages/index.pug", "<html><body>Home</body></html>\n");
    create_test_file(&app, "pages/about/index.pug", "<html><body>About</body></html>\n");
    create_test_file(
        &app,
        "common/styles/app.css",
        "@import 'base.css';\n@import 'helpers/sprites.css';\n.app { display: flex; }\n",
    );
    create_test_file(&app, "common/styles/base.css", "body { margin: 0; }\n");
    create_test_file(&app, "common/scripts/main.js", "console.log('main');\n");
    create_test_file(&app, "common/scripts/extra.js", "console.log('extra');\n");
    create_test_file(
        &app,
        "common/icons/arrow.svg",
        r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M0 0h24v24H0z"/></svg>"#,
    );
    create_test_file(&app, "common/fonts/body.woff2", "woff2");
}

/// Config whose template compiler is `cat`, so pages pass through unchanged.
fn site_config() -> SiteConfig {
    let mut config = SiteConfig::default();
    config.templates.command = vec!["cat".to_string()];
    config
}

fn context(root: &Path, mode: BuildMode) -> BuildContext {
    BuildContext::new(site_config(), root.to_path_buf()).with_mode(mode)
}

/// SHA-256 of every file below `dir`, keyed by relative path.
fn hash_tree(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut hashes = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let digest = Sha256::digest(fs::read(&path).unwrap()).to_vec();
                hashes.insert(path.strip_prefix(dir).unwrap().to_path_buf(), digest);
            }
        }
    }
    hashes
}

// ============================================================================
// Task Tests
// ============================================================================

#[cfg(unix)]
#[test]
fn test_templates_render_pages_to_html() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let tasks = TaskSet::from_context(&context(temp.path(), BuildMode::Development));

    let report = tasks.run(BuildTask::Templates).unwrap();
    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(report.written_count(), 2);

    let dist = temp.path().join("dist");
    assert_eq!(
        fs::read_to_string(dist.join("index.html")).unwrap(),
        "<html><body>Home</body></html>\n"
    );
    assert!(dist.join("about/index.html").is_file());
    assert!(!dist.join("index.pug").exists());
}

#[cfg(unix)]
#[test]
fn test_failing_template_command_isolated_per_file() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let mut config = site_config();
    config.templates.command = vec!["false".to_string()];
    let tasks = TaskSet::from_context(&BuildContext::new(config, temp.path().to_path_buf()));

    let report = tasks.run(BuildTask::Templates).unwrap();
    assert_eq!(report.failed_count(), 2);
    assert!(!temp.path().join("dist/index.html").exists());

    // A later task in the same build still runs
    let copy = tasks.run(BuildTask::Copy).unwrap();
    assert!(copy.is_success());
    assert!(temp.path().join("dist/assets/fonts/body.woff2").is_file());
}

#[test]
fn test_styles_development_inlines_imports_with_source_map() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let tasks = TaskSet::from_context(&context(temp.path(), BuildMode::Development));

    tasks.run(BuildTask::Icons).unwrap();
    let report = tasks.run(BuildTask::Styles).unwrap();
    assert!(report.is_success(), "{}", report.summary());

    let css = fs::read_to_string(temp.path().join("dist/assets/styles/app.css")).unwrap();
    assert!(css.contains("margin: 0"));
    assert!(css.contains(".icon-arrow"));
    assert!(css.contains(SOURCE_MAP_MARKER));
    // Partials are inlined, never emitted on their own
    assert!(!temp.path().join("dist/assets/styles/base.css").exists());
}

#[test]
fn test_styles_production_is_minified_without_source_map() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let dev = TaskSet::from_context(&context(temp.path(), BuildMode::Development));
    dev.run(BuildTask::Icons).unwrap();
    dev.run(BuildTask::Styles).unwrap();
    let dev_css = fs::read_to_string(temp.path().join("dist/assets/styles/app.css")).unwrap();

    let prod = TaskSet::from_context(&context(temp.path(), BuildMode::Production));
    let report = prod.run(BuildTask::Styles).unwrap();
    assert!(report.is_success(), "{}", report.summary());
    let prod_css = fs::read_to_string(temp.path().join("dist/assets/styles/app.css")).unwrap();

    assert!(!prod_css.contains(SOURCE_MAP_MARKER));
    assert!(prod_css.contains("body{margin:0}"));
    assert!(prod_css.len() < dev_css.len());
}

#[test]
fn test_malformed_stylesheet_fails_only_that_entry() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    create_test_file(&temp.path().join("app"), "common/styles/broken.css", "..a { color: red; }");
    let mut config = site_config();
    config.styles.sources = vec!["common/styles/app.css".into(), "common/styles/broken.css".into()];
    let tasks = TaskSet::from_context(&BuildContext::new(config, temp.path().to_path_buf()));

    tasks.run(BuildTask::Icons).unwrap();
    let report = tasks.run(BuildTask::Styles).unwrap();
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.written_count(), 1);
    assert!(report.failures()[0].source.ends_with("broken.css"));
    assert!(temp.path().join("dist/assets/styles/app.css").is_file());
}

#[test]
fn test_scripts_only_reprocess_changed_entries() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let tasks = TaskSet::from_context(&context(temp.path(), BuildMode::Development));

    let first = tasks.run(BuildTask::Scripts).unwrap();
    assert_eq!(first.written_count(), 2);

    std::thread::sleep(Duration::from_millis(50));
    create_test_file(&temp.path().join("app"), "common/scripts/main.js", "console.log('v2');\n");

    let second = tasks.run(BuildTask::Scripts).unwrap();
    assert_eq!(second.written_count(), 1);
    assert_eq!(second.skipped_count(), 1);
    assert_eq!(
        fs::read_to_string(temp.path().join("dist/assets/scripts/main.js")).unwrap(),
        "console.log('v2');\n"
    );
}

#[test]
fn test_images_optimized_in_production() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let logo = temp.path().join("app/common/images/logo.png");
    fs::create_dir_all(logo.parent().unwrap()).unwrap();
    image::RgbaImage::from_pixel(16, 16, image::Rgba([200, 40, 40, 255])).save(&logo).unwrap();

    let tasks = TaskSet::from_context(&context(temp.path(), BuildMode::Production));
    let report = tasks.run(BuildTask::Images).unwrap();
    assert!(report.is_success(), "{}", report.summary());

    let output = temp.path().join("dist/assets/images/logo.png");
    assert!(fs::metadata(&output).unwrap().len() <= fs::metadata(&logo).unwrap().len());
    let decoded = image::open(&output).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 16));
}

#[test]
fn test_missing_source_root_is_a_task_error() {
    let temp = TempDir::new().unwrap();
    let tasks = TaskSet::from_context(&context(temp.path(), BuildMode::Development));
    assert!(tasks.run(BuildTask::Copy).is_err());
}

#[cfg(unix)]
#[test]
fn test_rebuild_is_idempotent() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let ctx = context(temp.path(), BuildMode::Production);

    for task in [BuildTask::Templates, BuildTask::Icons, BuildTask::Styles, BuildTask::Copy] {
        TaskSet::from_context(&ctx).run(task).unwrap();
    }
    let first = hash_tree(&temp.path().join("dist"));

    for task in [BuildTask::Templates, BuildTask::Icons, BuildTask::Styles, BuildTask::Copy] {
        TaskSet::from_context(&ctx).run(task).unwrap();
    }
    let second = hash_tree(&temp.path().join("dist"));

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

// ============================================================================
// Composite Tests
// ============================================================================

#[test]
fn test_groups() {
    assert_eq!(DEFAULT_GROUP.len(), 6);
    assert!(DEFAULT_GROUP.contains(&BuildTask::Copy));
    assert_eq!(
        PRODUCTION_GROUP,
        [BuildTask::Templates, BuildTask::Styles, BuildTask::Scripts, BuildTask::Images]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_production_build_from_stale_output() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    create_test_file(&temp.path().join("dist"), "old/page.html", "stale");
    let orchestrator = Orchestrator::new(context(temp.path(), BuildMode::Production));

    let report = orchestrator.run_production().await.unwrap();
    assert!(report.is_success());

    let dist = temp.path().join("dist");
    assert!(!dist.join("old").exists());
    assert!(dist.join("index.html").is_file());
    assert!(dist.join("assets/scripts/main.js").is_file());
    assert!(dist.join("assets/images/icons/sprite.svg").is_file());
    let css = fs::read_to_string(dist.join("assets/styles/app.css")).unwrap();
    assert!(css.contains(".icon-arrow"));
    assert!(!css.contains(SOURCE_MAP_MARKER));
}

#[tokio::test]
async fn test_clear_refuses_project_root() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let mut config = site_config();
    config.paths.dist = PathBuf::from(".");
    let ctx = BuildContext::new(config, temp.path().to_path_buf());

    assert!(matches!(clear_output(&ctx), Err(ClearError::Unsafe { .. })));
    assert!(temp.path().join("app/pages/index.pug").exists());
}

#[tokio::test]
async fn test_clear_missing_output_is_ok() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(context(temp.path(), BuildMode::Development));
    orchestrator.clear().await.unwrap();
    assert!(!temp.path().join("dist").exists());
}

// ============================================================================
// Watch Binding Tests
// ============================================================================

#[test]
fn test_watch_bindings_map_changes_to_tasks() {
    let bindings = default_bindings(&SiteConfig::default()).unwrap();
    let cases = [
        ("pages/about/index.pug", vec![BuildTask::Templates]),
        ("common/blocks/header.pug", vec![BuildTask::Templates]),
        ("common/styles/helpers/vars.css", vec![BuildTask::Styles]),
        ("common/scripts/main.js", vec![BuildTask::Scripts]),
        ("common/images/photos/a.jpg", vec![BuildTask::Images]),
        ("common/icons/arrow.svg", vec![BuildTask::Icons]),
        ("common/fonts/body.woff2", vec![BuildTask::Copy]),
        ("README.md", vec![]),
    ];
    for (path, expected) in cases {
        assert_eq!(bindings_for(&bindings, Path::new(path)), expected, "{}", path);
    }
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_load_project_config() {
    let temp = TempDir::new().unwrap();
    let path = create_test_file(
        temp.path(),
        "sitepipe.toml",
        r#"
[paths]
app = "src"
dist = "public"

[templates]
command = []

[scripts]
incremental = false

[server]
port = 8080
"#,
    );

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.paths.app, PathBuf::from("src"));
    assert_eq!(config.paths.dist, PathBuf::from("public"));
    assert!(config.templates.command.is_empty());
    assert!(!config.scripts.incremental);
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.styles.dest, PathBuf::from("assets/styles"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = create_test_file(temp.path(), "sitepipe.toml", "[images]\njpeg_quality = 0\n");
    assert!(load_config(Some(&path)).is_err());
}

#[test]
fn test_build_mode_from_environment_value() {
    assert_eq!(BuildMode::from_env_value(Some("production")), BuildMode::Production);
    assert_eq!(BuildMode::from_env_value(Some("staging")), BuildMode::Development);
    assert_eq!(BuildMode::from_env_value(None), BuildMode::Development);
}
