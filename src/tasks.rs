//! Task registry.
//!
//! Builds the static set of tasks from configuration and build mode. The
//! descriptors are created once; running a task never changes them.

use crate::build::{
    BuildContext, BuildMode, Pipeline, TaskDescriptor, TaskError, TaskReport, TransformTask,
};
use crate::sprite::SpriteTask;
use crate::stages::{
    CommandStage, CompileStyles, MinifyCss, OptimizeImage, Rename, SourceMapInit, SourceMapWrite,
};
use std::fmt;
use std::str::FromStr;

/// A task that produces files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildTask {
    Templates,
    Styles,
    Scripts,
    Images,
    Copy,
    Icons,
}

impl BuildTask {
    pub const ALL: [BuildTask; 6] = [
        BuildTask::Templates,
        BuildTask::Styles,
        BuildTask::Scripts,
        BuildTask::Images,
        BuildTask::Copy,
        BuildTask::Icons,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildTask::Templates => "templates",
            BuildTask::Styles => "styles",
            BuildTask::Scripts => "scripts",
            BuildTask::Images => "images",
            BuildTask::Copy => "copy",
            BuildTask::Icons => "icons",
        }
    }
}

impl fmt::Display for BuildTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildTask::ALL
            .into_iter()
            .find(|task| task.as_str() == s)
            .ok_or_else(|| format!("unknown task '{}'", s))
    }
}

/// `pages/**/*.pug` → `dist/**/*.html`
pub fn templates_descriptor(ctx: &BuildContext) -> TaskDescriptor {
    let config = &ctx.config().templates;
    let mut pipeline = Pipeline::new();
    if let Some(command) = CommandStage::from_command("templates", &config.command) {
        pipeline = pipeline.stage(command);
    }
    pipeline = pipeline.stage(Rename::extension(config.extension.clone()));

    TaskDescriptor::new(
        BuildTask::Templates.as_str(),
        ctx.app_dir(),
        config.sources.clone(),
        ctx.dist_path(&config.dest),
    )
    .with_pipeline(pipeline)
}

/// Entry stylesheets → `dist/assets/styles`.
///
/// Development wraps compilation in source map capture; production adds
/// minification and never emits a map.
pub fn styles_descriptor(ctx: &BuildContext) -> TaskDescriptor {
    let config = &ctx.config().styles;
    let development = ctx.mode() == BuildMode::Development;

    let mut pipeline = Pipeline::new().stage_if(development, SourceMapInit);
    let compile = match CommandStage::from_command("styles", &config.command) {
        Some(command) => {
            pipeline = pipeline.stage(command);
            CompileStyles::new(&config.browsers).without_bundling()
        }
        None => CompileStyles::new(&config.browsers),
    };
    let pipeline = pipeline
        .stage(compile)
        .stage_if(ctx.mode().is_production(), MinifyCss::new(&config.browsers))
        .stage_if(development, SourceMapWrite);

    TaskDescriptor::new(
        BuildTask::Styles.as_str(),
        ctx.app_dir(),
        config.sources.clone(),
        ctx.dist_path(&config.dest),
    )
    .with_pipeline(pipeline)
}

/// Script entries → `dist/assets/scripts`, incremental by default.
pub fn scripts_descriptor(ctx: &BuildContext) -> TaskDescriptor {
    let config = &ctx.config().scripts;
    let mut pipeline = Pipeline::new();
    if let Some(command) = CommandStage::from_command("scripts", &config.command) {
        pipeline = pipeline.stage(command);
    }

    TaskDescriptor::new(
        BuildTask::Scripts.as_str(),
        ctx.app_dir(),
        config.sources.clone(),
        ctx.dist_path(&config.dest),
    )
    .with_pipeline(pipeline)
    .with_incremental(config.incremental)
}

pub fn images_descriptor(ctx: &BuildContext) -> TaskDescriptor {
    let config = &ctx.config().images;
    let pipeline = Pipeline::new()
        .stage_if(ctx.mode().is_production(), OptimizeImage::new(config.jpeg_quality));

    TaskDescriptor::new(
        BuildTask::Images.as_str(),
        ctx.app_dir(),
        config.sources.clone(),
        ctx.dist_path(&config.dest),
    )
    .with_pipeline(pipeline)
}

pub fn copy_descriptor(ctx: &BuildContext) -> TaskDescriptor {
    let config = &ctx.config().fonts;
    TaskDescriptor::new(
        BuildTask::Copy.as_str(),
        ctx.app_dir(),
        config.sources.clone(),
        ctx.dist_path(&config.dest),
    )
}

/// Every task of a build, ready to run.
#[derive(Debug)]
pub struct TaskSet {
    templates: TransformTask,
    styles: TransformTask,
    scripts: TransformTask,
    images: TransformTask,
    copy: TransformTask,
    icons: SpriteTask,
}

impl TaskSet {
    pub fn from_context(ctx: &BuildContext) -> Self {
        Self {
            templates: TransformTask::new(templates_descriptor(ctx)),
            styles: TransformTask::new(styles_descriptor(ctx)),
            scripts: TransformTask::new(scripts_descriptor(ctx)),
            images: TransformTask::new(images_descriptor(ctx)),
            copy: TransformTask::new(copy_descriptor(ctx)),
            icons: SpriteTask::from_context(ctx),
        }
    }

    /// The transform task behind `task`; `None` for icons.
    pub fn transform(&self, task: BuildTask) -> Option<&TransformTask> {
        match task {
            BuildTask::Templates => Some(&self.templates),
            BuildTask::Styles => Some(&self.styles),
            BuildTask::Scripts => Some(&self.scripts),
            BuildTask::Images => Some(&self.images),
            BuildTask::Copy => Some(&self.copy),
            BuildTask::Icons => None,
        }
    }

    pub fn sprite(&self) -> &SpriteTask {
        &self.icons
    }

    /// Run one task on the current thread.
    pub fn run(&self, task: BuildTask) -> Result<TaskReport, TaskError> {
        match self.transform(task) {
            Some(transform) => transform.run(),
            None => self.icons.run(),
        }
    }
}
