//! External program stage.
//!
//! Template engines and script bundlers are reached through their command
//! line: the asset is written to the program's stdin and its stdout becomes
//! the new contents.

use crate::build::{Asset, Stage, StageError};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

/// Placeholder replaced by the source path in command arguments
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Pipes an asset through an external program.
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandStage {
    /// Build a stage from a `[program, args...]` list.
    ///
    /// Returns `None` for an empty list.
    pub fn from_command(name: impl Into<String>, command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self { name: name.into(), program: program.clone(), args: args.to_vec() })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn expand_args(&self, asset: &Asset) -> Vec<String> {
        let file = asset.source.display().to_string();
        self.args.iter().map(|arg| arg.replace(FILE_PLACEHOLDER, &file)).collect()
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, asset: Asset) -> Result<Asset, StageError> {
        let mut child = Command::new(&self.program)
            .args(self.expand_args(&asset))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    StageError::command(&self.name, format!("`{}` not found in PATH", self.program))
                }
                _ => StageError::io(&self.name, e),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StageError::command(&self.name, "stdin was not captured"))?;
        let input = asset.contents.clone();
        // Feed stdin on its own thread so a full stdout pipe cannot deadlock us
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output().map_err(|e| StageError::io(&self.name, e))?;

        match writer.join() {
            Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => {
                return Err(StageError::io(&self.name, e));
            }
            Err(_) => return Err(StageError::command(&self.name, "stdin writer panicked")),
            _ => {}
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StageError::command(
                &self.name,
                format!("`{}` exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }

        Ok(asset.with_contents(output.stdout))
    }
}
