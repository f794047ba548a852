//! Launching the external annotation tool and trainer.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Session file the annotation tool restores its last folder and labels from
pub const LABEL_IMAGE_CONFIG_FILE: &str = ".labelImgSettings.pkl";

/// Remove the annotation tool's saved session from the home folder so it opens
/// on the requested folder. Returns the removed file, if there was one.
pub fn reset_label_tool_settings() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let config_file = Path::new(&home).join(LABEL_IMAGE_CONFIG_FILE);
    if !config_file.exists() {
        return None;
    }
    match fs::remove_file(&config_file) {
        Ok(()) => {
            info!(
                "Reset label tool config for new session {}",
                config_file.display()
            );
            Some(config_file)
        }
        Err(e) => {
            warn!("Failed to reset {}: {}", config_file.display(), e);
            None
        }
    }
}

/// Run `command` to completion, capturing its output. A non-zero exit is an
/// error carrying the captured stderr.
pub fn run_captured(command: &mut Command) -> Result<String> {
    info!("Launching {:?}", command);
    let output = command
        .output()
        .with_context(|| format!("failed to start {:?}", command.get_program()))?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        warn!("{:?} errors:\n{}", command.get_program(), stderr);
    }
    if !output.status.success() {
        bail!(
            "{:?} exited with {}: {}",
            command.get_program(),
            output.status,
            stderr.trim()
        );
    }
    Ok(stdout)
}

pub fn label_tool_command(program: &str, folder: &Path, classes_file: &Path) -> Command {
    let mut command = Command::new(program);
    command.arg(folder).arg(classes_file);
    command
}

/// Open `folder` in the annotation tool with `classes_file` as its label list
pub fn launch_label_tool(program: &str, folder: &Path, classes_file: &Path) -> Result<()> {
    let stdout = run_captured(&mut label_tool_command(program, folder, classes_file))?;
    if !stdout.trim().is_empty() {
        info!("Label tool output:\n{}", stdout);
    }
    Ok(())
}

/// Arguments of one training run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainRequest {
    pub model: String,
    pub data: PathBuf,
    pub epochs: u32,
    pub image_size: u32,
    pub batch_size: u32,
    pub name: String,
}

impl TrainRequest {
    /// `key=value` arguments following `detect train`
    pub fn args(&self) -> Vec<String> {
        vec![
            "detect".to_string(),
            "train".to_string(),
            format!("model={}", self.model),
            format!("data={}", self.data.display()),
            format!("epochs={}", self.epochs),
            format!("imgsz={}", self.image_size),
            format!("batch={}", self.batch_size),
            format!("name={}", self.name),
        ]
    }

    pub fn command<S: AsRef<OsStr>>(&self, program: S, working_dir: &Path) -> Command {
        let mut command = Command::new(program);
        command.args(self.args()).current_dir(working_dir);
        command
    }
}

/// Run the trainer in `working_dir`, streaming its output to the terminal
pub fn run_training(program: &str, request: &TrainRequest, working_dir: &Path) -> Result<()> {
    let mut command = request.command(program, working_dir);
    info!("Starting training with {:?}", command);
    let status = command
        .status()
        .with_context(|| format!("failed to start trainer {}", program))?;
    if !status.success() {
        bail!("trainer {} exited with {}", program, status);
    }
    Ok(())
}
