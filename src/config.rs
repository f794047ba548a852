use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use crate::resolver::UnknownLabelPolicy;

/// Command-line arguments for preparing, training and deploying a YOLO detector project.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Project folder containing project_settings.yaml
    #[arg(short = 'p', long = "project_dir", default_value = ".", global = true)]
    pub project_dir: PathBuf,

    /// Seed for random sampling; a fresh seed is drawn when omitted
    #[arg(long = "seed", global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sync raw data into the labeling folder and convert existing annotations
    Init {
        /// Override USE_PERCENT_DATA from the settings file
        #[arg(long = "use_percent_data", value_parser = validate_percent)]
        use_percent_data: Option<f64>,

        /// How to handle annotation labels missing from the class list
        #[arg(long = "unknown_labels", value_enum, default_value = "prompt")]
        unknown_labels: UnknownLabelPolicy,

        /// Delete undecodable images (and their annotations) from the labeling folders
        #[arg(long = "remove_bad_images")]
        remove_bad_images: bool,
    },

    /// Open a labeling folder in the annotation tool, then convert its annotations
    Label {
        /// Labeling sub-folder to open; chosen from a menu when omitted
        #[arg(long = "folder")]
        folder: Option<String>,

        /// Annotation tool executable
        #[arg(long = "label_tool", default_value = "labelImg")]
        label_tool: String,

        /// How to handle annotation labels missing from the class list
        #[arg(long = "unknown_labels", value_enum, default_value = "prompt")]
        unknown_labels: UnknownLabelPolicy,
    },

    /// Update the train/val/test manifests and the dataset descriptor
    Split,

    /// Update the manifests and run the trainer
    Train {
        /// Trainer executable
        #[arg(long = "trainer", default_value = "yolo")]
        trainer: String,

        /// Prepare the session without launching the trainer
        #[arg(long = "skip_training")]
        skip_training: bool,
    },

    /// Copy the best checkpoint and its descriptor into the deployment folder
    Deploy,
}

// Validate that the percentage is between 0 and 100
pub fn validate_percent(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=100.0).contains(&val) => Ok(val),
        _ => Err("PERCENT must be between 0 and 100".to_string()),
    }
}
