//! YOLO detector project tooling
//!
//! This library prepares Pascal VOC labeled image folders for YOLO detector
//! training: it samples raw images into labeling folders, converts XML
//! annotations to YOLO label files, maintains train/val/test manifests and
//! packages trained weights for deployment.

pub mod config;
pub mod dataset;
pub mod deploy;
pub mod external;
pub mod labels;
pub mod pipeline;
pub mod project;
pub mod resolver;
pub mod stats;
pub mod sync;
pub mod train;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Args, Command};
pub use dataset::{update_train_files, DatasetDescriptor, PartitionReport, SplitData};
pub use deploy::{copy_best_model, deploy_model, write_model_yaml_file, ModelDescriptor};
pub use labels::{convert_xml_file, convert_xml_files, read_xml_label_file};
pub use pipeline::{initialize_project, label_folder_session, InitOptions};
pub use project::{ClassMap, Project, ProjectPaths, ProjectSettings};
pub use resolver::{LabelResolver, Resolution, ScriptedResolver, UnknownLabelPolicy};
pub use sync::{create_random_data_set, update_labeling_data};
pub use types::{ConversionStats, YoloBox};
