//! Project settings and folder layout.
//!
//! A project folder holds `project_settings.yaml` plus four working folders:
//! raw data, labeling, training and deployment. The [`Project`] is loaded once
//! per command and is the only place that writes the settings file back.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{
    CLASSES_FILE_NAME, CUSTOM_FILE_NAME, DATA_LABEL_FOLDER, DATA_RAW_FOLDER, MODEL_DEPLOY_FOLDER,
    MODEL_TRAIN_FOLDER, PROJECT_FILE, TEST_DATA_PERCENTAGE, VAL_DATA_PERCENTAGE,
};
use crate::utils::{get_folder_list, make_folder, read_yaml, write_list_to_file, write_yaml};

/// Contents of `project_settings.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ProjectSettings {
    pub model_name: String,
    pub description: String,
    pub classes: Vec<String>,
    pub use_percent_data: f64,
    pub random_data_size: usize,
    pub base_model: String,
    pub image_size: u32,
    pub num_epochs: u32,
    pub batch_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes_dict: Option<IndexMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_data_percentage: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data_percentage: Option<u32>,
    // Keys this tool does not know about survive a rewrite untouched
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

/// Ordered class list plus the label -> index mapping used during conversion.
///
/// The mapping may hold aliases (labels that are not themselves classes but
/// map onto one) and discarded labels mapped to `-1`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassMap {
    classes: Vec<String>,
    classes_dict: IndexMap<String, i64>,
}

impl ClassMap {
    /// Build from a class list, deriving `label -> position` for every class
    pub fn new(classes: Vec<String>) -> Self {
        let classes_dict = create_classes_dict(&classes);
        Self {
            classes,
            classes_dict,
        }
    }

    /// Build from a saved mapping. Classes missing from it are mapped to their
    /// list position.
    pub fn with_dict(classes: Vec<String>, mut classes_dict: IndexMap<String, i64>) -> Self {
        for (i, label) in classes.iter().enumerate() {
            classes_dict.entry(label.clone()).or_insert(i as i64);
        }
        Self {
            classes,
            classes_dict,
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn classes_dict(&self) -> &IndexMap<String, i64> {
        &self.classes_dict
    }

    /// Mapped index of `label`; `Some(-1)` for a discarded label
    pub fn lookup(&self, label: &str) -> Option<i64> {
        self.classes_dict.get(label).copied()
    }

    pub fn is_known(&self, label: &str) -> bool {
        self.classes_dict.contains_key(label)
    }

    pub fn is_class(&self, label: &str) -> bool {
        self.classes.iter().any(|class| class == label)
    }

    /// Index of the class named `label`, appending it when missing
    pub fn add_class(&mut self, label: &str) -> i64 {
        let index = match self.classes.iter().position(|class| class == label) {
            Some(position) => position,
            None => {
                self.classes.push(label.to_string());
                self.classes.len() - 1
            }
        };
        index as i64
    }

    /// Record `label -> index` in the mapping
    pub fn map_label(&mut self, label: &str, index: i64) {
        self.classes_dict.insert(label.to_string(), index);
    }

    /// Class name for a mapped index, `None` for `-1` or out of range
    pub fn class_name(&self, index: i64) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.classes.get(index))
            .map(|class| class.as_str())
    }
}

pub fn create_classes_dict(classes: &[String]) -> IndexMap<String, i64> {
    classes
        .iter()
        .enumerate()
        .map(|(i, label)| (label.clone(), i as i64))
        .collect()
}

/// Canonical paths derived from the project folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub project_folder: PathBuf,
    pub data_folder: PathBuf,
    pub label_folder: PathBuf,
    pub train_folder: PathBuf,
    pub deploy_folder: PathBuf,
    pub classes_file: PathBuf,
    pub train_file: PathBuf,
    pub project_file: PathBuf,
}

impl ProjectPaths {
    pub fn new(project_folder: &Path) -> Self {
        let label_folder = project_folder.join(DATA_LABEL_FOLDER);
        let train_folder = project_folder.join(MODEL_TRAIN_FOLDER);
        Self {
            project_folder: project_folder.to_path_buf(),
            data_folder: project_folder.join(DATA_RAW_FOLDER),
            classes_file: label_folder.join(CLASSES_FILE_NAME),
            train_file: train_folder.join(CUSTOM_FILE_NAME),
            deploy_folder: project_folder.join(MODEL_DEPLOY_FOLDER),
            project_file: project_folder.join(PROJECT_FILE),
            label_folder,
            train_folder,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    pub paths: ProjectPaths,
    pub settings: ProjectSettings,
    pub class_map: ClassMap,
}

impl Project {
    /// Load `project_settings.yaml` from `project_folder`.
    ///
    /// The folder is canonicalized so every derived path (and every path
    /// written into a split manifest) is absolute.
    pub fn load(project_folder: &Path) -> Result<Self> {
        if !project_folder.exists() {
            bail!("project folder not found: {}", project_folder.display());
        }
        let project_folder = fs::canonicalize(project_folder)
            .with_context(|| format!("failed to resolve {}", project_folder.display()))?;
        let paths = ProjectPaths::new(&project_folder);
        if !paths.project_file.exists() {
            bail!(
                "failed to find project settings file: {}",
                paths.project_file.display()
            );
        }
        info!(
            "Importing project settings from file: {}",
            paths.project_file.display()
        );
        let mut settings: ProjectSettings = read_yaml(&paths.project_file)?;
        let classes_dict = settings
            .classes_dict
            .get_or_insert_with(|| create_classes_dict(&settings.classes))
            .clone();
        let class_map = ClassMap::with_dict(settings.classes.clone(), classes_dict);

        Ok(Self {
            paths,
            settings,
            class_map,
        })
    }

    pub fn val_percentage(&self) -> u32 {
        self.settings
            .val_data_percentage
            .unwrap_or(VAL_DATA_PERCENTAGE)
    }

    pub fn test_percentage(&self) -> u32 {
        self.settings
            .test_data_percentage
            .unwrap_or(TEST_DATA_PERCENTAGE)
    }

    /// `<MODEL_NAME>_<BASE_MODEL without .pt>_<IMAGE_SIZE>`
    pub fn deploy_name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.settings.model_name,
            self.settings.base_model.replace(".pt", ""),
            self.settings.image_size
        )
    }

    /// Create the labeling, training and deployment folders when missing
    pub fn ensure_folders(&self) -> Result<()> {
        make_folder(&self.paths.label_folder)?;
        make_folder(&self.paths.train_folder)?;
        make_folder(&self.paths.deploy_folder)?;
        Ok(())
    }

    /// Adopt `class_map` and rewrite the settings file if it differs from the
    /// loaded classes. Returns whether anything was written.
    pub fn update_classes(&mut self, class_map: &ClassMap) -> Result<bool> {
        if *class_map == self.class_map {
            return Ok(false);
        }
        self.settings.classes = class_map.classes().to_vec();
        self.settings.classes_dict = Some(class_map.classes_dict().clone());
        self.class_map = class_map.clone();
        info!(
            "Updating project settings file {} with classes {:?}",
            self.paths.project_file.display(),
            self.settings.classes
        );
        write_yaml(&self.settings, &self.paths.project_file)?;
        Ok(true)
    }
}

/// Write `classes.txt` at the labeling root and into every labeling sub-folder
pub fn write_class_files(classes: &[String], label_folder: &Path) -> Result<()> {
    make_folder(label_folder)?;
    write_list_to_file(classes, &label_folder.join(CLASSES_FILE_NAME))?;
    for folder in get_folder_list(label_folder) {
        write_list_to_file(classes, &folder.join(CLASSES_FILE_NAME))?;
    }
    Ok(())
}
