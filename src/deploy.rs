//! Packaging trained weights for deployment.

use anyhow::{Context, Result};
use jwalk::WalkDir;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::project::{Project, ProjectSettings};
use crate::types::{BEST_FILE_NAME, MODEL_INFO_FILE_NAME, MODEL_TYPE, RESULTS_FILE_NAME};
use crate::utils::{clean_destination, copy_file, make_folder, write_yaml};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameField {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueField {
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub image_width: ValueField,
    pub image_height: ValueField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNames {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiModel {
    pub framework: NameField,
    #[serde(rename = "type")]
    pub model_type: NameField,
    pub description: NameField,
    pub weight_file: NameField,
    pub image_size: ImageSize,
    pub classes: ClassNames,
}

/// Deployment descriptor written next to the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub ai_model: AiModel,
}

/// Base-model file name without `.pt` and without its trailing size letter,
/// e.g. `yolov8n.pt` -> `yolov8`
pub fn framework_name(base_model: &str) -> String {
    let stem = base_model.split(".pt").next().unwrap_or(base_model);
    let mut chars = stem.chars();
    chars.next_back();
    chars.as_str().to_string()
}

/// Newest file named `best.pt` anywhere below `source_folder`
pub fn find_best_model(source_folder: &Path) -> Option<PathBuf> {
    if !source_folder.exists() {
        return None;
    }
    WalkDir::new(source_folder)
        .skip_hidden(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file() && entry.file_name().to_str() == Some(BEST_FILE_NAME)
        })
        .map(|entry| {
            let path = entry.path();
            let modified = fs::metadata(&path)
                .and_then(|metadata| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .max()
        .map(|(_, path)| path)
}

// Training runs keep checkpoints in `<run>/weights/` and metrics in `<run>/results.csv`
fn results_file_for(model_path: &Path) -> PathBuf {
    let run_folder = model_path
        .ancestors()
        .find(|ancestor| ancestor.file_name().is_some_and(|name| name == "weights"))
        .and_then(|weights| weights.parent())
        .or_else(|| model_path.parent())
        .unwrap_or(model_path);
    run_folder.join(RESULTS_FILE_NAME)
}

/// Copy the newest `best.pt` under `source_folder` to `output_file_path`, plus
/// the run's `results.csv` to the same path with a `.csv` extension.
///
/// Returns the checkpoint that was copied, or `None` when no checkpoint exists
/// (the destination is then left untouched) or the copy did not land.
pub fn copy_best_model(source_folder: &Path, output_file_path: &Path) -> Result<Option<PathBuf>> {
    let found_model_path = match find_best_model(source_folder) {
        Some(path) => path,
        None => return Ok(None),
    };
    info!("Found best model file: {}", found_model_path.display());

    let output_folder_exists = output_file_path
        .parent()
        .map(|parent| parent.as_os_str().is_empty() || parent.exists())
        .unwrap_or(false);
    if !output_folder_exists {
        warn!(
            "Output folder for {} does not exist",
            output_file_path.display()
        );
        return Ok(None);
    }

    let output_path = clean_destination(output_file_path);
    if output_path.exists() {
        fs::remove_file(&output_path)
            .with_context(|| format!("failed to remove {}", output_path.display()))?;
    }
    if !copy_file(&found_model_path, &output_path)? {
        warn!("Model file {} already exists, not copied", output_path.display());
    }

    let found_results_path = results_file_for(&found_model_path);
    let output_results_path = output_path.with_extension("csv");
    if found_results_path.exists() {
        info!(
            "Copying results file {} to {}",
            found_results_path.display(),
            output_results_path.display()
        );
        if output_results_path.exists() {
            if let Err(e) = fs::remove_file(&output_results_path) {
                warn!("Failed to remove {}: {}", output_results_path.display(), e);
            }
        }
        if let Err(e) = copy_file(&found_results_path, &output_results_path) {
            error!("{:#}", e);
        }
    }

    if output_path.exists() {
        Ok(Some(found_model_path))
    } else {
        Ok(None)
    }
}

pub fn model_descriptor(settings: &ProjectSettings, weight_file: &str) -> ModelDescriptor {
    ModelDescriptor {
        ai_model: AiModel {
            framework: NameField {
                name: framework_name(&settings.base_model),
            },
            model_type: NameField {
                name: MODEL_TYPE.to_string(),
            },
            description: NameField {
                name: settings.description.clone(),
            },
            weight_file: NameField {
                name: weight_file.to_string(),
            },
            image_size: ImageSize {
                image_width: ValueField {
                    value: settings.image_size,
                },
                image_height: ValueField {
                    value: settings.image_size,
                },
            },
            classes: ClassNames {
                names: settings.classes.clone(),
            },
        },
    }
}

/// Write the model descriptor to `output_file_path`, replacing any existing
/// file. The weight file name is the descriptor's name with a `.pt` extension.
pub fn write_model_yaml_file(
    settings: &ProjectSettings,
    output_file_path: &Path,
) -> Result<ModelDescriptor> {
    let weight_file = output_file_path
        .with_extension("pt")
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let descriptor = model_descriptor(settings, &weight_file);
    if output_file_path.exists() {
        fs::remove_file(output_file_path)
            .with_context(|| format!("failed to delete {}", output_file_path.display()))?;
    }
    write_yaml(&descriptor, output_file_path)?;
    Ok(descriptor)
}

/// Copy the best checkpoint of `project` into its deployment folder and write
/// the matching descriptor. Returns the checkpoint used, if any.
pub fn deploy_model(project: &Project) -> Result<Option<PathBuf>> {
    let deploy_folder = &project.paths.deploy_folder;
    make_folder(deploy_folder)?;

    let deploy_name = project.deploy_name();
    let copy_file_path = deploy_folder.join(format!("{}.pt", deploy_name));
    let best_model_path = match copy_best_model(&project.paths.train_folder, &copy_file_path)? {
        Some(path) => path,
        None => {
            warn!(
                "No {} found in {}",
                BEST_FILE_NAME,
                project.paths.train_folder.display()
            );
            return Ok(None);
        }
    };

    let output_file_path = deploy_folder.join(format!("{}.yaml", deploy_name));
    write_model_yaml_file(&project.settings, &output_file_path)?;
    info!("Deploy model updated from: {}", best_model_path.display());

    let model_info_path = deploy_folder.join(MODEL_INFO_FILE_NAME);
    if model_info_path.exists() {
        if let Err(e) = fs::remove_file(&model_info_path) {
            warn!("Failed to remove {}: {}", model_info_path.display(), e);
        }
    }
    Ok(Some(best_model_path))
}
