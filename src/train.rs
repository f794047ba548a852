//! Preparing a training session in the project's training folder.

use anyhow::{Context, Result};
use log::{error, info, warn};
use rand::Rng;
use std::fs;

use crate::dataset::{update_train_files, PartitionReport};
use crate::deploy::copy_best_model;
use crate::external::TrainRequest;
use crate::project::Project;
use crate::sync::fix_data_files;
use crate::types::{BEST_FILE_NAME, TRAIN_DICT_FILE_NAME};
use crate::utils::{get_folder_list, make_folder, read_yaml, write_yaml};

/// Base model recorded by the previous session, if a snapshot exists
pub fn last_base_model(project: &Project) -> Option<String> {
    let train_dict_file = project.paths.train_folder.join(TRAIN_DICT_FILE_NAME);
    if !train_dict_file.exists() {
        return None;
    }
    match read_yaml::<serde_yaml::Value>(&train_dict_file) {
        Ok(value) => value
            .get("BASE_MODEL")
            .and_then(|model| model.as_str())
            .map(|model| model.to_string()),
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    }
}

/// Delete every run folder under the training folder when the base model
/// changed since the last session. Returns whether a reset happened.
pub fn reset_training_session(project: &Project) -> Result<bool> {
    let last_model = match last_base_model(project) {
        Some(model) => model,
        None => return Ok(false),
    };
    if last_model == project.settings.base_model {
        return Ok(false);
    }
    info!(
        "Resetting training session for new base model: {}",
        project.settings.base_model
    );
    for folder in get_folder_list(&project.paths.train_folder) {
        match fs::remove_dir_all(&folder) {
            Ok(()) => info!("Old training folder {} deleted", folder.display()),
            Err(e) => error!("Failed to delete {}: {}", folder.display(), e),
        }
    }
    Ok(true)
}

/// Pick the model the next run starts from: the newest `best.pt` of earlier
/// runs (copied to the training folder root) or the configured base model.
pub fn prepare_start_model(project: &Project) -> Result<String> {
    let last_best_file = project.paths.train_folder.join(BEST_FILE_NAME);
    if last_best_file.exists() {
        fs::remove_file(&last_best_file)
            .with_context(|| format!("failed to delete {}", last_best_file.display()))?;
        info!("Old best training file {} removed", last_best_file.display());
    }
    match copy_best_model(&project.paths.train_folder, &last_best_file)? {
        Some(best_model_path) if last_best_file.exists() => {
            info!("Resuming from {}", best_model_path.display());
            Ok(last_best_file.to_string_lossy().into_owned())
        }
        _ => Ok(project.settings.base_model.clone()),
    }
}

/// Refresh the split manifests and session state, returning the trainer
/// arguments for this run.
pub fn prepare_training<R: Rng + ?Sized>(
    project: &Project,
    rng: &mut R,
) -> Result<(TrainRequest, PartitionReport)> {
    let paths = &project.paths;
    make_folder(&paths.train_folder)?;
    fix_data_files(&paths.label_folder);

    info!("Updating training files in: {}", paths.train_folder.display());
    let report = update_train_files(
        &paths.label_folder,
        &paths.train_folder,
        project.class_map.classes(),
        project.val_percentage(),
        project.test_percentage(),
        rng,
    )?;

    reset_training_session(project)?;
    let start_model = prepare_start_model(project)?;
    write_yaml(
        &project.settings,
        &paths.train_folder.join(TRAIN_DICT_FILE_NAME),
    )?;

    let request = TrainRequest {
        model: start_model,
        data: paths.train_file.clone(),
        epochs: project.settings.num_epochs,
        image_size: project.settings.image_size,
        batch_size: project.settings.batch_size,
        name: project.settings.model_name.clone(),
    };
    Ok((request, report))
}
