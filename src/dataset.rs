use anyhow::Result;
use log::{error, info};
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::types::{
    is_image_extension, CUSTOM_FILE_NAME, TEST_MANIFEST_NAME, TRAIN_MANIFEST_NAME,
    VAL_MANIFEST_NAME,
};
use crate::utils::{
    create_progress_bar, file_extension, get_folder_list, list_file_names, read_list_from_file,
    write_list_to_file, write_yaml,
};

/// Image paths of the train, validation and test subsets
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitData {
    pub train_files: Vec<String>,
    pub val_files: Vec<String>,
    pub test_files: Vec<String>,
}

impl SplitData {
    /// Every path already assigned to some subset
    pub fn exist_files(&self) -> HashSet<String> {
        self.train_files
            .iter()
            .chain(self.val_files.iter())
            .chain(self.test_files.iter())
            .cloned()
            .collect()
    }
}

/// What one partitioning pass added
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartitionReport {
    pub new_train: usize,
    pub new_val: usize,
    pub new_test: usize,
    pub unlabeled_files: Vec<String>,
}

/// `data_custom.yaml` consumed by the trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub path: String,
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: usize,
    pub names: Vec<String>,
}

/// Number of items reserved for a subset: `floor(folder_size / percentage)`.
/// A percentage of 0 reserves nothing.
pub fn split_size(folder_size: usize, percentage: u32) -> usize {
    if percentage == 0 {
        0
    } else {
        folder_size / percentage as usize
    }
}

/// Draw distinct positions in `0..folder_size` for the validation and test
/// subsets. The two sets never overlap; when the folder is too small the test
/// set is shortened first.
pub fn draw_split_positions<R: Rng + ?Sized>(
    rng: &mut R,
    folder_size: usize,
    val_count: usize,
    test_count: usize,
) -> (HashSet<usize>, HashSet<usize>) {
    let total = (val_count + test_count).min(folder_size);
    let drawn = sample(rng, folder_size, total).into_vec();
    let val_count = val_count.min(total);
    let val_indexes = drawn[..val_count].iter().copied().collect();
    let test_indexes = drawn[val_count..].iter().copied().collect();
    (val_indexes, test_indexes)
}

/// Read whichever manifests already exist in `train_folder`
pub fn load_split_manifests(train_folder: &Path) -> Result<SplitData> {
    let read_if_exists = |name: &str| -> Result<Vec<String>> {
        let path = train_folder.join(name);
        if path.exists() {
            read_list_from_file(&path)
        } else {
            Ok(Vec::new())
        }
    };
    Ok(SplitData {
        train_files: read_if_exists(TRAIN_MANIFEST_NAME)?,
        val_files: read_if_exists(VAL_MANIFEST_NAME)?,
        test_files: read_if_exists(TEST_MANIFEST_NAME)?,
    })
}

/// Assign the labeled images of one labeling sub-folder to subsets.
///
/// Images are visited in file-name order; only images with a sibling `.txt`
/// label take a position. Images already listed in `exist_files` keep their
/// subset.
fn partition_folder<R: Rng + ?Sized>(
    folder: &Path,
    exist_files: &HashSet<String>,
    val_percentage: u32,
    test_percentage: u32,
    rng: &mut R,
    split_data: &mut SplitData,
    report: &mut PartitionReport,
) -> Result<()> {
    let mut labeled_files = Vec::new();
    for name in list_file_names(folder)? {
        if !is_image_extension(file_extension(&name)) {
            continue;
        }
        let image_file = folder.join(&name);
        let image_key = image_file.to_string_lossy().into_owned();
        if image_file.with_extension("txt").exists() {
            labeled_files.push(image_key);
        } else {
            report.unlabeled_files.push(image_key);
        }
    }

    let data_size = labeled_files.len();
    let data_val_size = split_size(data_size, val_percentage);
    let data_test_size = split_size(data_size, test_percentage);
    let (val_indexes, test_indexes) =
        draw_split_positions(rng, data_size, data_val_size, data_test_size);

    for (ind, image_file) in labeled_files.into_iter().enumerate() {
        if exist_files.contains(&image_file) {
            continue;
        }
        if val_indexes.contains(&ind) {
            split_data.val_files.push(image_file);
            report.new_val += 1;
        } else if test_indexes.contains(&ind) {
            split_data.test_files.push(image_file);
            report.new_test += 1;
        } else {
            split_data.train_files.push(image_file);
            report.new_train += 1;
        }
    }
    Ok(())
}

/// Extend the split manifests in `train_folder` with newly labeled images from
/// every sub-folder of `label_folder`, then write `data_custom.yaml`.
///
/// The train manifest is always rewritten. The val and test manifests are
/// only written when they do not exist yet, so once established they stay
/// fixed across runs.
pub fn update_train_files<R: Rng + ?Sized>(
    label_folder: &Path,
    train_folder: &Path,
    classes: &[String],
    val_percentage: u32,
    test_percentage: u32,
    rng: &mut R,
) -> Result<PartitionReport> {
    let mut split_data = load_split_manifests(train_folder)?;
    let exist_files = split_data.exist_files();
    let mut report = PartitionReport::default();

    info!("Processing folders in: {}", label_folder.display());
    let folders_to_process = get_folder_list(label_folder);
    let pb = create_progress_bar(folders_to_process.len() as u64, "Split");
    for folder in &folders_to_process {
        if let Err(e) = partition_folder(
            folder,
            &exist_files,
            val_percentage,
            test_percentage,
            rng,
            &mut split_data,
            &mut report,
        ) {
            error!("Failed to partition folder {}: {:#}", folder.display(), e);
        }
        pb.inc(1);
    }
    pb.finish_with_message("Split complete");

    info!(
        "Added {} train, {} val, {} test files",
        report.new_train, report.new_val, report.new_test
    );
    info!("Found {} unlabeled files", report.unlabeled_files.len());

    let train_file_path = train_folder.join(TRAIN_MANIFEST_NAME);
    let val_file_path = train_folder.join(VAL_MANIFEST_NAME);
    let test_file_path = train_folder.join(TEST_MANIFEST_NAME);
    write_list_to_file(&split_data.train_files, &train_file_path)?;
    if !val_file_path.exists() {
        write_list_to_file(&split_data.val_files, &val_file_path)?;
    }
    if !test_file_path.exists() {
        write_list_to_file(&split_data.test_files, &test_file_path)?;
    }

    create_dataset_yaml(train_folder, classes)?;
    Ok(report)
}

/// Write `data_custom.yaml` describing the manifests in `train_folder`
pub fn create_dataset_yaml(train_folder: &Path, classes: &[String]) -> Result<DatasetDescriptor> {
    let descriptor = DatasetDescriptor {
        path: train_folder.to_string_lossy().into_owned(),
        train: TRAIN_MANIFEST_NAME.to_string(),
        val: VAL_MANIFEST_NAME.to_string(),
        test: TEST_MANIFEST_NAME.to_string(),
        nc: classes.len(),
        names: classes.to_vec(),
    };
    write_yaml(&descriptor, &train_folder.join(CUSTOM_FILE_NAME))?;
    Ok(descriptor)
}
