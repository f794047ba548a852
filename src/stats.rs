use anyhow::Result;
use log::{info, warn};
use rayon::prelude::*;
use std::path::Path;

use crate::types::{FolderStats, StatsDict, STATS_FILE_NAME};
use crate::utils::{get_folder_files, get_folder_list, write_yaml};

pub const ALL_FOLDERS_KEY: &str = "ALL_FOLDERS";

pub fn folder_stats(folder_path: &Path) -> FolderStats {
    let files = get_folder_files(folder_path);
    FolderStats {
        num_img_files: files.img_files.len(),
        num_xml_files: files.xml_files.len(),
        num_txt_files: files.txt_files.len(),
    }
}

/// Count images and annotations in every sub-folder of `folder_path` and write
/// the result, headed by an `ALL_FOLDERS` total, to `<folder_path>/stats.yaml`.
pub fn update_stats_file(folder_path: &Path) -> Result<StatsDict> {
    let mut stats_dict = StatsDict::new();
    if !folder_path.exists() {
        warn!("Stats update folder not found: {}", folder_path.display());
        return Ok(stats_dict);
    }
    info!("Updating stats dict for folder: {}", folder_path.display());

    let per_folder: Vec<(String, FolderStats)> = get_folder_list(folder_path)
        .par_iter()
        .filter_map(|folder| {
            let name = folder.file_name()?.to_string_lossy().into_owned();
            Some((name, folder_stats(folder)))
        })
        .collect();

    let total = per_folder
        .iter()
        .fold(FolderStats::default(), |acc, (_, stats)| FolderStats {
            num_img_files: acc.num_img_files + stats.num_img_files,
            num_xml_files: acc.num_xml_files + stats.num_xml_files,
            num_txt_files: acc.num_txt_files + stats.num_txt_files,
        });
    stats_dict.insert(ALL_FOLDERS_KEY.to_string(), total);
    stats_dict.extend(per_folder);

    write_yaml(&stats_dict, &folder_path.join(STATS_FILE_NAME))?;
    Ok(stats_dict)
}
