//! The project workflows behind each command.

use anyhow::{bail, Result};
use log::{error, info};
use rand::Rng;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::external::{launch_label_tool, reset_label_tool_settings};
use crate::labels::convert_xml_files;
use crate::project::{write_class_files, Project};
use crate::resolver::{select_option, LabelResolver};
use crate::stats::update_stats_file;
use crate::sync::{
    create_random_data_set, fix_data_files, remove_bad_label_files, update_labeling_data,
};
use crate::types::{ConversionStats, RANDOM_FILE_NAME};
use crate::utils::get_folder_list;

/// Options of the `init` workflow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitOptions {
    pub use_percent_data: f64,
    pub remove_bad_images: bool,
}

/// Convert the annotations of every labeling sub-folder, then persist any
/// class changes through the project.
pub fn convert_label_folders(
    project: &mut Project,
    resolver: &mut dyn LabelResolver,
) -> Result<ConversionStats> {
    let mut class_map = project.class_map.clone();
    let mut stats = ConversionStats::new();
    for folder in get_folder_list(&project.paths.label_folder) {
        stats.merge(&convert_xml_files(&folder, &mut class_map, resolver));
    }
    if project.update_classes(&class_map)? {
        info!("Updated classes in project settings");
    }
    write_class_files(project.class_map.classes(), &project.paths.label_folder)?;
    Ok(stats)
}

/// Prepare the labeling folder: normalize file names, sample raw images into
/// it, draw a random review set and convert every existing annotation.
pub fn initialize_project<R: Rng + ?Sized>(
    project: &mut Project,
    options: InitOptions,
    resolver: &mut dyn LabelResolver,
    rng: &mut R,
) -> Result<ConversionStats> {
    info!("Use percent data: {}", options.use_percent_data);
    project.ensure_folders()?;
    let label_folder = project.paths.label_folder.clone();
    let data_folder = project.paths.data_folder.clone();

    fix_data_files(&label_folder);
    fix_data_files(&data_folder);
    let imgs_list =
        update_labeling_data(&data_folder, &label_folder, options.use_percent_data, rng)?;

    if options.remove_bad_images {
        for folder in get_folder_list(&label_folder) {
            match remove_bad_label_files(&folder) {
                Ok(removed) if !removed.is_empty() => {
                    info!("Removed {} bad images from {}", removed.len(), folder.display())
                }
                Ok(_) => {}
                Err(e) => error!("Failed to clean {}: {:#}", folder.display(), e),
            }
        }
    }

    let random_folder_path = label_folder.join(RANDOM_FILE_NAME);
    let random_imgs = create_random_data_set(
        &imgs_list,
        &random_folder_path,
        project.settings.random_data_size,
        rng,
    )?;
    info!("Selected {} images for the random set", random_imgs.len());

    let stats = convert_label_folders(project, resolver)?;
    stats.print_summary();

    update_stats_file(&data_folder)?;
    update_stats_file(&label_folder)?;
    Ok(stats)
}

/// Resolve the labeling sub-folder to open, by name or from a console menu
pub fn choose_label_folder<R: BufRead, W: Write>(
    project: &Project,
    folder: Option<&str>,
    input: &mut R,
    output: &mut W,
) -> Result<PathBuf> {
    let label_folder = &project.paths.label_folder;
    if !label_folder.exists() {
        bail!("failed to find required project folder: {}", label_folder.display());
    }
    if let Some(name) = folder {
        let sel_path = label_folder.join(name);
        if !sel_path.is_dir() {
            bail!("failed to find labeling folder: {}", sel_path.display());
        }
        return Ok(sel_path);
    }

    let folders = get_folder_list(label_folder);
    let names: Vec<String> = folders
        .iter()
        .filter_map(|folder| folder.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    if names.is_empty() {
        bail!("no labeling folders found in {}", label_folder.display());
    }
    writeln!(output)?;
    writeln!(output, "***********************")?;
    writeln!(output, "Select Folder to Label")?;
    writeln!(output)?;
    let options: Vec<&str> = names.iter().map(|name| name.as_str()).collect();
    let sel_ind = select_option(input, output, &options)?;
    info!("Selected labeling folder: {}", names[sel_ind]);
    Ok(label_folder.join(&names[sel_ind]))
}

/// Label one folder with the external tool, then convert its annotations and
/// refresh the labeling statistics.
pub fn label_folder_session(
    project: &mut Project,
    sel_path: &Path,
    label_tool: &str,
    resolver: &mut dyn LabelResolver,
) -> Result<ConversionStats> {
    reset_label_tool_settings();
    write_class_files(project.class_map.classes(), &project.paths.label_folder)?;

    if let Err(e) = launch_label_tool(label_tool, sel_path, &project.paths.classes_file) {
        error!("Error starting label tool {}: {:#}", label_tool, e);
    }

    info!("Converting xml files to txt files in {}", sel_path.display());
    let mut class_map = project.class_map.clone();
    let stats = convert_xml_files(sel_path, &mut class_map, resolver);
    if project.update_classes(&class_map)? {
        write_class_files(project.class_map.classes(), &project.paths.label_folder)?;
    }
    stats.print_summary();

    update_stats_file(&project.paths.label_folder)?;
    Ok(stats)
}
