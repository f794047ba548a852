//! Moving images from the raw-data folder into the labeling folder.

use anyhow::Result;
use log::{error, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::{
    check_image_file, clean_destination, copy_file, get_folder_files, get_folder_list,
    make_folder, with_extension,
};

/// Rename image, XML and TXT files whose names contain spaces so the name uses
/// underscores instead. An existing file with the target name is replaced.
/// Returns the original paths of the renamed files.
pub fn fix_data_files(source_path: &Path) -> Vec<PathBuf> {
    let mut fixed_files = Vec::new();
    if !source_path.exists() {
        warn!("Source update folder not found: {}", source_path.display());
        return fixed_files;
    }
    for source_folder in get_folder_list(source_path) {
        let folder_files = get_folder_files(&source_folder);
        let files = folder_files
            .img_files
            .iter()
            .chain(folder_files.xml_files.iter())
            .chain(folder_files.txt_files.iter());
        for file in files {
            let cfile = file.replace(' ', "_");
            if *file == cfile {
                continue;
            }
            let old_file_name = source_folder.join(file);
            let new_file_name = source_folder.join(&cfile);
            if new_file_name.exists() {
                if let Err(e) = fs::remove_file(&new_file_name) {
                    error!("Failed to remove {}: {}", new_file_name.display(), e);
                    continue;
                }
            }
            match fs::rename(&old_file_name, &new_file_name) {
                Ok(()) => fixed_files.push(old_file_name),
                Err(e) => error!("Failed to rename {}: {}", old_file_name.display(), e),
            }
        }
    }
    if !fixed_files.is_empty() {
        info!("Renamed {} files containing spaces", fixed_files.len());
    }
    fixed_files
}

/// Queue the `.xml` / `.txt` annotations sitting next to `image` in
/// `source_folder`, skipping names listed in `skip`.
fn push_annotation_files(
    source_folder: &Path,
    image: &str,
    skip: &HashSet<&str>,
    copy_files: &mut Vec<String>,
) {
    for ext in ["xml", "txt"] {
        let annotation = with_extension(image, ext);
        if !skip.contains(annotation.as_str()) && source_folder.join(&annotation).exists() {
            copy_files.push(annotation);
        }
    }
}

/// Bring each sub-folder of `source_path` into `output_path` until
/// `use_percent_data` percent of its images are present there.
///
/// Below 100 percent images are drawn at random; at 100 percent they are taken
/// in order. Every candidate must decode as an image. The attempt budget per
/// folder is ten times its image count. Returns the source paths of all
/// images now present in the labeling folders.
pub fn update_labeling_data<R: Rng + ?Sized>(
    source_path: &Path,
    output_path: &Path,
    use_percent_data: f64,
    rng: &mut R,
) -> Result<Vec<PathBuf>> {
    let mut imgs_list = Vec::new();
    if !source_path.exists() {
        warn!("Source update folder not found: {}", source_path.display());
        return Ok(imgs_list);
    }
    make_folder(output_path)?;

    let folders_to_process = get_folder_list(source_path);
    info!("Updating from {} source folders", folders_to_process.len());
    for source_folder in folders_to_process {
        let source = get_folder_files(&source_folder);
        let source_name = match source_folder.file_name() {
            Some(name) => name.to_owned(),
            None => continue,
        };
        let output_folder = output_path.join(source_name);
        let existing = if output_folder.exists() {
            get_folder_files(&output_folder)
        } else {
            info!("Creating label folder: {}", output_folder.display());
            make_folder(&output_folder)?;
            Default::default()
        };

        let num_images = source.img_files.len();
        if num_images == 0 {
            continue;
        }
        let mut limg_files = existing.img_files.clone();
        let mut chosen: HashSet<String> = limg_files.iter().cloned().collect();
        let skip: HashSet<&str> = existing
            .xml_files
            .iter()
            .chain(existing.txt_files.iter())
            .map(|name| name.as_str())
            .collect();

        let mut label_percent = limg_files.len() as f64 / num_images as f64 * 100.0;
        info!(
            "Updating folder {} with stats [{}, {}, {:.1}]",
            source_folder.display(),
            num_images,
            limg_files.len(),
            label_percent
        );

        let mut copy_files: Vec<String> = Vec::new();
        let mut attempts = 0;
        while label_percent < use_percent_data && attempts < 10 * num_images {
            let random_img = if use_percent_data < 100.0 {
                match source.img_files.choose(rng) {
                    Some(img) => img,
                    None => break,
                }
            } else if attempts < num_images {
                &source.img_files[attempts]
            } else {
                break;
            };
            attempts += 1;

            if !chosen.contains(random_img) {
                let random_img_path = source_folder.join(random_img);
                if !check_image_file(&random_img_path) {
                    warn!("Skipping bad image file: {}", random_img_path.display());
                } else {
                    chosen.insert(random_img.clone());
                    limg_files.push(random_img.clone());
                    copy_files.push(random_img.clone());
                    push_annotation_files(&source_folder, random_img, &skip, &mut copy_files);
                }
            }
            label_percent = limg_files.len() as f64 / num_images as f64 * 100.0;
        }
        info!("Finished label data selection with attempts: {}", attempts);

        info!(
            "Copying {} files to folder: {}",
            copy_files.len(),
            output_folder.display()
        );
        for file in &copy_files {
            if let Err(e) = copy_file(&source_folder.join(file), &output_folder.join(file)) {
                error!("{:#}", e);
            }
        }

        // Only images that actually landed in the labeling folder are listed
        imgs_list.extend(
            limg_files
                .iter()
                .filter(|img| {
                    let destination = output_folder.join(img);
                    destination.exists() || clean_destination(&destination).exists()
                })
                .map(|img| source_folder.join(img)),
        );
    }
    Ok(imgs_list)
}

/// Copy up to `random_data_size` valid images (with their annotations) drawn
/// from `source_image_list` into a fresh `<random_folder_path>_<n>` folder,
/// using the first unused `n`. Returns the chosen images.
pub fn create_random_data_set<R: Rng + ?Sized>(
    source_image_list: &[PathBuf],
    random_folder_path: &Path,
    random_data_size: usize,
    rng: &mut R,
) -> Result<Vec<PathBuf>> {
    let num_images = source_image_list.len();
    info!(
        "Starting random data selection with num_images: {}",
        num_images
    );
    let random_data_size = random_data_size.min(num_images);
    if random_data_size == 0 {
        return Ok(Vec::new());
    }

    let mut ind = 1;
    let random_folder = loop {
        let candidate = PathBuf::from(format!("{}_{}", random_folder_path.display(), ind));
        if !candidate.exists() {
            break candidate;
        }
        ind += 1;
    };
    make_folder(&random_folder)?;

    let mut img_files: Vec<PathBuf> = Vec::new();
    let mut copy_files: Vec<PathBuf> = Vec::new();
    let mut chosen: HashSet<&Path> = HashSet::new();
    let mut attempts = 0;
    while img_files.len() < random_data_size && attempts < 10 * num_images {
        attempts += 1;
        let random_img = match source_image_list.choose(rng) {
            Some(img) => img,
            None => break,
        };
        if !check_image_file(random_img) {
            warn!("Skipping bad image file: {}", random_img.display());
        } else if chosen.insert(random_img.as_path()) {
            img_files.push(random_img.clone());
            copy_files.push(random_img.clone());
            for ext in ["xml", "txt"] {
                let annotation = random_img.with_extension(ext);
                if annotation.exists() {
                    copy_files.push(annotation);
                }
            }
        }
    }
    info!("Finished random data selection with attempts: {}", attempts);

    for file in &copy_files {
        let Some(file_name) = file.file_name() else {
            continue;
        };
        if let Err(e) = fs::copy(file, random_folder.join(file_name)) {
            error!("Failed to copy {}: {}", file.display(), e);
        }
    }
    Ok(img_files)
}

/// Delete images in `folder_path` that fail to decode, together with their
/// `.xml` and `.txt` annotations. Returns the deleted image paths.
pub fn remove_bad_label_files(folder_path: &Path) -> Result<Vec<PathBuf>> {
    info!("Checking for bad images in folder: {}", folder_path.display());
    let mut removed = Vec::new();
    for image in get_folder_files(folder_path).img_files {
        let image_file = folder_path.join(&image);
        if check_image_file(&image_file) {
            continue;
        }
        warn!("Deleting bad image file: {}", image_file.display());
        fs::remove_file(&image_file)?;
        for ext in ["xml", "txt"] {
            let label_file = image_file.with_extension(ext);
            if label_file.exists() {
                warn!("Deleting label file for bad image: {}", label_file.display());
                fs::remove_file(&label_file)?;
            }
        }
        removed.push(image_file);
    }
    Ok(removed)
}
