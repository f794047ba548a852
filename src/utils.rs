use anyhow::{Context, Result};
use image::io::Reader as ImageReader;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::{is_image_extension, FolderFiles};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .progress_chars("#>-"),
    );
    pb
}

/// Create `path` (and any missing parents) if it does not exist yet
pub fn make_folder(path: &Path) -> Result<()> {
    if !path.exists() {
        debug!("Creating folder {}", path.display());
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create folder {}", path.display()))?;
    }
    Ok(())
}

/// Extension of a file name without the leading dot, or "" when there is none
pub fn file_extension(file_name: &str) -> &str {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
}

/// Same file name with its extension swapped, e.g. `a.jpg` -> `a.xml`
pub fn with_extension(file_name: &str, ext: &str) -> String {
    Path::new(file_name)
        .with_extension(ext)
        .to_string_lossy()
        .into_owned()
}

/// Sub-folders directly under `folder_path`, sorted by name.
/// A missing folder yields an empty list.
pub fn get_folder_list(folder_path: &Path) -> Vec<PathBuf> {
    let mut folders: Vec<PathBuf> = match fs::read_dir(folder_path) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect(),
        Err(_) => Vec::new(),
    };
    folders.sort();
    folders
}

/// Names of the regular files directly under `folder_path`, sorted
pub fn list_file_names(folder_path: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(folder_path)
        .with_context(|| format!("failed to list folder {}", folder_path.display()))?
    {
        let entry = entry?;
        if entry.path().is_dir() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Sort the files of one folder into images, XML annotations and TXT labels
pub fn get_folder_files(folder_path: &Path) -> FolderFiles {
    let mut files = FolderFiles::default();
    let names = match list_file_names(folder_path) {
        Ok(names) => names,
        Err(_) => {
            warn!("Folder not found: {}", folder_path.display());
            return files;
        }
    };
    for name in names {
        let ext = file_extension(&name);
        if is_image_extension(ext) {
            files.img_files.push(name);
        } else if ext == "xml" {
            files.xml_files.push(name);
        } else if ext == "txt" {
            files.txt_files.push(name);
        }
    }
    files
}

/// Read a newline-delimited list, dropping trailing whitespace and blank lines
pub fn read_list_from_file(file_path: &Path) -> Result<Vec<String>> {
    let file = File::open(file_path)
        .with_context(|| format!("failed to open {}", file_path.display()))?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim_end();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

pub fn write_list_to_file<S: AsRef<str>>(data_list: &[S], file_path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(
        File::create(file_path)
            .with_context(|| format!("failed to create {}", file_path.display()))?,
    );
    for data in data_list {
        writer.write_all(data.as_ref().as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_yaml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let file = File::open(file_path)
        .with_context(|| format!("failed to open {}", file_path.display()))?;
    serde_yaml::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse YAML file {}", file_path.display()))
}

pub fn write_yaml<T: Serialize>(value: &T, file_path: &Path) -> Result<()> {
    let writer = BufWriter::new(
        File::create(file_path)
            .with_context(|| format!("failed to create {}", file_path.display()))?,
    );
    serde_yaml::to_writer(writer, value)
        .with_context(|| format!("failed to write YAML file {}", file_path.display()))
}

/// Destination with spaces in its file name replaced by underscores; parent
/// folders are kept as they are
pub fn clean_destination(destination_path: &Path) -> PathBuf {
    match destination_path.file_name() {
        Some(name) => destination_path.with_file_name(name.to_string_lossy().replace(' ', "_")),
        None => destination_path.to_path_buf(),
    }
}

/// Copy `file_path` to `destination_path` with spaces in the destination file
/// name replaced by underscores. An existing destination is left alone and
/// `Ok(false)` is returned.
pub fn copy_file(file_path: &Path, destination_path: &Path) -> Result<bool> {
    let output_path = clean_destination(destination_path);
    if output_path.exists() {
        return Ok(false);
    }
    fs::copy(file_path, &output_path).with_context(|| {
        format!(
            "failed to copy {} to {}",
            file_path.display(),
            output_path.display()
        )
    })?;
    Ok(true)
}

/// True when the file has an image extension and decodes cleanly
pub fn check_image_file(file_path: &Path) -> bool {
    let ext = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    if !is_image_extension(ext) || !file_path.exists() {
        warn!("Image file not found: {}", file_path.display());
        return false;
    }
    match ImageReader::open(file_path).and_then(|reader| reader.with_guessed_format()) {
        Ok(reader) => match reader.decode() {
            Ok(_) => true,
            Err(e) => {
                debug!("Failed to decode {}: {}", file_path.display(), e);
                false
            }
        },
        Err(e) => {
            debug!("Failed to open {}: {}", file_path.display(), e);
            false
        }
    }
}
