//! Pascal VOC XML to YOLO label conversion.

use anyhow::{Context, Result};
use glob::glob;
use log::{debug, error, info, warn};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::project::ClassMap;
use crate::resolver::{apply_resolution, LabelResolver};
use crate::types::{ConversionStats, VocAnnotation, YoloBox};
use crate::utils::{copy_file, create_progress_bar, write_list_to_file};

/// Outcome of converting one annotation file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileConversion {
    pub boxes_written: usize,
    pub discarded_boxes: usize,
    pub rewritten: bool,
}

/// Parse a VOC annotation and normalize every box.
///
/// Returns the object labels in document order alongside their boxes. A box
/// whose label is not in the class map gets class index `-1`.
pub fn read_xml_label_file(
    file_path: &Path,
    class_map: &ClassMap,
) -> Result<(Vec<String>, Vec<YoloBox>)> {
    let xml_content = fs::read_to_string(file_path)
        .with_context(|| format!("failed to read annotation file {}", file_path.display()))?;
    let annotation: VocAnnotation = serde_xml_rs::from_str(&xml_content)
        .with_context(|| format!("failed to parse annotation file {}", file_path.display()))?;

    let image_width = annotation.size.width;
    let image_height = annotation.size.height;
    let mut labels = Vec::with_capacity(annotation.objects.len());
    let mut bboxes = Vec::with_capacity(annotation.objects.len());
    for object in &annotation.objects {
        let label = object.name.trim().to_string();
        let class_index = class_map.lookup(&label).unwrap_or(-1);
        bboxes.push(YoloBox::from_corners(
            class_index,
            &object.bndbox,
            image_width,
            image_height,
        ));
        labels.push(label);
    }
    Ok((labels, bboxes))
}

/// Ask `resolver` about every label missing from the class map and record the
/// answers. Labels already known never reach the resolver.
pub fn fix_broken_labels(
    labels: &[String],
    class_map: &mut ClassMap,
    resolver: &mut dyn LabelResolver,
) -> Result<()> {
    for label in labels {
        if class_map.is_known(label) {
            continue;
        }
        warn!("Unable to find label: {}", label);
        let resolution = resolver.resolve_unknown_label(label, class_map.classes())?;
        apply_resolution(class_map, label, &resolution)?;
    }
    Ok(())
}

fn backup_path(file_path: &Path) -> PathBuf {
    let mut backup: OsString = file_path.as_os_str().to_owned();
    backup.push(".org");
    PathBuf::from(backup)
}

/// Rewrite object names in a VOC file to their mapped class names and remove
/// discarded objects. The original is kept as `<file>.org` (an existing
/// backup is never replaced).
pub fn update_xml_label_file(file_path: &Path, class_map: &ClassMap) -> Result<()> {
    let file = File::open(file_path)
        .with_context(|| format!("failed to open annotation file {}", file_path.display()))?;
    let mut root = Element::parse(BufReader::new(file))
        .with_context(|| format!("failed to parse annotation file {}", file_path.display()))?;

    let mut kept = Vec::with_capacity(root.children.len());
    for node in root.children.drain(..) {
        let mut element = match node {
            XMLNode::Element(element) if element.name == "object" => element,
            other => {
                kept.push(other);
                continue;
            }
        };
        let label = element
            .get_child("name")
            .and_then(|name| name.get_text())
            .map(|text| text.trim().to_string())
            .unwrap_or_default();
        match class_map.lookup(&label) {
            Some(-1) => {
                debug!("Removing discarded object '{}'", label);
                continue;
            }
            Some(index) => {
                if let (Some(class_name), Some(name)) =
                    (class_map.class_name(index), element.get_mut_child("name"))
                {
                    name.children = vec![XMLNode::Text(class_name.to_string())];
                }
            }
            None => warn!("No match for label: {}", label),
        }
        kept.push(XMLNode::Element(element));
    }
    root.children = kept;

    let orig_file = backup_path(file_path);
    if let Err(e) = copy_file(file_path, &orig_file) {
        error!("Failed to copy labels to file {}: {}", orig_file.display(), e);
    }

    let writer = BufWriter::new(
        File::create(file_path)
            .with_context(|| format!("failed to create {}", file_path.display()))?,
    );
    root.write_with_config(writer, EmitterConfig::new().perform_indent(true))
        .with_context(|| {
            format!("failed to save annotation labels to {}", file_path.display())
        })?;
    Ok(())
}

/// Write one `<class> <cx> <cy> <w> <h>` line per box
pub fn save_txt_label_file(bounding_boxes: &[YoloBox], file_path: &Path) -> Result<()> {
    let lines: Vec<String> = bounding_boxes.iter().map(YoloBox::to_line).collect();
    write_list_to_file(&lines, file_path)
}

/// Convert one VOC file into its sibling `.txt` label file, resolving unknown
/// labels through `resolver` and rewriting the XML when any object label is
/// not literally one of the classes.
pub fn convert_xml_file(
    file_path: &Path,
    class_map: &mut ClassMap,
    resolver: &mut dyn LabelResolver,
) -> Result<FileConversion> {
    let (labels, bboxes) = read_xml_label_file(file_path, class_map)?;
    let mut conversion = FileConversion::default();

    let needs_rewrite = labels.iter().any(|label| !class_map.is_class(label));
    let bboxes = if needs_rewrite {
        fix_broken_labels(&labels, class_map, resolver)?;
        let mut new_bboxes = Vec::with_capacity(bboxes.len());
        for (label, bbox) in labels.iter().zip(bboxes) {
            match class_map.lookup(label) {
                Some(index) if index != -1 => new_bboxes.push(YoloBox {
                    class_index: index,
                    ..bbox
                }),
                _ => conversion.discarded_boxes += 1,
            }
        }
        update_xml_label_file(file_path, class_map)?;
        conversion.rewritten = true;
        new_bboxes
    } else {
        bboxes
    };

    save_txt_label_file(&bboxes, &file_path.with_extension("txt"))?;
    conversion.boxes_written = bboxes.len();
    Ok(conversion)
}

/// Convert every `*.xml` directly inside `folder_path`. A file that fails is
/// logged and counted; the pass continues with the next file.
pub fn convert_xml_files(
    folder_path: &Path,
    class_map: &mut ClassMap,
    resolver: &mut dyn LabelResolver,
) -> ConversionStats {
    let mut stats = ConversionStats::new();
    let pattern = folder_path.join("*.xml");
    let mut files: Vec<PathBuf> = match glob(&pattern.to_string_lossy()) {
        Ok(entries) => entries.filter_map(|entry| entry.ok()).collect(),
        Err(e) => {
            error!("Invalid annotation pattern {}: {}", pattern.display(), e);
            return stats;
        }
    };
    files.sort();
    if files.is_empty() {
        return stats;
    }

    info!(
        "Converting {} xml label files in {}",
        files.len(),
        folder_path.display()
    );
    let pb = create_progress_bar(files.len() as u64, "Labels");
    for file in &files {
        stats.total_files_processed += 1;
        match convert_xml_file(file, class_map, resolver) {
            Ok(conversion) => {
                stats.successful_conversions += 1;
                stats.discarded_boxes += conversion.discarded_boxes;
                if conversion.rewritten {
                    stats.rewritten_annotations += 1;
                }
            }
            Err(e) => {
                error!("Failed to convert {}: {:#}", file.display(), e);
                stats.failed_conversions += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Label conversion complete");
    stats
}
