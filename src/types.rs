use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

// Image extensions recognised in project folders (matched case-sensitively)
pub const IMAGE_FILE_TYPES: &[&str] = &["jpg", "JPG", "jpeg", "png", "PNG"];

pub const PROJECT_FILE: &str = "project_settings.yaml";
pub const DATA_RAW_FOLDER: &str = "data_raw";
pub const DATA_LABEL_FOLDER: &str = "data_labeling";
pub const MODEL_TRAIN_FOLDER: &str = "model_training";
pub const MODEL_DEPLOY_FOLDER: &str = "model_deploy";

pub const RANDOM_FILE_NAME: &str = "random_set";
pub const CLASSES_FILE_NAME: &str = "classes.txt";
pub const STATS_FILE_NAME: &str = "stats.yaml";
pub const TRAIN_DICT_FILE_NAME: &str = "train_info_dict.yaml";
pub const CUSTOM_FILE_NAME: &str = "data_custom.yaml";
pub const BEST_FILE_NAME: &str = "best.pt";
pub const RESULTS_FILE_NAME: &str = "results.csv";
pub const MODEL_INFO_FILE_NAME: &str = "model_info.yaml";

pub const TRAIN_MANIFEST_NAME: &str = "train_data.txt";
pub const VAL_MANIFEST_NAME: &str = "val_data.txt";
pub const TEST_MANIFEST_NAME: &str = "test_data.txt";

pub const MODEL_TYPE: &str = "detection";

pub const VAL_DATA_PERCENTAGE: u32 = 10;
pub const TEST_DATA_PERCENTAGE: u32 = 10;

static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<&'static str>> = OnceLock::new();

/// Whether `ext` (without the leading dot) is one of [`IMAGE_FILE_TYPES`]
pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS_SET
        .get_or_init(|| IMAGE_FILE_TYPES.iter().copied().collect())
        .contains(ext)
}

// Pascal VOC annotation as written by labelImg. Only the fields needed for
// conversion are modelled; everything else in the document is ignored.
#[derive(Debug, Deserialize, Clone)]
pub struct VocAnnotation {
    pub size: VocSize,
    #[serde(rename = "object", default)]
    pub objects: Vec<VocObject>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VocSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VocObject {
    pub name: String,
    pub bndbox: VocBndBox,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct VocBndBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// A bounding box in YOLO form: class index plus center and size normalized
/// by the image dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloBox {
    pub class_index: i64,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl YoloBox {
    /// Normalize pixel-space corners against an `image_width` x `image_height` image
    pub fn from_corners(
        class_index: i64,
        bndbox: &VocBndBox,
        image_width: f64,
        image_height: f64,
    ) -> Self {
        let absolute_x = bndbox.xmin + 0.5 * (bndbox.xmax - bndbox.xmin);
        let absolute_y = bndbox.ymin + 0.5 * (bndbox.ymax - bndbox.ymin);
        let absolute_width = bndbox.xmax - bndbox.xmin;
        let absolute_height = bndbox.ymax - bndbox.ymin;

        Self {
            class_index,
            x_center: absolute_x / image_width,
            y_center: absolute_y / image_height,
            width: absolute_width / image_width,
            height: absolute_height / image_height,
        }
    }

    /// Inverse of [`YoloBox::from_corners`]
    pub fn to_corners(&self, image_width: f64, image_height: f64) -> VocBndBox {
        let half_width = 0.5 * self.width * image_width;
        let half_height = 0.5 * self.height * image_height;
        let x_center = self.x_center * image_width;
        let y_center = self.y_center * image_height;
        VocBndBox {
            xmin: x_center - half_width,
            ymin: y_center - half_height,
            xmax: x_center + half_width,
            ymax: y_center + half_height,
        }
    }

    /// One label-file line: `<class> <cx> <cy> <w> <h>` with 6 decimals
    pub fn to_line(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_index, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// Image, XML and TXT file names found directly inside one folder
#[derive(Debug, Default, Clone)]
pub struct FolderFiles {
    pub img_files: Vec<String>,
    pub xml_files: Vec<String>,
    pub txt_files: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStats {
    pub num_img_files: usize,
    pub num_xml_files: usize,
    pub num_txt_files: usize,
}

pub type StatsDict = IndexMap<String, FolderStats>;

// Counters for a folder-wide XML conversion pass
#[derive(Debug, Default, Clone)]
pub struct ConversionStats {
    pub total_files_processed: usize,
    pub successful_conversions: usize,
    pub rewritten_annotations: usize,
    pub discarded_boxes: usize,
    pub failed_conversions: usize,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &ConversionStats) {
        self.total_files_processed += other.total_files_processed;
        self.successful_conversions += other.successful_conversions;
        self.rewritten_annotations += other.rewritten_annotations;
        self.discarded_boxes += other.discarded_boxes;
        self.failed_conversions += other.failed_conversions;
    }

    pub fn print_summary(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!("Total annotation files: {}", self.total_files_processed);
        log::info!("Successful conversions: {}", self.successful_conversions);
        log::info!("Rewritten annotations: {}", self.rewritten_annotations);
        log::info!("Discarded boxes: {}", self.discarded_boxes);
        if self.failed_conversions > 0 {
            log::warn!("Failed conversions: {}", self.failed_conversions);
        }
    }
}
