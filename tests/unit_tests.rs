#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;
    use std::process::Command;

    use yolo_detector_trainer::config::validate_percent;
    use yolo_detector_trainer::dataset::{draw_split_positions, split_size};
    use yolo_detector_trainer::deploy::{framework_name, model_descriptor};
    use yolo_detector_trainer::external::{run_captured, TrainRequest};
    use yolo_detector_trainer::resolver::{apply_resolution, select_option, ConsoleResolver};
    use yolo_detector_trainer::types::{is_image_extension, VocBndBox};
    use yolo_detector_trainer::utils::{file_extension, with_extension};
    use yolo_detector_trainer::{
        ClassMap, LabelResolver, ProjectSettings, Resolution, ScriptedResolver, YoloBox,
    };

    fn classes(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_from_corners() {
        let bndbox = VocBndBox {
            xmin: 10.0,
            ymin: 20.0,
            xmax: 30.0,
            ymax: 60.0,
        };
        let yolo_box = YoloBox::from_corners(0, &bndbox, 100.0, 200.0);

        assert!((yolo_box.x_center - 0.2).abs() < 1e-12);
        assert!((yolo_box.y_center - 0.2).abs() < 1e-12);
        assert!((yolo_box.width - 0.2).abs() < 1e-12);
        assert!((yolo_box.height - 0.2).abs() < 1e-12);
        assert_eq!(yolo_box.to_line(), "0 0.200000 0.200000 0.200000 0.200000");
    }

    #[test]
    fn test_normalized_values_stay_in_unit_range() {
        let (width, height) = (640.0, 480.0);
        let corners = [
            (0.0, 0.0, 640.0, 480.0),
            (0.0, 0.0, 1.0, 1.0),
            (639.0, 479.0, 640.0, 480.0),
            (100.0, 50.0, 420.0, 400.0),
        ];
        for (xmin, ymin, xmax, ymax) in corners {
            let bndbox = VocBndBox {
                xmin,
                ymin,
                xmax,
                ymax,
            };
            let yolo_box = YoloBox::from_corners(3, &bndbox, width, height);
            for value in [
                yolo_box.x_center,
                yolo_box.y_center,
                yolo_box.width,
                yolo_box.height,
            ] {
                assert!((0.0..=1.0).contains(&value), "{} out of range", value);
            }
        }
    }

    #[test]
    fn test_corner_round_trip() {
        let bndbox = VocBndBox {
            xmin: 17.0,
            ymin: 33.0,
            xmax: 301.0,
            ymax: 250.0,
        };
        let (width, height) = (1280.0, 720.0);
        let yolo_box = YoloBox::from_corners(1, &bndbox, width, height);
        let restored = yolo_box.to_corners(width, height);

        assert!((restored.xmin - bndbox.xmin).abs() < 1e-6);
        assert!((restored.ymin - bndbox.ymin).abs() < 1e-6);
        assert!((restored.xmax - bndbox.xmax).abs() < 1e-6);
        assert!((restored.ymax - bndbox.ymax).abs() < 1e-6);
    }

    #[test]
    fn test_round_trip_through_six_decimals() {
        let bndbox = VocBndBox {
            xmin: 17.0,
            ymin: 33.0,
            xmax: 301.0,
            ymax: 250.0,
        };
        let (width, height) = (1280.0, 720.0);
        let line = YoloBox::from_corners(1, &bndbox, width, height).to_line();
        let values: Vec<f64> = line
            .split_whitespace()
            .skip(1)
            .map(|value| value.parse().unwrap())
            .collect();
        let parsed = YoloBox {
            class_index: 1,
            x_center: values[0],
            y_center: values[1],
            width: values[2],
            height: values[3],
        };
        let restored = parsed.to_corners(width, height);

        // 6 decimals on a 1280 pixel axis is accurate to ~0.001 px
        assert!((restored.xmin - bndbox.xmin).abs() < 1e-2);
        assert!((restored.ymax - bndbox.ymax).abs() < 1e-2);
    }

    #[test]
    fn test_split_size() {
        assert_eq!(split_size(100, 10), 10);
        assert_eq!(split_size(99, 10), 9);
        assert_eq!(split_size(5, 10), 0);
        assert_eq!(split_size(100, 0), 0);
        assert_eq!(split_size(0, 10), 0);
    }

    #[test]
    fn test_draw_split_positions() {
        let mut rng = StdRng::seed_from_u64(42);
        let (val, test) = draw_split_positions(&mut rng, 100, 10, 10);

        assert_eq!(val.len(), 10);
        assert_eq!(test.len(), 10);
        assert!(val.is_disjoint(&test));
        assert!(val.iter().chain(test.iter()).all(|&i| i < 100));
    }

    #[test]
    fn test_draw_split_positions_small_folder() {
        let mut rng = StdRng::seed_from_u64(7);
        let (val, test) = draw_split_positions(&mut rng, 3, 2, 2);

        assert_eq!(val.len(), 2);
        assert_eq!(test.len(), 1);
        assert!(val.is_disjoint(&test));

        let (val, test) = draw_split_positions(&mut rng, 0, 0, 0);
        assert!(val.is_empty());
        assert!(test.is_empty());
    }

    #[test]
    fn test_validate_percent() {
        assert!(validate_percent("50").is_ok());
        assert!(validate_percent("100").is_ok());
        assert!(validate_percent("0").is_ok());
        assert!(validate_percent("12.5").is_ok());
        assert!(validate_percent("-1").is_err());
        assert!(validate_percent("100.1").is_err());
        assert!(validate_percent("abc").is_err());
    }

    #[test]
    fn test_image_extensions() {
        assert!(is_image_extension("jpg"));
        assert!(is_image_extension("PNG"));
        assert!(!is_image_extension("Jpg"));
        assert!(!is_image_extension("xml"));
        assert_eq!(file_extension("a.b.jpeg"), "jpeg");
        assert_eq!(file_extension("noext"), "");
        assert_eq!(with_extension("frame_01.jpg", "xml"), "frame_01.xml");
    }

    #[test]
    fn test_framework_name() {
        assert_eq!(framework_name("yolov8n.pt"), "yolov8");
        assert_eq!(framework_name("yolo11s.pt"), "yolo11");
        assert_eq!(framework_name("yolov5m"), "yolov5");
    }

    #[test]
    fn test_model_descriptor() {
        let settings: ProjectSettings = serde_yaml::from_str(
            "MODEL_NAME: boats\nDESCRIPTION: boat detector\nCLASSES: [boat, buoy]\n\
             USE_PERCENT_DATA: 100\nRANDOM_DATA_SIZE: 0\nBASE_MODEL: yolov8s.pt\n\
             IMAGE_SIZE: 640\nNUM_EPOCHS: 5\nBATCH_SIZE: 4\n",
        )
        .unwrap();
        let descriptor = model_descriptor(&settings, "boats_yolov8s_640.pt");

        assert_eq!(descriptor.ai_model.framework.name, "yolov8");
        assert_eq!(descriptor.ai_model.model_type.name, "detection");
        assert_eq!(descriptor.ai_model.image_size.image_width.value, 640);
        assert_eq!(descriptor.ai_model.classes.names, classes(&["boat", "buoy"]));

        let yaml = serde_yaml::to_string(&descriptor).unwrap();
        assert!(yaml.contains("type:"));
        assert!(yaml.contains("weight_file:"));
    }

    #[test]
    fn test_add_new_label_appends_class() {
        let mut class_map = ClassMap::new(classes(&["dog"]));
        let index = apply_resolution(&mut class_map, "cat", &Resolution::AddNew).unwrap();

        assert_eq!(index, 1);
        assert_eq!(class_map.classes(), classes(&["dog", "cat"]).as_slice());
        assert_eq!(class_map.lookup("cat"), Some(1));
    }

    #[test]
    fn test_reuse_and_discard() {
        let mut class_map = ClassMap::new(classes(&["dog", "cat"]));
        assert_eq!(
            apply_resolution(&mut class_map, "puppy", &Resolution::Reuse(0)).unwrap(),
            0
        );
        assert_eq!(
            apply_resolution(&mut class_map, "blur", &Resolution::Discard).unwrap(),
            -1
        );
        assert!(apply_resolution(&mut class_map, "x", &Resolution::Reuse(5)).is_err());

        assert_eq!(class_map.classes().len(), 2);
        assert_eq!(class_map.lookup("puppy"), Some(0));
        assert_eq!(class_map.lookup("blur"), Some(-1));
        assert!(!class_map.is_class("puppy"));
        assert_eq!(class_map.class_name(-1), None);
    }

    #[test]
    fn test_rename_maps_both_labels() {
        let mut class_map = ClassMap::new(classes(&["dog"]));
        let index =
            apply_resolution(&mut class_map, "kitty", &Resolution::Rename("cat".into())).unwrap();

        assert_eq!(index, 1);
        assert_eq!(class_map.lookup("kitty"), Some(1));
        assert_eq!(class_map.lookup("cat"), Some(1));
        assert_eq!(class_map.class_name(1), Some("cat"));
    }

    #[test]
    fn test_console_resolver_reprompts() {
        let input = Cursor::new("abc\n9\n2\n");
        let mut output = Vec::new();
        let mut resolver = ConsoleResolver::new(input, &mut output);
        let resolution = resolver
            .resolve_unknown_label("cat", &classes(&["dog"]))
            .unwrap();
        drop(resolver);

        assert_eq!(resolution, Resolution::AddNew);
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Unable to find label: cat"));
        assert!(text.contains("1. dog"));
        assert!(text.contains("2. Add New Label"));
        assert!(text.contains("Invalid input. Please enter a number."));
        assert!(text.contains("Invalid choice. Please enter a valid number."));
    }

    #[test]
    fn test_console_resolver_choices() {
        let class_list = classes(&["dog"]);

        let mut resolver = ConsoleResolver::new(Cursor::new("1\n"), Vec::new());
        assert_eq!(
            resolver.resolve_unknown_label("puppy", &class_list).unwrap(),
            Resolution::Reuse(0)
        );

        let mut resolver = ConsoleResolver::new(Cursor::new("3\n\nkitty\n"), Vec::new());
        assert_eq!(
            resolver.resolve_unknown_label("cat", &class_list).unwrap(),
            Resolution::Rename("kitty".to_string())
        );

        let mut resolver = ConsoleResolver::new(Cursor::new("4\n"), Vec::new());
        assert_eq!(
            resolver.resolve_unknown_label("cat", &class_list).unwrap(),
            Resolution::Discard
        );
    }

    #[test]
    fn test_console_resolver_end_of_input() {
        let mut resolver = ConsoleResolver::new(Cursor::new("x\n"), Vec::new());
        assert!(resolver
            .resolve_unknown_label("cat", &classes(&["dog"]))
            .is_err());
    }

    #[test]
    fn test_select_option() {
        let mut input = Cursor::new("0\n2\n");
        let mut output = Vec::new();
        let choice = select_option(&mut input, &mut output, &["set_a", "set_b"]).unwrap();
        assert_eq!(choice, 1);
    }

    #[test]
    fn test_scripted_resolver() {
        let mut resolver = ScriptedResolver::new([Resolution::Reuse(0)]);
        let class_list = classes(&["dog"]);
        assert_eq!(
            resolver.resolve_unknown_label("a", &class_list).unwrap(),
            Resolution::Reuse(0)
        );
        assert!(resolver.resolve_unknown_label("b", &class_list).is_err());
        assert_eq!(resolver.asked(), ["a".to_string(), "b".to_string()]);

        let mut resolver = ScriptedResolver::always(Resolution::Discard);
        assert_eq!(
            resolver.resolve_unknown_label("c", &class_list).unwrap(),
            Resolution::Discard
        );
    }

    #[test]
    fn test_train_request_args() {
        let request = TrainRequest {
            model: "yolov8n.pt".to_string(),
            data: "/project/model_training/data_custom.yaml".into(),
            epochs: 50,
            image_size: 640,
            batch_size: 16,
            name: "boats".to_string(),
        };
        assert_eq!(
            request.args(),
            vec![
                "detect",
                "train",
                "model=yolov8n.pt",
                "data=/project/model_training/data_custom.yaml",
                "epochs=50",
                "imgsz=640",
                "batch=16",
                "name=boats",
            ]
        );
    }

    #[test]
    fn test_run_captured() {
        let stdout = run_captured(Command::new("sh").args(["-c", "echo ready"])).unwrap();
        assert_eq!(stdout.trim(), "ready");

        assert!(run_captured(Command::new("sh").args(["-c", "exit 3"])).is_err());
        assert!(run_captured(&mut Command::new("no-such-label-tool-binary")).is_err());
    }
}
