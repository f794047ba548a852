use anyhow::Result;
use clap::Parser;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;

use yolo_detector_trainer::dataset::update_train_files;
use yolo_detector_trainer::deploy::deploy_model;
use yolo_detector_trainer::external::run_training;
use yolo_detector_trainer::pipeline::{
    choose_label_folder, initialize_project, label_folder_session, InitOptions,
};
use yolo_detector_trainer::train::prepare_training;
use yolo_detector_trainer::{Args, Command, Project};

fn run(args: Args) -> Result<()> {
    let mut project = Project::load(&args.project_dir)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match args.command {
        Command::Init {
            use_percent_data,
            unknown_labels,
            remove_bad_images,
        } => {
            info!("Starting create label data process");
            let options = InitOptions {
                use_percent_data: use_percent_data.unwrap_or(project.settings.use_percent_data),
                remove_bad_images,
            };
            let mut resolver = unknown_labels.resolver();
            initialize_project(&mut project, options, resolver.as_mut(), &mut rng)?;
        }
        Command::Label {
            folder,
            label_tool,
            unknown_labels,
        } => {
            info!("Starting data labeling process");
            let sel_path = choose_label_folder(
                &project,
                folder.as_deref(),
                &mut io::stdin().lock(),
                &mut io::stdout(),
            )?;
            let mut resolver = unknown_labels.resolver();
            label_folder_session(&mut project, &sel_path, &label_tool, resolver.as_mut())?;
        }
        Command::Split => {
            project.ensure_folders()?;
            update_train_files(
                &project.paths.label_folder,
                &project.paths.train_folder,
                project.class_map.classes(),
                project.val_percentage(),
                project.test_percentage(),
                &mut rng,
            )?;
        }
        Command::Train {
            trainer,
            skip_training,
        } => {
            info!(
                "Starting training for model name: {}",
                project.settings.model_name
            );
            let (request, _) = prepare_training(&project, &mut rng)?;
            if skip_training {
                info!("Training session prepared; trainer arguments: {:?}", request.args());
            } else {
                run_training(&trainer, &request, &project.paths.train_folder)?;
            }
        }
        Command::Deploy => {
            info!("Starting deploy model process");
            if deploy_model(&project)?.is_none() {
                error!("Failed to update deploy model from best checkpoint");
            }
        }
    }
    Ok(())
}

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
