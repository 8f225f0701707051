mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use likeness_core::annotate::Annotator;
use likeness_core::dataset::{self, PrepareOptions};
use likeness_core::{grid, training};
use likeness_core::{LabelMap, LbphModel, LbphTrainer, RecognitionPipeline, RustfaceDetector};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "likeness", about = "Offline face dataset, training and recognition tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in raw photos and write normalized crops as 0.jpg, 1.jpg, ...
    Prepare {
        /// Directory of raw photos
        input_dir: PathBuf,
        /// Directory to write face crops into (created if missing)
        output_dir: PathBuf,
    },
    /// Train a recognition model from crops named {subject_id}_{n}.jpg
    Train {
        /// Directory of labeled face crops
        input_dir: PathBuf,
        /// Where to write the trained model
        output_path: PathBuf,
    },
    /// Compose all images in a directory into one grid image
    Stitch {
        /// Directory of equally sized images
        input_dir: PathBuf,
        /// Output image path
        output_path: PathBuf,
        /// Images per row
        #[arg(long)]
        columns: Option<usize>,
    },
    /// Label the faces in one image and write the annotated copy
    Recognize {
        /// Input photo
        image: PathBuf,
        /// Output image path
        output_path: PathBuf,
        /// Trained model file
        #[arg(long)]
        model: PathBuf,
        /// Label file with one "{id},{name}" record per line
        #[arg(long)]
        labels: PathBuf,
        /// Reject predictions at or above this distance
        #[arg(long)]
        threshold: Option<f64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Prepare {
            input_dir,
            output_dir,
        } => {
            let mut detector = load_detector(&config)?;
            let options = PrepareOptions {
                face_size: config.face_size,
                failure_policy: config.failure_policy(),
            };
            let report = dataset::prepare(&mut detector, &input_dir, &output_dir, &options)
                .with_context(|| format!("preparing faces from {}", input_dir.display()))?;

            println!(
                "Wrote {} face(s) from {} image(s) to {}",
                report.faces,
                report.images,
                output_dir.display()
            );
            if report.outside > 0 {
                println!("  {} detection(s) lay outside their image", report.outside);
            }
            for path in &report.skipped {
                println!("  skipped unreadable {}", path.display());
            }
        }
        Commands::Train {
            input_dir,
            output_path,
        } => {
            let report = training::train(
                &LbphTrainer::default(),
                &input_dir,
                &output_path,
                config.face_size,
            )
            .with_context(|| format!("training from {}", input_dir.display()))?;

            println!(
                "Trained on {} sample(s) of {} subject(s), model saved to {}",
                report.samples,
                report.subjects.len(),
                output_path.display()
            );
        }
        Commands::Stitch {
            input_dir,
            output_path,
            columns,
        } => {
            let columns = columns.unwrap_or(config.columns);
            let report = grid::stitch(&input_dir, &output_path, columns)
                .with_context(|| format!("stitching {}", input_dir.display()))?;

            match report {
                Some(report) => println!(
                    "Stitched {} image(s) into {} row(s), {}x{}, saved to {}",
                    report.images,
                    report.rows,
                    report.width,
                    report.height,
                    output_path.display()
                ),
                None => println!("No images in {}, nothing written", input_dir.display()),
            }
        }
        Commands::Recognize {
            image,
            output_path,
            model,
            labels,
            threshold,
        } => {
            let labels = LabelMap::load(&labels)?;
            let model = LbphModel::load(&model)?;
            let detector = load_detector(&config)?;
            let annotator = match &config.font {
                Some(font) => Annotator::with_font_file(font)?,
                None => Annotator::new(),
            };

            let mut pipeline = RecognitionPipeline::new(detector, model, labels)
                .with_threshold(threshold.unwrap_or(config.threshold))
                .with_face_size(config.face_size)
                .with_annotator(annotator);

            let photo = image::open(&image)
                .with_context(|| format!("loading {}", image.display()))?
                .to_rgb8();
            let result = pipeline
                .recognize(&photo)
                .with_context(|| format!("recognizing faces in {}", image.display()))?;
            result
                .image
                .save(&output_path)
                .with_context(|| format!("writing {}", output_path.display()))?;

            for face in &result.faces {
                println!("{}  {}", face.bounds, face.text);
            }
            println!(
                "{} face(s) recognized, {} rejected, annotated image saved to {}",
                result.faces.len(),
                result.rejected,
                output_path.display()
            );
        }
    }

    Ok(())
}

fn load_detector(config: &Config) -> Result<RustfaceDetector> {
    RustfaceDetector::load(&config.detector_model, config.detector_params())
        .context("set LIKENESS_DETECTOR_MODEL to a SeetaFace model file")
}
