use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use detscope::build_info::BuildInfo;
use detscope::logging::setup_logger;
use detscope::{ArtifactPaths, ArtifactStore, CropPipeline, SelectionBounds, Settings};

#[derive(Parser)]
#[command(name = "detscope", version, about = "Explore detection datasets through their embedding projection")]
struct Cli {
    /// Settings file (defaults to the per-user config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the directory holding the artifact files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the source images directory
    #[arg(long, global = true)]
    images_dir: Option<PathBuf>,

    /// Override where removal snapshots are written
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Log everything from detscope, including trace output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the artifact files and images directory exist
    Check,
    /// List class names
    Classes,
    /// List embedding points, optionally for one class
    Points {
        #[arg(long = "class")]
        class_name: Option<String>,
    },
    /// Annotation ids inside an inclusive rectangle
    Select {
        #[arg(allow_negative_numbers = true)]
        x_min: f64,
        #[arg(allow_negative_numbers = true)]
        x_max: f64,
        #[arg(allow_negative_numbers = true)]
        y_min: f64,
        #[arg(allow_negative_numbers = true)]
        y_max: f64,
    },
    /// Print one annotation record
    Annotation { id: u64 },
    /// Write the JPEG crop of an annotation (or the placeholder) to a file
    Crop {
        id: u64,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long)]
        padding: Option<u32>,
    },
    /// Show how an annotation's crop resolves
    CropInfo { id: u64 },
    /// Summarize the images directory
    Images,
    /// Embedding and annotation statistics
    Stats,
    /// Remove annotations and write a filtered snapshot
    Remove {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<u64>,
    },
    /// Report which artifacts load
    Health,
    /// Write a commented settings file
    InitConfig { path: Option<PathBuf> },
    /// Print build information
    Version,
}

#[derive(Serialize)]
struct Stats<'a> {
    embeddings: detscope::EmbeddingStats,
    annotations: detscope::AnnotationStats,
    classes: &'a [String],
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_store(settings: &Settings) -> Result<ArtifactStore, Box<dyn Error>> {
    let mut store = ArtifactStore::new(ArtifactPaths::from_settings(settings));
    match store.load_all() {
        Ok(summary) => {
            debug!("Load summary: {:?}", summary);
            Ok(store)
        }
        Err(e) => {
            error!("Failed to load {} artifact: {}", e.artifact(), e);
            Err(e.into())
        }
    }
}

fn resolve_settings(cli: &Cli) -> Settings {
    let mut settings = Settings::load(cli.config.as_deref());
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.images_dir {
        settings.images_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        settings.output_dir = dir.clone();
    }
    settings
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut settings = resolve_settings(&cli);

    match cli.command {
        Command::Check => {
            let store = ArtifactStore::new(ArtifactPaths::from_settings(&settings));
            let missing = store.missing_files();
            for (artifact, path) in &missing {
                eprintln!("Missing {} file: {}", artifact, path.display());
            }

            let report = CropPipeline::from_settings(&settings).check_images_dir();
            if !report.exists {
                warn!("Images directory not found: {}; crops will fall back to placeholders", report.path.display());
            }
            print_json(&report)?;

            if !missing.is_empty() {
                return Err(format!("{} required artifact file(s) missing", missing.len()).into());
            }
            info!("All required data files found");
        }
        Command::Classes => {
            let store = load_store(&settings)?;
            print_json(&store.class_names()?)?;
        }
        Command::Points { class_name } => {
            let store = load_store(&settings)?;
            print_json(&store.join()?.list_points(class_name.as_deref()))?;
        }
        Command::Select { x_min, x_max, y_min, y_max } => {
            let store = load_store(&settings)?;
            let bounds = SelectionBounds { x_min, x_max, y_min, y_max };
            print_json(&store.join()?.select_in_rectangle(bounds))?;
        }
        Command::Annotation { id } => {
            let store = load_store(&settings)?;
            match store.join()?.annotation_by_id(id) {
                Some(annotation) => print_json(annotation)?,
                None => return Err(format!("Annotation {} not found", id).into()),
            }
        }
        Command::Crop { id, output, padding } => {
            if let Some(padding) = padding {
                settings.crop_padding = padding;
            }
            let store = load_store(&settings)?;
            let delivery = CropPipeline::from_settings(&settings).crop_or_placeholder(&store, id)?;
            std::fs::write(&output, &delivery.bytes)?;
            if delivery.is_placeholder {
                warn!("Crop unavailable for annotation {}; wrote placeholder to {}", id, output.display());
            } else {
                info!("Wrote crop of annotation {} to {}", id, output.display());
            }
        }
        Command::CropInfo { id } => {
            let store = load_store(&settings)?;
            match CropPipeline::from_settings(&settings).crop_info(&store, id)? {
                Some(crop_info) => print_json(&crop_info)?,
                None => return Err(format!("Annotation {} not found", id).into()),
            }
        }
        Command::Images => {
            print_json(&CropPipeline::from_settings(&settings).check_images_dir())?;
        }
        Command::Stats => {
            let store = load_store(&settings)?;
            let join = store.join()?;
            let classes = store.class_names()?;
            print_json(&Stats {
                embeddings: join.embedding_stats(),
                annotations: join.annotation_stats(),
                classes: &classes,
            })?;
        }
        Command::Remove { ids } => {
            let mut store = load_store(&settings)?;
            let summary = store.remove_annotations(&ids, &settings.output_dir)?;
            print_json(&summary)?;
        }
        Command::Health => {
            let mut store = ArtifactStore::new(ArtifactPaths::from_settings(&settings));
            if let Err(e) = store.load_all() {
                warn!("Artifacts not loaded: {}", e);
            }
            print_json(&store.health())?;
        }
        Command::InitConfig { path } => {
            let path = path.unwrap_or_else(Settings::settings_path);
            settings.save_to(&path)?;
            println!("Wrote settings to {}", path.display());
        }
        Command::Version => {
            println!("detscope {}", BuildInfo::display_version());
            println!("{}", BuildInfo::detailed_info());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logger(cli.verbose) {
        eprintln!("Failed to initialize logger: {}", e);
    }
    debug!("{}", BuildInfo::summary_line());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
