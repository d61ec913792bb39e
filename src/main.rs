use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_outline::pipeline;
use pdf_outline::{Model, OutlineConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pdf-outline", version, about = "Extract a title and H1-H3 outline from PDFs")]
struct Args {
    /// YAML file overriding any subset of the default settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Label every PDF in a folder heuristically and fit the heading classifier
    Train {
        pdf_dir: PathBuf,
        #[arg(short, long)]
        model: PathBuf,
    },
    /// Write `<name>.json` for every PDF in the input folder
    Extract {
        input_dir: PathBuf,
        output_dir: PathBuf,
        #[arg(short, long)]
        model: PathBuf,
    },
    /// Outline a single PDF, printing the JSON unless --output is given
    Outline {
        pdf: PathBuf,
        #[arg(short, long)]
        model: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // lopdf logs every font encoding lookup at info
    let default_level = if args.verbose {
        "debug,lopdf=warn"
    } else {
        "info,lopdf=warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match &args.config {
        Some(path) => OutlineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => OutlineConfig::default(),
    };

    match args.command {
        Command::Train { pdf_dir, model } => {
            match pipeline::train_from_folder(&pdf_dir, &model, &config)? {
                Some(trained) => {
                    let accuracy = trained
                        .accuracy()
                        .map_or_else(|| "n/a".to_string(), |a| format!("{a:.4}"));
                    println!(
                        "Model saved to {} (hold-out accuracy {accuracy})",
                        model.display()
                    );
                }
                None => println!("No training data found in {}", pdf_dir.display()),
            }
        }
        Command::Extract {
            input_dir,
            output_dir,
            model,
        } => {
            let model = load_model(&model)?;
            let summary = pipeline::extract_folder(&input_dir, &output_dir, &model, &config)?;
            println!(
                "Processed {} documents, {} skipped",
                summary.written, summary.skipped
            );
        }
        Command::Outline { pdf, model, output } => {
            let model = load_model(&model)?;
            let outline = pipeline::detect_outline(&pdf, &model, &config)
                .with_context(|| format!("Failed to process {}", pdf.display()))?;
            match output {
                Some(path) => {
                    pipeline::write_outline(&outline, &path)?;
                    println!("Successfully processed {}", pdf.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&outline)?),
            }
        }
    }

    Ok(())
}

fn load_model(path: &Path) -> Result<Model> {
    Model::load(path).with_context(|| format!("Failed to load model {}", path.display()))
}
