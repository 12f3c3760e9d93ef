use clap::{Parser, Subcommand};
use lineage::engine::{Engine, Upload};
use lineage::models::{GenerationId, ImageId, UserId};
use lineage::pipeline::ActionOutcome;
use lineage::transform::ActionParams;
use lineage::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "lineage")]
#[command(about = "Image transformations with thumbnails and lineage tracking")]
#[command(long_about = "\
Image transformations with thumbnails and lineage tracking

Upload PNG or JPEG images, apply actions to produce derived generations,
and elevate a generation into a new image of its own.

Actions:

  crop    width=<px> height=<px>    stretch to exactly width x height
  flip    axis=<0|1>                0 = upside down, 1 = mirror
  rotate  angle=<degrees>           counter-clockwise, same canvas size
  blur    mode=<mean|median|gaussian>
  detect                            record size and pixel extremes on the image

Data directory layout:

  .lineage/
  ├── config.toml      # Optional, see 'lineage gen-config'
  ├── records.json     # Images and generations
  └── blobs/
      ├── image/       # Uploaded and elevated images
      ├── thumbnail/
      └── generation/  # One directory per action

Set RUST_LOG (e.g. RUST_LOG=lineage=debug) for more detailed logs on stderr.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding records, blobs and config.toml
    #[arg(long, default_value = ".lineage", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a PNG or JPEG image
    Upload {
        file: PathBuf,
        /// Display name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Owning user id
        #[arg(long)]
        user: Option<u64>,
    },
    /// List images, most recent first
    List,
    /// Show an image with its generations
    Show {
        id: u64,
        /// Treat the id as a generation id
        #[arg(long)]
        generation: bool,
    },
    /// Apply an action to an image
    Apply {
        image: u64,
        action: String,
        /// Action parameters as key=value
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Promote a generation into a new image
    Elevate {
        generation: u64,
        /// Owning user id for the new image
        #[arg(long)]
        user: Option<u64>,
    },
    /// Rename an image
    Rename { image: u64, name: String },
    /// Delete images with their generations and blobs
    Delete {
        #[arg(required = true)]
        images: Vec<u64>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let data_dir = cli.data_dir;
    let open = || -> Result<_, Box<dyn std::error::Error>> {
        let config = config::load_config(&data_dir)?;
        init_thread_pool(&config.processing);
        Ok(Engine::open(&data_dir, &config)?)
    };

    match cli.command {
        Command::Upload { file, name, user } => {
            let engine = open()?;
            let bytes = std::fs::read(&file)?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let image = engine.upload(Upload {
                owner: user.map(UserId),
                name,
                ..Upload::new(file_name, bytes)
            })?;
            output::print_image(&image);
        }
        Command::List => {
            let engine = open()?;
            output::print_image_list(&engine.images()?);
        }
        Command::Show { id, generation } => {
            let engine = open()?;
            if generation {
                let detail = engine.generation_detail(GenerationId(id))?;
                output::print_outcome(&ActionOutcome::Generated(detail));
            } else {
                output::print_image_detail(&engine.image_detail(ImageId(id))?);
            }
        }
        Command::Apply {
            image,
            action,
            params,
        } => {
            let engine = open()?;
            let params: ActionParams = params.into_iter().collect();
            let outcome = engine.apply(ImageId(image), &action, &params)?;
            output::print_outcome(&outcome);
        }
        Command::Elevate { generation, user } => {
            let engine = open()?;
            let image = engine.elevate(GenerationId(generation), user.map(UserId))?;
            output::print_image(&image);
        }
        Command::Rename { image, name } => {
            let engine = open()?;
            let image = engine.rename_image(ImageId(image), &name)?;
            output::print_image(&image);
        }
        Command::Delete { images } => {
            let engine = open()?;
            let ids: Vec<ImageId> = images.into_iter().map(ImageId).collect();
            let deleted = engine.delete_images(&ids)?;
            println!("{}", output::format_delete_summary(deleted, ids.len()));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays reserved for command output.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lineage=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn parse_param(pair: &str) -> Result<(String, String), String> {
    ActionParams::parse_pair(pair).map_err(|e| e.to_string())
}
