//! Geoconv Command Line
//!
//! Preprocessing for geodesic convolutions on PLY meshes and point clouds.
//!
//! Commands:
//! - `gpc`: compute the GPC system of every vertex into a resumable store
//! - `barycentric`: interpolate the template in a complete GPC store
//! - `preprocess`: both of the above, or the tangent-plane path for point clouds
//! - `info`: report on a mesh and its preprocessed outputs

mod config;
mod error;
mod pipeline;

use clap::{Parser, Subcommand};
use config::PreprocessArgs;
use error::CliError;
use geoconv_data::load_mesh_from_ply;

/// Geoconv - geodesic convolution preprocessing
#[derive(Parser, Debug)]
#[command(name = "geoconv")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Send spans to Tracy
    #[cfg(feature = "tracy")]
    #[arg(long, global = true)]
    tracy: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute GPC systems into <output>/gpc
    Gpc(PreprocessArgs),
    /// Compute barycentric coordinates from <output>/gpc
    Barycentric(PreprocessArgs),
    /// Run every preprocessing stage
    Preprocess(PreprocessArgs),
    /// Describe a mesh and its preprocessed outputs
    Info {
        #[command(flatten)]
        args: PreprocessArgs,

        /// Also print the barycentric records of this center
        #[arg(long)]
        center: Option<usize>,
    },
}

fn init_logging(args: &Args) {
    #[cfg(feature = "tracy")]
    {
        if args.tracy {
            use tracing_subscriber::Layer;
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;
            tracing_subscriber::registry()
                .with(tracing_tracy::TracyLayer::default())
                .with(
                    tracing_subscriber::fmt::layer().with_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| args.log_level.clone().into()),
                    ),
                )
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();
}

fn run(command: &Command) -> Result<(), CliError> {
    match command {
        Command::Gpc(args) => {
            let mesh = load_mesh_from_ply(&args.mesh)?;
            if mesh.face_count() == 0 {
                return Err(CliError::NoFaces(args.mesh.clone()));
            }
            pipeline::run_gpc(&mesh, &args.resolve()?)?;
        }
        Command::Barycentric(args) => {
            let mesh = load_mesh_from_ply(&args.mesh)?;
            if mesh.face_count() == 0 {
                return Err(CliError::NoFaces(args.mesh.clone()));
            }
            pipeline::run_barycentric(&mesh, &args.resolve()?)?;
        }
        Command::Preprocess(args) => {
            let mesh = load_mesh_from_ply(&args.mesh)?;
            pipeline::run_preprocess(&mesh, &args.resolve()?)?;
        }
        Command::Info { args, center } => {
            let mesh = load_mesh_from_ply(&args.mesh)?;
            println!("{}", pipeline::describe(&mesh, &args.resolve()?, *center)?);
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(&args.command) {
        tracing::error!("Application error: {}", e);
        std::process::exit(1);
    }
}
