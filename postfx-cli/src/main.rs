use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod io;
mod output;

use commands::{Inputs, apply::ApplyOptions, effect::EffectOptions};
use config::OutputFormat;

#[derive(Parser)]
#[command(name = "postfx")]
#[command(version, about = "Apply wgpu post-processing passes to image files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pass chain (bloom and filmic tone map by default)
    Apply {
        /// Image read as the `source` input
        input: PathBuf,
        /// Destination image (png, jpg, hdr or exr)
        output: PathBuf,
        /// TOML chain file with `[[step]]` tables
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Image read as the `source2` input
        #[arg(long)]
        input2: Option<PathBuf>,
        /// Format of the final render target
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        /// Render with the CPU reference renderer
        #[arg(long)]
        cpu: bool,
    },
    /// Run a single effect
    Effect {
        /// Effect name, see `postfx effects`
        name: String,
        input: PathBuf,
        output: PathBuf,
        /// Second image for merge and bloom_combine
        #[arg(long)]
        input2: Option<PathBuf>,
        /// Effect parameter, repeatable
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Output size relative to the input
        #[arg(long)]
        scale: Option<f32>,
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        #[arg(long)]
        cpu: bool,
    },
    /// List effects and their parameters
    Effects,
}

fn main() {
    init_tracing();

    if let Err(err) = run(Cli::parse()) {
        output::error(format!("{err:#}"));
        std::process::exit(1);
    }
}

fn run(Cli { command }: Cli) -> Result<()> {
    match command {
        Commands::Apply {
            input,
            output,
            config,
            input2,
            format,
            cpu,
        } => {
            commands::apply::execute(ApplyOptions {
                inputs: Inputs {
                    source: input,
                    source2: input2,
                },
                output: &output,
                config: config.as_deref(),
                format,
                cpu,
            })?;
        }
        Commands::Effect {
            name,
            input,
            output,
            input2,
            params,
            scale,
            format,
            cpu,
        } => {
            commands::effect::execute(EffectOptions {
                name: &name,
                inputs: Inputs {
                    source: input,
                    source2: input2,
                },
                output: &output,
                params: &params,
                scale,
                format,
                cpu,
            })?;
        }
        Commands::Effects => commands::effects::execute(),
    }

    Ok(())
}

const DEFAULT_FILTER: &str = "error,tessera_postfx=info,postfx=info";

fn init_tracing() {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER) {
            Ok(filter) => filter,
            Err(_) => tracing_subscriber::EnvFilter::new("error"),
        },
    };

    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .try_init();
}
