// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pulse sequence generator CLI
//!
//! # Usage
//!
//! ```bash
//! # List stored assets
//! pulsegen assets
//!
//! # Build a Rabi sweep and sample it
//! pulsegen generate rabi rabi 10e-9 10e-9 50 0.5 2.87e9 3e-6 1e-6
//! pulsegen sample-ensemble rabi --chunked
//!
//! # Sample a stored sequence
//! pulsegen sample-sequence my_sequence
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pulsegen::error::AssetKind;
use pulsegen::predefined::PredefinedArgs;
use pulsegen::sampling::SamplingMode;
use pulsegen::{Config, Result, SequenceGenerator, VERSION};

/// Pulse sequence generator
#[derive(Parser)]
#[command(name = "pulsegen")]
#[command(author = "QubitOS Contributors")]
#[command(version = VERSION)]
#[command(about = "Sample pulse blocks, ensembles and sequences into waveform files")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Root directory for assets and sampled files
    #[arg(long, global = true, env = "PULSEGEN_PULSED_FILE_DIR")]
    pulsed_file_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored blocks, ensembles and sequences
    Assets,

    /// Sample a stored ensemble
    SampleEnsemble {
        /// Ensemble name
        name: String,

        /// Write element by element instead of all at once
        #[arg(long)]
        chunked: bool,

        /// Phase offset in samples
        #[arg(long, default_value_t = 0)]
        offset_bin: u64,

        /// Sample without writing files
        #[arg(long)]
        no_write: bool,
    },

    /// Sample a stored sequence
    SampleSequence {
        /// Sequence name
        name: String,

        /// Write element by element instead of all at once
        #[arg(long)]
        chunked: bool,
    },

    /// Run a predefined generator
    Generate {
        /// Generator name
        name: String,

        /// Positional arguments, parsed as JSON where possible
        args: Vec<String>,
    },

    /// Delete a stored asset
    Delete {
        kind: KindArg,
        name: String,
    },

    /// List predefined generators
    Predefined,

    /// Show effective configuration
    Config,

    /// Validate configuration file
    Validate,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Block,
    Ensemble,
    Sequence,
}

impl From<KindArg> for AssetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Block => AssetKind::Block,
            KindArg::Ensemble => AssetKind::Ensemble,
            KindArg::Sequence => AssetKind::Sequence,
        }
    }
}

fn mode(chunked: bool) -> SamplingMode {
    if chunked {
        SamplingMode::Chunked
    } else {
        SamplingMode::Monolithic
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(dir) = cli.pulsed_file_dir {
        config.generator.pulsed_file_dir = dir;
    }

    init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
            return Ok(());
        }
        Commands::Validate => {
            match config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    std::process::exit(1);
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let generator = Arc::new(SequenceGenerator::new(config)?);
    info!(
        version = VERSION,
        dir = %generator.pulsed_file_dir().display(),
        "Sequence generator ready"
    );

    match cli.command {
        Commands::Assets => {
            let sections = [
                ("Blocks", generator.list_blocks(), generator.current_block()),
                ("Ensembles", generator.list_ensembles(), generator.current_ensemble()),
                ("Sequences", generator.list_sequences(), generator.current_sequence()),
            ];
            for (title, names, current) in sections {
                println!("{}:", title);
                if names.is_empty() {
                    println!("  (none)");
                }
                for name in names {
                    let marker = if current.as_deref() == Some(name.as_str()) {
                        " (current)"
                    } else {
                        ""
                    };
                    println!("  {}{}", name, marker);
                }
            }
        }

        Commands::SampleEnsemble {
            name,
            chunked,
            offset_bin,
            no_write,
        } => {
            let out = generator
                .clone()
                .sample_ensemble_async(name.clone(), mode(chunked), offset_bin, !no_write)
                .await?;
            if let (Some(analog), Some(digital)) = (&out.analog, &out.digital) {
                println!(
                    "{}: analog {:?}, digital {:?}",
                    name,
                    analog.dim(),
                    digital.dim()
                );
            }
            for file in &out.files {
                println!("  {}", file);
            }
            println!("offset_bin: {}", out.offset_bin);
        }

        Commands::SampleSequence { name, chunked } => {
            let out = generator
                .clone()
                .sample_sequence_async(name.clone(), mode(chunked))
                .await?;
            println!("{}: {} steps", name, out.steps.len());
            for (waveform, files) in &out.sampled_ensembles {
                println!("  {}: {}", waveform, files.join(", "));
            }
            for file in &out.sequence_files {
                println!("  {}", file);
            }
        }

        Commands::Generate { name, args } => {
            let args = PredefinedArgs::parse(&args[..]);
            for (kind, asset) in generator.generate_predefined_sequence(&name, &args)? {
                println!("{} {}", kind, asset);
            }
        }

        Commands::Delete { kind, name } => {
            generator.delete(kind.into(), &name)?;
            println!("Deleted {}", name);
        }

        Commands::Predefined => {
            println!("Predefined generators:");
            for method in generator.predefined_methods() {
                println!("  {}({})", method.name, method.params.join(", "));
            }
        }

        Commands::Config | Commands::Validate => {}
    }

    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
