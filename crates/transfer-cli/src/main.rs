mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::CliOverrides;
use pipeline::{SummaryArgs, TransferArgs};

/// burn-style: neural style transfer with statistical or adversarial style losses.
#[derive(Parser)]
#[command(name = "burn-style", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for running transfers and inspecting their loss histories.
#[derive(Subcommand)]
enum Command {
    /// Optimize an image towards a style image while keeping a content image.
    Transfer {
        /// Path to the style image.
        #[arg(long)]
        style: PathBuf,
        /// Path to the content image (also the starting image).
        #[arg(long)]
        content: PathBuf,
        /// Path for the output image.
        #[arg(long)]
        output: PathBuf,
        /// Path to a transfer config TOML file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Style loss family: kernel, disc-sn or disc-wass.
        #[arg(long)]
        distance: Option<String>,
        /// Statistic for the kernel family: m1, m3 or gram.
        #[arg(long)]
        disc: Option<String>,
        /// Style/content blend: alpha * style + (1 - alpha) * content.
        #[arg(long)]
        alpha: Option<f64>,
        /// Adam learning rate for the image.
        #[arg(long)]
        img_lr: Option<f64>,
        /// Adam learning rate for the critics.
        #[arg(long)]
        disc_lr: Option<f64>,
        /// Number of optimization steps.
        #[arg(long)]
        steps: Option<usize>,
        /// Feature vectors sampled per style layer and step.
        #[arg(long)]
        k: Option<usize>,
        /// Longest side of the working images, in pixels.
        #[arg(long)]
        image_size: Option<u32>,
        /// Seed for sampling and initialization.
        #[arg(long)]
        seed: Option<u64>,
        /// Backbone weights saved with burn's NamedMpkFileRecorder.
        #[arg(long)]
        weights: Option<PathBuf>,
        /// Write the per-step loss history as JSON.
        #[arg(long)]
        losses: Option<PathBuf>,
        /// Hide the progress bar.
        #[arg(long)]
        no_progress: bool,
        /// Build the model and report feature shapes without optimizing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print statistics from a loss history JSON file.
    Summary {
        /// Path to the loss history JSON file.
        #[arg(long)]
        input: PathBuf,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Transfer {
            style,
            content,
            output,
            config,
            distance,
            disc,
            alpha,
            img_lr,
            disc_lr,
            steps,
            k,
            image_size,
            seed,
            weights,
            losses,
            no_progress,
            dry_run,
        } => pipeline::run_transfer(TransferArgs {
            config,
            style,
            content,
            output,
            weights,
            losses,
            dry_run,
            overrides: CliOverrides {
                distance,
                disc,
                alpha,
                img_lr,
                disc_lr,
                steps,
                k,
                seed,
                image_size,
                show_progress: !no_progress,
            },
        }),
        Command::Summary { input, json } => pipeline::run_summary(SummaryArgs { input, json }),
    }
}
