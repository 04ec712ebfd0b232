//! TOML config loading for the transfer CLI.
//!
//! Deserializes `configs/transfer.toml`, which has optional `[transfer]` and
//! `[backbone]` sections, then merges it with CLI overrides.

use std::path::Path;

use serde::Deserialize;
use style::{DistanceKind, TransferConfig, VggBackboneConfig};

/// Top-level structure matching `configs/transfer.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct TransferToml {
    #[serde(default)]
    pub transfer: TransferOverrides,
    #[serde(default)]
    pub backbone: BackboneOverrides,
}

/// Optional overrides for `TransferConfig` fields.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferOverrides {
    /// `kernel`, `disc-sn` or `disc-wass`.
    pub distance: Option<String>,
    /// `m1`, `m3` or `gram`; only read when `distance = "kernel"`.
    pub disc: Option<String>,
    pub alpha: Option<f64>,
    pub img_lr: Option<f64>,
    pub disc_lr: Option<f64>,
    pub steps: Option<usize>,
    pub k: Option<usize>,
    pub style_layers: Option<Vec<usize>>,
    pub content_layer: Option<usize>,
    pub gp_weight: Option<f64>,
    pub skew_scale: Option<f64>,
    pub critic_hidden: Option<usize>,
    pub log_interval: Option<usize>,
    pub seed: Option<u64>,
    /// Longest side of the working images, in pixels.
    pub image_size: Option<u32>,
}

/// Optional overrides for `VggBackboneConfig` fields.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackboneOverrides {
    pub stage_channels: Option<Vec<usize>>,
    pub convs_per_stage: Option<usize>,
}

/// Values given on the command line. `None` leaves the TOML value in place.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub distance: Option<String>,
    pub disc: Option<String>,
    pub alpha: Option<f64>,
    pub img_lr: Option<f64>,
    pub disc_lr: Option<f64>,
    pub steps: Option<usize>,
    pub k: Option<usize>,
    pub seed: Option<u64>,
    pub image_size: Option<u32>,
    pub show_progress: bool,
}

/// Longest image side used when neither the TOML file nor the CLI sets one.
pub const DEFAULT_IMAGE_SIZE: u32 = 256;

/// Load and deserialize a `TransferToml` from a TOML file.
pub fn load_transfer_toml(path: &Path) -> anyhow::Result<TransferToml> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let config: TransferToml = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded transfer config");
    Ok(config)
}

/// Build a `TransferConfig` from defaults, TOML overrides and CLI flags.
///
/// Priority chain: `TransferConfig::new()` defaults < TOML values < CLI flags.
/// The `distance` / `disc` pair is resolved after merging, so an unknown name
/// from either source fails here.
pub fn build_transfer_config(
    overrides: &TransferOverrides,
    cli: &CliOverrides,
) -> anyhow::Result<TransferConfig> {
    let mut config = TransferConfig::new();

    // Apply TOML overrides
    if let Some(v) = overrides.alpha {
        config.alpha = v;
    }
    if let Some(v) = overrides.img_lr {
        config.img_lr = v;
    }
    if let Some(v) = overrides.disc_lr {
        config.disc_lr = v;
    }
    if let Some(v) = overrides.steps {
        config.steps = v;
    }
    if let Some(v) = overrides.k {
        config.k = v;
    }
    if let Some(v) = &overrides.style_layers {
        config.style_layers = v.clone();
    }
    if let Some(v) = overrides.content_layer {
        config.content_layer = v;
    }
    if let Some(v) = overrides.gp_weight {
        config.gp_weight = v;
    }
    if let Some(v) = overrides.skew_scale {
        config.skew_scale = v;
    }
    if let Some(v) = overrides.critic_hidden {
        config.critic_hidden = v;
    }
    if let Some(v) = overrides.log_interval {
        config.log_interval = v;
    }
    if overrides.seed.is_some() {
        config.seed = overrides.seed;
    }

    // CLI overrides take highest priority
    if let Some(v) = cli.alpha {
        config.alpha = v;
    }
    if let Some(v) = cli.img_lr {
        config.img_lr = v;
    }
    if let Some(v) = cli.disc_lr {
        config.disc_lr = v;
    }
    if let Some(v) = cli.steps {
        config.steps = v;
    }
    if let Some(v) = cli.k {
        config.k = v;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    config.show_progress = cli.show_progress;

    let distance = cli
        .distance
        .as_deref()
        .or(overrides.distance.as_deref())
        .unwrap_or("kernel");
    let disc = cli
        .disc
        .as_deref()
        .or(overrides.disc.as_deref())
        .unwrap_or("m1");
    config.distance = DistanceKind::from_flags(distance, disc)?;

    config.validate()?;
    Ok(config)
}

/// Build a `VggBackboneConfig` from defaults and TOML overrides.
pub fn build_backbone_config(overrides: &BackboneOverrides) -> VggBackboneConfig {
    let mut config = VggBackboneConfig::new();
    if let Some(v) = &overrides.stage_channels {
        config.stage_channels = v.clone();
    }
    if let Some(v) = overrides.convs_per_stage {
        config.convs_per_stage = v;
    }
    config
}

/// Image size: CLI flag, then TOML, then [`DEFAULT_IMAGE_SIZE`].
pub fn resolve_image_size(overrides: &TransferOverrides, cli: &CliOverrides) -> u32 {
    cli.image_size
        .or(overrides.image_size)
        .unwrap_or(DEFAULT_IMAGE_SIZE)
}
