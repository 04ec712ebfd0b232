//! Transfer hyperparameters and the closed set of style-loss families.

use std::fmt;
use std::str::FromStr;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::StyleError;
use crate::model::critic::CriticMode;
use crate::training::distance::Statistic;

/// Which style loss drives the transfer.
///
/// Parsed once from the `distance` / `disc` flag pair and matched exhaustively
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceKind {
    /// Per-channel mean and standard deviation matching.
    #[serde(rename = "m1")]
    FirstMoment,
    /// Mean, standard deviation and (attenuated) skew matching.
    #[serde(rename = "m3")]
    ThirdMoment,
    /// Normalized Gram matrix matching.
    #[serde(rename = "gram")]
    Gramian,
    /// Spectral-norm critic trained with binary cross-entropy.
    #[serde(rename = "disc-sn")]
    SpectralCritic,
    /// Unconstrained critic trained as a Wasserstein critic with gradient penalty.
    #[serde(rename = "disc-wass")]
    WassersteinCritic,
}

/// Prefix of `distance` values that select the adversarial path.
pub const ADVERSARIAL_PREFIX: &str = "disc-";

impl DistanceKind {
    /// Resolve the `distance` / `disc` flag pair.
    ///
    /// `distance` is either `kernel` (closed-form statistics, chosen by `disc`)
    /// or `disc-sn` / `disc-wass` (adversarial critics; `disc` is ignored).
    pub fn from_flags(distance: &str, disc: &str) -> Result<Self, StyleError> {
        if let Some(mode) = distance.strip_prefix(ADVERSARIAL_PREFIX) {
            return match mode {
                "sn" => Ok(Self::SpectralCritic),
                "wass" => Ok(Self::WassersteinCritic),
                _ => Err(StyleError::UnknownDistance(distance.to_string())),
            };
        }
        match distance {
            "kernel" => match disc {
                "m1" => Ok(Self::FirstMoment),
                "m3" => Ok(Self::ThirdMoment),
                "gram" => Ok(Self::Gramian),
                other => Err(StyleError::UnknownStatistic(other.to_string())),
            },
            other => Err(StyleError::UnknownDistance(other.to_string())),
        }
    }

    /// Whether this family trains critics alongside the image.
    pub fn is_adversarial(self) -> bool {
        matches!(self, Self::SpectralCritic | Self::WassersteinCritic)
    }

    /// The closed-form statistic for non-adversarial families.
    pub fn statistic(self, skew_scale: f64) -> Option<Statistic> {
        match self {
            Self::FirstMoment => Some(Statistic::FirstMoment),
            Self::ThirdMoment => Some(Statistic::ThirdMoment { skew_scale }),
            Self::Gramian => Some(Statistic::Gramian),
            Self::SpectralCritic | Self::WassersteinCritic => None,
        }
    }

    /// The critic regularization for adversarial families.
    pub fn critic_mode(self) -> Option<CriticMode> {
        match self {
            Self::SpectralCritic => Some(CriticMode::SpectralNorm),
            Self::WassersteinCritic => Some(CriticMode::Wasserstein),
            Self::FirstMoment | Self::ThirdMoment | Self::Gramian => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::FirstMoment => "m1",
            Self::ThirdMoment => "m3",
            Self::Gramian => "gram",
            Self::SpectralCritic => "disc-sn",
            Self::WassersteinCritic => "disc-wass",
        }
    }
}

impl fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses the single-token form used in TOML files (`m1`, `gram`, `disc-wass`, ...).
impl FromStr for DistanceKind {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(ADVERSARIAL_PREFIX) {
            Self::from_flags(s, "")
        } else {
            Self::from_flags("kernel", s)
        }
    }
}

/// Configuration for a style transfer run.
#[derive(Config, Debug)]
pub struct TransferConfig {
    /// Style loss family.
    #[config(default = "DistanceKind::FirstMoment")]
    pub distance: DistanceKind,
    /// Style/content blend: loss = alpha * style + (1 - alpha) * content.
    #[config(default = 0.5)]
    pub alpha: f64,
    /// Adam learning rate for the image pixels.
    #[config(default = 1e-2)]
    pub img_lr: f64,
    /// Adam learning rate for the critics (adversarial families only).
    #[config(default = 1e-3)]
    pub disc_lr: f64,
    /// Total number of optimization steps.
    #[config(default = 1000)]
    pub steps: usize,
    /// Feature vectors sampled per style layer and step.
    #[config(default = 256)]
    pub k: usize,
    /// Backbone stages that carry a style loss.
    #[config(default = "vec![0, 1, 2, 3]")]
    pub style_layers: Vec<usize>,
    /// Backbone stage used for the content reconstruction loss.
    #[config(default = 3)]
    pub content_layer: usize,
    /// Weight of the gradient penalty in the Wasserstein critic loss.
    #[config(default = 10.0)]
    pub gp_weight: f64,
    /// Multiplier on the skew term of the third-moment distance.
    #[config(default = 1e-20)]
    pub skew_scale: f64,
    /// Hidden width of each critic MLP.
    #[config(default = 256)]
    pub critic_hidden: usize,
    /// Steps between progress log lines. 0 disables them.
    #[config(default = 100)]
    pub log_interval: usize,
    /// Draw an indicatif progress bar.
    #[config(default = true)]
    pub show_progress: bool,
    /// Seed for sampling, interpolation and tensor initialization.
    pub seed: Option<u64>,
}

impl TransferConfig {
    /// Reject hyperparameters the loop cannot run with.
    pub fn validate(&self) -> Result<(), StyleError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(StyleError::InvalidConfig(format!(
                "alpha must lie in [0, 1], got {}",
                self.alpha
            )));
        }
        if self.k == 0 {
            return Err(StyleError::InvalidConfig("k must be positive".to_string()));
        }
        if self.img_lr <= 0.0 {
            return Err(StyleError::InvalidConfig(format!(
                "img_lr must be positive, got {}",
                self.img_lr
            )));
        }
        if self.distance.is_adversarial() && self.disc_lr <= 0.0 {
            return Err(StyleError::InvalidConfig(format!(
                "disc_lr must be positive, got {}",
                self.disc_lr
            )));
        }
        if self.style_layers.is_empty() {
            return Err(StyleError::InvalidConfig(
                "at least one style layer is required".to_string(),
            ));
        }
        if self.critic_hidden == 0 {
            return Err(StyleError::InvalidConfig(
                "critic_hidden must be positive".to_string(),
            ));
        }
        if self.gp_weight < 0.0 {
            return Err(StyleError::InvalidConfig(format!(
                "gp_weight must be non-negative, got {}",
                self.gp_weight
            )));
        }
        if self.alpha == 0.0 || self.alpha == 1.0 {
            tracing::warn!(
                alpha = self.alpha,
                "alpha = {}, one of the style/content terms is disabled",
                self.alpha
            );
        }
        Ok(())
    }
}
