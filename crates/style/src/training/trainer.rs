//! Alternating transfer loop.
//!
//! Each of the `steps` iterations runs an optional critic update followed by
//! an image update, then clamps the image back into `[0, 1]`. There is no
//! early stopping and no recovery from non-finite losses.

use std::time::Instant;

use burn::optim::AdamConfig;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::TransferConfig;
use crate::error::StyleError;
use crate::model::backbone::FeatureExtractor;
use crate::model::critic::CriticStack;
use crate::model::image::GeneratedImage;
use crate::model::style_model::StyleModel;
use crate::training::metrics::LossHistory;
use crate::training::steps::{disc_step, sc_step, StyleObjective};

/// Result of a finished transfer.
#[derive(Debug)]
pub struct TransferOutcome<B: Backend> {
    /// The optimized image, pixels in `[0, 1]`.
    pub image: GeneratedImage<B>,
    /// Trained critics, present only for adversarial distances.
    pub critics: Option<CriticStack<B>>,
    pub history: LossHistory,
}

fn progress_bar(steps: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(steps as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Optimize `initial` towards the style and content targets held by `model`.
///
/// Critics are built here (after seeding) when the configured distance is
/// adversarial, together with their own Adam optimizer; statistical
/// distances never construct either.
///
/// # Arguments
/// - `config`: transfer hyperparameters, validated before anything runs
/// - `model`: frozen backbone with precomputed style and content targets
/// - `initial`: starting image, `(1, 3, H, W)` with values in `[0, 1]`
/// - `device`: device for the critics
pub fn transfer<B, E>(
    config: &TransferConfig,
    model: &StyleModel<B, E>,
    initial: Tensor<B, 4>,
    device: &B::Device,
) -> Result<TransferOutcome<B>, StyleError>
where
    B: AutodiffBackend,
    E: FeatureExtractor<B> + Module<B>,
{
    config.validate()?;

    let mut rng = match config.seed {
        Some(seed) => {
            B::seed(seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let statistic = config.distance.statistic(config.skew_scale);
    let critic_mode = config.distance.critic_mode();
    let mut critics = model.critics(config, device);
    let mut disc_optim = critics
        .as_ref()
        .map(|_| AdamConfig::new().init::<B, CriticStack<B>>());
    let mut img_optim = AdamConfig::new().init::<B, GeneratedImage<B>>();

    let mut image = GeneratedImage::new(initial.clamp(0.0, 1.0).detach());
    let mut history = LossHistory::new();
    let mut warned_non_finite = false;

    tracing::info!(
        distance = %config.distance,
        steps = config.steps,
        alpha = config.alpha,
        k = config.k,
        image = ?image.dims(),
        critics = critics.as_ref().map_or(0, CriticStack::len),
        "Starting style transfer"
    );

    let pb = progress_bar(config.steps, config.show_progress);
    let start = Instant::now();

    for step in 0..config.steps {
        let disc_loss = match (critics.take(), disc_optim.as_mut(), critic_mode) {
            (Some(stack), Some(optim), Some(mode)) => {
                let (stack, loss) =
                    disc_step(model, stack, optim, &image, mode, config, &mut rng)?;
                critics = Some(stack);
                Some(loss)
            }
            (stack, _, _) => {
                critics = stack;
                None
            }
        };

        let objective = match (&critics, statistic) {
            (Some(stack), _) => StyleObjective::Critics(stack),
            (None, Some(statistic)) => StyleObjective::Statistic(statistic),
            (None, None) => {
                return Err(StyleError::InvalidConfig(format!(
                    "distance {} has neither critics nor a statistic",
                    config.distance
                )))
            }
        };
        let (next, losses) = sc_step(model, objective, &mut img_optim, image, config, &mut rng)?;
        image = next.clamp();

        history.record(losses, disc_loss);

        if !warned_non_finite {
            let warnings = history.health_check();
            if !warnings.is_empty() {
                tracing::warn!(step, "Non-finite losses: {:?}", warnings);
                warned_non_finite = true;
            }
        }

        pb.set_message(history.display());
        pb.inc(1);

        if config.log_interval > 0 && step % config.log_interval == 0 {
            tracing::info!(step, "{}", history.display());
        }
    }

    pb.finish_and_clear();

    let elapsed = start.elapsed().as_secs_f64();
    tracing::info!(
        steps = history.len(),
        elapsed_s = format!("{elapsed:.1}"),
        "Style transfer complete: {}",
        history.display()
    );

    Ok(TransferOutcome {
        image,
        critics,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceKind;
    use crate::model::backbone::{VggBackbone, VggBackboneConfig};
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::Distribution;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn image() -> Tensor<TestBackend, 4> {
        let device = Default::default();
        Tensor::random([1, 3, 8, 8], Distribution::Uniform(0.0, 1.0), &device)
    }

    fn config(distance: DistanceKind) -> TransferConfig {
        TransferConfig::new()
            .with_distance(distance)
            .with_steps(3)
            .with_style_layers(vec![0, 1])
            .with_content_layer(1)
            .with_k(16)
            .with_critic_hidden(8)
            .with_show_progress(false)
            .with_seed(Some(42))
    }

    fn model(config: &TransferConfig) -> StyleModel<TestBackend, VggBackbone<TestBackend>> {
        let device = Default::default();
        let backbone = VggBackboneConfig::new()
            .with_stage_channels(vec![4, 8])
            .init::<TestBackend>(&device);
        StyleModel::new(backbone, image(), image(), config).unwrap()
    }

    #[test]
    fn test_statistical_transfer_has_no_critics() {
        let device = Default::default();
        let config = config(DistanceKind::FirstMoment);
        let outcome = transfer(&config, &model(&config), image(), &device).unwrap();

        assert_eq!(outcome.history.style.len(), 3);
        assert_eq!(outcome.history.content.len(), 3);
        assert!(outcome.history.disc.is_empty());
        assert!(outcome.critics.is_none());
    }

    #[test]
    fn test_adversarial_transfer_records_disc_losses() {
        let device = Default::default();
        let config = config(DistanceKind::SpectralCritic);
        let outcome = transfer(&config, &model(&config), image(), &device).unwrap();

        assert_eq!(outcome.history.len(), 3);
        assert_eq!(outcome.history.disc.len(), 3);
        assert_eq!(outcome.critics.map(|c| c.len()), Some(2));
    }

    #[test]
    fn test_pixels_clamped() {
        let device = Default::default();
        let config = config(DistanceKind::Gramian).with_img_lr(0.5);
        let start = image() * 3.0 - 1.0;
        let outcome = transfer(&config, &model(&config), start, &device).unwrap();

        let pixels = outcome.image.pixels_detached();
        let min: f32 = pixels.clone().min().into_scalar().elem();
        let max: f32 = pixels.max().into_scalar().elem();
        assert!(min >= 0.0 && max <= 1.0, "pixels out of range: [{min}, {max}]");
    }

    #[test]
    fn test_zero_steps_returns_initial_image() {
        let device = Default::default();
        let config = config(DistanceKind::WassersteinCritic).with_steps(0);
        let start = image();
        let outcome = transfer(&config, &model(&config), start.clone(), &device).unwrap();

        assert!(outcome.history.is_empty());
        let diff: f32 = (outcome.image.pixels_detached() - start)
            .abs()
            .max()
            .into_scalar()
            .elem();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let device = Default::default();
        let config = config(DistanceKind::FirstMoment).with_alpha(1.5);
        let err = transfer(&config, &model(&config.clone().with_alpha(0.5)), image(), &device)
            .err()
            .expect("alpha outside [0, 1] should fail");
        assert!(matches!(err, StyleError::InvalidConfig(_)));
    }
}
