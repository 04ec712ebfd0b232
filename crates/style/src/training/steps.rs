//! The two sub-steps of a transfer iteration.
//!
//! [`disc_step`] trains the critics against a frozen image, [`sc_step`] moves
//! the image against frozen critics (or closed-form statistics). Both consume
//! the state they update and return the new state.

use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;

use crate::config::TransferConfig;
use crate::error::StyleError;
use crate::features::bridge::tensor_to_f64;
use crate::model::backbone::FeatureExtractor;
use crate::model::critic::{sum_scores, CriticMode, CriticStack};
use crate::model::image::GeneratedImage;
use crate::model::style_model::StyleModel;
use crate::training::distance::Statistic;
use crate::training::loss::{
    adversarial_style_loss, bce_critic_loss, blend, wasserstein_critic_loss,
};
use crate::training::metrics::StepLosses;
use crate::training::penalty::{gradient_penalty, interpolate};

/// What the image's style loss is measured against.
#[derive(Debug)]
pub enum StyleObjective<'a, B: Backend> {
    /// Closed-form distance to the style features.
    Statistic(Statistic),
    /// Negated score of the (frozen) critics.
    Critics(&'a CriticStack<B>),
}

/// One critic update.
///
/// The image is detached so no gradient reaches it. Scores of the style and
/// generated samples are summed over layers before the objective is applied;
/// in Wasserstein mode the per-layer gradient penalties are summed as well.
///
/// # Returns
/// The updated critics and the critic loss.
pub fn disc_step<B, E, O>(
    model: &StyleModel<B, E>,
    mut critics: CriticStack<B>,
    optimizer: &mut O,
    image: &GeneratedImage<B>,
    mode: CriticMode,
    config: &TransferConfig,
    rng: &mut impl Rng,
) -> Result<(CriticStack<B>, f64), StyleError>
where
    B: AutodiffBackend,
    E: FeatureExtractor<B> + Module<B>,
    O: Optimizer<CriticStack<B>, B>,
{
    let features = model.extract(image.pixels_detached());
    let (gens, styles): (Vec<_>, Vec<_>) =
        model.sample_pairs(&features, rng)?.into_iter().unzip();

    let real = sum_scores(critics.scores_train(&styles));
    let gen = sum_scores(critics.scores_train(&gens));

    let loss = match mode {
        CriticMode::SpectralNorm => bce_critic_loss(real, gen),
        CriticMode::Wasserstein => {
            let penalties = critics
                .critics
                .iter()
                .zip(gens.into_iter().zip(styles))
                .map(|(critic, (g, s))| {
                    gradient_penalty(critic, interpolate(g, s, &mut *rng))
                })
                .collect();
            wasserstein_critic_loss(real, gen, sum_scores(penalties), config.gp_weight)
        }
    };
    let value = tensor_to_f64(loss.clone());

    let grads = GradientsParams::from_grads(loss.backward(), &critics);
    let critics = optimizer.step(config.disc_lr, critics, grads);
    Ok((critics, value))
}

/// One image update.
///
/// Critics are evaluated with gradients disabled on their weights, so only
/// the image pixels move. The style loss is summed over layers and blended
/// with the content loss as `alpha * style + (1 - alpha) * content`.
pub fn sc_step<B, E, O>(
    model: &StyleModel<B, E>,
    objective: StyleObjective<'_, B>,
    optimizer: &mut O,
    image: GeneratedImage<B>,
    config: &TransferConfig,
    rng: &mut impl Rng,
) -> Result<(GeneratedImage<B>, StepLosses), StyleError>
where
    B: AutodiffBackend,
    E: FeatureExtractor<B> + Module<B>,
    O: Optimizer<GeneratedImage<B>, B>,
{
    let features = model.extract(image.pixels());

    let style = match objective {
        StyleObjective::Statistic(statistic) => {
            sum_scores(model.statistic_losses(statistic, &features, rng)?)
        }
        StyleObjective::Critics(critics) => {
            let frozen = critics.clone().no_grad();
            let samples = model.sample_generated(&features, rng)?;
            adversarial_style_loss(sum_scores(frozen.scores(&samples)))
        }
    };
    let content = model.content_loss(&features);

    let losses = StepLosses {
        style: tensor_to_f64(style.clone()),
        content: tensor_to_f64(content.clone()),
    };

    let loss = blend(style, content, config.alpha);
    let grads = GradientsParams::from_grads(loss.backward(), &image);
    let image = optimizer.step(config.img_lr, image, grads);
    Ok((image, losses))
}
