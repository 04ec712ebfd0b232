//! Critic objectives and the content reconstruction loss.
//!
//! Every function is generic over `B: Backend` and returns a `[1]`-shaped
//! loss tensor. Critic scores are logits: higher means "looks like the style
//! image".

use burn::nn::loss::{BinaryCrossEntropyLossConfig, MseLoss, Reduction};
use burn::prelude::*;

/// Binary cross-entropy objective for a spectral-norm critic.
///
/// Style scores are pushed towards label 1, generated scores towards 0:
/// `BCE(real, 1) + BCE(gen, 0)`, with sigmoid applied internally.
///
/// # Arguments
/// - `real`: critic logit for style features, shape `[1]`
/// - `gen`: critic logit for generated features, shape `[1]`
pub fn bce_critic_loss<B: Backend>(real: Tensor<B, 1>, gen: Tensor<B, 1>) -> Tensor<B, 1> {
    let device = real.device();
    let bce = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(&device);

    let ones = Tensor::<B, 1, Int>::ones(real.dims(), &device);
    let zeros = Tensor::<B, 1, Int>::zeros(gen.dims(), &device);

    bce.forward(real, ones) + bce.forward(gen, zeros)
}

/// Wasserstein critic objective with gradient penalty.
///
/// `gen - real + gp_weight * gp`. Minimizing it widens the score gap between
/// style and generated features while keeping the critic close to 1-Lipschitz.
pub fn wasserstein_critic_loss<B: Backend>(
    real: Tensor<B, 1>,
    gen: Tensor<B, 1>,
    gp: Tensor<B, 1>,
    gp_weight: f64,
) -> Tensor<B, 1> {
    gen - real + gp * gp_weight
}

/// Style loss seen by the image in adversarial mode: the negated critic score.
pub fn adversarial_style_loss<B: Backend>(score: Tensor<B, 1>) -> Tensor<B, 1> {
    score.neg()
}

/// Mean squared error between two feature maps.
pub fn content_loss<B: Backend>(features: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    MseLoss::new().forward(features, target, Reduction::Mean)
}

/// Blend style and content losses: `alpha * style + (1 - alpha) * content`.
pub fn blend<B: Backend>(style: Tensor<B, 1>, content: Tensor<B, 1>, alpha: f64) -> Tensor<B, 1> {
    style * alpha + content * (1.0 - alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    fn scalar(value: f32) -> Tensor<TestBackend, 1> {
        let device = Default::default();
        Tensor::from_data(TensorData::new(vec![value], [1]), &device)
    }

    fn value(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem()
    }

    #[test]
    fn test_bce_undecided_critic() {
        // sigmoid(0) = 0.5 on both sides: 2 * ln 2
        let loss = value(bce_critic_loss(scalar(0.0), scalar(0.0)));
        assert!((loss - 2.0 * std::f32::consts::LN_2).abs() < 1e-5, "got {loss}");
    }

    #[test]
    fn test_bce_rewards_separation() {
        let confident = value(bce_critic_loss(scalar(6.0), scalar(-6.0)));
        let wrong = value(bce_critic_loss(scalar(-6.0), scalar(6.0)));
        assert!(confident < 0.01, "separated scores should give ~0 loss, got {confident}");
        assert!(wrong > 10.0, "inverted scores should be penalized, got {wrong}");
    }

    #[test]
    fn test_wasserstein_loss() {
        let loss = value(wasserstein_critic_loss(scalar(2.0), scalar(0.5), scalar(0.1), 10.0));
        // 0.5 - 2.0 + 10 * 0.1
        assert!((loss - (-0.5)).abs() < 1e-6, "got {loss}");
    }

    #[test]
    fn test_adversarial_style_loss_negates() {
        assert_eq!(value(adversarial_style_loss(scalar(3.0))), -3.0);
    }

    #[test]
    fn test_content_loss() {
        let device = Default::default();
        let a = Tensor::<TestBackend, 4>::zeros([1, 2, 2, 2], &device);
        let b = Tensor::<TestBackend, 4>::ones([1, 2, 2, 2], &device) * 2.0;
        assert!((value(content_loss(a.clone(), b)) - 4.0).abs() < 1e-6);
        assert_eq!(value(content_loss(a.clone(), a)), 0.0);
    }

    #[test]
    fn test_blend_endpoints() {
        assert_eq!(value(blend(scalar(3.0), scalar(5.0), 1.0)), 3.0);
        assert_eq!(value(blend(scalar(3.0), scalar(5.0), 0.0)), 5.0);
        assert!((value(blend(scalar(3.0), scalar(5.0), 0.5)) - 4.0).abs() < 1e-6);
    }
}
