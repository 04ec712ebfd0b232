//! Gradient penalty for Wasserstein critics.

use burn::prelude::*;
use rand::Rng;

use crate::model::critic::Critic;

/// Squared norms below this are treated as a zero norm. The square root is
/// taken of `max(||g||^2, NORM_EPS)` so its gradient stays finite.
const NORM_EPS: f64 = 1e-12;

/// Penalize input-gradient norms that stray from 1.
///
/// `mean_rows((||d critic(x) / dx|| - 1)^2)`, shape `[1]`. Rows whose squared
/// norm is below `1e-12` count as norm 0, so a constant critic gives exactly 1.
/// The input gradient comes from [`Critic::input_gradient`], so the penalty
/// backpropagates into the critic weights.
pub fn gradient_penalty<B: Backend>(critic: &Critic<B>, input: Tensor<B, 2>) -> Tensor<B, 1> {
    let grad = critic.input_gradient(input);
    let squared = grad.powf_scalar(2.0).sum_dim(1);
    let vanishing = squared.clone().lower_elem(NORM_EPS);
    let norm = squared.clamp_min(NORM_EPS).sqrt().mask_fill(vanishing, 0.0);
    norm.sub_scalar(1.0).powf_scalar(2.0).mean()
}

/// Random point on the segment between a generated and a style sample.
///
/// A fresh `alpha ~ U[0, 1)` is drawn on every call. The endpoints are treated
/// as constants; the result is a new leaf that tracks gradients.
pub fn interpolate<B: Backend>(
    gen: Tensor<B, 2>,
    style: Tensor<B, 2>,
    rng: &mut impl Rng,
) -> Tensor<B, 2> {
    let alpha: f64 = rng.gen();
    (gen.detach() * alpha + style.detach() * (1.0 - alpha)).require_grad()
}
