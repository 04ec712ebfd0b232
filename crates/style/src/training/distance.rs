//! Closed-form two-sample distances between batches of feature vectors.
//!
//! All distances take `(batch, N, C)` tensors (N spatial samples of C
//! channels) and compare statistics computed over the spatial axis. They are
//! generic over the tensor rank so that a wrongly shaped input is reported as
//! a [`StyleError::Rank`] instead of silently reshaped.

use burn::prelude::*;

use crate::error::StyleError;

/// Added to the standard deviation before cubing in the skew term.
pub const SKEW_EPS: f64 = 1e-5;

/// Added to the variance before the square root, so that constant channels
/// (common after ReLU) keep a finite gradient.
const VAR_EPS: f64 = 1e-12;

/// A closed-form style statistic, selected once at setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    FirstMoment,
    ThirdMoment { skew_scale: f64 },
    Gramian,
}

impl Statistic {
    /// Distance between two `(batch, N, C)` batches, mean-reduced to a scalar.
    pub fn distance<B: Backend>(
        &self,
        y_true: Tensor<B, 3>,
        y_pred: Tensor<B, 3>,
    ) -> Result<Tensor<B, 1>, StyleError> {
        let reduced = match *self {
            Self::FirstMoment => first_moment_distance(y_true, y_pred)?.mean(),
            Self::ThirdMoment { skew_scale } => {
                third_moment_distance(y_true, y_pred, skew_scale)?.mean()
            }
            Self::Gramian => gramian_distance(y_true, y_pred)?.mean(),
        };
        Ok(reduced)
    }
}

/// Per-channel mean and variance matching.
///
/// Returns `(batch, C)`: `(mu_true - mu_pred)^2 + (std_true - std_pred)^2`,
/// using the population standard deviation over the spatial axis.
pub fn first_moment_distance<B: Backend, const D: usize>(
    y_true: Tensor<B, D>,
    y_pred: Tensor<B, D>,
) -> Result<Tensor<B, 2>, StyleError> {
    let a = Moments::of(expect_rank3(y_true)?);
    let b = Moments::of(expect_rank3(y_pred)?);

    let loss = (a.mean - b.mean).powf_scalar(2.0) + (a.std - b.std).powf_scalar(2.0);
    Ok(loss.squeeze::<2>(1))
}

/// First-moment distance plus a skew term.
///
/// `skew = mean((x - mu)^3) / (std + 1e-5)^3`. The third central moment in
/// the numerator is averaged over locations and channels together, then
/// divided by each channel's own standard deviation. The absolute skew
/// difference is multiplied by `skew_scale` before being added; the default
/// scale of `1e-20` leaves it as a tie-breaker only.
pub fn third_moment_distance<B: Backend, const D: usize>(
    y_true: Tensor<B, D>,
    y_pred: Tensor<B, D>,
    skew_scale: f64,
) -> Result<Tensor<B, 2>, StyleError> {
    let a = Moments::of(expect_rank3(y_true)?);
    let b = Moments::of(expect_rank3(y_pred)?);

    let skew_a = a.skew();
    let skew_b = b.skew();

    let loss = (a.mean - b.mean).powf_scalar(2.0)
        + (a.std - b.std).powf_scalar(2.0)
        + (skew_a - skew_b).abs().mul_scalar(skew_scale);
    Ok(loss.squeeze::<2>(1))
}

/// Elementwise squared difference of the normalized Gram matrices.
///
/// `G = sum_n x_n x_n^T / N`, one `(C, C)` matrix per batch entry. Returns the
/// unreduced `(batch, C, C)` difference; callers reduce as needed.
pub fn gramian_distance<B: Backend, const D: usize>(
    y_true: Tensor<B, D>,
    y_pred: Tensor<B, D>,
) -> Result<Tensor<B, 3>, StyleError> {
    let gram_true = gram(expect_rank3(y_true)?);
    let gram_pred = gram(expect_rank3(y_pred)?);
    Ok((gram_true - gram_pred).powf_scalar(2.0))
}

fn gram<B: Backend>(feats: Tensor<B, 3>) -> Tensor<B, 3> {
    let [_, num_locs, _] = feats.dims();
    feats
        .clone()
        .swap_dims(1, 2)
        .matmul(feats)
        .div_scalar(num_locs as f64)
}

fn expect_rank3<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
) -> Result<Tensor<B, 3>, StyleError> {
    if D != 3 {
        return Err(StyleError::Rank {
            expected: 3,
            actual: D,
        });
    }
    let dims = tensor.dims();
    Ok(tensor.reshape([dims[0], dims[1], dims[2]]))
}

/// Spatial statistics of a `(batch, N, C)` tensor, kept as `(batch, 1, C)`.
struct Moments<B: Backend> {
    mean: Tensor<B, 3>,
    std: Tensor<B, 3>,
    centered: Tensor<B, 3>,
}

impl<B: Backend> Moments<B> {
    fn of(feats: Tensor<B, 3>) -> Self {
        let mean = feats.clone().mean_dim(1);
        let centered = feats - mean.clone();
        let std = centered
            .clone()
            .powf_scalar(2.0)
            .mean_dim(1)
            .add_scalar(VAR_EPS)
            .sqrt();
        Self {
            mean,
            std,
            centered,
        }
    }

    fn skew(&self) -> Tensor<B, 3> {
        let cubed = self.centered.clone() * self.centered.clone() * self.centered.clone();
        let denom = self.std.clone().add_scalar(SKEW_EPS).powf_scalar(3.0);
        // (batch, 1, 1) numerator, broadcast against the per-channel std
        cubed.mean_dim(1).mean_dim(2) / denom
    }
}
