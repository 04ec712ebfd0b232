use burn::prelude::*;
use burn::tensor::activation::relu;

use crate::model::spectral_norm::{SpectralNormLinear, SpectralNormLinearConfig};

/// How a critic keeps its Lipschitz constant in check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticMode {
    /// Spectral-normalized weights, trained with binary cross-entropy.
    SpectralNorm,
    /// Unconstrained weights, trained as a Wasserstein critic with a
    /// gradient penalty.
    Wasserstein,
}

/// Configuration for a per-layer style critic.
///
/// ```text
/// (k, d_input)
///   → Linear(d_input→d_hidden) → ReLU
///   → Linear(d_hidden→d_hidden) → ReLU
///   → Linear(d_hidden→1)
///   → score: (k, 1)
/// ```
#[derive(Config, Debug)]
pub struct CriticConfig {
    /// Channels of the feature map this critic is attached to.
    pub d_input: usize,
    /// Hidden layer width.
    #[config(default = 256)]
    pub d_hidden: usize,
}

/// Feed-forward critic scoring how style-like each sampled feature vector is.
#[derive(Module, Debug)]
pub struct Critic<B: Backend> {
    pub(crate) linear1: SpectralNormLinear<B>,
    pub(crate) linear2: SpectralNormLinear<B>,
    pub(crate) linear3: SpectralNormLinear<B>,
}

impl CriticConfig {
    pub fn init<B: Backend>(&self, mode: CriticMode, device: &B::Device) -> Critic<B> {
        let layer = |d_in: usize, d_out: usize| {
            SpectralNormLinearConfig::new(d_in, d_out)
                .with_enabled(mode == CriticMode::SpectralNorm)
                .with_n_power_iterations(1)
                .with_eps(1e-12)
                .init(device)
        };
        Critic {
            linear1: layer(self.d_input, self.d_hidden),
            linear2: layer(self.d_hidden, self.d_hidden),
            linear3: layer(self.d_hidden, 1),
        }
    }
}

impl<B: Backend> Critic<B> {
    /// Evaluation forward pass. Input `(k, d_input)`, output `(k, 1)`.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.linear1.forward(x));
        let x = relu(self.linear2.forward(x));
        self.linear3.forward(x)
    }

    /// Training forward pass; advances the spectral-norm power iteration.
    pub fn forward_train(&mut self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.linear1.forward_train(x));
        let x = relu(self.linear2.forward_train(x));
        self.linear3.forward_train(x)
    }

    /// Mean score over a sample, shape `[1]`.
    pub fn score(&self, x: Tensor<B, 2>) -> Tensor<B, 1> {
        self.forward(x).mean()
    }

    /// Mean score over a sample in training mode, shape `[1]`.
    pub fn score_train(&mut self, x: Tensor<B, 2>) -> Tensor<B, 1> {
        self.forward_train(x).mean()
    }

    /// Gradient of `sum(forward(x))` with respect to `x`, shape `(k, d_input)`.
    ///
    /// Computed in closed form by back-substituting through the ReLU masks, so
    /// the result stays on the autodiff graph of the critic weights and can
    /// itself be differentiated (the gradient penalty needs this). Matches the
    /// autodiff input gradient wherever no pre-activation is exactly zero.
    pub fn input_gradient(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let [k, _] = x.dims();
        let device = x.device();

        let w1 = self.linear1.effective_weight();
        let w2 = self.linear2.effective_weight();
        let w3 = self.linear3.effective_weight();

        let h1 = self.linear1.forward(x);
        let mask1 = h1.clone().greater_elem(0.0).float().detach();
        let h2 = self.linear2.forward(relu(h1));
        let mask2 = h2.greater_elem(0.0).float().detach();

        // d out / d a2 = 1 @ W3, then back through each ReLU and linear map
        let upstream = Tensor::<B, 2>::ones([k, 1], &device);
        let grad_a2 = upstream.matmul(w3);
        let grad_a1 = (grad_a2 * mask2).matmul(w2);
        (grad_a1 * mask1).matmul(w1)
    }

    pub fn d_input(&self) -> usize {
        self.linear1.d_input()
    }
}

/// One critic per style layer, trained together by a single optimizer.
#[derive(Module, Debug)]
pub struct CriticStack<B: Backend> {
    pub(crate) critics: Vec<Critic<B>>,
}

impl<B: Backend> CriticStack<B> {
    /// Build a critic for each style layer, given that layer's channel count.
    pub fn new(
        channels: &[usize],
        d_hidden: usize,
        mode: CriticMode,
        device: &B::Device,
    ) -> Self {
        let critics = channels
            .iter()
            .map(|&c| {
                CriticConfig::new(c)
                    .with_d_hidden(d_hidden)
                    .init(mode, device)
            })
            .collect();
        Self { critics }
    }

    pub fn len(&self) -> usize {
        self.critics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.critics.is_empty()
    }

    pub fn get(&self, layer: usize) -> Option<&Critic<B>> {
        self.critics.get(layer)
    }

    /// Per-layer evaluation scores, one `[1]` tensor per sample.
    ///
    /// # Panics
    /// Panics if the number of samples differs from the number of critics.
    pub fn scores(&self, samples: &[Tensor<B, 2>]) -> Vec<Tensor<B, 1>> {
        assert_eq!(samples.len(), self.critics.len(), "one sample per critic");
        self.critics
            .iter()
            .zip(samples)
            .map(|(critic, sample)| critic.score(sample.clone()))
            .collect()
    }

    /// Per-layer training-mode scores.
    ///
    /// # Panics
    /// Panics if the number of samples differs from the number of critics.
    pub fn scores_train(&mut self, samples: &[Tensor<B, 2>]) -> Vec<Tensor<B, 1>> {
        assert_eq!(samples.len(), self.critics.len(), "one sample per critic");
        self.critics
            .iter_mut()
            .zip(samples)
            .map(|(critic, sample)| critic.score_train(sample.clone()))
            .collect()
    }
}

/// Sum per-layer `[1]` scores into one `[1]` tensor.
///
/// # Panics
/// Panics if `scores` is empty.
pub fn sum_scores<B: Backend>(scores: Vec<Tensor<B, 1>>) -> Tensor<B, 1> {
    assert!(!scores.is_empty(), "no scores to combine");
    Tensor::cat(scores, 0).sum()
}
