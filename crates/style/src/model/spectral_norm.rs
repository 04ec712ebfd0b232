use burn::module::Param;
use burn::prelude::*;
use burn::tensor::Distribution;

/// Configuration for a spectral-normalized linear layer.
#[derive(Config, Debug)]
pub struct SpectralNormLinearConfig {
    /// Input dimension.
    pub d_input: usize,
    /// Output dimension.
    pub d_output: usize,
    /// Rescale the weight by its spectral norm. When false the layer is a
    /// plain affine map.
    #[config(default = true)]
    pub enabled: bool,
    /// Power iterations per training forward pass.
    #[config(default = 1)]
    pub n_power_iterations: usize,
    /// Power iterations run once at construction so the first estimate is
    /// already close to the largest singular value.
    #[config(default = 10)]
    pub n_init_iterations: usize,
    /// Small constant for numerical stability in normalization.
    #[config(default = 1e-12)]
    pub eps: f64,
    /// Whether to include a bias term.
    #[config(default = true)]
    pub bias: bool,
}

/// Linear layer with spectral normalization.
///
/// The weight is divided by an estimate of its largest singular value,
/// `sigma = u^T W v`. The singular vectors `u` and `v` persist across calls:
/// [`forward_train`](Self::forward_train) advances them by
/// `n_power_iterations` steps of power iteration before normalizing, while
/// [`forward`](Self::forward) reuses them as they are. The vectors are
/// detached; gradients reach the weight only through the division by sigma.
#[derive(Module, Debug)]
pub struct SpectralNormLinear<B: Backend> {
    /// Weight matrix, shape (d_output, d_input). Kaiming initialized.
    pub(crate) weight: Param<Tensor<B, 2>>,
    /// Optional bias, shape (d_output,). Zero initialized.
    pub(crate) bias: Option<Param<Tensor<B, 1>>>,
    /// Left singular vector estimate, shape (d_output,).
    u: Tensor<B, 1>,
    /// Right singular vector estimate, shape (d_input,).
    v: Tensor<B, 1>,
    enabled: bool,
    n_power_iterations: usize,
    eps: f64,
}

impl SpectralNormLinearConfig {
    /// Initialize a SpectralNormLinear layer.
    ///
    /// Weight uses Kaiming (He) initialization: Normal(0, sqrt(2/fan_in)).
    /// Bias is zero-initialized.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SpectralNormLinear<B> {
        let std_dev = (2.0 / self.d_input as f64).sqrt();
        let weight = Tensor::random(
            [self.d_output, self.d_input],
            Distribution::Normal(0.0, std_dev),
            device,
        );
        self.init_with_weight(weight)
    }

    /// Build a layer around an existing `(d_output, d_input)` weight.
    ///
    /// # Panics
    /// Panics if the weight shape disagrees with the configured dimensions.
    pub fn init_with_weight<B: Backend>(&self, weight: Tensor<B, 2>) -> SpectralNormLinear<B> {
        assert_eq!(
            weight.dims(),
            [self.d_output, self.d_input],
            "weight shape does not match d_output x d_input"
        );
        let device = weight.device();

        let bias = if self.bias {
            Some(Param::from_tensor(Tensor::zeros([self.d_output], &device)))
        } else {
            None
        };

        let u = normalize(
            Tensor::random([self.d_output], Distribution::Normal(0.0, 1.0), &device),
            self.eps,
        );
        let v = normalize(
            Tensor::random([self.d_input], Distribution::Normal(0.0, 1.0), &device),
            self.eps,
        );

        let mut layer = SpectralNormLinear {
            weight: Param::from_tensor(weight),
            bias,
            u,
            v,
            enabled: self.enabled,
            n_power_iterations: self.n_init_iterations,
            eps: self.eps,
        };
        if layer.enabled {
            layer.update_singular_vectors();
        }
        layer.n_power_iterations = self.n_power_iterations;
        layer
    }
}

impl<B: Backend> SpectralNormLinear<B> {
    /// Evaluation forward pass: `input @ W_normed^T + bias` with the stored
    /// singular vectors.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let output = input.matmul(self.effective_weight().transpose());
        match &self.bias {
            Some(b) => output + b.val().unsqueeze_dim::<2>(0),
            None => output,
        }
    }

    /// Training forward pass: advance the power iteration, then apply.
    pub fn forward_train(&mut self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        if self.enabled {
            self.update_singular_vectors();
        }
        self.forward(input)
    }

    /// Weight as applied by `forward`, shape (d_output, d_input).
    ///
    /// Divided by the spectral norm estimate when enabled, raw otherwise.
    pub fn effective_weight(&self) -> Tensor<B, 2> {
        let weight = self.weight.val();
        if !self.enabled {
            return weight;
        }
        // (1, d_out) @ (d_out, d_in) @ (d_in, 1) = (1, 1)
        let sigma = self
            .u
            .clone()
            .unsqueeze_dim::<2>(0)
            .matmul(weight.clone().matmul(self.v.clone().unsqueeze_dim::<2>(1)))
            .abs()
            .clamp_min(self.eps);
        weight / sigma
    }

    /// Current spectral norm estimate of the raw weight.
    pub fn sigma(&self) -> f64 {
        let weight = self.weight.val().detach();
        let sigma: Tensor<B, 2> = self
            .u
            .clone()
            .unsqueeze_dim::<2>(0)
            .matmul(weight.matmul(self.v.clone().unsqueeze_dim::<2>(1)));
        sigma.abs().into_scalar().elem::<f64>()
    }

    pub fn d_input(&self) -> usize {
        self.weight.dims()[1]
    }

    pub fn d_output(&self) -> usize {
        self.weight.dims()[0]
    }

    fn update_singular_vectors(&mut self) {
        let weight = self.weight.val().detach();
        let mut u = self.u.clone();
        let mut v = self.v.clone();
        for _ in 0..self.n_power_iterations {
            // v = W^T u / ||W^T u||
            let wt_u: Tensor<B, 1> = weight
                .clone()
                .transpose()
                .matmul(u.unsqueeze_dim::<2>(1))
                .squeeze::<1>(1);
            v = normalize(wt_u, self.eps);

            // u = W v / ||W v||
            let w_v: Tensor<B, 1> = weight
                .clone()
                .matmul(v.clone().unsqueeze_dim::<2>(1))
                .squeeze::<1>(1);
            u = normalize(w_v, self.eps);
        }
        self.u = u.detach();
        self.v = v.detach();
    }
}

fn normalize<B: Backend>(vector: Tensor<B, 1>, eps: f64) -> Tensor<B, 1> {
    let norm = vector.clone().powf_scalar(2.0).sum().sqrt().clamp_min(eps);
    vector / norm
}

/// Largest singular value of `matrix`, by many rounds of power iteration.
#[cfg(test)]
pub(crate) fn largest_singular_value<B: Backend>(matrix: Tensor<B, 2>, iterations: usize) -> f32 {
    let [_, d_in] = matrix.dims();
    let device = matrix.device();
    let mut v = normalize(
        Tensor::<B, 1>::random([d_in], Distribution::Normal(0.0, 1.0), &device),
        1e-12,
    );
    for _ in 0..iterations {
        let w_v: Tensor<B, 1> = matrix
            .clone()
            .matmul(v.clone().unsqueeze_dim::<2>(1))
            .squeeze::<1>(1);
        let wt_w_v: Tensor<B, 1> = matrix
            .clone()
            .transpose()
            .matmul(w_v.unsqueeze_dim::<2>(1))
            .squeeze::<1>(1);
        v = normalize(wt_w_v, 1e-12);
    }
    let w_v: Tensor<B, 1> = matrix.matmul(v.unsqueeze_dim::<2>(1)).squeeze::<1>(1);
    w_v.powf_scalar(2.0).sum().sqrt().into_scalar().elem()
}
