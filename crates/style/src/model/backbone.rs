//! Frozen convolutional feature extractor.
//!
//! The style and content losses only need per-stage feature maps, so any
//! network implementing [`FeatureExtractor`] can drive a transfer. The bundled
//! [`VggBackbone`] follows the VGG layout: stacks of 3x3 convolutions with
//! ReLU, separated by 2x2 max pooling.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::prelude::*;
use burn::tensor::activation::relu;

/// A network producing one feature map per stage for a `(1, 3, H, W)` image.
pub trait FeatureExtractor<B: Backend> {
    /// Feature maps, shallowest first. Each is `(1, C_i, H_i, W_i)`.
    fn extract(&self, image: Tensor<B, 4>) -> Vec<Tensor<B, 4>>;

    /// Channel count of each stage's output.
    fn stage_channels(&self) -> Vec<usize>;

    fn num_stages(&self) -> usize {
        self.stage_channels().len()
    }
}

/// Configuration for [`VggBackbone`].
#[derive(Config, Debug)]
pub struct VggBackboneConfig {
    /// Image channels.
    #[config(default = 3)]
    pub in_channels: usize,
    /// Output channels of each stage.
    #[config(default = "vec![64, 128, 256, 512]")]
    pub stage_channels: Vec<usize>,
    /// 3x3 convolutions per stage.
    #[config(default = 2)]
    pub convs_per_stage: usize,
}

/// One VGG stage: `convs_per_stage` x (3x3 conv → ReLU).
#[derive(Module, Debug)]
pub struct VggStage<B: Backend> {
    convs: Vec<Conv2d<B>>,
}

impl<B: Backend> VggStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.convs.iter().fold(x, |x, conv| relu(conv.forward(x)))
    }
}

/// VGG-style backbone. Stage `i > 0` is preceded by 2x2 max pooling.
#[derive(Module, Debug)]
pub struct VggBackbone<B: Backend> {
    stages: Vec<VggStage<B>>,
    pool: MaxPool2d,
}

impl VggBackboneConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> VggBackbone<B> {
        let conv = |c_in: usize, c_out: usize| {
            Conv2dConfig::new([c_in, c_out], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(true)
                .init(device)
        };

        let mut c_in = self.in_channels;
        let mut stages = Vec::with_capacity(self.stage_channels.len());
        for &c_out in &self.stage_channels {
            let mut convs = Vec::with_capacity(self.convs_per_stage);
            for i in 0..self.convs_per_stage.max(1) {
                convs.push(conv(if i == 0 { c_in } else { c_out }, c_out));
            }
            stages.push(VggStage { convs });
            c_in = c_out;
        }

        VggBackbone {
            stages,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

impl<B: Backend> FeatureExtractor<B> for VggBackbone<B> {
    fn extract(&self, image: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut features = Vec::with_capacity(self.stages.len());
        let mut x = image;
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                x = self.pool.forward(x);
            }
            x = stage.forward(x);
            features.push(x.clone());
        }
        features
    }

    fn stage_channels(&self) -> Vec<usize> {
        self.stages
            .iter()
            .filter_map(|stage| stage.convs.last())
            .map(|conv| conv.weight.dims()[0])
            .collect()
    }
}
