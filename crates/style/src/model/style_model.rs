//! Style targets bound to a frozen backbone.
//!
//! Holds everything that stays fixed for a transfer: the backbone, the
//! style image's per-layer feature vectors and the content image's target
//! feature map. Every method returns its per-layer results; combining them
//! is left to the training steps.

use burn::prelude::*;
use rand::Rng;

use crate::config::TransferConfig;
use crate::error::StyleError;
use crate::features::bridge::feature_vectors;
use crate::features::sampler::FeatureSampler;
use crate::model::backbone::FeatureExtractor;
use crate::model::critic::CriticStack;
use crate::training::distance::Statistic;
use crate::training::loss::content_loss;

pub struct StyleModel<B: Backend, E> {
    backbone: E,
    style_layers: Vec<usize>,
    content_layer: usize,
    /// `(H*W, C)` tanh feature vectors of the style image, one per style layer.
    style_feats: Vec<Tensor<B, 2>>,
    /// Feature map of the content image at `content_layer`.
    content_target: Tensor<B, 4>,
    sampler: FeatureSampler,
}

impl<B, E> StyleModel<B, E>
where
    B: Backend,
    E: FeatureExtractor<B> + Module<B>,
{
    /// Freeze the backbone and precompute style and content targets.
    pub fn new(
        backbone: E,
        style_image: Tensor<B, 4>,
        content_image: Tensor<B, 4>,
        config: &TransferConfig,
    ) -> Result<Self, StyleError> {
        let backbone = backbone.no_grad();
        let stages = backbone.num_stages();
        for &index in config.style_layers.iter().chain([&config.content_layer]) {
            if index >= stages {
                return Err(StyleError::LayerOutOfRange { index, stages });
            }
        }

        let style_maps = backbone.extract(style_image.detach());
        let style_feats = config
            .style_layers
            .iter()
            .map(|&layer| feature_vectors(style_maps[layer].clone()).map(|f| f.detach()))
            .collect::<Result<Vec<_>, _>>()?;

        let content_maps = backbone.extract(content_image.detach());
        let content_target = content_maps[config.content_layer].clone().detach();
        let [batch, ..] = content_target.dims();
        if batch != 1 {
            return Err(StyleError::BatchSize(batch));
        }

        tracing::debug!(
            style_layers = ?config.style_layers,
            content_layer = config.content_layer,
            style_rows = ?style_feats.iter().map(|f| f.dims()[0]).collect::<Vec<_>>(),
            "Style targets computed"
        );

        Ok(Self {
            backbone,
            style_layers: config.style_layers.clone(),
            content_layer: config.content_layer,
            style_feats,
            content_target,
            sampler: FeatureSampler::new(config.k),
        })
    }

    /// Run the frozen backbone on an image.
    pub fn extract(&self, image: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        self.backbone.extract(image)
    }

    pub fn style_layers(&self) -> &[usize] {
        &self.style_layers
    }

    pub fn content_layer(&self) -> usize {
        self.content_layer
    }

    /// Channel count of each style layer, in style-layer order.
    pub fn style_channels(&self) -> Vec<usize> {
        self.style_feats.iter().map(|f| f.dims()[1]).collect()
    }

    pub fn sampler(&self) -> FeatureSampler {
        self.sampler
    }

    /// Build one critic per style layer.
    pub fn critics(&self, config: &TransferConfig, device: &B::Device) -> Option<CriticStack<B>> {
        config.distance.critic_mode().map(|mode| {
            CriticStack::new(&self.style_channels(), config.critic_hidden, mode, device)
        })
    }

    /// Paired `(generated, style)` samples for every style layer.
    ///
    /// Both samples of a pair have equal shape; each is drawn from its own
    /// full set of locations.
    pub fn sample_pairs(
        &self,
        features: &[Tensor<B, 4>],
        rng: &mut impl Rng,
    ) -> Result<Vec<(Tensor<B, 2>, Tensor<B, 2>)>, StyleError> {
        self.style_layers
            .iter()
            .zip(&self.style_feats)
            .map(|(&layer, style)| {
                let generated = feature_vectors(features[layer].clone())?;
                Ok(self.sampler.sample_pair(generated, style.clone(), rng))
            })
            .collect()
    }

    /// Samples of the generated image's features for every style layer.
    pub fn sample_generated(
        &self,
        features: &[Tensor<B, 4>],
        rng: &mut impl Rng,
    ) -> Result<Vec<Tensor<B, 2>>, StyleError> {
        self.style_layers
            .iter()
            .map(|&layer| {
                let generated = feature_vectors(features[layer].clone())?;
                Ok(self.sampler.sample(generated, rng))
            })
            .collect()
    }

    /// Per-layer statistical distance between style and generated samples.
    pub fn statistic_losses(
        &self,
        statistic: Statistic,
        features: &[Tensor<B, 4>],
        rng: &mut impl Rng,
    ) -> Result<Vec<Tensor<B, 1>>, StyleError> {
        self.sample_pairs(features, rng)?
            .into_iter()
            .map(|(generated, style)| {
                statistic.distance(style.unsqueeze_dim::<3>(0), generated.unsqueeze_dim::<3>(0))
            })
            .collect()
    }

    /// Mean squared error against the content target.
    pub fn content_loss(&self, features: &[Tensor<B, 4>]) -> Tensor<B, 1> {
        content_loss(
            features[self.content_layer].clone(),
            self.content_target.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceKind;
    use crate::model::backbone::VggBackboneConfig;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::Distribution;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    fn image(size: usize) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        Tensor::random([1, 3, size, size], Distribution::Uniform(0.0, 1.0), &device)
    }

    fn config() -> TransferConfig {
        TransferConfig::new()
            .with_style_layers(vec![0, 1])
            .with_content_layer(1)
            .with_k(16)
    }

    fn model(config: &TransferConfig) -> StyleModel<TestBackend, crate::VggBackbone<TestBackend>> {
        let device = Default::default();
        let backbone = VggBackboneConfig::new()
            .with_stage_channels(vec![4, 8])
            .init::<TestBackend>(&device);
        StyleModel::new(backbone, image(8), image(8), config).unwrap()
    }

    #[test]
    fn test_targets_shapes() {
        let model = model(&config());
        assert_eq!(model.style_channels(), vec![4, 8]);
        assert_eq!(model.style_feats[0].dims(), [64, 4]);
        assert_eq!(model.style_feats[1].dims(), [16, 8]);
        assert_eq!(model.content_target.dims(), [1, 8, 4, 4]);
    }

    #[test]
    fn test_layer_out_of_range() {
        let device = Default::default();
        let backbone = VggBackboneConfig::new()
            .with_stage_channels(vec![4, 8])
            .init::<TestBackend>(&device);
        let config = config().with_content_layer(5);
        let err = StyleModel::new(backbone, image(8), image(8), &config)
            .err()
            .expect("content layer 5 should be rejected");
        assert!(matches!(err, StyleError::LayerOutOfRange { index: 5, stages: 2 }));
    }

    #[test]
    fn test_sample_pairs_respect_k_and_population() {
        let model = model(&config());
        let features = model.extract(image(8));
        let mut rng = StdRng::seed_from_u64(0);
        let pairs = model.sample_pairs(&features, &mut rng).unwrap();

        // Layer 0 has 64 locations (k=16 applies); layer 1 only 16
        assert_eq!(pairs[0].0.dims(), [16, 4]);
        assert_eq!(pairs[0].1.dims(), [16, 4]);
        assert_eq!(pairs[1].0.dims(), [16, 8]);
    }

    #[test]
    fn test_statistic_losses_vanish_on_style_image() {
        let device = Default::default();
        let backbone = VggBackboneConfig::new()
            .with_stage_channels(vec![4, 8])
            .init::<TestBackend>(&device);
        let style = image(8);
        // k covers every location, so both samples hold all rows in order
        let config = config().with_k(1024);
        let model = StyleModel::new(backbone, style.clone(), image(8), &config).unwrap();

        let features = model.extract(style);
        let mut rng = StdRng::seed_from_u64(0);
        let losses = model
            .statistic_losses(Statistic::Gramian, &features, &mut rng)
            .unwrap();
        assert_eq!(losses.len(), 2);
        for loss in losses {
            let value: f32 = loss.into_scalar().elem();
            assert!(value.abs() < 1e-8, "style image should match itself, got {value}");
        }
    }

    #[test]
    fn test_content_loss_zero_on_content_image() {
        let device = Default::default();
        let backbone = VggBackboneConfig::new()
            .with_stage_channels(vec![4, 8])
            .init::<TestBackend>(&device);
        let content = image(8);
        let model = StyleModel::new(backbone, image(8), content.clone(), &config()).unwrap();

        let loss: f32 = model.content_loss(&model.extract(content)).into_scalar().elem();
        assert!(loss.abs() < 1e-10);
    }

    #[test]
    fn test_critics_only_for_adversarial() {
        let device = Default::default();
        let model = model(&config());
        assert!(model.critics(&config(), &device).is_none());

        let adversarial = config().with_distance(DistanceKind::WassersteinCritic);
        let critics = model.critics(&adversarial, &device).unwrap();
        assert_eq!(critics.len(), 2);
        assert_eq!(critics.get(1).unwrap().d_input(), 8);
    }
}
