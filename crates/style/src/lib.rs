//! Neural style transfer on burn.
//!
//! An image is optimized so that a frozen convolutional backbone sees the style
//! of a reference image and the content of a source image. Style similarity is
//! measured either with closed-form feature statistics (moments, Gram matrices)
//! or with per-layer critics trained adversarially against the image, using
//! spectral normalization or a Wasserstein gradient penalty.

pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod training;

pub use config::{DistanceKind, TransferConfig};
pub use error::StyleError;
pub use model::backbone::{FeatureExtractor, VggBackbone, VggBackboneConfig};
pub use model::image::GeneratedImage;
pub use model::style_model::StyleModel;
pub use training::metrics::LossHistory;
pub use training::trainer::{transfer, TransferOutcome};
