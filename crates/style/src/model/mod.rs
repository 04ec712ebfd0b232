//! Model components: the frozen backbone, per-layer critics with spectral
//! normalization, the optimized image and the style targets that tie them
//! together.

pub mod backbone;
pub mod critic;
pub mod image;
pub mod spectral_norm;
pub mod style_model;
