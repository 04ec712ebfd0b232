/// Errors raised while building or running a style transfer.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    /// A loss received a tensor of the wrong rank.
    #[error("expected a rank-{expected} tensor, got rank {actual}")]
    Rank { expected: usize, actual: usize },

    /// Feature maps are processed one image at a time.
    #[error("feature maps must have batch size 1, got {0}")]
    BatchSize(usize),

    /// `distance` names no known loss family.
    #[error("unknown distance family '{0}' (expected kernel, disc-sn or disc-wass)")]
    UnknownDistance(String),

    /// `disc` names no known statistical distance.
    #[error("unknown statistical distance '{0}' (expected m1, m3 or gram)")]
    UnknownStatistic(String),

    /// A style or content layer index points past the last backbone stage.
    #[error("layer {index} out of range for a backbone with {stages} stages")]
    LayerOutOfRange { index: usize, stages: usize },

    /// Hyperparameters outside their valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tensor data could not be converted to host values.
    #[error("tensor data error: {0}")]
    TensorData(String),
}
