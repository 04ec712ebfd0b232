//! Tensor bridge: conversions between backbone feature maps, host pixel
//! buffers and the per-location feature vectors the style losses consume.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::error::StyleError;

/// Reshape a `(1, C, H, W)` feature map into a `(H*W, C)` feature vector set.
///
/// Each row is one spatial location. Values are squashed with `tanh` so that
/// all statistics operate on a bounded range.
pub fn feature_vectors<B: Backend>(feature_map: Tensor<B, 4>) -> Result<Tensor<B, 2>, StyleError> {
    let [batch, channels, height, width] = feature_map.dims();
    if batch != 1 {
        return Err(StyleError::BatchSize(batch));
    }
    Ok(feature_map
        .reshape([channels, height * width])
        .transpose()
        .tanh())
}

/// Convert an interleaved RGB buffer (`height * width * 3`, values in `[0, 1]`)
/// into a `(1, 3, height, width)` image tensor.
///
/// # Panics
/// Panics if the buffer length does not match `height * width * 3`.
pub fn pixels_to_tensor<B: Backend>(
    pixels: &[f32],
    height: usize,
    width: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    assert_eq!(
        pixels.len(),
        height * width * 3,
        "pixel buffer has length {}, expected {height}x{width}x3",
        pixels.len()
    );
    let hwc: Tensor<B, 3> =
        Tensor::from_data(TensorData::new(pixels.to_vec(), [height, width, 3]), device);
    hwc.permute([2, 0, 1]).unsqueeze_dim::<4>(0)
}

/// Convert a `(1, 3, H, W)` image tensor back into an interleaved RGB buffer.
///
/// Returns `(pixels, height, width)`.
pub fn tensor_to_pixels<B: Backend>(
    image: Tensor<B, 4>,
) -> Result<(Vec<f32>, usize, usize), StyleError> {
    let [batch, _channels, height, width] = image.dims();
    if batch != 1 {
        return Err(StyleError::BatchSize(batch));
    }
    let hwc: Tensor<B, 3> = image.squeeze::<3>(0).permute([1, 2, 0]);
    let pixels = hwc
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| StyleError::TensorData(format!("{e:?}")))?;
    Ok((pixels, height, width))
}

/// Extract a single f64 scalar from a one-element tensor.
pub fn tensor_to_f64<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}
