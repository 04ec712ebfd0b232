use burn::module::Param;
use burn::prelude::*;

/// The image under optimization, wrapped as a module so burn optimizers can
/// step it like any other parameter.
#[derive(Module, Debug)]
pub struct GeneratedImage<B: Backend> {
    pub(crate) pixels: Param<Tensor<B, 4>>,
}

impl<B: Backend> GeneratedImage<B> {
    /// Start from a `(1, C, H, W)` tensor of pixel values.
    pub fn new(pixels: Tensor<B, 4>) -> Self {
        Self {
            pixels: Param::from_tensor(pixels),
        }
    }

    /// Pixel values, tracked when the backend records gradients.
    pub fn pixels(&self) -> Tensor<B, 4> {
        self.pixels.val()
    }

    /// Pixel values cut off from any gradient graph.
    pub fn pixels_detached(&self) -> Tensor<B, 4> {
        self.pixels.val().detach()
    }

    /// Project every pixel into `[0, 1]`.
    ///
    /// Not part of the loss: the clamped tensor is detached and re-enters the
    /// parameter under the same id, so optimizer state carries over.
    pub fn clamp(self) -> Self {
        Self {
            pixels: self
                .pixels
                .map(|pixels| pixels.clamp(0.0, 1.0).detach().require_grad()),
        }
    }

    pub fn dims(&self) -> [usize; 4] {
        self.pixels.dims()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_clamp_projects_into_unit_range() {
        let device = Default::default();
        let pixels = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![1.3_f32, -0.2, 0.5, 1.0], [1, 1, 2, 2]),
            &device,
        );
        let image = GeneratedImage::new(pixels).clamp();
        let values: Vec<f32> = image.pixels().into_data().to_vec().unwrap();
        assert_eq!(values, vec![1.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_clamp_keeps_param_id() {
        let device = Default::default();
        let image = GeneratedImage::new(Tensor::<TestBackend, 4>::ones([1, 3, 2, 2], &device));
        let id = image.pixels.id;
        let clamped = image.clamp();
        assert_eq!(clamped.pixels.id, id);
        assert_eq!(clamped.dims(), [1, 3, 2, 2]);
    }
}
