use crate::candle_data_loader_util::EpochCursor;
use crate::candle_model_traits::ImageShape;

use anyhow::anyhow;
use candle_core::{Device, Tensor};

/// Anything that can hand out image minibatches
pub trait ImageBatchSource {
    /// Draw the next `batch_size` images as an `n x c x h x w` tensor
    /// with values in `[0, 1]`
    fn next_batch(&mut self, batch_size: usize, target_device: &Device) -> anyhow::Result<Tensor>;

    fn image_shape(&self) -> ImageShape;

    fn num_samples(&self) -> usize;

    /// number of completed passes over the data
    fn epoch(&self) -> usize;
}

///
/// A simple data loader for in-memory images. Pixels are stored
/// contiguously, image after image, in `c x h x w` order.
///
pub struct InMemoryImageData {
    pixels: Vec<f32>,
    shape: ImageShape,
    cursor: EpochCursor,
}

impl InMemoryImageData {
    ///
    /// Create a data loader from flat pixel values
    ///
    /// * `pixels` - `n * c * h * w` values
    /// * `shape` - shape of each image
    /// * `seed` - seed for the epoch-wise shuffling
    ///
    pub fn new(pixels: Vec<f32>, shape: ImageShape, seed: u64) -> anyhow::Result<Self> {
        let d = shape.num_pixels();
        if d == 0 || pixels.len() % d != 0 {
            return Err(anyhow!(
                "{} values can't be split into {} images",
                pixels.len(),
                shape
            ));
        }
        let n = pixels.len() / d;
        Ok(Self {
            pixels,
            shape,
            cursor: EpochCursor::new(n, seed),
        })
    }

    /// `n` copies of an image filled with `value`
    pub fn constant(n: usize, shape: ImageShape, value: f32, seed: u64) -> anyhow::Result<Self> {
        Self::new(vec![value; n * shape.num_pixels()], shape, seed)
    }

    /// Keep only the first `n` images
    pub fn truncate(self, n: usize, seed: u64) -> anyhow::Result<Self> {
        let d = self.shape.num_pixels();
        let n = n.min(self.num_samples());
        let mut pixels = self.pixels;
        pixels.truncate(n * d);
        Self::new(pixels, self.shape, seed)
    }

    /// Pixels of the `i`-th image
    pub fn image(&self, i: usize) -> Option<&[f32]> {
        let d = self.shape.num_pixels();
        self.pixels.get((i * d)..((i + 1) * d))
    }
}

impl ImageBatchSource for InMemoryImageData {
    fn next_batch(&mut self, batch_size: usize, target_device: &Device) -> anyhow::Result<Tensor> {
        if self.num_samples() == 0 {
            return Err(anyhow!("no images to draw a minibatch from"));
        }
        let d = self.shape.num_pixels();
        let indexes = self.cursor.next_indexes(batch_size);
        let mut batch = Vec::with_capacity(batch_size * d);
        for i in indexes {
            batch.extend_from_slice(&self.pixels[(i * d)..((i + 1) * d)]);
        }
        Ok(Tensor::from_vec(
            batch,
            self.shape.batch_dims(batch_size),
            target_device,
        )?)
    }

    fn image_shape(&self) -> ImageShape {
        self.shape
    }

    fn num_samples(&self) -> usize {
        self.cursor.size()
    }

    fn epoch(&self) -> usize {
        self.cursor.epoch()
    }
}
