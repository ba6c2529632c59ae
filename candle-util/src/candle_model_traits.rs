use candle_core::{Result, Tensor};

/// Spatial layout of one image, `channels x height x width`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// 28 x 28 grayscale
    pub fn mnist() -> Self {
        Self::new(1, 28, 28)
    }

    pub fn num_pixels(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// `(n, c, h, w)` for a batch of `n` images
    pub fn batch_dims(&self, n: usize) -> (usize, usize, usize, usize) {
        (n, self.channels, self.height, self.width)
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

pub trait GaussianEncoderT {
    /// Evaluate the posterior parameters of `q(z|x)`
    ///
    /// # Arguments
    /// * `x_nchw` - image batch (n x c x h x w)
    ///
    /// # Returns `(z_mean_nk, z_std_nk)`
    /// * `z_mean_nk` - posterior mean (n x k)
    /// * `z_std_nk` - posterior standard deviation (n x k), floored
    fn latent_gaussian_params(&self, x_nchw: &Tensor) -> Result<(Tensor, Tensor)>;

    fn image_shape(&self) -> ImageShape;

    fn dim_latent(&self) -> usize;
}

pub trait GaussianDecoderT {
    /// Evaluate the likelihood parameters of `p(x|z)`
    ///
    /// # Returns `(x_mean_nchw, x_std_nchw)`
    fn forward(&self, z_nk: &Tensor) -> Result<(Tensor, Tensor)>;

    fn image_shape(&self) -> ImageShape;

    fn dim_latent(&self) -> usize;
}
