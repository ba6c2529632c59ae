use crate::candle_aux_layers::*;
use crate::candle_inference::VaeConfig;
use crate::candle_model_traits::*;
use candle_core::{Result, Tensor};
use candle_nn::{Conv2d, Linear, Module, VarBuilder};

/// DC-GAN style encoder: two halving convolutions, one dense layer,
/// then separate mean and standard deviation heads
pub struct ConvGaussianEncoder {
    image_shape: ImageShape,
    n_latent: usize,
    conv: StackLayers<Conv2d>,
    fc: StackLayers<Linear>,
    z_mean: Linear,
    z_std: Linear,
}

impl GaussianEncoderT for ConvGaussianEncoder {
    fn latent_gaussian_params(&self, x_nchw: &Tensor) -> Result<(Tensor, Tensor)> {
        let h_nchw = self.conv.forward(x_nchw)?;
        let h_nl = self.fc.forward(&h_nchw.flatten_from(1)?)?;
        let z_mean_nk = self.z_mean.forward(&h_nl)?;
        let z_std_nk = floored_sigmoid(&self.z_std.forward(&h_nl)?)?;
        Ok((z_mean_nk, z_std_nk))
    }

    fn image_shape(&self) -> ImageShape {
        self.image_shape
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

impl ConvGaussianEncoder {
    /// Will create a new encoder module with these variables:
    ///
    /// * `enc.conv.{0,1}.weight`
    /// * `enc.fc.0.weight`
    /// * `enc.z.mean.weight`
    /// * `enc.z.std.weight`
    ///
    /// # Arguments
    /// * `config` - image shape, latent dimension and layer widths
    /// * `vs` - variable builder
    pub fn new(config: &VaeConfig, vs: VarBuilder) -> Result<Self> {
        let shape = config.image_shape;
        if shape.height % 4 != 0 || shape.width % 4 != 0 {
            candle_core::bail!("image {} is not divisible by 4", shape);
        }

        let (c1, c2) = config.conv_channels;

        // (1) image -> h/4 x w/4 feature map
        let mut conv = StackLayers::<Conv2d>::new();
        conv.push_with_act(halving_conv2d(shape.channels, c1, vs.pp("enc.conv.0"))?, lrelu());
        conv.push_with_act(halving_conv2d(c1, c2, vs.pp("enc.conv.1"))?, lrelu());

        // (2) flattened map -> hidden
        let flat_dim = c2 * (shape.height / 4) * (shape.width / 4);
        let mut fc = StackLayers::<Linear>::new();
        fc.push_with_act(
            candle_nn::linear(flat_dim, config.hidden_dim, vs.pp("enc.fc.0"))?,
            lrelu(),
        );

        // (3) hidden -> K
        let z_mean = candle_nn::linear(config.hidden_dim, config.z_dim, vs.pp("enc.z.mean"))?;
        let z_std = candle_nn::linear(config.hidden_dim, config.z_dim, vs.pp("enc.z.std"))?;

        Ok(Self {
            image_shape: shape,
            n_latent: config.z_dim,
            conv,
            fc,
            z_mean,
            z_std,
        })
    }
}
