use crate::candle_aux_layers::*;
use crate::candle_inference::VaeConfig;
use crate::candle_model_traits::*;
use candle_core::{Result, Tensor};
use candle_nn::{Activation, ConvTranspose2d, Linear, Module, VarBuilder};

/// Mirror image of [`crate::candle_encoder_gaussian_conv::ConvGaussianEncoder`]
pub struct ConvGaussianDecoder {
    image_shape: ImageShape,
    n_latent: usize,
    grid_channels: usize,
    fc: StackLayers<Linear>,
    deconv: StackLayers<ConvTranspose2d>,
    x_mean: ConvTranspose2d,
    x_std: ConvTranspose2d,
}

impl GaussianDecoderT for ConvGaussianDecoder {
    fn forward(&self, z_nk: &Tensor) -> Result<(Tensor, Tensor)> {
        let n = z_nk.dim(0)?;
        let h_nl = self.fc.forward(z_nk)?;
        let grid = h_nl.reshape((
            n,
            self.grid_channels,
            self.image_shape.height / 4,
            self.image_shape.width / 4,
        ))?;
        let h_nchw = self.deconv.forward(&grid)?;
        let x_mean = candle_nn::ops::sigmoid(&self.x_mean.forward(&h_nchw)?)?;
        let x_std = floored_sigmoid(&self.x_std.forward(&h_nchw)?)?;
        Ok((x_mean, x_std))
    }

    fn image_shape(&self) -> ImageShape {
        self.image_shape
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

impl ConvGaussianDecoder {
    /// Will create a new decoder module with these variables:
    ///
    /// * `dec.fc.{0,1}.weight`
    /// * `dec.deconv.0.weight`
    /// * `dec.x.mean.weight`
    /// * `dec.x.std.weight`
    pub fn new(config: &VaeConfig, vs: VarBuilder) -> Result<Self> {
        let shape = config.image_shape;
        if shape.height % 4 != 0 || shape.width % 4 != 0 {
            candle_core::bail!("image {} is not divisible by 4", shape);
        }

        let (c1, c2) = config.conv_channels;
        let grid_dim = c2 * (shape.height / 4) * (shape.width / 4);

        // (1) K -> hidden -> grid
        let mut fc = StackLayers::<Linear>::new();
        fc.push_with_act(
            candle_nn::linear(config.z_dim, config.hidden_dim, vs.pp("dec.fc.0"))?,
            Activation::Relu,
        );
        fc.push_with_act(
            candle_nn::linear(config.hidden_dim, grid_dim, vs.pp("dec.fc.1"))?,
            Activation::Relu,
        );

        // (2) h/4 x w/4 -> h/2 x w/2
        let mut deconv = StackLayers::<ConvTranspose2d>::new();
        deconv.push_with_act(
            doubling_conv_transpose2d(c2, c1, vs.pp("dec.deconv.0"))?,
            Activation::Relu,
        );

        // (3) h/2 x w/2 -> h x w, one head per parameter
        let x_mean = doubling_conv_transpose2d(c1, shape.channels, vs.pp("dec.x.mean"))?;
        let x_std = doubling_conv_transpose2d(c1, shape.channels, vs.pp("dec.x.std"))?;

        Ok(Self {
            image_shape: shape,
            n_latent: config.z_dim,
            grid_channels: c2,
            fc,
            deconv,
            x_mean,
            x_std,
        })
    }
}
