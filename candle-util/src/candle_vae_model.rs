use crate::candle_decoder_gaussian_conv::ConvGaussianDecoder;
use crate::candle_encoder_gaussian_conv::ConvGaussianEncoder;
use crate::candle_inference::VaeConfig;
use crate::candle_loss_functions::*;
use crate::candle_model_traits::*;

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{VarBuilder, VarMap};

/// One draw of `z ~ q(z|x)` together with its parameters
pub struct LatentSample {
    pub z_mean: Tensor,
    pub z_std: Tensor,
    pub z: Tensor,
}

/// Everything one stochastic encode/decode pass yields for a batch
pub struct LossTerms {
    pub latent: LatentSample,
    pub x_mean: Tensor,
    pub x_std: Tensor,
    /// `x_mean + x_std * eps`
    pub x_recon: Tensor,
    /// per-sample Gaussian negative log-likelihood (n)
    pub nll_n: Tensor,
    /// per-sample KL divergence from the prior (n)
    pub kl_n: Tensor,
    pub nll: Tensor,
    pub elbo: Tensor,
    pub mmd: Tensor,
    pub x_log_det: Tensor,
    pub z_log_det: Tensor,
}

/// Owns the parameters of an encoder/decoder pair and the device
/// they live on. The decoder is built once and shared by the
/// reconstruction and generation paths.
pub struct GaussianVae<Enc, Dec>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    encoder: Enc,
    decoder: Dec,
    variable_map: VarMap,
    device: Device,
}

pub type ConvGaussianVae = GaussianVae<ConvGaussianEncoder, ConvGaussianDecoder>;

impl ConvGaussianVae {
    /// Allocate fresh convolutional encoder and decoder parameters
    pub fn new(config: &VaeConfig, device: &Device) -> Result<Self> {
        let variable_map = VarMap::new();
        let vs = VarBuilder::from_varmap(&variable_map, DType::F32, device);
        let encoder = ConvGaussianEncoder::new(config, vs.clone())?;
        let decoder = ConvGaussianDecoder::new(config, vs)?;
        Self::build(encoder, decoder, variable_map, device.clone())
    }
}

impl<Enc, Dec> GaussianVae<Enc, Dec>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    /// Build a VAE model
    /// * `encoder` - encoder module
    /// * `decoder` - decoder module
    /// * `variable_map` - the variables both modules were built from
    pub fn build(encoder: Enc, decoder: Dec, variable_map: VarMap, device: Device) -> Result<Self> {
        if encoder.dim_latent() != decoder.dim_latent() {
            candle_core::bail!(
                "latent dims: encoder {} vs. decoder {}",
                encoder.dim_latent(),
                decoder.dim_latent()
            );
        }
        if encoder.image_shape() != decoder.image_shape() {
            candle_core::bail!(
                "image shapes: encoder {} vs. decoder {}",
                encoder.image_shape(),
                decoder.image_shape()
            );
        }
        Ok(Self {
            encoder,
            decoder,
            variable_map,
            device,
        })
    }

    pub fn variable_map(&self) -> &VarMap {
        &self.variable_map
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn dim_latent(&self) -> usize {
        self.encoder.dim_latent()
    }

    pub fn image_shape(&self) -> ImageShape {
        self.encoder.image_shape()
    }

    pub fn encoder(&self) -> &Enc {
        &self.encoder
    }

    pub fn decoder(&self) -> &Dec {
        &self.decoder
    }

    /// z ~ q(z|x) by reparameterization
    pub fn encode(&self, x_nchw: &Tensor) -> Result<LatentSample> {
        let (z_mean, z_std) = self.encoder.latent_gaussian_params(x_nchw)?;
        let z = reparameterize(&z_mean, &z_std)?;
        Ok(LatentSample { z_mean, z_std, z })
    }

    /// `(x_mean, x_std)` of p(x|z) for posterior draws
    pub fn reconstruct(&self, z_nk: &Tensor) -> Result<(Tensor, Tensor)> {
        self.decoder.forward(z_nk)
    }

    /// `(x_mean, x_std)` of p(x|z) for given prior draws
    pub fn generate_from(&self, z_nk: &Tensor) -> Result<(Tensor, Tensor)> {
        self.decoder.forward(z_nk)
    }

    /// `n` unconditioned samples, z ~ N(0, I)
    pub fn generate(&self, n: usize) -> Result<(Tensor, Tensor)> {
        self.generate_from(&self.sample_prior(n)?)
    }

    pub fn sample_prior(&self, n: usize) -> Result<Tensor> {
        Tensor::randn(0f32, 1f32, (n, self.dim_latent()), &self.device)
    }

    /// One stochastic pass through encoder and decoder with all the
    /// base quantities of the training objectives
    pub fn loss_terms(&self, x_nchw: &Tensor) -> Result<LossTerms> {
        let latent = self.encode(x_nchw)?;
        let (x_mean, x_std) = self.reconstruct(&latent.z)?;
        let x_recon = reparameterize(&x_mean, &x_std)?;

        let nll_n = gaussian_nll(x_nchw, &x_mean, &x_std)?;
        let kl_n = gaussian_kl_loss_std(&latent.z_mean, &latent.z_std)?;

        let true_samples = Tensor::randn_like(&latent.z, 0., 1.)?;
        let mmd = compute_mmd(&true_samples, &latent.z)?;

        Ok(LossTerms {
            nll: nll_n.mean_all()?,
            elbo: kl_n.mean_all()?,
            x_log_det: diagonal_log_det(&x_std)?,
            z_log_det: diagonal_log_det(&latent.z_std)?,
            mmd,
            latent,
            x_mean,
            x_std,
            x_recon,
            nll_n,
            kl_n,
        })
    }

    /// Per-sample `kl + nll` of one posterior draw (n)
    pub fn importance_sampled_nll(&self, x_nchw: &Tensor) -> Result<Tensor> {
        let latent = self.encode(x_nchw)?;
        let (x_mean, x_std) = self.reconstruct(&latent.z)?;
        let nll_n = gaussian_nll(x_nchw, &x_mean, &x_std)?;
        let kl_n = gaussian_kl_loss_std(&latent.z_mean, &latent.z_std)?;
        (kl_n + nll_n)?.detach().to_device(&Device::Cpu)
    }

    /// Per-sample Gaussian negative log-likelihood under one prior draw (n)
    pub fn prior_sampled_nll(&self, x_nchw: &Tensor) -> Result<Tensor> {
        let z_nk = self.sample_prior(x_nchw.dim(0)?)?;
        let (x_mean, x_std) = self.generate_from(&z_nk)?;
        gaussian_nll(x_nchw, &x_mean, &x_std)?
            .detach()
            .to_device(&Device::Cpu)
    }
}
