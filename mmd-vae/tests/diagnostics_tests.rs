use approx::assert_abs_diff_eq;
use candle_util::candle_core::{DType, Device, Result, Tensor};
use candle_util::candle_data_loader::InMemoryImageData;
use candle_util::candle_decoder_gaussian_conv::ConvGaussianDecoder;
use candle_util::candle_inference::VaeConfig;
use candle_util::candle_model_traits::*;
use candle_util::candle_nn::{VarBuilder, VarMap};
use candle_util::candle_vae_model::{ConvGaussianVae, GaussianVae};
use mmd_vae::diagnostics::latent_log_determinant;

/// q(z|x) = N(0, diag(std^2)) whatever the image
struct FixedEncoder {
    image_shape: ImageShape,
    std_1k: Tensor,
}

impl GaussianEncoderT for FixedEncoder {
    fn latent_gaussian_params(&self, x_nchw: &Tensor) -> Result<(Tensor, Tensor)> {
        let n = x_nchw.dim(0)?;
        let k = self.dim_latent();
        let z_mean = Tensor::zeros((n, k), DType::F32, x_nchw.device())?;
        let z_std = self.std_1k.broadcast_as((n, k))?.contiguous()?;
        Ok((z_mean, z_std))
    }

    fn image_shape(&self) -> ImageShape {
        self.image_shape
    }

    fn dim_latent(&self) -> usize {
        self.std_1k.dims()[1]
    }
}

fn config(z_dim: usize) -> VaeConfig {
    VaeConfig {
        image_shape: ImageShape::new(1, 4, 4),
        z_dim,
        conv_channels: (2, 4),
        hidden_dim: 8,
    }
}

#[test]
fn log_determinant_of_known_encodings() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let config = config(2);
    let variable_map = VarMap::new();
    let vs = VarBuilder::from_varmap(&variable_map, DType::F32, &dev);
    let decoder = ConvGaussianDecoder::new(&config, vs)?;
    let encoder = FixedEncoder {
        image_shape: config.image_shape,
        std_1k: Tensor::new(&[[0.5f32, 3.0]], &dev)?,
    };
    let model = GaussianVae::build(encoder, decoder, variable_map, dev.clone())?;

    let mut data = InMemoryImageData::constant(50, config.image_shape, 0.5, 1)?;
    let logdet = latent_log_determinant(&model, &mut data, 40, 100)?;

    // cov(z) ~ diag(0.25, 9)
    let expected = 2.0 * (0.5f64.ln() + 3.0f64.ln());
    assert_abs_diff_eq!(logdet, expected, epsilon = 0.2);
    Ok(())
}

#[test]
fn log_determinant_is_finite_across_batches() -> anyhow::Result<()> {
    let model = ConvGaussianVae::new(&config(3), &Device::Cpu)?;
    let mut data = InMemoryImageData::constant(10, config(3).image_shape, 0.25, 2)?;
    for num_batches in [1, 3, 6] {
        let logdet = latent_log_determinant(&model, &mut data, num_batches, 8)?;
        assert!(logdet.is_finite(), "{} batches gave {}", num_batches, logdet);
    }
    assert!(latent_log_determinant(&model, &mut data, 0, 8).is_err());
    Ok(())
}
