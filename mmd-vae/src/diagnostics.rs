use candle_util::candle_core::Tensor;
use candle_util::candle_data_loader::ImageBatchSource;
use candle_util::candle_model_traits::{GaussianDecoderT, GaussianEncoderT};
use candle_util::candle_vae_model::GaussianVae;
use log::debug;
use matrix_util::dmatrix_util::covariance_log_determinant;
use matrix_util::traits::ConvertMatOps;
use nalgebra::DMatrix;

///
/// Log-determinant of the empirical covariance of latent codes drawn
/// for `num_batches` fresh minibatches of `data`
///
/// * `model` - a model context (read only)
/// * `data` - where the minibatches come from
/// * `num_batches` - number of minibatches to encode
/// * `batch_size` - images per minibatch
///
pub fn latent_log_determinant<Enc, Dec>(
    model: &GaussianVae<Enc, Dec>,
    data: &mut dyn ImageBatchSource,
    num_batches: usize,
    batch_size: usize,
) -> anyhow::Result<f64>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    let mut z_list = Vec::with_capacity(num_batches);
    for _ in 0..num_batches {
        let x_nchw = data.next_batch(batch_size, model.device())?;
        z_list.push(model.encode(&x_nchw)?.z.detach());
    }
    if z_list.is_empty() {
        return Err(anyhow::anyhow!("no minibatch to encode"));
    }
    let z_nk = Tensor::cat(&z_list, 0)?;
    debug!("latent codes for covariance: {:?}", z_nk.shape());
    covariance_log_determinant(&DMatrix::<f64>::from_tensor(&z_nk)?)
}
