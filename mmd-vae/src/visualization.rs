use candle_util::candle_model_traits::{GaussianDecoderT, GaussianEncoderT};
use candle_util::candle_vae_model::{GaussianVae, LossTerms};
use matrix_util::image_tile::{nchw_tensor_to_nhwc, save_png, tile_images, tile_panels};
use std::path::{Path, PathBuf};

pub const MAX_TILED_SAMPLES: usize = 100;

pub fn snapshot_path(run_dir: &Path, iter: usize) -> PathBuf {
    run_dir.join(format!("samples{}.png", iter))
}

///
/// Write `samples{iter}.png`: generated mean, generated stddev,
/// reconstructed mean and reconstructed stddev, each tiled on its own
/// grid, then arranged 2 x 2.
///
pub fn save_snapshot<Enc, Dec>(
    model: &GaussianVae<Enc, Dec>,
    terms: &LossTerms,
    run_dir: &Path,
    iter: usize,
) -> anyhow::Result<PathBuf>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    let nn = terms.x_mean.dim(0)?.min(MAX_TILED_SAMPLES);
    let (gen_mean, gen_std) = model.generate(nn)?;

    let mut panels = Vec::with_capacity(4);
    for images in [&gen_mean, &gen_std, &terms.x_mean, &terms.x_std] {
        let nhwc = nchw_tensor_to_nhwc(&images.detach())?;
        panels.push(tile_images(&nhwc, nn)?);
    }
    let composite = tile_panels(&panels)?;

    let file = snapshot_path(run_dir, iter);
    let file_str = file
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid path {:?}", file))?;
    save_png(&composite, file_str)?;
    Ok(file)
}
