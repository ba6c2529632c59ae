use candle_util::candle_core::{Device, Tensor};
use image::{GrayImage, RgbImage};
use log::debug;
use ndarray::{s, Array3, Array4};

/// Copy an `n x c x h x w` image tensor into an `n x h x w x c` array
pub fn nchw_tensor_to_nhwc(images_nchw: &Tensor) -> anyhow::Result<Array4<f32>> {
    let (n, c, h, w) = images_nchw.dims4()?;
    let data: Vec<f32> = images_nchw
        .to_device(&Device::Cpu)?
        .permute((0, 2, 3, 1))?
        .flatten_all()?
        .to_vec1()?;
    Ok(Array4::from_shape_vec((n, h, w, c), data)?)
}

///
/// Lay out the first `cnt * cnt` images on a `cnt x cnt` grid,
/// row after row, where `cnt = floor(sqrt(min(n, max_samples)))`
///
/// * `samples` - `n x h x w x c` images
/// * `max_samples` - upper bound on the number of images shown
///
/// Returns a `(h * cnt) x (w * cnt) x c` array
///
pub fn tile_images(samples: &Array4<f32>, max_samples: usize) -> anyhow::Result<Array3<f32>> {
    let (n, h, w, c) = samples.dim();
    let max_samples = max_samples.min(n);
    let cnt = (max_samples as f64).sqrt().floor() as usize;
    if cnt == 0 {
        return Err(anyhow::anyhow!("no images to tile"));
    }

    let mut ret = Array3::<f32>::zeros((h * cnt, w * cnt, c));
    for i in 0..(cnt * cnt) {
        let (row, col) = (i / cnt, i % cnt);
        ret.slice_mut(s![(row * h)..((row + 1) * h), (col * w)..((col + 1) * w), ..])
            .assign(&samples.slice(s![i, .., .., ..]));
    }
    Ok(ret)
}

/// Stack equally-sized panels and tile them once more
pub fn tile_panels(panels: &[Array3<f32>]) -> anyhow::Result<Array3<f32>> {
    let first = panels
        .first()
        .ok_or_else(|| anyhow::anyhow!("no panels to tile"))?;
    let (h, w, c) = first.dim();
    let mut stacked = Array4::<f32>::zeros((panels.len(), h, w, c));
    for (i, panel) in panels.iter().enumerate() {
        if panel.dim() != (h, w, c) {
            return Err(anyhow::anyhow!(
                "panel {} is {:?}, expected {:?}",
                i,
                panel.dim(),
                (h, w, c)
            ));
        }
        stacked.slice_mut(s![i, .., .., ..]).assign(panel);
    }
    tile_images(&stacked, panels.len())
}

fn to_pixel(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}

///
/// Save an `h x w x c` array of values in `[0, 1]` as an 8-bit PNG;
/// one channel is written as grayscale, three as RGB
///
pub fn save_png(grid: &Array3<f32>, file_path: &str) -> anyhow::Result<()> {
    let (h, w, c) = grid.dim();
    let pixels: Vec<u8> = grid.iter().map(|&x| to_pixel(x)).collect();
    debug!("writing {} x {} x {} image to {}", h, w, c, file_path);
    match c {
        1 => GrayImage::from_raw(w as u32, h as u32, pixels)
            .ok_or_else(|| anyhow::anyhow!("failed to create image buffer"))?
            .save(file_path)?,
        3 => RgbImage::from_raw(w as u32, h as u32, pixels)
            .ok_or_else(|| anyhow::anyhow!("failed to create image buffer"))?
            .save(file_path)?,
        _ => return Err(anyhow::anyhow!("can't save {} channels as png", c)),
    }
    Ok(())
}
