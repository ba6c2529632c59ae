use candle_util::candle_data_loader::{ImageBatchSource, InMemoryImageData};
use candle_util::candle_model_traits::ImageShape;
use log::{info, warn};
use matrix_util::common_io::read_bytes;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// magic number of an IDX file of unsigned-byte 3d arrays
pub const IDX_IMAGE_MAGIC: u32 = 2051;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";

fn read_u32_be(bytes: &[u8], offset: usize) -> anyhow::Result<u32> {
    let word = bytes
        .get(offset..(offset + 4))
        .ok_or_else(|| anyhow::anyhow!("IDX header is truncated"))?;
    Ok(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

///
/// Parse an IDX image file: a big-endian header
/// `magic, n, rows, cols` followed by `n * rows * cols` bytes.
/// Pixels are scaled to `[0, 1]`.
///
pub fn parse_idx_images(bytes: &[u8]) -> anyhow::Result<(Vec<f32>, ImageShape)> {
    let magic = read_u32_be(bytes, 0)?;
    if magic != IDX_IMAGE_MAGIC {
        return Err(anyhow::anyhow!(
            "not an IDX image file: magic {} != {}",
            magic,
            IDX_IMAGE_MAGIC
        ));
    }
    let n = read_u32_be(bytes, 4)? as usize;
    let rows = read_u32_be(bytes, 8)? as usize;
    let cols = read_u32_be(bytes, 12)? as usize;

    let num_bytes = n
        .checked_mul(rows)
        .and_then(|x| x.checked_mul(cols))
        .ok_or_else(|| {
            anyhow::anyhow!("IDX header {} x {} x {} overflows", n, rows, cols)
        })?;

    let body = &bytes[16..];
    if body.len() != num_bytes {
        return Err(anyhow::anyhow!(
            "expected {} x {} x {} pixels, found {} bytes",
            n,
            rows,
            cols,
            body.len()
        ));
    }

    let pixels = body.par_iter().map(|&b| b as f32 / 255.0).collect();
    Ok((pixels, ImageShape::new(1, rows, cols)))
}

/// `{dir}/{stem}` or else `{dir}/{stem}.gz`
pub fn find_idx_file(dir: &Path, stem: &str) -> anyhow::Result<PathBuf> {
    let plain = dir.join(stem);
    if plain.is_file() {
        return Ok(plain);
    }
    let gz = dir.join(format!("{}.gz", stem));
    if gz.is_file() {
        return Ok(gz);
    }
    Err(anyhow::anyhow!("neither {:?} nor {:?} exists", plain, gz))
}

pub fn read_idx_images(file: &Path, seed: u64) -> anyhow::Result<InMemoryImageData> {
    let file_str = file
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid path {:?}", file))?;
    let (pixels, shape) = parse_idx_images(&read_bytes(file_str)?)?;
    InMemoryImageData::new(pixels, shape, seed)
}

/// MNIST with the training split cut down to its first `train_size`
/// images; the held-out split is the full test set
pub struct LimitedMnist {
    pub train: InMemoryImageData,
    pub test: InMemoryImageData,
}

impl LimitedMnist {
    pub fn load(data_dir: &Path, train_size: usize, seed: u64) -> anyhow::Result<Self> {
        let train = read_idx_images(&find_idx_file(data_dir, TRAIN_IMAGES)?, seed)?;
        let test = read_idx_images(&find_idx_file(data_dir, TEST_IMAGES)?, seed + 1)?;

        if train_size > train.num_samples() {
            warn!(
                "requested {} training images, only {} available",
                train_size,
                train.num_samples()
            );
        }
        let train = train.truncate(train_size, seed)?;

        info!(
            "MNIST: {} training / {} held-out images of {}",
            train.num_samples(),
            test.num_samples(),
            train.image_shape()
        );

        Ok(Self { train, test })
    }
}
