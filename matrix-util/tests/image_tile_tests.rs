use candle_util::candle_core::{Device, Tensor};
use matrix_util::image_tile::*;
use ndarray::{Array3, Array4};

#[test]
fn grid_is_row_major() -> anyhow::Result<()> {
    // 5 images of 2 x 3, each filled with its index
    let samples = Array4::from_shape_fn((5, 2, 3, 1), |(i, _, _, _)| i as f32);
    let grid = tile_images(&samples, 100)?;
    assert_eq!(grid.dim(), (4, 6, 1));
    assert_eq!(grid[[0, 0, 0]], 0.0);
    assert_eq!(grid[[0, 3, 0]], 1.0);
    assert_eq!(grid[[2, 0, 0]], 2.0);
    assert_eq!(grid[[3, 5, 0]], 3.0);
    Ok(())
}

#[test]
fn max_samples_caps_the_grid() -> anyhow::Result<()> {
    let samples = Array4::<f32>::zeros((200, 4, 4, 1));
    assert_eq!(tile_images(&samples, 100)?.dim(), (40, 40, 1));
    assert_eq!(tile_images(&samples, 8)?.dim(), (8, 8, 1));
    assert!(tile_images(&Array4::<f32>::zeros((0, 4, 4, 1)), 100).is_err());
    Ok(())
}

#[test]
fn four_panels_make_two_by_two() -> anyhow::Result<()> {
    let panels: Vec<Array3<f32>> = (0..4)
        .map(|k| Array3::from_elem((10, 10, 1), k as f32))
        .collect();
    let grid = tile_panels(&panels)?;
    assert_eq!(grid.dim(), (20, 20, 1));
    assert_eq!(grid[[15, 15, 0]], 3.0);

    let ragged = vec![Array3::<f32>::zeros((2, 2, 1)), Array3::<f32>::zeros((3, 2, 1))];
    assert!(tile_panels(&ragged).is_err());
    Ok(())
}

#[test]
fn nchw_to_nhwc() -> anyhow::Result<()> {
    let t = Tensor::arange(0f32, 12f32, &Device::Cpu)?.reshape((1, 3, 2, 2))?;
    let a = nchw_tensor_to_nhwc(&t)?;
    assert_eq!(a.dim(), (1, 2, 2, 3));
    assert_eq!(a[[0, 0, 1, 0]], 1.0);
    assert_eq!(a[[0, 0, 0, 2]], 8.0);
    Ok(())
}

#[test]
fn png_files_are_written() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let gray = dir.path().join("gray.png");
    let rgb = dir.path().join("rgb.png");
    save_png(&Array3::from_elem((6, 4, 1), 0.5), gray.to_str().unwrap())?;
    save_png(&Array3::from_elem((6, 4, 3), 2.0), rgb.to_str().unwrap())?;
    assert!(gray.exists() && rgb.exists());
    assert!(save_png(&Array3::zeros((2, 2, 2)), dir.path().join("x.png").to_str().unwrap()).is_err());
    Ok(())
}
