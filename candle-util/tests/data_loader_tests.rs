use candle_util::candle_core::Device;
use candle_util::candle_data_loader::*;
use candle_util::candle_data_loader_util::EpochCursor;
use candle_util::candle_model_traits::ImageShape;
use std::collections::HashSet;

#[test]
fn cursor_visits_every_sample_once_per_epoch() {
    let mut cursor = EpochCursor::new(10, 7);
    let first: HashSet<usize> = cursor.next_indexes(10).into_iter().collect();
    assert_eq!(first.len(), 10);
    assert_eq!(cursor.epoch(), 1);

    let wrapped = cursor.next_indexes(15);
    assert_eq!(wrapped.len(), 15);
    assert_eq!(cursor.epoch(), 2);
    let second: HashSet<usize> = wrapped[..10].iter().cloned().collect();
    assert_eq!(second.len(), 10);
}

#[test]
fn epoch_counts_completed_passes() {
    let mut cursor = EpochCursor::new(10, 7);
    assert_eq!(cursor.epoch(), 0);
    cursor.next_indexes(9);
    assert_eq!(cursor.epoch(), 0);
    cursor.next_indexes(1);
    assert_eq!(cursor.epoch(), 1);
    cursor.next_indexes(25);
    assert_eq!(cursor.epoch(), 3);
    cursor.next_indexes(4);
    assert_eq!(cursor.epoch(), 3);
}

#[test]
fn image_data_reports_epochs() -> anyhow::Result<()> {
    let shape = ImageShape::new(1, 4, 4);
    let mut data = InMemoryImageData::constant(6, shape, 0.5, 1)?;
    data.next_batch(4, &Device::Cpu)?;
    assert_eq!(data.epoch(), 0);
    data.next_batch(4, &Device::Cpu)?;
    assert_eq!(data.epoch(), 1);
    data.next_batch(4, &Device::Cpu)?;
    assert_eq!(data.epoch(), 2);
    Ok(())
}

#[test]
fn cursor_is_seeded() {
    let mut a = EpochCursor::new(100, 3);
    let mut b = EpochCursor::new(100, 3);
    assert_eq!(a.next_indexes(50), b.next_indexes(50));
}

#[test]
fn batches_have_image_layout() -> anyhow::Result<()> {
    let shape = ImageShape::new(1, 4, 4);
    let pixels: Vec<f32> = (0..(3 * 16)).map(|i| (i / 16) as f32 / 2.0).collect();
    let mut data = InMemoryImageData::new(pixels, shape, 0)?;
    assert_eq!(data.num_samples(), 3);
    assert_eq!(data.image(1).map(|x| x[0]), Some(0.5));

    let x = data.next_batch(5, &Device::Cpu)?;
    assert_eq!(x.dims(), &[5, 1, 4, 4]);
    let max = x.flatten_all()?.max(0)?.to_scalar::<f32>()?;
    assert!(max <= 1.0);
    Ok(())
}

#[test]
fn truncation_limits_samples() -> anyhow::Result<()> {
    let shape = ImageShape::new(1, 4, 4);
    let data = InMemoryImageData::constant(20, shape, 0.5, 1)?.truncate(6, 1)?;
    assert_eq!(data.num_samples(), 6);
    Ok(())
}

#[test]
fn ragged_pixels_are_rejected() {
    let shape = ImageShape::new(1, 4, 4);
    assert!(InMemoryImageData::new(vec![0.0; 17], shape, 0).is_err());
}
