use crate::candle_model_traits::ImageShape;

/// Network widths of the convolutional encoder/decoder pair
#[derive(Clone, Debug)]
pub struct VaeConfig {
    pub image_shape: ImageShape,
    pub z_dim: usize,
    /// output channels of the first and second conv stage
    pub conv_channels: (usize, usize),
    pub hidden_dim: usize,
}

impl Default for VaeConfig {
    fn default() -> Self {
        Self {
            image_shape: ImageShape::mnist(),
            z_dim: 20,
            conv_channels: (64, 128),
            hidden_dim: 1024,
        }
    }
}

/// Step-wise warm-up of the KL coefficient
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnealSchedule {
    pub start: f64,
    pub end: f64,
    pub threshold: usize,
}

impl AnnealSchedule {
    pub fn coefficient(&self, iter: usize) -> f64 {
        if iter < self.threshold {
            self.start
        } else {
            self.end
        }
    }
}

impl Default for AnnealSchedule {
    fn default() -> Self {
        Self {
            start: 0.01,
            end: 1.0,
            threshold: 20_000,
        }
    }
}

pub struct TrainConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub num_iterations: usize,
    pub anneal: AnnealSchedule,
    pub status_interval: usize,
    pub snapshot_interval: usize,
    pub device: candle_core::Device,
    pub verbose: bool,
    pub show_progress: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            batch_size: 200,
            num_iterations: 100_000,
            anneal: AnnealSchedule::default(),
            status_interval: 100,
            snapshot_interval: 250,
            device: candle_core::Device::Cpu,
            verbose: false,
            show_progress: true,
        }
    }
}

/// Monte Carlo budget of one likelihood estimate
#[derive(Clone, Copy, Debug)]
pub struct EstimatorConfig {
    pub num_iterations: usize,
    pub report_interval: usize,
}

impl EstimatorConfig {
    pub fn importance_sampling() -> Self {
        Self {
            num_iterations: 5_000,
            report_interval: 2_000,
        }
    }

    pub fn prior_sampling() -> Self {
        Self {
            num_iterations: 50_000,
            report_interval: 20_000,
        }
    }
}
