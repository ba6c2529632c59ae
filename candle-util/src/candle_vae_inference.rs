use crate::candle_data_loader::ImageBatchSource;
use crate::candle_inference::TrainConfig;
use crate::candle_model_traits::{GaussianDecoderT, GaussianEncoderT};
use crate::candle_regularization::Regularization;
use crate::candle_vae_model::{GaussianVae, LossTerms};

use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::{info, warn};

/// Scalar diagnostics of one optimizer step, evaluated before the update
#[derive(Clone, Copy, Debug, Default)]
pub struct StepStats {
    pub iter: usize,
    pub loss: f32,
    pub nll: f32,
    pub mmd: f32,
    pub elbo: f32,
    pub x_log_det: f32,
    pub z_log_det: f32,
    pub anneal_coeff: f64,
}

impl StepStats {
    fn collect(iter: usize, loss: f32, terms: &LossTerms, anneal_coeff: f64) -> anyhow::Result<Self> {
        Ok(Self {
            iter,
            loss,
            nll: terms.nll.to_scalar::<f32>()?,
            mmd: terms.mmd.to_scalar::<f32>()?,
            elbo: terms.elbo.to_scalar::<f32>()?,
            x_log_det: terms.x_log_det.to_scalar::<f32>()?,
            z_log_det: terms.z_log_det.to_scalar::<f32>()?,
            anneal_coeff,
        })
    }
}

/// Hooks the training loop calls back into; all default to no-ops
pub trait TrainMonitor<Enc, Dec>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    /// every iteration
    fn on_step(&mut self, _stats: &StepStats) -> anyhow::Result<()> {
        Ok(())
    }

    /// every `status_interval` iterations; `train_data` is the
    /// training source itself, for drawing extra batches
    fn on_status(
        &mut self,
        _model: &GaussianVae<Enc, Dec>,
        _train_data: &mut dyn ImageBatchSource,
        _stats: &StepStats,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// every `snapshot_interval` iterations
    fn on_snapshot(
        &mut self,
        _model: &GaussianVae<Enc, Dec>,
        _terms: &LossTerms,
        _stats: &StepStats,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A monitor that does nothing
pub struct SilentMonitor;

impl<Enc, Dec> TrainMonitor<Enc, Dec> for SilentMonitor
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
}

/// Train the VAE model under a given regularization
///
/// * `model` - encoder/decoder context; its parameters are updated in place
/// * `data` - source of training minibatches
/// * `regularization` - which objective to minimize
/// * `train_config` - training configuration
/// * `monitor` - periodic callbacks
///
/// Returns the objective value of each iteration
pub fn train_regularized_vae<Enc, Dec, Data, Mon>(
    model: &GaussianVae<Enc, Dec>,
    data: &mut Data,
    regularization: &Regularization,
    train_config: &TrainConfig,
    monitor: &mut Mon,
) -> anyhow::Result<Vec<f32>>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
    Data: ImageBatchSource,
    Mon: TrainMonitor<Enc, Dec>,
{
    let device = &train_config.device;
    let params = ParamsAdamW {
        lr: train_config.learning_rate.into(),
        weight_decay: 0.0,
        ..Default::default()
    };
    let mut adam = AdamW::new(model.variable_map().all_vars(), params)?;

    let pb = ProgressBar::new(train_config.num_iterations as u64);

    if !train_config.show_progress || train_config.verbose {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    info!(
        "Training {} VAE for {} iterations, batch size {}",
        regularization, train_config.num_iterations, train_config.batch_size
    );

    let status_interval = train_config.status_interval.max(1);
    let snapshot_interval = train_config.snapshot_interval.max(1);

    let mut loss_trace = Vec::with_capacity(train_config.num_iterations);

    for iter in 0..train_config.num_iterations {
        let x_nchw = data.next_batch(train_config.batch_size, device)?;
        let anneal_coeff = train_config.anneal.coefficient(iter);

        let terms = model.loss_terms(&x_nchw)?;
        let loss = regularization.objective(&terms, anneal_coeff)?;
        adam.backward_step(&loss)?;

        let loss_val = loss.to_scalar::<f32>()?;
        if !loss_val.is_finite() {
            warn!("[{}] non-finite objective: {}", iter, loss_val);
        }
        loss_trace.push(loss_val);

        let stats = StepStats::collect(iter, loss_val, &terms, anneal_coeff)?;
        monitor.on_step(&stats)?;

        if iter % status_interval == 0 {
            info!(
                "Iteration {} (epoch {}), nll {:.4}, mmd loss {:.4}, elbo loss {:.4}, xlogdet {}, zlogdet {}",
                iter,
                data.epoch(),
                stats.nll,
                stats.mmd,
                stats.elbo,
                stats.x_log_det,
                stats.z_log_det
            );
            monitor.on_status(model, &mut *data, &stats)?;
        }

        if iter % snapshot_interval == 0 {
            monitor.on_snapshot(model, &terms, &stats)?;
        }

        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(loss_trace)
}
