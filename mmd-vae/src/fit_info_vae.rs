use crate::diagnostics::latent_log_determinant;
use crate::log_likelihood::*;
use crate::metric_logger::MetricLogger;
use crate::mnist_input::LimitedMnist;
use crate::visualization::save_snapshot;

use candle_util::candle_core::{Device, Result};
use candle_util::candle_data_loader::ImageBatchSource;
use candle_util::candle_inference::{AnnealSchedule, EstimatorConfig, TrainConfig, VaeConfig};
use candle_util::candle_model_traits::{GaussianDecoderT, GaussianEncoderT};
use candle_util::candle_regularization::Regularization;
use candle_util::candle_vae_inference::{train_regularized_vae, StepStats, TrainMonitor};
use candle_util::candle_vae_model::{ConvGaussianVae, GaussianVae, LossTerms};
use clap::{Parser, ValueEnum};
use log::info;
use matrix_util::common_io::{recreate_dir, write_lines};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const LOG_FILE: &str = "log.txt";
pub const CONFIG_FILE: &str = "config.json";
pub const RUNNING_AVERAGE_WINDOW: usize = 50;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[clap(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegType {
    Elbo,
    Mmd,
    ElboAnneal,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[clap(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

impl ComputeDevice {
    pub fn to_device(&self, device_no: usize) -> Result<Device> {
        Ok(match self {
            ComputeDevice::Metal => Device::new_metal(device_no)?,
            ComputeDevice::Cuda => Device::new_cuda(device_no)?,
            ComputeDevice::Cpu => Device::Cpu,
        })
    }
}

#[derive(Parser, Debug, Clone, Serialize)]
#[command(
    version,
    about = "Information-regularized VAE on MNIST",
    long_about = "Train a convolutional Gaussian VAE on a limited MNIST subset\n\
		  under ELBO, MMD or annealed ELBO regularization,\n\
		  then estimate train and held-out negative log-likelihood.\n\
		  Outputs go to {log_root}/{reg}_{train_size}_{mi}_{reg_size}:\n\
		  - log.txt\n\
		  - config.json\n\
		  - samples{iter}.png\n"
)]
pub struct InfoVaeArgs {
    #[arg(
        long,
        short = 'r',
        value_enum,
        default_value = "elbo",
        help = "Type of regularization"
    )]
    pub reg_type: RegType,

    #[arg(long, value_enum, default_value = "cpu", help = "Candle device")]
    pub device: ComputeDevice,

    #[arg(long, short = 'g', default_value_t = 0, help = "Device number for cuda or metal")]
    pub gpu: usize,

    #[arg(long, short = 'n', default_value_t = 50000, help = "Number of training images")]
    pub train_size: usize,

    #[arg(
        long,
        short = 'm',
        default_value_t = 0.5,
        help = "Information preference",
        long_help = "Information preference (mu).\n\
		     1 drops the KL term of the ELBO altogether."
    )]
    pub mi: f64,

    #[arg(long, short = 's', default_value_t = 50.0, help = "Strength of the MMD term")]
    pub reg_size: f64,

    #[arg(
        long,
        short = 'l',
        value_enum,
        default_value = "is",
        help = "Likelihood estimation method"
    )]
    pub ll_eval: LikelihoodMethod,

    #[arg(
        long,
        default_value = "mnist",
        help = "Directory of MNIST files",
        long_help = "Directory with train-images-idx3-ubyte and\n\
		     t10k-images-idx3-ubyte, optionally gzipped (.gz)."
    )]
    pub data_dir: PathBuf,

    #[arg(long, default_value = "log", help = "Parent of the run directory")]
    pub log_root: PathBuf,

    #[arg(long, default_value_t = 100000, help = "Training iterations")]
    pub iterations: usize,

    #[arg(long, default_value_t = 200, help = "Minibatch size")]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-4, help = "Learning rate")]
    pub learning_rate: f32,

    #[arg(long, default_value_t = 20, help = "Latent dimension")]
    pub z_dim: usize,

    #[arg(long, default_value_t = 0.01, help = "Anneal coefficient during warm-up")]
    pub anneal_start: f64,

    #[arg(long, default_value_t = 1.0, help = "Anneal coefficient after warm-up")]
    pub anneal_end: f64,

    #[arg(long, default_value_t = 20000, help = "Warm-up iterations")]
    pub anneal_threshold: usize,

    #[arg(long, default_value_t = 100, help = "Iterations between status lines")]
    pub status_interval: usize,

    #[arg(long, default_value_t = 250, help = "Iterations between sample images")]
    pub snapshot_interval: usize,

    #[arg(
        long,
        default_value_t = 50,
        help = "Minibatches per latent covariance diagnostic"
    )]
    pub logdet_batches: usize,

    #[arg(long, default_value_t = 50, help = "Likelihood evaluation rounds")]
    pub eval_rounds: usize,

    #[arg(long, default_value_t = 5000, help = "Importance sampling draws")]
    pub is_iterations: usize,

    #[arg(long, default_value_t = 50000, help = "Prior sampling draws")]
    pub sampling_iterations: usize,

    #[arg(long, default_value_t = 42, help = "Random seed for data shuffling")]
    pub seed: u64,

    #[arg(long, default_value_t = false, help = "Verbose messages")]
    pub verbose: bool,
}

impl InfoVaeArgs {
    pub fn regularization(&self) -> Regularization {
        match self.reg_type {
            RegType::Elbo => Regularization::Elbo {
                info_preference: self.mi,
            },
            RegType::Mmd => Regularization::Mmd {
                info_preference: self.mi,
                mmd_strength: self.reg_size,
            },
            RegType::ElboAnneal => Regularization::ElboAnneal {
                info_preference: self.mi,
            },
        }
    }

    /// `{reg}_{train_size}_{mi:.2}_{reg_size:.2}`
    pub fn run_name(&self) -> String {
        format!(
            "{}_{}_{:.2}_{:.2}",
            self.regularization().name(),
            self.train_size,
            self.mi,
            self.reg_size
        )
    }

    /// Reject settings that would only fail after training has started
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("--batch-size must be positive");
        }
        if self.logdet_batches.saturating_mul(self.batch_size) < 2 {
            anyhow::bail!(
                "--logdet-batches {} x --batch-size {} leaves fewer than two latent codes for a covariance",
                self.logdet_batches,
                self.batch_size
            );
        }
        if self.eval_rounds < 2 {
            anyhow::bail!(
                "--eval-rounds {} can't cover both the train and test splits",
                self.eval_rounds
            );
        }
        Ok(())
    }

    pub fn run_dir(&self) -> PathBuf {
        self.log_root.join(self.run_name())
    }

    pub fn train_config(&self, device: &Device) -> TrainConfig {
        TrainConfig {
            learning_rate: self.learning_rate,
            batch_size: self.batch_size,
            num_iterations: self.iterations,
            anneal: AnnealSchedule {
                start: self.anneal_start,
                end: self.anneal_end,
                threshold: self.anneal_threshold,
            },
            status_interval: self.status_interval,
            snapshot_interval: self.snapshot_interval,
            device: device.clone(),
            verbose: self.verbose,
            show_progress: true,
        }
    }

    pub fn evaluation_config(&self) -> EvaluationConfig {
        EvaluationConfig {
            method: self.ll_eval,
            num_rounds: self.eval_rounds,
            batch_size: self.batch_size,
            importance_sampling: EstimatorConfig {
                num_iterations: self.is_iterations,
                ..EstimatorConfig::importance_sampling()
            },
            prior_sampling: EstimatorConfig {
                num_iterations: self.sampling_iterations,
                ..EstimatorConfig::prior_sampling()
            },
            label: format!("{}-{}", self.regularization().name(), self.train_size),
        }
    }
}

/// Wipe and recreate the run directory, then record the configuration
pub fn prepare_run_dir(args: &InfoVaeArgs) -> anyhow::Result<PathBuf> {
    args.validate()?;
    let run_dir = args.run_dir();
    recreate_dir(&run_dir)?;

    let config_file = run_dir.join(CONFIG_FILE);
    let config_str = config_file
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid path {:?}", config_file))?;
    write_lines(&[serde_json::to_string_pretty(args)?], config_str)?;

    info!("run directory: {}", run_dir.display());
    Ok(run_dir)
}

pub struct ExperimentOutcome {
    pub log_path: PathBuf,
    pub loss_trace: Vec<f32>,
    pub train_nll: f32,
    pub test_nll: f32,
}

/// Metrics, latent diagnostics and sample images along the training
struct ExperimentMonitor<'a> {
    logger: MetricLogger,
    test_data: &'a mut dyn ImageBatchSource,
    run_dir: &'a Path,
    logdet_batches: usize,
    batch_size: usize,
}

impl<Enc, Dec> TrainMonitor<Enc, Dec> for ExperimentMonitor<'_>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    fn on_step(&mut self, stats: &StepStats) -> anyhow::Result<()> {
        self.logger.add_item("loss", stats.loss);
        self.logger.add_item("nll", stats.nll);
        self.logger.add_item("mmd", stats.mmd);
        self.logger.add_item("elbo", stats.elbo);
        self.logger.add_item("xlogdet", stats.x_log_det);
        self.logger.add_item("zlogdet", stats.z_log_det);
        Ok(())
    }

    fn on_status(
        &mut self,
        model: &GaussianVae<Enc, Dec>,
        train_data: &mut dyn ImageBatchSource,
        _stats: &StepStats,
    ) -> anyhow::Result<()> {
        let train_logdet =
            latent_log_determinant(model, train_data, self.logdet_batches, self.batch_size)?;
        let test_logdet = latent_log_determinant(
            model,
            &mut *self.test_data,
            self.logdet_batches,
            self.batch_size,
        )?;
        self.logger.add_item("zlogdet_train", train_logdet as f32);
        self.logger.add_item("zlogdet_test", test_logdet as f32);
        self.logger.flush()
    }

    fn on_snapshot(
        &mut self,
        model: &GaussianVae<Enc, Dec>,
        terms: &LossTerms,
        stats: &StepStats,
    ) -> anyhow::Result<()> {
        save_snapshot(model, terms, self.run_dir, stats.iter)?;
        Ok(())
    }
}

///
/// Train and evaluate one model on given data sources and an already
/// prepared run directory
///
pub fn run_experiment<Train, Test>(
    args: &InfoVaeArgs,
    train_data: &mut Train,
    test_data: &mut Test,
    device: &Device,
    run_dir: &Path,
) -> anyhow::Result<ExperimentOutcome>
where
    Train: ImageBatchSource,
    Test: ImageBatchSource,
{
    args.validate()?;

    let vae_config = VaeConfig {
        image_shape: train_data.image_shape(),
        z_dim: args.z_dim,
        ..VaeConfig::default()
    };
    let model = ConvGaussianVae::new(&vae_config, device)?;
    let regularization = args.regularization();

    info!(
        "{} on {} images of {}, z_dim {}",
        regularization,
        train_data.num_samples(),
        vae_config.image_shape,
        vae_config.z_dim
    );

    let log_path = run_dir.join(LOG_FILE);

    let mut monitor = ExperimentMonitor {
        logger: MetricLogger::new(&log_path, RUNNING_AVERAGE_WINDOW),
        test_data: &mut *test_data,
        run_dir,
        logdet_batches: args.logdet_batches,
        batch_size: args.batch_size,
    };

    let loss_trace = train_regularized_vae(
        &model,
        train_data,
        &regularization,
        &args.train_config(device),
        &mut monitor,
    )?;

    let mut logger = monitor.logger;
    logger.flush()?;

    let summary = evaluate_held_out_likelihood(
        &model,
        train_data,
        test_data,
        &args.evaluation_config(),
        &mut logger,
    )?;

    Ok(ExperimentOutcome {
        log_path,
        loss_trace,
        train_nll: summary.train_nll,
        test_nll: summary.test_nll,
    })
}

pub fn fit_info_vae(args: &InfoVaeArgs) -> anyhow::Result<ExperimentOutcome> {
    let device = args.device.to_device(args.gpu)?;
    let run_dir = prepare_run_dir(args)?;
    let mut mnist = LimitedMnist::load(&args.data_dir, args.train_size, args.seed)?;
    run_experiment(args, &mut mnist.train, &mut mnist.test, &device, &run_dir)
}
