use crate::metric_logger::MetricLogger;

use candle_util::candle_data_loader::ImageBatchSource;
use candle_util::candle_inference::EstimatorConfig;
use candle_util::candle_likelihood_estimator::{estimate_nll, NllEstimator};
use candle_util::candle_model_traits::{GaussianDecoderT, GaussianEncoderT};
use candle_util::candle_vae_model::GaussianVae;
use clap::ValueEnum;
use log::info;
use serde::Serialize;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[clap(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LikelihoodMethod {
    Is,
    Sampling,
    Both,
}

pub struct EvaluationConfig {
    pub method: LikelihoodMethod,
    pub num_rounds: usize,
    pub batch_size: usize,
    pub importance_sampling: EstimatorConfig,
    pub prior_sampling: EstimatorConfig,
    /// prefix of the batch labels, e.g. `elbo-50000`
    pub label: String,
}

#[derive(Clone, Copy, Debug)]
pub struct NllSummary {
    pub train_nll: f32,
    pub test_nll: f32,
}

fn mean(xs: &[f32]) -> f32 {
    xs.iter().sum::<f32>() / xs.len().max(1) as f32
}

///
/// Alternate likelihood estimation between the training split (even
/// rounds) and the held-out split (odd rounds).
///
/// Every round records `{split}_nll`, plus `{split}_nll_sampling`
/// under `LikelihoodMethod::Both`, and flushes the logger. The
/// averages end up in `train_nll_all` and `test_nll_all`.
///
pub fn evaluate_held_out_likelihood<Enc, Dec>(
    model: &GaussianVae<Enc, Dec>,
    train_data: &mut dyn ImageBatchSource,
    test_data: &mut dyn ImageBatchSource,
    config: &EvaluationConfig,
    logger: &mut MetricLogger,
) -> anyhow::Result<NllSummary>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    if config.num_rounds < 2 {
        return Err(anyhow::anyhow!(
            "need at least two rounds to cover both splits, got {}",
            config.num_rounds
        ));
    }

    for round in 0..config.num_rounds {
        let split = if round % 2 == 0 { "train" } else { "test" };
        let data: &mut dyn ImageBatchSource = if round % 2 == 0 {
            &mut *train_data
        } else {
            &mut *test_data
        };
        info!("[{}] {}-{}", round, config.label, split);

        let x_nchw = data.next_batch(config.batch_size, model.device())?;

        let nll = match config.method {
            LikelihoodMethod::Is | LikelihoodMethod::Both => estimate_nll(
                model,
                &x_nchw,
                NllEstimator::ImportanceSampling,
                &config.importance_sampling,
            )?,
            LikelihoodMethod::Sampling => estimate_nll(
                model,
                &x_nchw,
                NllEstimator::PriorSampling,
                &config.prior_sampling,
            )?,
        };
        logger.add_item(&format!("{}_nll", split), nll);

        if config.method == LikelihoodMethod::Both {
            let nll_sampling = estimate_nll(
                model,
                &x_nchw,
                NllEstimator::PriorSampling,
                &config.prior_sampling,
            )?;
            logger.add_item(&format!("{}_nll_sampling", split), nll_sampling);
        }

        logger.flush()?;
    }

    let summary = NllSummary {
        train_nll: mean(logger.series("train_nll").unwrap_or_default()),
        test_nll: mean(logger.series("test_nll").unwrap_or_default()),
    };
    logger.add_item("train_nll_all", summary.train_nll);
    logger.add_item("test_nll_all", summary.test_nll);
    logger.flush()?;

    info!(
        "{}: train nll {:.4}, test nll {:.4}",
        config.label, summary.train_nll, summary.test_nll
    );
    Ok(summary)
}
