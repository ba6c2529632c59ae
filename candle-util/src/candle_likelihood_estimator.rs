use crate::candle_inference::EstimatorConfig;
use crate::candle_model_traits::{GaussianDecoderT, GaussianEncoderT};
use crate::candle_vae_model::GaussianVae;

use candle_core::{DType, Result, Tensor};
use log::info;
use std::time::Instant;

/// Monte Carlo estimators of the marginal negative log-likelihood
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NllEstimator {
    /// draws from the encoder, weighted by `kl + nll`
    ImportanceSampling,
    /// draws from the prior `N(0, I)`
    PriorSampling,
}

impl NllEstimator {
    pub fn default_config(&self) -> EstimatorConfig {
        match self {
            Self::ImportanceSampling => EstimatorConfig::importance_sampling(),
            Self::PriorSampling => EstimatorConfig::prior_sampling(),
        }
    }
}

/// Shift-stable `-log mean_s exp(-v(s,i))`, averaged over samples `i`
///
/// m(i) = min_s v(s,i)
/// out = mean_i [ m(i) - log mean_s exp(-v(s,i) + m(i)) ]
///
/// * `nll_si` - draws x samples matrix of negative log-likelihoods
///
pub fn compute_log_sum(nll_si: &Tensor) -> Result<f32> {
    let nll_si = nll_si.to_dtype(DType::F64)?;
    let min_1i = nll_si.min_keepdim(0)?;
    let log_mean_1i = nll_si
        .neg()?
        .broadcast_add(&min_1i)?
        .exp()?
        .mean_keepdim(0)?
        .log()?;
    let ret = min_1i.sub(&log_mean_1i)?.mean_all()?;
    Ok(ret.to_scalar::<f64>()? as f32)
}

/// Estimate the negative log-likelihood of `x_nchw` under a trained model
///
/// * `model` - a trained model (read only)
/// * `x_nchw` - a fixed image batch
/// * `estimator` - where the latent draws come from
/// * `config` - number of draws and the reporting interval
pub fn estimate_nll<Enc, Dec>(
    model: &GaussianVae<Enc, Dec>,
    x_nchw: &Tensor,
    estimator: NllEstimator,
    config: &EstimatorConfig,
) -> anyhow::Result<f32>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    let start_time = Instant::now();
    let report_interval = config.report_interval.max(1);
    let mut nll_list = Vec::with_capacity(config.num_iterations);

    for k in 0..config.num_iterations {
        let nll_i = match estimator {
            NllEstimator::ImportanceSampling => model.importance_sampled_nll(x_nchw)?,
            NllEstimator::PriorSampling => model.prior_sampled_nll(x_nchw)?,
        };
        nll_list.push(nll_i);

        if k % report_interval == 0 {
            info!(
                "Iter {}, current value {:.4}, time used {:.2}",
                k,
                compute_log_sum(&Tensor::stack(&nll_list, 0)?)?,
                start_time.elapsed().as_secs_f32()
            );
        }
    }

    if nll_list.is_empty() {
        anyhow::bail!("at least one Monte Carlo draw is needed");
    }

    Ok(compute_log_sum(&Tensor::stack(&nll_list, 0)?)?)
}

pub fn estimate_nll_by_importance_sampling<Enc, Dec>(
    model: &GaussianVae<Enc, Dec>,
    x_nchw: &Tensor,
    config: &EstimatorConfig,
) -> anyhow::Result<f32>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    estimate_nll(model, x_nchw, NllEstimator::ImportanceSampling, config)
}

pub fn estimate_nll_by_sampling<Enc, Dec>(
    model: &GaussianVae<Enc, Dec>,
    x_nchw: &Tensor,
    config: &EstimatorConfig,
) -> anyhow::Result<f32>
where
    Enc: GaussianEncoderT,
    Dec: GaussianDecoderT,
{
    estimate_nll(model, x_nchw, NllEstimator::PriorSampling, config)
}
