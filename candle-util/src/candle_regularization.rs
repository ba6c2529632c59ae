use crate::candle_vae_model::LossTerms;
use candle_core::{Result, Tensor};

/// How the posterior is pulled towards the prior
///
/// * `info_preference` - μ in [0, 1]; μ = 1 drops the KL term
/// * `mmd_strength` - s, weight of the MMD between aggregate posterior and prior
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Regularization {
    /// nll + (1 - μ) kl
    Elbo { info_preference: f64 },
    /// nll + (s + μ - 1) mmd + (1 - μ) kl
    Mmd {
        info_preference: f64,
        mmd_strength: f64,
    },
    /// nll + (1 - μ) kl * c, with c from the warm-up schedule
    ElboAnneal { info_preference: f64 },
}

impl Regularization {
    /// Assemble the scalar training objective
    ///
    /// * `terms` - outcome of one encode/decode pass
    /// * `anneal_coeff` - warm-up coefficient, used by `ElboAnneal` only
    pub fn objective(&self, terms: &LossTerms, anneal_coeff: f64) -> Result<Tensor> {
        match *self {
            Self::Elbo { info_preference } => {
                terms.nll.add(&(&terms.elbo * (1.0 - info_preference))?)
            }
            Self::Mmd {
                info_preference,
                mmd_strength,
            } => {
                let mmd = (&terms.mmd * (mmd_strength + info_preference - 1.0))?;
                let kl = (&terms.elbo * (1.0 - info_preference))?;
                terms.nll.add(&mmd)?.add(&kl)
            }
            Self::ElboAnneal { info_preference } => {
                terms
                    .nll
                    .add(&(&terms.elbo * ((1.0 - info_preference) * anneal_coeff))?)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Elbo { .. } => "elbo",
            Self::Mmd { .. } => "mmd",
            Self::ElboAnneal { .. } => "elbo_anneal",
        }
    }

    pub fn info_preference(&self) -> f64 {
        match *self {
            Self::Elbo { info_preference }
            | Self::Mmd {
                info_preference, ..
            }
            | Self::ElboAnneal { info_preference } => info_preference,
        }
    }
}

impl std::fmt::Display for Regularization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
