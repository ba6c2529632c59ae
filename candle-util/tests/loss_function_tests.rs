use approx::assert_abs_diff_eq;
use candle_util::candle_core::{DType, Device, Tensor};
use candle_util::candle_inference::VaeConfig;
use candle_util::candle_likelihood_estimator::compute_log_sum;
use candle_util::candle_loss_functions::*;
use candle_util::candle_model_traits::ImageShape;
use candle_util::candle_regularization::Regularization;
use candle_util::candle_vae_model::ConvGaussianVae;

fn scalar(x: &Tensor) -> f32 {
    x.to_scalar::<f32>().unwrap()
}

#[test]
fn kernel_diagonal_is_one() -> anyhow::Result<()> {
    let x = Tensor::randn(0f32, 1f32, (6, 4), &Device::Cpu)?;
    let k: Vec<Vec<f32>> = compute_kernel(&x, &x)?.to_vec2()?;
    for (i, k_i) in k.iter().enumerate() {
        assert_abs_diff_eq!(k_i[i], 1.0, epsilon = 1e-6);
        for k_ij in k_i.iter() {
            assert!(*k_ij > 0.0 && *k_ij <= 1.0 + 1e-6);
        }
    }
    Ok(())
}

#[test]
fn kernel_matches_definition() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let x = Tensor::new(&[[0f32, 0.], [1., 2.]], &dev)?;
    let y = Tensor::new(&[[1f32, 1.]], &dev)?;
    let k: Vec<Vec<f32>> = compute_kernel(&x, &y)?.to_vec2()?;
    // mean sq. distances: 1.0 and 0.5, divided by dim = 2
    assert_abs_diff_eq!(k[0][0], (-0.5f32).exp(), epsilon = 1e-6);
    assert_abs_diff_eq!(k[1][0], (-0.25f32).exp(), epsilon = 1e-6);
    Ok(())
}

#[test]
fn mmd_is_symmetric() -> anyhow::Result<()> {
    let x = Tensor::randn(0f32, 1f32, (20, 5), &Device::Cpu)?;
    let y = Tensor::randn(1f32, 2f32, (20, 5), &Device::Cpu)?;
    let xy = scalar(&compute_mmd(&x, &y)?);
    let yx = scalar(&compute_mmd(&y, &x)?);
    assert_abs_diff_eq!(xy, yx, epsilon = 1e-6);
    assert!(xy > 0.0);
    Ok(())
}

#[test]
fn mmd_of_identical_sets_vanishes() -> anyhow::Result<()> {
    let x = Tensor::randn(0f32, 1f32, (30, 8), &Device::Cpu)?;
    assert_abs_diff_eq!(scalar(&compute_mmd(&x, &x)?), 0.0, epsilon = 1e-6);
    Ok(())
}

#[test]
fn kl_of_standard_gaussian_is_zero() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let mean = Tensor::zeros((3, 4), DType::F32, &dev)?;
    let std = Tensor::ones((3, 4), DType::F32, &dev)?;
    let kl: Vec<f32> = gaussian_kl_loss_std(&mean, &std)?.to_vec1()?;
    assert_eq!(kl.len(), 3);
    for v in kl {
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-6);
    }

    // mu = 1, sigma = 0.5: -log(0.5) + 0.125 + 0.5 - 0.5 per dim
    let mean = Tensor::ones((1, 2), DType::F32, &dev)?;
    let std = (Tensor::ones((1, 2), DType::F32, &dev)? * 0.5)?;
    let kl: Vec<f32> = gaussian_kl_loss_std(&mean, &std)?.to_vec1()?;
    let expected = 2.0 * (2f32.ln() + 0.125);
    assert_abs_diff_eq!(kl[0], expected, epsilon = 1e-5);
    Ok(())
}

#[test]
fn gaussian_nll_matches_per_pixel_formula() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let x = Tensor::new(&[0.0f32, 1.0, 0.5, 0.25], &dev)?.reshape((1, 1, 2, 2))?;
    let mean = (Tensor::ones((1, 1, 2, 2), DType::F32, &dev)? * 0.5)?;
    let std = (Tensor::ones((1, 1, 2, 2), DType::F32, &dev)? * 0.1)?;

    let nll: Vec<f32> = gaussian_nll(&x, &mean, &std)?.to_vec1()?;

    let half_log_2pi = 0.5 * (2.0 * std::f32::consts::PI).ln();
    let expected: f32 = [0.0f32, 1.0, 0.5, 0.25]
        .iter()
        .map(|&v| (v - 0.5).powi(2) / (2.0 * 0.01) + 0.1f32.ln() + half_log_2pi)
        .sum();
    assert_abs_diff_eq!(nll[0], expected, epsilon = 1e-4);
    Ok(())
}

#[test]
fn log_sum_matches_brute_force() -> anyhow::Result<()> {
    let vals = vec![
        vec![1.0f32, -2.0, 3.5],
        vec![0.5, -1.0, 4.0],
        vec![2.0, -3.0, 3.0],
        vec![1.5, -2.5, 5.0],
    ];
    let nll_si = Tensor::new(vals.clone(), &Device::Cpu)?;
    let estimate = compute_log_sum(&nll_si)?;

    let (s, n) = (vals.len(), vals[0].len());
    let mut brute = 0f64;
    for i in 0..n {
        let mean_exp: f64 = (0..s).map(|k| (-(vals[k][i] as f64)).exp()).sum::<f64>() / s as f64;
        brute += -mean_exp.ln();
    }
    brute /= n as f64;

    assert_abs_diff_eq!(estimate as f64, brute, epsilon = 1e-5);
    Ok(())
}

#[test]
fn log_sum_tracks_constant_shift() -> anyhow::Result<()> {
    let nll_si = Tensor::randn(0f32, 1f32, (50, 4), &Device::Cpu)?;
    let base = compute_log_sum(&nll_si)?;
    let shifted = compute_log_sum(&(&nll_si + 1000.0)?)?;
    assert_abs_diff_eq!(shifted - base, 1000.0, epsilon = 1e-2);

    // exp(-1000) underflows without the shift
    assert!(shifted.is_finite());
    Ok(())
}

#[test]
fn full_information_preference_drops_kl() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let config = VaeConfig {
        image_shape: ImageShape::new(1, 8, 8),
        z_dim: 3,
        conv_channels: (4, 8),
        hidden_dim: 16,
    };
    let model = ConvGaussianVae::new(&config, &dev)?;
    let x = (Tensor::ones(config.image_shape.batch_dims(6), DType::F32, &dev)? * 0.3)?;
    let terms = model.loss_terms(&x)?;

    let elbo = Regularization::Elbo {
        info_preference: 1.0,
    };
    let loss = scalar(&elbo.objective(&terms, 1.0)?);
    assert_abs_diff_eq!(loss, scalar(&terms.nll), epsilon = 1e-6);

    let half = Regularization::Elbo {
        info_preference: 0.5,
    };
    let expected = scalar(&terms.nll) + 0.5 * scalar(&terms.elbo);
    assert_abs_diff_eq!(scalar(&half.objective(&terms, 1.0)?), expected, epsilon = 1e-3);
    Ok(())
}

#[test]
fn objectives_follow_their_coefficients() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let config = VaeConfig {
        image_shape: ImageShape::new(1, 8, 8),
        z_dim: 3,
        conv_channels: (4, 8),
        hidden_dim: 16,
    };
    let model = ConvGaussianVae::new(&config, &dev)?;
    let x = Tensor::rand(0f32, 1f32, config.image_shape.batch_dims(6), &dev)?;
    let terms = model.loss_terms(&x)?;
    let (nll, kl, mmd) = (scalar(&terms.nll), scalar(&terms.elbo), scalar(&terms.mmd));

    let mmd_reg = Regularization::Mmd {
        info_preference: 0.25,
        mmd_strength: 50.0,
    };
    let expected = nll + (50.0 + 0.25 - 1.0) * mmd + 0.75 * kl;
    assert_abs_diff_eq!(scalar(&mmd_reg.objective(&terms, 1.0)?), expected, epsilon = 1e-2);

    // the anneal coefficient only matters for the annealed variant
    let anneal = Regularization::ElboAnneal {
        info_preference: 0.0,
    };
    let expected = nll + kl * 0.01;
    assert_abs_diff_eq!(scalar(&anneal.objective(&terms, 0.01)?), expected, epsilon = 1e-2);

    let elbo = Regularization::Elbo {
        info_preference: 0.0,
    };
    assert_abs_diff_eq!(
        scalar(&elbo.objective(&terms, 0.01)?),
        scalar(&elbo.objective(&terms, 1.0)?),
        epsilon = 1e-6
    );
    Ok(())
}

#[test]
fn diagonal_log_det_is_batch_mean_of_twice_log_std() -> anyhow::Result<()> {
    let std = Tensor::new(&[[0.5f32, 1.0, 2.0], [0.25, 0.5, 4.0]], &Device::Cpu)?;
    // row 0: 2 ln(0.5 * 1 * 2) = 0, row 1: 2 ln(0.25 * 0.5 * 4) = 2 ln 0.5
    let expected = (0.0 + 2.0 * 0.5f32.ln()) / 2.0;
    assert_abs_diff_eq!(scalar(&diagonal_log_det(&std)?), expected, epsilon = 1e-6);

    let std_nchw = Tensor::full(0.1f32, (3, 1, 2, 2), &Device::Cpu)?;
    let expected = 4.0 * 2.0 * 0.1f32.ln();
    assert_abs_diff_eq!(scalar(&diagonal_log_det(&std_nchw)?), expected, epsilon = 1e-5);
    Ok(())
}

#[test]
fn reparameterized_draws_follow_mean_and_std() -> anyhow::Result<()> {
    let dev = Device::Cpu;
    let n = 20_000;
    let mean = Tensor::new(&[2f32, -1.0], &dev)?.unsqueeze(0)?.repeat((n, 1))?;
    let std = Tensor::new(&[0.5f32, 3.0], &dev)?.unsqueeze(0)?.repeat((n, 1))?;
    let z = reparameterize(&mean, &std)?;
    assert_eq!(z.dims(), &[n, 2]);

    let z_mean: Vec<f32> = z.mean(0)?.to_vec1()?;
    let z_var: Vec<f32> = z
        .broadcast_sub(&z.mean_keepdim(0)?)?
        .sqr()?
        .mean(0)?
        .to_vec1()?;

    assert_abs_diff_eq!(z_mean[0], 2.0, epsilon = 0.03);
    assert_abs_diff_eq!(z_mean[1], -1.0, epsilon = 0.15);
    assert_abs_diff_eq!(z_var[0].sqrt(), 0.5, epsilon = 0.02);
    assert_abs_diff_eq!(z_var[1].sqrt(), 3.0, epsilon = 0.1);
    Ok(())
}
