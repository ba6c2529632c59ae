use core::f64;

use candle_core::{Result, Tensor};

/// KL divergence of `N(mu, sigma^2)` from the standard Gaussian prior
///
/// kl(i) = sum_k [ -log(sigma) + 0.5 * sigma^2 + 0.5 * mu^2 - 0.5 ]
///
/// * `z_mean` - mean of Gaussian distribution
/// * `z_std` - standard deviation of Gaussian distribution
///
pub fn gaussian_kl_loss_std(z_mean: &Tensor, z_std: &Tensor) -> Result<Tensor> {
    let quad = ((z_std.sqr()? + z_mean.sqr()?)? * 0.5)?;
    let kl = (quad.sub(&z_std.log()?)? - 0.5)?;
    kl.sum(z_mean.rank() - 1)
}

/// Gaussian negative log-likelihood of images, summed over pixels
///
/// nll(i) = sum_j [ (x(i,j) - mu(i,j))^2 / (2 sigma(i,j)^2) + log sigma(i,j) + log(2 pi) / 2 ]
///
/// * `x_nchw` - observed data
/// * `mean_nchw` - reconstruction mean
/// * `std_nchw` - reconstruction standard deviation
///
pub fn gaussian_nll(x_nchw: &Tensor, mean_nchw: &Tensor, std_nchw: &Tensor) -> Result<Tensor> {
    let half_log_2pi = 0.5 * (2.0 * f64::consts::PI).ln();
    let resid = x_nchw.sub(mean_nchw)?.div(std_nchw)?;
    let nll = ((resid.sqr()? * 0.5)? + std_nchw.log()?)?;
    (nll + half_log_2pi)?.flatten_from(1)?.sum(1)
}

/// Log-determinant of a diagonal Gaussian, averaged over the batch
///
/// mean_i sum_j 2 log sigma(i,j)
pub fn diagonal_log_det(std: &Tensor) -> Result<Tensor> {
    (std.log()? * 2.0)?.flatten_from(1)?.sum(1)?.mean_all()
}

/// z = mu + sigma * eps
/// where eps ~ N(0, 1)
pub fn reparameterize(mean: &Tensor, std: &Tensor) -> Result<Tensor> {
    let eps = Tensor::randn_like(mean, 0., 1.)?;
    mean + std.mul(&eps)?
}

/// Gaussian-like kernel between two sets of samples
///
/// k(i,j) = exp( - mean_d (x(i,d) - y(j,d))^2 / dim )
///
/// * `x_nd` - n samples
/// * `y_md` - m samples
///
/// Returns an `n x m` kernel matrix
pub fn compute_kernel(x_nd: &Tensor, y_md: &Tensor) -> Result<Tensor> {
    let dim = x_nd.dim(1)? as f64;
    let diff_nmd = x_nd.unsqueeze(1)?.broadcast_sub(&y_md.unsqueeze(0)?)?;
    (diff_nmd.sqr()?.mean(2)? / dim)?.neg()?.exp()
}

/// Biased MMD estimate with the diagonal kernel terms included
///
/// mmd = mean k(x,x) + mean k(y,y) - 2 mean k(x,y)
pub fn compute_mmd(x_nd: &Tensor, y_md: &Tensor) -> Result<Tensor> {
    let xx = compute_kernel(x_nd, x_nd)?.mean_all()?;
    let yy = compute_kernel(y_md, y_md)?.mean_all()?;
    let xy = compute_kernel(x_nd, y_md)?.mean_all()?;
    (xx + yy)?.sub(&(xy * 2.0)?)
}
