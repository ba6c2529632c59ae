pub mod diagnostics;
pub mod fit_info_vae;
pub mod log_likelihood;
pub mod metric_logger;
pub mod mnist_input;
pub mod visualization;
