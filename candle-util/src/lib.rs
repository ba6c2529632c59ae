pub mod candle_aux_layers;
pub mod candle_data_loader;
pub mod candle_data_loader_util;
pub mod candle_decoder_gaussian_conv;
pub mod candle_encoder_gaussian_conv;
pub mod candle_inference;
pub mod candle_likelihood_estimator;
pub mod candle_loss_functions;
pub mod candle_model_traits;
pub mod candle_regularization;
pub mod candle_vae_inference;
pub mod candle_vae_model;

pub use candle_core;
pub use candle_nn;
