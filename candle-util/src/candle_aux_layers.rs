use candle_core::{Result, Tensor};
use candle_nn::{Activation, Module};

/// Lower bound on every standard deviation a layer emits
pub const MIN_STD: f64 = 0.01;

/// build a stack of alternating `M` and `A` layers
pub struct StackLayers<M>
where
    M: Module,
{
    module_layers: Vec<M>,
    activation_layers: Vec<Option<Activation>>,
}

impl<M> Module for StackLayers<M>
where
    M: Module,
{
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for (module, activation) in self.module_layers.iter().zip(self.activation_layers.iter()) {
            x = module.forward(&x)?;
            if let Some(activation) = activation {
                x = activation.forward(&x)?;
            }
        }
        Ok(x)
    }
}

impl<M> StackLayers<M>
where
    M: Module,
{
    pub fn new() -> Self {
        Self {
            module_layers: Vec::new(),
            activation_layers: Vec::new(),
        }
    }

    /// Appends a layer after all the current layers.
    pub fn push_with_act(&mut self, layer: M, activation: Activation) {
        self.module_layers.push(layer);
        self.activation_layers.push(Some(activation));
    }
}

impl<M> Default for StackLayers<M>
where
    M: Module,
{
    fn default() -> Self {
        Self::new()
    }
}

/// leaky ReLU with slope 0.1 on the negative side
pub fn lrelu() -> Activation {
    Activation::LeakyRelu(0.1)
}

/// `max(sigmoid(x), 0.01)`
pub fn floored_sigmoid(x: &Tensor) -> Result<Tensor> {
    candle_nn::ops::sigmoid(x)?.maximum(MIN_STD)
}

/// Stride-2 convolution that halves the spatial resolution
///
/// `(h + 2 - 4) / 2 + 1 = h / 2` for even `h`
pub fn halving_conv2d(
    in_channels: usize,
    out_channels: usize,
    vs: candle_nn::VarBuilder,
) -> Result<candle_nn::Conv2d> {
    let config = candle_nn::Conv2dConfig {
        padding: 1,
        stride: 2,
        ..Default::default()
    };
    candle_nn::conv2d(in_channels, out_channels, 4, config, vs)
}

/// Stride-2 transposed convolution that doubles the spatial resolution
///
/// `(h - 1) * 2 - 2 + 4 = 2h`
pub fn doubling_conv_transpose2d(
    in_channels: usize,
    out_channels: usize,
    vs: candle_nn::VarBuilder,
) -> Result<candle_nn::ConvTranspose2d> {
    let config = candle_nn::ConvTranspose2dConfig {
        padding: 1,
        stride: 2,
        ..Default::default()
    };
    candle_nn::conv_transpose2d(in_channels, out_channels, 4, config, vs)
}
