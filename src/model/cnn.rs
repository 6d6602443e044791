//! CNN Model Architecture for Leaf Disease Classification
//!
//! A compact convolutional network built with Burn. The head is sized from
//! the label vocabulary, so the same architecture serves a single-crop
//! vocabulary (3-4 classes) or a merged bean+maize vocabulary.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the LeafClassifier CNN model
#[derive(Config, Debug)]
pub struct LeafClassifierConfig {
    /// Number of output classes (length of the label vocabulary)
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "224")]
    pub input_size: usize,

    /// Dropout rate for regularization
    #[config(default = "0.3")]
    pub dropout_rate: f64,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Base number of convolutional filters
    #[config(default = "32")]
    pub base_filters: usize,
}

impl LeafClassifierConfig {
    /// Build the model on `device`
    pub fn init<B: Backend>(&self, device: &B::Device) -> LeafClassifier<B> {
        LeafClassifier::new(self, device)
    }
}

/// A CNN block with Conv2d, BatchNorm, ReLU, and MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        Self {
            conv,
            bn: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Leaf Disease Classifier CNN
///
/// Architecture:
/// - 4 convolutional blocks (filters: base, 2x, 4x, 8x), each halving the resolution
/// - Global Average Pooling
/// - Fully connected classifier with dropout
#[derive(Module, Debug)]
pub struct LeafClassifier<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub conv4: ConvBlock<B>,

    pub global_pool: AdaptiveAvgPool2d,

    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> LeafClassifier<B> {
    /// Create a new LeafClassifier from configuration
    pub fn new(config: &LeafClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        Self {
            conv1: ConvBlock::new(config.in_channels, base, device),
            conv2: ConvBlock::new(base, base * 2, device),
            conv3: ConvBlock::new(base * 2, base * 4, device),
            conv4: ConvBlock::new(base * 4, base * 8, device),
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: LinearConfig::new(base * 8, 256).init(device),
            dropout: DropoutConfig::new(config.dropout_rate).init(),
            fc2: LinearConfig::new(256, config.num_classes).init(device),
            num_classes: config.num_classes,
        }
    }

    /// Forward pass: `[batch, 3, H, W]` images to `[batch, num_classes]` logits
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.conv4.forward(x);

        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_leaf_classifier_output_shape() {
        let device = Default::default();
        let config = LeafClassifierConfig::new(7).with_base_filters(4);
        let model: LeafClassifier<TestBackend> = config.init(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 7]);
        assert_eq!(model.num_classes(), 7);
    }

    #[test]
    fn test_config_defaults() {
        let config = LeafClassifierConfig::new(3);
        assert_eq!(config.input_size, 224);
        assert_eq!(config.in_channels, 3);
        assert_eq!(config.base_filters, 32);
    }
}
