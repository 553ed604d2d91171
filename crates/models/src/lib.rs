//! Burn U-Net for per-pixel nucleus segmentation.
//!
//! Contract:
//! - Input tiles: `[N, in_channels, T, T]` where `T` is divisible by `2^(depth - 1)`
//! - Output logits: `[N, out_channels, T, T]` (no activation applied)
//!
//! Encoder level `i` has `base_channels << i` channels. Each decoder level upsamples by two,
//! concatenates the matching encoder feature map, and projects back down.
//!
//! The network is a pure Burn Module; tiling, loss weighting, and thresholding live in the
//! `vision_core`, `training`, and `inference` crates.

use burn::module::{Module, Param};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::interpolate::{Interpolate2d, Interpolate2dConfig, InterpolateMode};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UNetConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub base_channels: usize,
    /// Number of encoder levels (including the full-resolution one).
    pub depth: usize,
}

impl Default for UNetConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            out_channels: 1,
            base_channels: 16,
            depth: 7,
        }
    }
}

impl UNetConfig {
    pub fn channels_at(&self, level: usize) -> usize {
        self.base_channels << level
    }

    /// Smallest tile edge the encoder can halve `depth - 1` times.
    pub fn min_tile_size(&self) -> usize {
        1 << self.depth.saturating_sub(1)
    }

    pub fn supports_tile(&self, tile: usize) -> bool {
        tile > 0 && tile % self.min_tile_size() == 0
    }
}

/// Replace the initializer's bias with zeros.
fn zero_bias<B: Backend>(mut conv: Conv2d<B>, output: usize, device: &B::Device) -> Conv2d<B> {
    conv.bias = Some(Param::from_tensor(Tensor::zeros([output], device)));
    conv
}

fn conv3x3<B: Backend>(input: usize, output: usize, device: &B::Device) -> Conv2d<B> {
    let conv = Conv2dConfig::new([input, output], [3, 3])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_initializer(Initializer::XavierUniform { gain: 1.0 })
        .init(device);
    zero_bias(conv, output, device)
}

#[derive(Module, Debug)]
pub struct ConvBnRelu<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
}

impl<B: Backend> ConvBnRelu<B> {
    pub fn new(input: usize, output: usize, device: &B::Device) -> Self {
        Self {
            conv: conv3x3(input, output, device),
            bn: BatchNormConfig::new(output).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.bn.forward(self.conv.forward(x)))
    }
}

/// Three conv/bn/relu stages, optionally preceded by 2x2 max pooling.
#[derive(Module, Debug)]
pub struct DownBlock<B: Backend> {
    pool: Option<MaxPool2d>,
    stages: Vec<ConvBnRelu<B>>,
}

impl<B: Backend> DownBlock<B> {
    pub fn new(input: usize, output: usize, downsample: bool, device: &B::Device) -> Self {
        let pool = downsample.then(|| MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init());
        Self {
            pool,
            stages: triple_stage(input, output, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        };
        for stage in &self.stages {
            x = stage.forward(x);
        }
        x
    }
}

/// Bilinear 2x upsample, concatenate the skip feature map, then three conv/bn/relu stages.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    upsample: Interpolate2d,
    stages: Vec<ConvBnRelu<B>>,
}

impl<B: Backend> UpBlock<B> {
    pub fn new(skip: usize, input: usize, output: usize, device: &B::Device) -> Self {
        let upsample = Interpolate2dConfig::new()
            .with_scale_factor(Some([2.0, 2.0]))
            .with_mode(InterpolateMode::Linear)
            .init();
        let mut stages = vec![ConvBnRelu::new(skip + input, output, device)];
        stages.push(ConvBnRelu::new(output, output, device));
        stages.push(ConvBnRelu::new(output, output, device));
        Self { upsample, stages }
    }

    pub fn forward(&self, skip: Tensor<B, 4>, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.upsample.forward(x);
        let mut x = Tensor::cat(vec![x, skip], 1);
        for stage in &self.stages {
            x = stage.forward(x);
        }
        x
    }
}

fn triple_stage<B: Backend>(input: usize, output: usize, device: &B::Device) -> Vec<ConvBnRelu<B>> {
    vec![
        ConvBnRelu::new(input, output, device),
        ConvBnRelu::new(output, output, device),
        ConvBnRelu::new(output, output, device),
    ]
}

#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    down: Vec<DownBlock<B>>,
    bottleneck: Vec<ConvBnRelu<B>>,
    /// Ordered deepest-first.
    up: Vec<UpBlock<B>>,
    head: ConvBnRelu<B>,
    out: Conv2d<B>,
}

impl<B: Backend> UNet<B> {
    pub fn new(cfg: UNetConfig, device: &B::Device) -> Self {
        let depth = cfg.depth.max(1);
        let down = (0..depth)
            .map(|level| {
                let input = if level == 0 {
                    cfg.in_channels
                } else {
                    cfg.channels_at(level - 1)
                };
                DownBlock::new(input, cfg.channels_at(level), level > 0, device)
            })
            .collect();
        let deepest = cfg.channels_at(depth - 1);
        let bottleneck = triple_stage(deepest, deepest, device);
        let up = (0..depth - 1)
            .rev()
            .map(|level| {
                UpBlock::new(
                    cfg.channels_at(level),
                    cfg.channels_at(level + 1),
                    cfg.channels_at(level),
                    device,
                )
            })
            .collect();
        let head = ConvBnRelu::new(cfg.base_channels, cfg.base_channels, device);
        let out = zero_bias(
            Conv2dConfig::new([cfg.base_channels, cfg.out_channels], [1, 1])
                .with_padding(PaddingConfig2d::Valid)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device),
            cfg.out_channels,
            device,
        );
        Self {
            down,
            bottleneck,
            up,
            head,
            out,
        }
    }

    /// Per-pixel logits with the same spatial size as the input.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skips = Vec::with_capacity(self.down.len());
        let mut x = input;
        for block in &self.down {
            x = block.forward(x);
            skips.push(x.clone());
        }
        // The deepest level feeds the bottleneck, not a skip connection.
        let _ = skips.pop();
        for stage in &self.bottleneck {
            x = stage.forward(x);
        }
        for (block, skip) in self.up.iter().zip(skips.into_iter().rev()) {
            x = block.forward(skip, x);
        }
        self.out.forward(self.head.forward(x))
    }
}

pub mod prelude {
    pub use super::{UNet, UNetConfig};
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn channel_ladder_doubles_per_level() {
        let cfg = UNetConfig::default();
        assert_eq!(cfg.channels_at(0), 16);
        assert_eq!(cfg.channels_at(6), 1024);
        assert_eq!(cfg.min_tile_size(), 64);
        assert!(cfg.supports_tile(256));
        assert!(!cfg.supports_tile(96));
    }

    fn host<const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn conv_biases_start_at_zero() {
        let cfg = UNetConfig {
            base_channels: 2,
            depth: 2,
            ..Default::default()
        };
        let model = UNet::<B>::new(cfg, &Default::default());
        let convs = model
            .down
            .iter()
            .flat_map(|block| block.stages.iter())
            .chain(model.bottleneck.iter())
            .chain(model.up.iter().flat_map(|block| block.stages.iter()))
            .chain(std::iter::once(&model.head))
            .map(|stage| &stage.conv)
            .chain(std::iter::once(&model.out));
        for conv in convs {
            let bias = conv.bias.as_ref().expect("conv has a bias");
            assert!(host(bias.val()).iter().all(|v| *v == 0.0));
            assert!(host(conv.weight.val()).iter().any(|v| *v != 0.0));
        }
        let bn = &model.head.bn;
        assert!(host(bn.gamma.val()).iter().all(|v| *v == 1.0));
        assert!(host(bn.beta.val()).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn forward_preserves_spatial_shape() {
        let cfg = UNetConfig {
            base_channels: 2,
            depth: 3,
            ..Default::default()
        };
        let device = Default::default();
        let model = UNet::<B>::new(cfg, &device);
        let input = Tensor::<B, 4>::zeros([1, 3, 16, 16], &device);
        let out = model.forward(input);
        assert_eq!(out.dims(), [1, 1, 16, 16]);
    }
}
