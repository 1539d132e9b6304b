//! `YOLOv8` detection network.
//!
//! Backbone (`DarkNet` with C2f blocks and SPPF), PAN neck and the decoupled
//! anchor-free head with distribution focal loss decoding. Weights are read
//! from a safetensors file with the layout used by the candle `YOLOv8`
//! conversion: `net.*` for the backbone, `fpn.*` for the neck, `head.*` for
//! the head. Every Conv + `BatchNorm` pair is folded into a single biased
//! convolution at load time.

// Allow common ML code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use std::str::FromStr;

use anyhow::{Context, Result};
use candle_core::{DType, IndexOp, Module, Tensor, D};
use candle_nn::{batch_norm, conv2d, conv2d_no_bias, Conv2d, Conv2dConfig, VarBuilder};

/// Number of bins per box side in the DFL regression head.
const REG_MAX: usize = 16;

/// `BatchNorm` epsilon used by the exported checkpoints.
const BN_EPS: f64 = 1e-3;

/// Size variant of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// Nano.
    #[default]
    N,
    /// Small.
    S,
    /// Medium.
    M,
    /// Large.
    L,
    /// Extra large.
    X,
}

impl Variant {
    /// All variants, smallest first.
    pub const ALL: [Self; 5] = [Self::N, Self::S, Self::M, Self::L, Self::X];

    /// Depth, width and ratio multipliers of this variant.
    #[must_use]
    pub const fn multiples(self) -> Multiples {
        match self {
            Self::N => Multiples::new(0.33, 0.25, 2.0),
            Self::S => Multiples::new(0.33, 0.50, 2.0),
            Self::M => Multiples::new(0.67, 0.75, 1.5),
            Self::L => Multiples::new(1.00, 1.00, 1.0),
            Self::X => Multiples::new(1.00, 1.25, 1.0),
        }
    }

    /// Number of output channels of the stem convolution.
    #[must_use]
    pub fn stem_channels(self) -> usize {
        (64.0 * self.multiples().width) as usize
    }

    /// Single-letter name, as used in checkpoint file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::N => "n",
            Self::S => "s",
            Self::M => "m",
            Self::L => "l",
            Self::X => "x",
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "n" => Ok(Self::N),
            "s" => Ok(Self::S),
            "m" => Ok(Self::M),
            "l" => Ok(Self::L),
            "x" => Ok(Self::X),
            other => Err(format!("unknown variant '{other}', expected one of n, s, m, l, x")),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scaling multipliers for a variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Multiples {
    depth: f64,
    width: f64,
    ratio: f64,
}

impl Multiples {
    const fn new(depth: f64, width: f64, ratio: f64) -> Self {
        Self {
            depth,
            width,
            ratio,
        }
    }

    /// Channel counts of the three feature levels fed to the head.
    fn filters(self) -> (usize, usize, usize) {
        let f1 = (256.0 * self.width) as usize;
        let f2 = (512.0 * self.width) as usize;
        let f3 = (512.0 * self.width * self.ratio) as usize;
        (f1, f2, f3)
    }

    fn channels(self, base: f64) -> usize {
        (base * self.width) as usize
    }

    fn repeats(self, base: f64) -> usize {
        (base * self.depth).round() as usize
    }
}

/// Conv + folded `BatchNorm` + `SiLU`.
struct ConvBlock {
    conv: Conv2d,
}

impl ConvBlock {
    fn load(
        vb: VarBuilder,
        c1: usize,
        c2: usize,
        k: usize,
        stride: usize,
        padding: Option<usize>,
    ) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: padding.unwrap_or(k / 2),
            stride,
            groups: 1,
            dilation: 1,
        };
        let bn = batch_norm(c2, BN_EPS, vb.pp("bn"))?;
        let conv = conv2d_no_bias(c1, c2, k, cfg, vb.pp("conv"))?.absorb_bn(&bn)?;
        Ok(Self { conv })
    }
}

impl Module for ConvBlock {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        candle_nn::ops::silu(&self.conv.forward(xs)?)
    }
}

struct Bottleneck {
    cv1: ConvBlock,
    cv2: ConvBlock,
    residual: bool,
}

impl Bottleneck {
    fn load(vb: &VarBuilder, c1: usize, c2: usize, shortcut: bool) -> Result<Self> {
        let cv1 = ConvBlock::load(vb.pp("cv1"), c1, c2, 3, 1, None)?;
        let cv2 = ConvBlock::load(vb.pp("cv2"), c2, c2, 3, 1, None)?;
        Ok(Self {
            cv1,
            cv2,
            residual: c1 == c2 && shortcut,
        })
    }
}

impl Module for Bottleneck {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let ys = self.cv2.forward(&self.cv1.forward(xs)?)?;
        if self.residual {
            xs + ys
        } else {
            Ok(ys)
        }
    }
}

/// CSP bottleneck with two convolutions.
struct C2f {
    cv1: ConvBlock,
    cv2: ConvBlock,
    bottlenecks: Vec<Bottleneck>,
}

impl C2f {
    fn load(vb: &VarBuilder, c1: usize, c2: usize, n: usize, shortcut: bool) -> Result<Self> {
        let c = c2 / 2;
        let cv1 = ConvBlock::load(vb.pp("cv1"), c1, 2 * c, 1, 1, None)?;
        let cv2 = ConvBlock::load(vb.pp("cv2"), (2 + n) * c, c2, 1, 1, None)?;
        let bottlenecks = (0..n)
            .map(|i| Bottleneck::load(&vb.pp(format!("bottleneck.{i}")), c, c, shortcut))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cv1,
            cv2,
            bottlenecks,
        })
    }
}

impl Module for C2f {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut ys = self.cv1.forward(xs)?.chunk(2, 1)?;
        for block in &self.bottlenecks {
            let last = ys
                .last()
                .ok_or_else(|| candle_core::Error::Msg("C2f split produced no chunks".into()))?;
            let next = block.forward(last)?;
            ys.push(next);
        }
        self.cv2.forward(&Tensor::cat(ys.as_slice(), 1)?)
    }
}

/// Spatial pyramid pooling, fast.
struct Sppf {
    cv1: ConvBlock,
    cv2: ConvBlock,
    k: usize,
}

impl Sppf {
    fn load(vb: &VarBuilder, c1: usize, c2: usize, k: usize) -> Result<Self> {
        let c = c1 / 2;
        let cv1 = ConvBlock::load(vb.pp("cv1"), c1, c, 1, 1, None)?;
        let cv2 = ConvBlock::load(vb.pp("cv2"), c * 4, c2, 1, 1, None)?;
        Ok(Self { cv1, cv2, k })
    }

    fn pool(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let pad = self.k / 2;
        xs.pad_with_same(2, pad, pad)?
            .pad_with_same(3, pad, pad)?
            .max_pool2d_with_stride(self.k, 1)
    }
}

impl Module for Sppf {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.cv1.forward(xs)?;
        let p1 = self.pool(&xs)?;
        let p2 = self.pool(&p1)?;
        let p3 = self.pool(&p2)?;
        self.cv2.forward(&Tensor::cat(&[&xs, &p1, &p2, &p3], 1)?)
    }
}

/// Distribution focal loss integral: expected bin index per box side.
struct Dfl {
    conv: Conv2d,
}

impl Dfl {
    fn load(vb: &VarBuilder) -> Result<Self> {
        let conv = conv2d_no_bias(REG_MAX, 1, 1, Conv2dConfig::default(), vb.pp("conv"))?;
        Ok(Self { conv })
    }
}

impl Module for Dfl {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (b, _channels, anchors) = xs.dims3()?;
        let xs = xs.reshape((b, 4, REG_MAX, anchors))?.transpose(2, 1)?;
        let xs = candle_nn::ops::softmax(&xs, 1)?;
        self.conv.forward(&xs)?.reshape((b, 4, anchors))
    }
}

fn upsample(xs: &Tensor) -> candle_core::Result<Tensor> {
    let (_b, _c, h, w) = xs.dims4()?;
    xs.upsample_nearest2d(2 * h, 2 * w)
}

struct DarkNet {
    b1_0: ConvBlock,
    b1_1: ConvBlock,
    b2_0: C2f,
    b2_1: ConvBlock,
    b2_2: C2f,
    b3_0: ConvBlock,
    b3_1: C2f,
    b4_0: ConvBlock,
    b4_1: C2f,
    b5: Sppf,
}

impl DarkNet {
    fn load(vb: &VarBuilder, m: Multiples) -> Result<Self> {
        let c64 = m.channels(64.0);
        let c128 = m.channels(128.0);
        let c256 = m.channels(256.0);
        let c512 = m.channels(512.0);
        let c512r = (512.0 * m.width * m.ratio) as usize;

        Ok(Self {
            b1_0: ConvBlock::load(vb.pp("b1.0"), 3, c64, 3, 2, Some(1))?,
            b1_1: ConvBlock::load(vb.pp("b1.1"), c64, c128, 3, 2, Some(1))?,
            b2_0: C2f::load(&vb.pp("b2.0"), c128, c128, m.repeats(3.0), true)?,
            b2_1: ConvBlock::load(vb.pp("b2.1"), c128, c256, 3, 2, Some(1))?,
            b2_2: C2f::load(&vb.pp("b2.2"), c256, c256, m.repeats(6.0), true)?,
            b3_0: ConvBlock::load(vb.pp("b3.0"), c256, c512, 3, 2, Some(1))?,
            b3_1: C2f::load(&vb.pp("b3.1"), c512, c512, m.repeats(6.0), true)?,
            b4_0: ConvBlock::load(vb.pp("b4.0"), c512, c512r, 3, 2, Some(1))?,
            b4_1: C2f::load(&vb.pp("b4.1"), c512r, c512r, m.repeats(3.0), true)?,
            b5: Sppf::load(&vb.pp("b5.0"), c512r, c512r, 5)?,
        })
    }

    /// Returns the stride-8, stride-16 and stride-32 feature maps.
    fn forward(&self, xs: &Tensor) -> candle_core::Result<(Tensor, Tensor, Tensor)> {
        let x1 = self.b1_1.forward(&self.b1_0.forward(xs)?)?;
        let x2 = self
            .b2_2
            .forward(&self.b2_1.forward(&self.b2_0.forward(&x1)?)?)?;
        let x3 = self.b3_1.forward(&self.b3_0.forward(&x2)?)?;
        let x4 = self.b4_1.forward(&self.b4_0.forward(&x3)?)?;
        let x5 = self.b5.forward(&x4)?;
        Ok((x2, x3, x5))
    }
}

struct Neck {
    n1: C2f,
    n2: C2f,
    n3: ConvBlock,
    n4: C2f,
    n5: ConvBlock,
    n6: C2f,
}

impl Neck {
    fn load(vb: &VarBuilder, m: Multiples) -> Result<Self> {
        let n = m.repeats(3.0);
        let c256 = m.channels(256.0);
        let c512 = m.channels(512.0);
        let c768 = m.channels(768.0);
        let c512r = (512.0 * m.width * m.ratio) as usize;
        let c512_1r = (512.0 * m.width * (1.0 + m.ratio)) as usize;

        Ok(Self {
            n1: C2f::load(&vb.pp("n1"), c512_1r, c512, n, false)?,
            n2: C2f::load(&vb.pp("n2"), c768, c256, n, false)?,
            n3: ConvBlock::load(vb.pp("n3"), c256, c256, 3, 2, Some(1))?,
            n4: C2f::load(&vb.pp("n4"), c768, c512, n, false)?,
            n5: ConvBlock::load(vb.pp("n5"), c512, c512, 3, 2, Some(1))?,
            n6: C2f::load(&vb.pp("n6"), c512_1r, c512r, n, false)?,
        })
    }

    fn forward(
        &self,
        p3: &Tensor,
        p4: &Tensor,
        p5: &Tensor,
    ) -> candle_core::Result<(Tensor, Tensor, Tensor)> {
        let x = self.n1.forward(&Tensor::cat(&[&upsample(p5)?, p4], 1)?)?;
        let head_1 = self.n2.forward(&Tensor::cat(&[&upsample(&x)?, p3], 1)?)?;
        let head_2 = self
            .n4
            .forward(&Tensor::cat(&[&self.n3.forward(&head_1)?, &x], 1)?)?;
        let head_3 = self
            .n6
            .forward(&Tensor::cat(&[&self.n5.forward(&head_2)?, p5], 1)?)?;
        Ok((head_1, head_2, head_3))
    }
}

/// Two conv blocks followed by a plain 1x1 projection.
struct HeadBranch {
    block0: ConvBlock,
    block1: ConvBlock,
    proj: Conv2d,
}

impl HeadBranch {
    fn load(vb: &VarBuilder, c_in: usize, c_mid: usize, c_out: usize) -> Result<Self> {
        Ok(Self {
            block0: ConvBlock::load(vb.pp("0"), c_in, c_mid, 3, 1, None)?,
            block1: ConvBlock::load(vb.pp("1"), c_mid, c_mid, 3, 1, None)?,
            proj: conv2d(c_mid, c_out, 1, Conv2dConfig::default(), vb.pp("2"))?,
        })
    }
}

impl Module for HeadBranch {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.block1.forward(&self.block0.forward(xs)?)?;
        self.proj.forward(&xs)
    }
}

struct DetectionHead {
    dfl: Dfl,
    box_branches: [HeadBranch; 3],
    cls_branches: [HeadBranch; 3],
    num_outputs: usize,
}

impl DetectionHead {
    fn load(vb: &VarBuilder, num_classes: usize, filters: (usize, usize, usize)) -> Result<Self> {
        let c_cls = filters.0.max(num_classes);
        let c_box = (filters.0 / 4).max(REG_MAX * 4);
        let levels = [filters.0, filters.1, filters.2];

        let box_branch = |i: usize| {
            HeadBranch::load(&vb.pp(format!("cv2.{i}")), levels[i], c_box, 4 * REG_MAX)
        };
        let cls_branch =
            |i: usize| HeadBranch::load(&vb.pp(format!("cv3.{i}")), levels[i], c_cls, num_classes);

        Ok(Self {
            dfl: Dfl::load(&vb.pp("dfl"))?,
            box_branches: [box_branch(0)?, box_branch(1)?, box_branch(2)?],
            cls_branches: [cls_branch(0)?, cls_branch(1)?, cls_branch(2)?],
            num_outputs: num_classes + 4 * REG_MAX,
        })
    }

    fn forward(&self, levels: [&Tensor; 3]) -> candle_core::Result<Tensor> {
        let mut outputs = Vec::with_capacity(3);
        let mut anchor_points = Vec::with_capacity(3);
        let mut strides = Vec::with_capacity(3);

        for (i, (xs, stride)) in levels.into_iter().zip([8.0, 16.0, 32.0]).enumerate() {
            let (b, _c, h, w) = xs.dims4()?;
            let level = Tensor::cat(
                &[
                    self.box_branches[i].forward(xs)?,
                    self.cls_branches[i].forward(xs)?,
                ],
                1,
            )?;
            outputs.push(level.reshape((b, self.num_outputs, h * w))?);

            let (points, level_strides) = make_anchors(xs, h, w, stride)?;
            anchor_points.push(points);
            strides.push(level_strides);
        }

        // (1, 2, A) and (1, A)
        let anchor_points = Tensor::cat(anchor_points.as_slice(), 0)?.t()?.unsqueeze(0)?;
        let strides = Tensor::cat(strides.as_slice(), 0)?.unsqueeze(0)?;

        let x_cat = Tensor::cat(outputs.as_slice(), 2)?;
        let box_dist = x_cat.i((.., ..REG_MAX * 4))?;
        let cls = x_cat.i((.., REG_MAX * 4..))?;

        let boxes = dist2bbox(&self.dfl.forward(&box_dist)?, &anchor_points)?;
        let boxes = boxes.broadcast_mul(&strides.unsqueeze(1)?)?;

        Tensor::cat(&[boxes, candle_nn::ops::sigmoid(&cls)?], 1)
    }
}

/// Anchor centres (grid cell + 0.5) for one feature level, shape `(h*w, 2)`,
/// and the matching stride per anchor, shape `(h*w,)`.
fn make_anchors(
    xs: &Tensor,
    h: usize,
    w: usize,
    stride: f64,
) -> candle_core::Result<(Tensor, Tensor)> {
    let dev = xs.device();
    let sx = (Tensor::arange(0u32, w as u32, dev)?.to_dtype(DType::F32)? + 0.5)?;
    let sy = (Tensor::arange(0u32, h as u32, dev)?.to_dtype(DType::F32)? + 0.5)?;
    let sx = sx.reshape((1, w))?.repeat((h, 1))?.flatten_all()?;
    let sy = sy.reshape((h, 1))?.repeat((1, w))?.flatten_all()?;
    let points = Tensor::stack(&[&sx, &sy], D::Minus1)?;
    let strides = (Tensor::ones(h * w, DType::F32, dev)? * stride)?;
    Ok((points, strides))
}

/// Converts left/top/right/bottom distances to centre-x, centre-y, width, height.
fn dist2bbox(distance: &Tensor, anchor_points: &Tensor) -> candle_core::Result<Tensor> {
    let chunks = distance.chunk(2, 1)?;
    let x1y1 = anchor_points.broadcast_sub(&chunks[0])?;
    let x2y2 = anchor_points.broadcast_add(&chunks[1])?;
    let centre = ((&x1y1 + &x2y2)? * 0.5)?;
    let size = (&x2y2 - &x1y1)?;
    Tensor::cat(&[centre, size], 1)
}

/// `YOLOv8` detector network.
pub struct YoloV8 {
    net: DarkNet,
    fpn: Neck,
    head: DetectionHead,
    num_classes: usize,
}

impl YoloV8 {
    /// Builds the network from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a tensor is missing or has an unexpected shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder, variant: Variant, num_classes: usize) -> Result<Self> {
        if num_classes == 0 {
            anyhow::bail!("num_classes must be at least 1");
        }
        let m = variant.multiples();
        let net = DarkNet::load(&vb.pp("net"), m).context("Failed to load backbone")?;
        let fpn = Neck::load(&vb.pp("fpn"), m).context("Failed to load neck")?;
        let head = DetectionHead::load(&vb.pp("head"), num_classes, m.filters())
            .context("Failed to load detection head")?;
        Ok(Self {
            net,
            fpn,
            head,
            num_classes,
        })
    }

    /// Number of classes the head predicts.
    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl Module for YoloV8 {
    /// Input `(B, 3, H, W)` in `[0, 1]`, H and W multiples of 32.
    ///
    /// Output `(B, 4 + num_classes, A)`: box centre-x, centre-y, width, height
    /// in input pixels, then per-class probabilities, for each of the A anchors.
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (p3, p4, p5) = self.net.forward(xs)?;
        let (h1, h2, h3) = self.fpn.forward(&p3, &p4, &p5)?;
        self.head.forward([&h1, &h2, &h3])
    }
}
