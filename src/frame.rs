// 该文件是 Xindian （心电） 项目的一部分。
// src/frame.rs - RGB 帧与灰度画布定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::{DynamicImage, ImageBuffer, Luma, RgbImage, imageops::FilterType};

use crate::input::normalize_channels;

/// 标准心电图画布宽度（像素）
pub const CANVAS_WIDTH: u32 = 2213;
/// 标准心电图画布高度（像素）
pub const CANVAS_HEIGHT: u32 = 1572;

/// 取值范围为 [0, 1] 的单通道浮点图像
pub type GrayImageF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 保证为 3 通道的图像
#[derive(Debug, Clone)]
pub struct RgbFrame {
  image: RgbImage,
}

impl From<DynamicImage> for RgbFrame {
  fn from(image: DynamicImage) -> Self {
    Self {
      image: normalize_channels(image),
    }
  }
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    Self { image }
  }
}

impl RgbFrame {
  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn as_rgb(&self) -> &RgbImage {
    &self.image
  }
}

/// 固定尺寸的灰度画布，尺寸由类型参数保证
#[derive(Debug, Clone)]
pub struct GrayCanvas<const W: u32, const H: u32> {
  data: GrayImageF32,
}

/// 标准 12 导联心电图的画布（高 1572，宽 2213）
pub type EcgCanvas = GrayCanvas<CANVAS_WIDTH, CANVAS_HEIGHT>;

impl<const W: u32, const H: u32> GrayCanvas<W, H> {
  /// 从任意通道布局的图像构建画布
  ///
  /// 该阶段可以被单独调用，因此这里再做一次通道归一化。
  pub fn from_image(image: DynamicImage) -> Self {
    Self::from_frame(&RgbFrame::from(image))
  }

  /// 转换为亮度并插值缩放到画布尺寸
  pub fn from_frame(frame: &RgbFrame) -> Self {
    let gray = DynamicImage::ImageRgb8(frame.as_rgb().clone()).to_luma32f();
    let data = if gray.dimensions() == (W, H) {
      gray
    } else {
      image::imageops::resize(&gray, W, H, FilterType::Triangle)
    };
    Self { data }
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn as_image(&self) -> &GrayImageF32 {
    &self.data
  }

  /// 读取 (行, 列) 处的亮度
  pub fn get(&self, row: u32, col: u32) -> f32 {
    self.data.get_pixel(col, row).0[0]
  }
}
