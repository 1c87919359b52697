// 该文件是 Xindian （心电） 项目的一部分。
// src/input.rs - 心电图图像输入与通道归一化
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

use image::{DynamicImage, ImageBuffer, Pixel, Rgb, RgbImage};

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 解码后图像的通道布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
  /// 单通道灰度（无通道轴或只有一个通道）
  Gray,
  /// 双通道，第二个通道视为冗余
  GrayAlpha,
  Rgb,
  /// 四通道，丢弃 alpha
  Rgba,
}

impl ChannelLayout {
  pub fn of(image: &DynamicImage) -> Self {
    match image.color().channel_count() {
      1 => ChannelLayout::Gray,
      2 => ChannelLayout::GrayAlpha,
      4 => ChannelLayout::Rgba,
      _ => ChannelLayout::Rgb,
    }
  }

  pub fn channels(&self) -> usize {
    match self {
      ChannelLayout::Gray => 1,
      ChannelLayout::GrayAlpha => 2,
      ChannelLayout::Rgb => 3,
      ChannelLayout::Rgba => 4,
    }
  }
}

/// 将任意通道布局的图像统一为 3 通道 RGB
///
/// - 灰度：复制为 3 个相同通道
/// - 双通道：复制第 0 通道，丢弃第 1 通道
/// - RGBA：丢弃第 4 通道
/// - RGB：原样返回
///
/// 16 位与浮点图像先按相同布局降为 8 位再处理。
pub fn normalize_channels(image: DynamicImage) -> RgbImage {
  match image {
    DynamicImage::ImageRgb8(rgb) => rgb,
    DynamicImage::ImageLuma8(gray) => replicate_first_channel(&gray),
    DynamicImage::ImageLumaA8(gray_alpha) => replicate_first_channel(&gray_alpha),
    DynamicImage::ImageRgba8(rgba) => drop_alpha(&rgba),
    other => match ChannelLayout::of(&other) {
      ChannelLayout::Gray => replicate_first_channel(&other.to_luma8()),
      ChannelLayout::GrayAlpha => replicate_first_channel(&other.to_luma_alpha8()),
      ChannelLayout::Rgba => drop_alpha(&other.to_rgba8()),
      ChannelLayout::Rgb => other.to_rgb8(),
    },
  }
}

fn replicate_first_channel<P: Pixel<Subpixel = u8>>(image: &ImageBuffer<P, Vec<u8>>) -> RgbImage {
  ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
    let value = image.get_pixel(x, y).channels()[0];
    Rgb([value, value, value])
  })
}

fn drop_alpha(image: &image::RgbaImage) -> RgbImage {
  ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
    let [r, g, b, _] = image.get_pixel(x, y).0;
    Rgb([r, g, b])
  })
}
