// 该文件是 Xindian （心电） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::io::Cursor;
use std::path::Path;

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, input::ChannelLayout, path_from_url};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch: {0}")]
  SchemaMismatch(String),
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(image::ImageError),
  #[error("Empty image input")]
  Empty,
}

impl From<std::io::Error> for ImageFileInputError {
  fn from(err: std::io::Error) -> Self {
    ImageFileInputError::IoError(err)
  }
}

impl From<image::ImageError> for ImageFileInputError {
  fn from(err: image::ImageError) -> Self {
    ImageFileInputError::ImageLoadError(err)
  }
}

/// 一张待分析的心电图图像（原始字节）
pub struct ImageFileInput {
  bytes: Vec<u8>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch(url.scheme().to_string()));
    }

    Self::from_path(path_from_url(url))
  }
}

impl ImageFileInput {
  pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
    ImageFileInput {
      bytes: bytes.into(),
    }
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let bytes = std::fs::read(path.as_ref())?;
    debug!(
      "读取图像文件: {} ({} 字节)",
      path.as_ref().display(),
      bytes.len()
    );
    Ok(Self::from_bytes(bytes))
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// 解码并归一化为 3 通道图像
  pub fn decode(&self) -> Result<RgbFrame, ImageFileInputError> {
    if self.bytes.is_empty() {
      return Err(ImageFileInputError::Empty);
    }

    let image = ImageReader::new(Cursor::new(&self.bytes))
      .with_guessed_format()?
      .decode()?;
    debug!(
      "图像解码完成: {}x{}, 通道布局 {:?}",
      image.width(),
      image.height(),
      ChannelLayout::of(&image)
    );

    Ok(RgbFrame::from(image))
  }
}
