// 该文件是 Xindian （心电） 项目的一部分。
// src/signal.rs - 导联波形提取
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

use image::{GrayImage, Luma, imageops::FilterType};
use imageproc::{contrast::otsu_level, filter::gaussian_blur_f32};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::frame::GrayImageF32;

mod contour;
pub use self::contour::{ContourPoint, largest_contour, resample_points, trace_contours};

/// 每个导联波形的采样点数
pub const WAVEFORM_LEN: usize = 255;
/// 二值图的工作分辨率（高 x 宽）
pub const WORK_HEIGHT: u32 = 300;
pub const WORK_WIDTH: u32 = 450;
/// 抑制打印网格噪声的高斯模糊强度
pub const BLUR_SIGMA: f32 = 0.7;
/// 轮廓追踪的等值线水平
pub const ISO_LEVEL: f32 = 0.8;
/// 8 位模糊的舍入误差
const FLAT_TOLERANCE: u8 = 1;

#[derive(Error, Debug)]
pub enum WaveformError {
  #[error("波形长度错误: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 归一化到 [0, 1] 的定长导联波形
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
  samples: Vec<f64>,
}

impl Waveform {
  /// 找不到曲线时使用的全零波形
  pub fn zeros() -> Self {
    Self {
      samples: vec![0.0; WAVEFORM_LEN],
    }
  }

  pub fn from_samples(samples: Vec<f64>) -> Result<Self, WaveformError> {
    if samples.len() != WAVEFORM_LEN {
      return Err(WaveformError::LengthMismatch {
        expected: WAVEFORM_LEN,
        actual: samples.len(),
      });
    }
    Ok(Self { samples })
  }

  pub fn samples(&self) -> &[f64] {
    &self.samples
  }

  pub fn into_samples(self) -> Vec<f64> {
    self.samples
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn is_zero(&self) -> bool {
    self.samples.iter().all(|&v| v == 0.0)
  }
}

/// 从单个导联面板中恢复波形
///
/// 流程：模糊 -> Otsu 二值化（暗像素为前景）-> 缩放到工作分辨率
/// -> 追踪轮廓 -> 取点数最多的轮廓 -> 重采样到 255 点 -> 对第 0 列做 min-max 缩放。
/// 没有任何轮廓时返回全零波形，不报错。
pub fn extract_waveform(panel: &GrayImageF32) -> Waveform {
  let gray = quantize(panel);
  let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
  let mask = binarize(&blurred);
  let mask = image::imageops::resize(&mask, WORK_WIDTH, WORK_HEIGHT, FilterType::Nearest);

  let contours = trace_contours(&mask, ISO_LEVEL);
  let points = match largest_contour(&contours) {
    Some(contour) => {
      debug!(
        "轮廓数量: {}, 最长轮廓点数: {}",
        contours.len(),
        contour.len()
      );
      resample_points(contour, WAVEFORM_LEN)
    }
    None => {
      debug!("未找到轮廓，使用全零波形");
      vec![[0.0; 2]; WAVEFORM_LEN]
    }
  };

  let column: Vec<f64> = points.iter().map(|p| p[0]).collect();
  Waveform {
    samples: min_max_scale(&column),
  }
}

/// 浮点灰度转为 8 位，供 imageproc 的模糊与阈值算法使用
pub fn quantize(panel: &GrayImageF32) -> GrayImage {
  GrayImage::from_fn(panel.width(), panel.height(), |x, y| {
    let v = panel.get_pixel(x, y).0[0];
    Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
  })
}

/// 按 Otsu 全局阈值二值化，暗于阈值的像素为前景（255）
///
/// 亮度一致（模糊后最多相差 1 级）的面板没有可分的两类，直接得到空前景。
pub fn binarize(image: &GrayImage) -> GrayImage {
  let (min, max) = image
    .pixels()
    .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
  if max.saturating_sub(min) <= FLAT_TOLERANCE {
    return GrayImage::new(image.width(), image.height());
  }

  let level = otsu_level(image);
  GrayImage::from_fn(image.width(), image.height(), |x, y| {
    if image.get_pixel(x, y).0[0] <= level {
      Luma([255])
    } else {
      Luma([0])
    }
  })
}

/// min-max 缩放到 [0, 1]；取值范围为零时全部输出 0
pub fn min_max_scale(values: &[f64]) -> Vec<f64> {
  let min = values.iter().copied().fold(f64::INFINITY, f64::min);
  let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let range = max - min;
  if !range.is_finite() || range == 0.0 {
    return vec![0.0; values.len()];
  }
  values.iter().map(|v| (v - min) / range).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use imageproc::drawing::draw_line_segment_mut;

  fn blank_panel(value: f32) -> GrayImageF32 {
    GrayImageF32::from_pixel(493, 300, Luma([value]))
  }

  fn traced_panel() -> GrayImageF32 {
    let mut panel = GrayImage::from_pixel(493, 300, Luma([235]));
    let points: Vec<(f32, f32)> = (0..=48)
      .map(|i| {
        let x = 20.0 + i as f32 * 9.0;
        let y = 150.0 + 70.0 * (i as f32 * 0.45).sin();
        (x, y)
      })
      .collect();
    for pair in points.windows(2) {
      for dy in 0..3 {
        let offset = dy as f32;
        draw_line_segment_mut(
          &mut panel,
          (pair[0].0, pair[0].1 + offset),
          (pair[1].0, pair[1].1 + offset),
          Luma([15]),
        );
      }
    }
    GrayImageF32::from_fn(panel.width(), panel.height(), |x, y| {
      Luma([panel.get_pixel(x, y).0[0] as f32 / 255.0])
    })
  }

  #[test]
  fn blank_panel_gives_zero_waveform() {
    for value in [1.0, 0.5, 0.0] {
      let waveform = extract_waveform(&blank_panel(value));
      assert_eq!(waveform.len(), WAVEFORM_LEN);
      assert!(waveform.is_zero());
    }
  }

  #[test]
  fn traced_panel_gives_scaled_waveform() {
    let waveform = extract_waveform(&traced_panel());
    assert_eq!(waveform.len(), WAVEFORM_LEN);
    assert!(!waveform.is_zero());
    assert!(waveform.samples().iter().all(|v| (0.0..=1.0).contains(v)));
    let max = waveform.samples().iter().copied().fold(f64::MIN, f64::max);
    assert!((max - 1.0).abs() < 1e-9);
  }

  #[test]
  fn extraction_is_deterministic() {
    let panel = traced_panel();
    assert_eq!(extract_waveform(&panel), extract_waveform(&panel));
  }

  #[test]
  fn binarize_marks_dark_pixels() {
    let mut image = GrayImage::from_pixel(10, 10, Luma([220]));
    image.put_pixel(3, 4, Luma([10]));
    image.put_pixel(5, 5, Luma([12]));
    let mask = binarize(&image);
    assert_eq!(mask.get_pixel(3, 4).0[0], 255);
    assert_eq!(mask.get_pixel(5, 5).0[0], 255);
    assert_eq!(mask.get_pixel(0, 0).0[0], 0);
  }

  #[test]
  fn min_max_handles_flat_input() {
    assert_eq!(min_max_scale(&[3.0, 3.0, 3.0]), vec![0.0, 0.0, 0.0]);
    assert_eq!(min_max_scale(&[1.0, 2.0, 3.0]), vec![0.0, 0.5, 1.0]);
  }

  #[test]
  fn waveform_length_is_checked() {
    assert!(Waveform::from_samples(vec![0.0; 10]).is_err());
    assert!(Waveform::from_samples(vec![0.0; WAVEFORM_LEN]).is_ok());
  }
}
