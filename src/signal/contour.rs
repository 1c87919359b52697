// 该文件是 Xindian （心电） 项目的一部分。
// src/signal/contour.rs - 轮廓追踪与重采样
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

use image::{GrayImage, Luma};
use imageproc::contours::find_contours;

/// 轮廓点，[行, 列]
pub type ContourPoint = [f64; 2];

/// 高斯核截断半径（以 sigma 为单位）
const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// 追踪二值图中所有连通区域的边界
///
/// 像素值（按 255 归一化）不低于 `level` 的视为前景。
/// 返回的轮廓顺序即追踪时的枚举顺序（自上而下、自左而右）。
pub fn trace_contours(mask: &GrayImage, level: f32) -> Vec<Vec<ContourPoint>> {
  let foreground = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
    if mask.get_pixel(x, y).0[0] as f32 / 255.0 >= level {
      Luma([255])
    } else {
      Luma([0])
    }
  });

  find_contours::<u32>(&foreground)
    .into_iter()
    .map(|contour| {
      contour
        .points
        .iter()
        .map(|p| [p.y as f64, p.x as f64])
        .collect()
    })
    .collect()
}

/// 取点数最多的轮廓；点数相同时取最先出现的那个
pub fn largest_contour(contours: &[Vec<ContourPoint>]) -> Option<&[ContourPoint]> {
  let mut best: Option<&Vec<ContourPoint>> = None;
  for contour in contours {
    if contour.is_empty() {
      continue;
    }
    match best {
      Some(current) if current.len() >= contour.len() => {}
      _ => best = Some(contour),
    }
  }
  best.map(|c| c.as_slice())
}

/// 沿点序列方向把轮廓重采样为 `len` 个点（线性插值，像素中心对齐）
///
/// 下采样时先沿序列方向做高斯平滑以抑制混叠，sigma = (比例 - 1) / 2。
pub fn resample_points(points: &[ContourPoint], len: usize) -> Vec<ContourPoint> {
  if points.is_empty() || len == 0 {
    return vec![[0.0; 2]; len];
  }
  if points.len() == 1 {
    return vec![points[0]; len];
  }

  let scale = points.len() as f64 / len as f64;
  let smoothed;
  let source = if scale > 1.0 {
    smoothed = gaussian_smooth(points, (scale - 1.0) / 2.0);
    smoothed.as_slice()
  } else {
    points
  };

  let last = (source.len() - 1) as f64;
  (0..len)
    .map(|i| {
      let coord = mirror((i as f64 + 0.5) * scale - 0.5, last);
      let lo = coord.floor() as usize;
      let hi = (lo + 1).min(source.len() - 1);
      let t = coord - lo as f64;
      [
        source[lo][0] * (1.0 - t) + source[hi][0] * t,
        source[lo][1] * (1.0 - t) + source[hi][1] * t,
      ]
    })
    .collect()
}

/// 镜像边界：越界坐标按端点反射回 [0, last]
fn mirror(coord: f64, last: f64) -> f64 {
  if last <= 0.0 {
    return 0.0;
  }
  let period = 2.0 * last;
  let mut c = coord.abs() % period;
  if c > last {
    c = period - c;
  }
  c
}

fn gaussian_smooth(points: &[ContourPoint], sigma: f64) -> Vec<ContourPoint> {
  if sigma <= 0.0 {
    return points.to_vec();
  }
  let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
  let weights: Vec<f64> = (-radius..=radius)
    .map(|k| (-0.5 * (k as f64 / sigma).powi(2)).exp())
    .collect();
  let total: f64 = weights.iter().sum();
  let last = (points.len() - 1) as f64;

  (0..points.len())
    .map(|i| {
      let mut acc = [0.0; 2];
      for (offset, w) in (-radius..=radius).zip(&weights) {
        let j = mirror(i as f64 + offset as f64, last) as usize;
        acc[0] += points[j][0] * w;
        acc[1] += points[j][1] * w;
      }
      [acc[0] / total, acc[1] / total]
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_mask_has_no_contours() {
    let mask = GrayImage::new(40, 30);
    assert!(trace_contours(&mask, 0.8).is_empty());
  }

  #[test]
  fn square_blob_is_traced() {
    let mut mask = GrayImage::new(40, 30);
    for y in 10..20 {
      for x in 5..25 {
        mask.put_pixel(x, y, Luma([255]));
      }
    }
    let contours = trace_contours(&mask, 0.8);
    assert_eq!(contours.len(), 1);
    let rows: Vec<f64> = contours[0].iter().map(|p| p[0]).collect();
    assert!(rows.iter().all(|&r| (10.0..20.0).contains(&r)));
  }

  #[test]
  fn largest_prefers_first_on_tie() {
    let a = vec![[1.0, 0.0]; 3];
    let b = vec![[2.0, 0.0]; 5];
    let c = vec![[3.0, 0.0]; 5];
    let contours = vec![a, b, c];
    let best = largest_contour(&contours).unwrap();
    assert_eq!(best.len(), 5);
    assert_eq!(best[0][0], 2.0);
  }

  #[test]
  fn largest_of_nothing_is_none() {
    assert!(largest_contour(&[]).is_none());
  }

  #[test]
  fn resample_has_exact_length() {
    let long: Vec<ContourPoint> = (0..1000).map(|i| [i as f64, 0.0]).collect();
    let short: Vec<ContourPoint> = (0..10).map(|i| [i as f64, 1.0]).collect();
    assert_eq!(resample_points(&long, 255).len(), 255);
    assert_eq!(resample_points(&short, 255).len(), 255);
    assert_eq!(resample_points(&[[4.0, 2.0]], 255), vec![[4.0, 2.0]; 255]);
  }

  #[test]
  fn resample_linear_ramp_stays_monotonic() {
    let ramp: Vec<ContourPoint> = (0..600).map(|i| [i as f64, 0.0]).collect();
    let out = resample_points(&ramp, 255);
    assert!(out.windows(2).all(|w| w[1][0] >= w[0][0]));
    assert!(out[0][0] >= 0.0 && out[254][0] <= 599.0);
  }

  #[test]
  fn mirror_reflects_both_ends() {
    assert_eq!(mirror(-0.25, 4.0), 0.25);
    assert_eq!(mirror(4.5, 4.0), 3.5);
    assert_eq!(mirror(2.0, 4.0), 2.0);
  }
}
