// 该文件是 Xindian （心电） 项目的一部分。
// tests/common/mod.rs - 集成测试公共夹具
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

#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use xindian::{
  features::FEATURE_LEN,
  frame::{CANVAS_HEIGHT, CANVAS_WIDTH},
  leads::{LEAD_COUNT, LEAD_LAYOUT},
  model::artifact::{
    ARTIFACT_FORMAT_VERSION, CLASSIFIER_FILE, ClassifierArtifact, ClassifierModel, MultiClass,
    PCA_FILE, PcaArtifact, SCALER_FILE, ScalerArtifact, save_artifact,
  },
  signal::WAVEFORM_LEN,
};

pub const N_COMPONENTS: usize = 4;

/// 每个主成分对应 3 个相邻导联的平均值
pub fn pca_artifact() -> PcaArtifact {
  let leads_per_component = LEAD_COUNT / N_COMPONENTS;
  let weight = 1.0 / (leads_per_component * WAVEFORM_LEN) as f64;
  let components = (0..N_COMPONENTS)
    .map(|k| {
      (0..FEATURE_LEN)
        .map(|i| {
          if i / (leads_per_component * WAVEFORM_LEN) == k {
            weight
          } else {
            0.0
          }
        })
        .collect()
    })
    .collect();
  PcaArtifact {
    format_version: ARTIFACT_FORMAT_VERSION,
    mean: vec![0.0; FEATURE_LEN],
    components,
    explained_variance: None,
    whiten: false,
  }
}

pub fn scaler_artifact() -> ScalerArtifact {
  ScalerArtifact {
    format_version: ARTIFACT_FORMAT_VERSION,
    mean: vec![0.5; FEATURE_LEN],
    scale: vec![0.25; FEATURE_LEN],
  }
}

pub fn logistic_artifact(width: usize) -> ClassifierArtifact {
  let coef = (0..4)
    .map(|c| (0..width).map(|k| if k == c { 1.0 } else { -0.25 }).collect())
    .collect();
  ClassifierArtifact {
    format_version: ARTIFACT_FORMAT_VERSION,
    model: ClassifierModel::LogisticRegression {
      classes: vec![0, 1, 2, 3],
      coef,
      intercept: vec![0.0, 0.1, 0.2, 0.05],
      multi_class: MultiClass::Multinomial,
    },
  }
}

pub fn svc_artifact() -> ClassifierArtifact {
  ClassifierArtifact {
    format_version: ARTIFACT_FORMAT_VERSION,
    model: ClassifierModel::LinearSvc {
      classes: vec![0, 1, 2, 3],
      coef: (0..4)
        .map(|c| (0..N_COMPONENTS).map(|k| if k == c { 1.0 } else { 0.0 }).collect())
        .collect(),
      intercept: vec![0.0; 4],
    },
  }
}

/// 写入一套完整的模型文件
pub fn write_models(dir: &Path) {
  save_artifact(&dir.join(SCALER_FILE), &scaler_artifact()).unwrap();
  save_artifact(&dir.join(PCA_FILE), &pca_artifact()).unwrap();
  save_artifact(&dir.join(CLASSIFIER_FILE), &logistic_artifact(N_COMPONENTS)).unwrap();
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
  let mut bytes = Cursor::new(Vec::new());
  image.write_to(&mut bytes, format).unwrap();
  bytes.into_inner()
}

pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
  encode(
    &RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
    ImageFormat::Png,
  )
}

/// 标准版面的合成心电图：白底，每个导联面板中一条 3 像素粗的黑色正弦曲线
pub fn synthetic_chart() -> RgbImage {
  let mut image = RgbImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, Rgb([255, 255, 255]));
  for (lead, region) in LEAD_LAYOUT.iter().take(LEAD_COUNT).enumerate() {
    let left = region.cols.start as f32 + 20.0;
    let right = region.cols.end as f32 - 20.0;
    let middle = (region.rows.start + region.rows.end) as f32 / 2.0;
    let amplitude = 40.0 + 5.0 * lead as f32;
    let cycles = 2.0 + (lead % 3) as f32;

    let steps = 400;
    let point = |i: usize| {
      let t = i as f32 / steps as f32;
      let x = left + t * (right - left);
      let y = middle - amplitude * (t * cycles * std::f32::consts::TAU).sin();
      (x, y)
    };
    for i in 0..steps {
      let (x0, y0) = point(i);
      let (x1, y1) = point(i + 1);
      for dy in -1..=1 {
        let dy = dy as f32;
        draw_line_segment_mut(&mut image, (x0, y0 + dy), (x1, y1 + dy), Rgb([0, 0, 0]));
      }
    }
  }
  image
}

pub fn synthetic_chart_png() -> Vec<u8> {
  encode(&synthetic_chart(), ImageFormat::Png)
}

pub fn dir_is_empty(dir: &Path) -> bool {
  std::fs::read_dir(dir).unwrap().next().is_none()
}
