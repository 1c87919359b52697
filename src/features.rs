// 该文件是 Xindian （心电） 项目的一部分。
// src/features.rs - 特征向量拼接
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

use ndarray::Array1;

use crate::error::PredictError;
use crate::leads::LEAD_COUNT;
use crate::signal::{WAVEFORM_LEN, Waveform};

/// 特征向量长度：12 个导联 x 255 点
pub const FEATURE_LEN: usize = LEAD_COUNT * WAVEFORM_LEN;

/// 按导联 1..12 顺序拼接的特征向量
///
/// 预训练的缩放器、PCA 与分类器都按这个列顺序拟合，不能打乱。
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f64>);

impl FeatureVector {
  pub fn as_array(&self) -> &Array1<f64> {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  #[cfg(test)]
  pub(crate) fn from_array(values: Array1<f64>) -> Self {
    Self(values)
  }
}

/// 拼接 12 个导联的波形
pub fn assemble(waveforms: &[Waveform]) -> Result<FeatureVector, PredictError> {
  if waveforms.len() != LEAD_COUNT {
    return Err(PredictError::prediction(format!(
      "导联数量错误: 期望 {}, 实际 {}",
      LEAD_COUNT,
      waveforms.len()
    )));
  }

  let mut values = Vec::with_capacity(FEATURE_LEN);
  for (i, waveform) in waveforms.iter().enumerate() {
    if waveform.len() != WAVEFORM_LEN {
      return Err(PredictError::prediction(format!(
        "导联 {} 波形长度错误: 期望 {}, 实际 {}",
        i + 1,
        WAVEFORM_LEN,
        waveform.len()
      )));
    }
    values.extend_from_slice(waveform.samples());
  }

  Ok(FeatureVector(Array1::from(values)))
}
