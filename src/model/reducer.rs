// 该文件是 Xindian （心电） 项目的一部分。
// src/model/reducer.rs - 标准化与主成分降维
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

use ndarray::{Array1, Array2};
use tracing::debug;

use super::{
  ArtifactError, Model,
  artifact::{PcaArtifact, ScalerArtifact},
};
use crate::{error::PredictError, features::FeatureVector};

/// 降维后的向量，维数由 PCA 文件决定
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedVector(pub Array1<f64>);

impl ReducedVector {
  pub fn as_array(&self) -> &Array1<f64> {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

#[derive(Debug, Clone)]
pub struct StandardScaler {
  mean: Array1<f64>,
  scale: Array1<f64>,
}

impl TryFrom<ScalerArtifact> for StandardScaler {
  type Error = ArtifactError;

  fn try_from(artifact: ScalerArtifact) -> Result<Self, Self::Error> {
    if artifact.mean.is_empty() || artifact.mean.len() != artifact.scale.len() {
      return Err(ArtifactError::incompatible(format!(
        "缩放器 mean 长度 {} 与 scale 长度 {} 不一致",
        artifact.mean.len(),
        artifact.scale.len()
      )));
    }

    // 方差为零的列按 1 处理
    let scale = artifact
      .scale
      .into_iter()
      .map(|s| if s == 0.0 { 1.0 } else { s })
      .collect::<Array1<f64>>();

    Ok(Self {
      mean: Array1::from(artifact.mean),
      scale,
    })
  }
}

impl StandardScaler {
  pub fn n_features(&self) -> usize {
    self.mean.len()
  }

  pub fn transform(&self, x: &Array1<f64>) -> Result<Array1<f64>, PredictError> {
    if x.len() != self.n_features() {
      return Err(PredictError::incompatible(format!(
        "缩放器期望 {} 维输入, 实际为 {} 维",
        self.n_features(),
        x.len()
      )));
    }
    Ok((x - &self.mean) / &self.scale)
  }
}

#[derive(Debug, Clone)]
pub struct Pca {
  mean: Array1<f64>,
  components: Array2<f64>,
  whiten_scale: Option<Array1<f64>>,
}

impl TryFrom<PcaArtifact> for Pca {
  type Error = ArtifactError;

  fn try_from(artifact: PcaArtifact) -> Result<Self, Self::Error> {
    let n_features = artifact.mean.len();
    let n_components = artifact.components.len();
    if n_features == 0 || n_components == 0 {
      return Err(ArtifactError::incompatible("PCA 文件为空"));
    }
    if let Some(row) = artifact
      .components
      .iter()
      .position(|row| row.len() != n_features)
    {
      return Err(ArtifactError::incompatible(format!(
        "PCA 第 {} 个主成分长度 {} 与 mean 长度 {} 不一致",
        row,
        artifact.components[row].len(),
        n_features
      )));
    }

    let flat: Vec<f64> = artifact.components.into_iter().flatten().collect();
    let components = Array2::from_shape_vec((n_components, n_features), flat)
      .map_err(|e| ArtifactError::incompatible(format!("PCA 主成分形状错误: {}", e)))?;

    let whiten_scale = if artifact.whiten {
      let variance = artifact
        .explained_variance
        .ok_or_else(|| ArtifactError::incompatible("whiten 需要 explained_variance"))?;
      if variance.len() != n_components {
        return Err(ArtifactError::incompatible(format!(
          "explained_variance 长度 {} 与主成分数 {} 不一致",
          variance.len(),
          n_components
        )));
      }
      Some(variance.into_iter().map(f64::sqrt).collect::<Array1<f64>>())
    } else {
      None
    };

    Ok(Self {
      mean: Array1::from(artifact.mean),
      components,
      whiten_scale,
    })
  }
}

impl Pca {
  pub fn n_features(&self) -> usize {
    self.components.ncols()
  }

  pub fn n_components(&self) -> usize {
    self.components.nrows()
  }

  pub fn transform(&self, x: &Array1<f64>) -> Result<Array1<f64>, PredictError> {
    if x.len() != self.n_features() {
      return Err(PredictError::incompatible(format!(
        "PCA 期望 {} 维输入, 实际为 {} 维",
        self.n_features(),
        x.len()
      )));
    }
    let projected = self.components.dot(&(x - &self.mean));
    Ok(match &self.whiten_scale {
      Some(scale) => projected / scale,
      None => projected,
    })
  }
}

/// 缩放（可选）+ PCA 投影
#[derive(Debug, Clone)]
pub struct Reducer {
  scaler: Option<StandardScaler>,
  pca: Pca,
}

impl Reducer {
  pub fn new(scaler: Option<StandardScaler>, pca: Pca) -> Result<Self, ArtifactError> {
    if let Some(scaler) = &scaler
      && scaler.n_features() != pca.n_features()
    {
      return Err(ArtifactError::incompatible(format!(
        "缩放器维数 {} 与 PCA 输入维数 {} 不一致",
        scaler.n_features(),
        pca.n_features()
      )));
    }
    Ok(Self { scaler, pca })
  }

  pub fn has_scaler(&self) -> bool {
    self.scaler.is_some()
  }

  pub fn n_components(&self) -> usize {
    self.pca.n_components()
  }
}

impl Model for Reducer {
  type Input = FeatureVector;
  type Output = ReducedVector;
  type Error = PredictError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let scaled = match &self.scaler {
      Some(scaler) => scaler.transform(input.as_array())?,
      None => {
        debug!("未加载缩放器，跳过标准化");
        input.as_array().clone()
      }
    };
    let reduced = self.pca.transform(&scaled)?;
    debug!("降维完成: {} -> {}", input.len(), reduced.len());
    Ok(ReducedVector(reduced))
  }
}
