// 该文件是 Xindian （心电） 项目的一部分。
// src/error.rs - 预测错误定义
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

use std::path::PathBuf;

use thiserror::Error;

use crate::input::ImageFileInputError;
use crate::model::ArtifactError;

/// 预测流水线中所有阶段共用的错误类型
#[derive(Error, Debug)]
pub enum PredictError {
  /// 输入图像为空、损坏或无法读取，不重试
  #[error("Image decode error: {0}")]
  ImageDecode(String),
  /// 部署配置错误：必需的模型文件不存在
  #[error("Missing model artifact: {}", path.display())]
  MissingModelArtifact { path: PathBuf },
  /// 模型文件格式与当前运行时不匹配
  #[error(
    "ECG model incompatibility detected: {0}. Please retrain the models or re-export compatible artifacts."
  )]
  ModelIncompatibility(String),
  #[error("Scratch workspace error: {0}")]
  Workspace(#[from] std::io::Error),
  #[error("Prediction error: {0}")]
  Prediction(String),
}

impl PredictError {
  pub fn prediction(msg: impl Into<String>) -> Self {
    PredictError::Prediction(msg.into())
  }

  pub fn incompatible(msg: impl Into<String>) -> Self {
    PredictError::ModelIncompatibility(msg.into())
  }
}

impl From<ImageFileInputError> for PredictError {
  fn from(err: ImageFileInputError) -> Self {
    match err {
      ImageFileInputError::SchemaMismatch(_) => PredictError::Prediction(err.to_string()),
      other => PredictError::ImageDecode(other.to_string()),
    }
  }
}

impl From<ArtifactError> for PredictError {
  fn from(err: ArtifactError) -> Self {
    match err {
      ArtifactError::Missing(path) => PredictError::MissingModelArtifact { path },
      ArtifactError::Incompatible(msg) => PredictError::ModelIncompatibility(msg),
      ArtifactError::Json(e) if e.is_data() => PredictError::ModelIncompatibility(e.to_string()),
      other => PredictError::Prediction(other.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_artifact_keeps_path() {
    let err: PredictError = ArtifactError::Missing(PathBuf::from("/models/pca.json")).into();
    assert!(matches!(err, PredictError::MissingModelArtifact { .. }));
    assert!(err.to_string().contains("/models/pca.json"));
  }

  #[test]
  fn json_type_mismatch_is_incompatibility() {
    let json_err = serde_json::from_str::<Vec<f64>>("[\"a\"]").unwrap_err();
    let err: PredictError = ArtifactError::Json(json_err).into();
    assert!(matches!(err, PredictError::ModelIncompatibility(_)));
    assert!(err.to_string().contains("retrain"));
  }

  #[test]
  fn json_syntax_error_is_generic() {
    let json_err = serde_json::from_str::<Vec<f64>>("[1.0,").unwrap_err();
    let err: PredictError = ArtifactError::Json(json_err).into();
    assert!(matches!(err, PredictError::Prediction(_)));
  }
}
