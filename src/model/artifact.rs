// 该文件是 Xindian （心电） 项目的一部分。
// src/model/artifact.rs - 预训练模型文件格式
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

//! 预训练的缩放器、PCA 和分类器统一导出为带版本号的 JSON 文件。

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info};

use super::ArtifactError;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

pub const SCALER_FILE: &str = "scaler.json";
pub const PCA_FILE: &str = "pca.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";

pub trait Versioned {
  fn format_version(&self) -> u32;
}

/// 标准化缩放器：(x - mean) / scale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
  pub format_version: u32,
  pub mean: Vec<f64>,
  pub scale: Vec<f64>,
}

/// 主成分投影：(x - mean) · componentsᵀ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaArtifact {
  pub format_version: u32,
  pub mean: Vec<f64>,
  /// k 行，每行 n_features 列
  pub components: Vec<Vec<f64>>,
  #[serde(default)]
  pub explained_variance: Option<Vec<f64>>,
  #[serde(default)]
  pub whiten: bool,
}

/// 逻辑回归的概率方式
///
/// 二分类只有一行系数 `d`：`multinomial` 给出 softmax([-d, d])，即 sigmoid(2d)；
/// `ovr` 给出 sigmoid(d)。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiClass {
  #[default]
  Multinomial,
  Ovr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
  LogisticRegression {
    classes: Vec<i64>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    #[serde(default)]
    multi_class: MultiClass,
  },
  LinearSvc {
    classes: Vec<i64>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
  },
  KNeighbors {
    classes: Vec<i64>,
    n_neighbors: usize,
    samples: Vec<Vec<f64>>,
    labels: Vec<i64>,
  },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
  pub format_version: u32,
  #[serde(flatten)]
  pub model: ClassifierModel,
}

impl Versioned for ScalerArtifact {
  fn format_version(&self) -> u32 {
    self.format_version
  }
}

impl Versioned for PcaArtifact {
  fn format_version(&self) -> u32 {
    self.format_version
  }
}

impl Versioned for ClassifierArtifact {
  fn format_version(&self) -> u32 {
    self.format_version
  }
}

/// 读取必需的模型文件，不存在时报 `ArtifactError::Missing`
pub fn load_artifact<T: DeserializeOwned + Versioned>(path: &Path) -> Result<T, ArtifactError> {
  if !path.is_file() {
    return Err(ArtifactError::Missing(path.to_path_buf()));
  }

  info!("加载模型文件: {}", path.display());
  let file = File::open(path)?;
  debug!(
    "模型文件大小: {:.2} MB",
    file.metadata()?.len() as f64 / (1024.0 * 1024.0)
  );
  let artifact: T = serde_json::from_reader(BufReader::new(file))?;

  if artifact.format_version() != ARTIFACT_FORMAT_VERSION {
    return Err(ArtifactError::incompatible(format!(
      "{}: 文件格式版本为 {}, 当前支持版本 {}",
      path.display(),
      artifact.format_version(),
      ARTIFACT_FORMAT_VERSION
    )));
  }

  Ok(artifact)
}

/// 读取可选的模型文件，不存在时返回 None
pub fn load_optional_artifact<T: DeserializeOwned + Versioned>(
  path: &Path,
) -> Result<Option<T>, ArtifactError> {
  match load_artifact(path) {
    Ok(artifact) => Ok(Some(artifact)),
    Err(ArtifactError::Missing(_)) => Ok(None),
    Err(e) => Err(e),
  }
}

/// 导出模型文件
pub fn save_artifact<T: Serialize>(path: &Path, artifact: &T) -> Result<(), ArtifactError> {
  let mut writer = BufWriter::new(File::create(path)?);
  serde_json::to_writer(&mut writer, artifact)?;
  writer.flush()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifier_kind_is_tagged() {
    let json = r#"{
      "format_version": 1,
      "kind": "linear_svc",
      "classes": [0, 1],
      "coef": [[1.0, -1.0]],
      "intercept": [0.5]
    }"#;
    let artifact: ClassifierArtifact = serde_json::from_str(json).unwrap();
    assert!(matches!(artifact.model, ClassifierModel::LinearSvc { .. }));
  }

  #[test]
  fn logistic_defaults_to_multinomial() {
    let json = r#"{
      "format_version": 1,
      "kind": "logistic_regression",
      "classes": [0, 1, 2],
      "coef": [[1.0], [0.0], [-1.0]],
      "intercept": [0.0, 0.0, 0.0]
    }"#;
    let artifact: ClassifierArtifact = serde_json::from_str(json).unwrap();
    match artifact.model {
      ClassifierModel::LogisticRegression { multi_class, .. } => {
        assert_eq!(multi_class, MultiClass::Multinomial)
      }
      other => panic!("unexpected model: {:?}", other),
    }
  }

  #[test]
  fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(PCA_FILE);
    assert!(matches!(
      load_artifact::<PcaArtifact>(&path),
      Err(ArtifactError::Missing(_))
    ));
    assert!(
      load_optional_artifact::<ScalerArtifact>(&dir.path().join(SCALER_FILE))
        .unwrap()
        .is_none()
    );
  }

  #[test]
  fn wrong_version_is_incompatible() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SCALER_FILE);
    let artifact = ScalerArtifact {
      format_version: 99,
      mean: vec![0.0],
      scale: vec![1.0],
    };
    save_artifact(&path, &artifact).unwrap();
    assert!(matches!(
      load_artifact::<ScalerArtifact>(&path),
      Err(ArtifactError::Incompatible(_))
    ));
  }

  #[test]
  fn saved_artifact_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(PCA_FILE);
    let artifact = PcaArtifact {
      format_version: ARTIFACT_FORMAT_VERSION,
      mean: vec![0.5, 0.25],
      components: vec![vec![1.0, 0.0]],
      explained_variance: None,
      whiten: false,
    };
    save_artifact(&path, &artifact).unwrap();
    let loaded: PcaArtifact = load_artifact(&path).unwrap();
    assert_eq!(loaded.mean, artifact.mean);
    assert_eq!(loaded.components, artifact.components);
  }
}
