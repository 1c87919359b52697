// 该文件是 Xindian （心电） 项目的一部分。
// src/model.rs - 模型
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ArtifactError {
  #[error("模型文件不存在: {}", .0.display())]
  Missing(PathBuf),
  #[error("模型文件读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型文件解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("模型文件不兼容: {0}")]
  Incompatible(String),
}

impl ArtifactError {
  pub fn incompatible(msg: impl Into<String>) -> Self {
    ArtifactError::Incompatible(msg.into())
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn from_label_id(id: i64) -> Self;
}

/// 结果的紧急程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Normal,
  Attention,
  Critical,
}

/// 分类器输出的诊断类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
  AbnormalHeartbeat,
  MyocardialInfarction,
  Normal,
  HistoryOfMi,
  /// 分类器给出了表外的类别编号
  Unknown(i64),
}

impl Diagnosis {
  pub fn from_code(code: i64) -> Self {
    match code {
      0 => Diagnosis::AbnormalHeartbeat,
      1 => Diagnosis::MyocardialInfarction,
      2 => Diagnosis::Normal,
      3 => Diagnosis::HistoryOfMi,
      other => Diagnosis::Unknown(other),
    }
  }

  pub fn code(&self) -> i64 {
    match self {
      Diagnosis::AbnormalHeartbeat => 0,
      Diagnosis::MyocardialInfarction => 1,
      Diagnosis::Normal => 2,
      Diagnosis::HistoryOfMi => 3,
      Diagnosis::Unknown(code) => *code,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Diagnosis::AbnormalHeartbeat => "Abnormal Heartbeat",
      Diagnosis::MyocardialInfarction => "Myocardial Infarction",
      Diagnosis::Normal => "Normal",
      Diagnosis::HistoryOfMi => "History of MI",
      Diagnosis::Unknown(_) => "Unknown",
    }
  }

  pub fn message(&self) -> &'static str {
    match self {
      Diagnosis::AbnormalHeartbeat => {
        "Your ECG shows signs of abnormal heartbeat (arrhythmia). Please consult a cardiologist."
      }
      Diagnosis::MyocardialInfarction => {
        "Your ECG indicates Myocardial Infarction (heart attack). Seek immediate medical attention!"
      }
      Diagnosis::Normal => "Your ECG appears normal. Your heart rhythm is healthy.",
      Diagnosis::HistoryOfMi => {
        "Your ECG shows signs of previous Myocardial Infarction. Follow up with your cardiologist."
      }
      Diagnosis::Unknown(_) => "Unable to classify ECG",
    }
  }

  pub fn status(&self) -> Status {
    match self {
      Diagnosis::MyocardialInfarction => Status::Critical,
      Diagnosis::Normal => Status::Normal,
      _ => Status::Attention,
    }
  }
}

impl WithLabel for Diagnosis {
  fn to_label_str(&self) -> String {
    self.label().to_string()
  }

  fn from_label_id(id: i64) -> Self {
    Diagnosis::from_code(id)
  }
}

/// 分类器的原始输出
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
  pub code: i64,
  /// 按类别顺序排列的概率，分类器不支持概率时为 None
  pub probabilities: Option<Vec<f64>>,
}

impl Classification {
  /// 最大类别概率的百分数
  pub fn confidence(&self) -> Option<f64> {
    self
      .probabilities
      .as_ref()
      .and_then(|p| p.iter().copied().reduce(f64::max))
      .map(|p| p * 100.0)
  }

  pub fn diagnosis(&self) -> Diagnosis {
    Diagnosis::from_label_id(self.code)
  }
}

pub mod artifact;
mod classifier;
mod reducer;

pub use self::classifier::Classifier;
pub use self::reducer::{Pca, ReducedVector, Reducer, StandardScaler};
