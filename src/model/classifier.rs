// 该文件是 Xindian （心电） 项目的一部分。
// src/model/classifier.rs - 预训练分类器
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

use ndarray::{Array1, Array2, Axis};
use tracing::debug;

use super::{
  ArtifactError, Classification, Model, ReducedVector,
  artifact::{ClassifierArtifact, ClassifierModel, MultiClass},
};
use crate::error::PredictError;

/// 线性决策函数：coef · x + intercept
#[derive(Debug, Clone)]
struct Linear {
  coef: Array2<f64>,
  intercept: Array1<f64>,
}

impl Linear {
  fn new(classes: &[i64], coef: Vec<Vec<f64>>, intercept: Vec<f64>) -> Result<Self, ArtifactError> {
    if classes.len() < 2 {
      return Err(ArtifactError::incompatible("分类器至少需要两个类别"));
    }
    let rows = coef.len();
    // 二分类只导出一行系数
    let expected_rows = if classes.len() == 2 { [1, 2] } else { [classes.len(); 2] };
    if !expected_rows.contains(&rows) {
      return Err(ArtifactError::incompatible(format!(
        "系数行数 {} 与类别数 {} 不匹配",
        rows,
        classes.len()
      )));
    }
    if intercept.len() != rows {
      return Err(ArtifactError::incompatible(format!(
        "截距长度 {} 与系数行数 {} 不一致",
        intercept.len(),
        rows
      )));
    }
    let width = coef[0].len();
    if width == 0 || coef.iter().any(|row| row.len() != width) {
      return Err(ArtifactError::incompatible("系数矩阵各行长度不一致"));
    }

    let flat: Vec<f64> = coef.into_iter().flatten().collect();
    let coef = Array2::from_shape_vec((rows, width), flat)
      .map_err(|e| ArtifactError::incompatible(format!("系数矩阵形状错误: {}", e)))?;
    Ok(Self {
      coef,
      intercept: Array1::from(intercept),
    })
  }

  fn n_features(&self) -> usize {
    self.coef.ncols()
  }

  fn decision(&self, x: &Array1<f64>) -> Array1<f64> {
    self.coef.dot(x) + &self.intercept
  }
}

fn sigmoid(v: f64) -> f64 {
  1.0 / (1.0 + (-v).exp())
}

fn softmax(values: &Array1<f64>) -> Vec<f64> {
  let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let exp: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
  let sum: f64 = exp.iter().sum();
  exp.into_iter().map(|v| v / sum).collect()
}

/// 第一个最大值的下标
fn argmax(values: &[f64]) -> usize {
  let mut best = 0;
  for (i, v) in values.iter().enumerate() {
    if *v > values[best] {
      best = i;
    }
  }
  best
}

#[derive(Debug, Clone)]
enum Kind {
  LogisticRegression {
    linear: Linear,
    multi_class: MultiClass,
  },
  LinearSvc {
    linear: Linear,
  },
  KNeighbors {
    n_neighbors: usize,
    samples: Array2<f64>,
    /// 每个样本标签在 classes 中的下标
    label_index: Vec<usize>,
  },
}

/// 从 classifier.json 恢复的分类器
#[derive(Debug, Clone)]
pub struct Classifier {
  classes: Vec<i64>,
  kind: Kind,
}

impl TryFrom<ClassifierArtifact> for Classifier {
  type Error = ArtifactError;

  fn try_from(artifact: ClassifierArtifact) -> Result<Self, Self::Error> {
    match artifact.model {
      ClassifierModel::LogisticRegression {
        classes,
        coef,
        intercept,
        multi_class,
      } => {
        let linear = Linear::new(&classes, coef, intercept)?;
        Ok(Classifier {
          classes,
          kind: Kind::LogisticRegression {
            linear,
            multi_class,
          },
        })
      }
      ClassifierModel::LinearSvc {
        classes,
        coef,
        intercept,
      } => {
        let linear = Linear::new(&classes, coef, intercept)?;
        Ok(Classifier {
          classes,
          kind: Kind::LinearSvc { linear },
        })
      }
      ClassifierModel::KNeighbors {
        classes,
        n_neighbors,
        samples,
        labels,
      } => {
        if classes.is_empty() || samples.is_empty() {
          return Err(ArtifactError::incompatible("近邻分类器没有类别或样本"));
        }
        if n_neighbors == 0 || n_neighbors > samples.len() {
          return Err(ArtifactError::incompatible(format!(
            "近邻数 {} 超出样本数 {}",
            n_neighbors,
            samples.len()
          )));
        }
        if labels.len() != samples.len() {
          return Err(ArtifactError::incompatible(format!(
            "标签数 {} 与样本数 {} 不一致",
            labels.len(),
            samples.len()
          )));
        }
        let label_index = labels
          .iter()
          .map(|label| {
            classes.iter().position(|c| c == label).ok_or_else(|| {
              ArtifactError::incompatible(format!("样本标签 {} 不在类别表中", label))
            })
          })
          .collect::<Result<Vec<_>, _>>()?;

        let width = samples[0].len();
        if width == 0 || samples.iter().any(|row| row.len() != width) {
          return Err(ArtifactError::incompatible("近邻样本各行长度不一致"));
        }
        let rows = samples.len();
        let flat: Vec<f64> = samples.into_iter().flatten().collect();
        let samples = Array2::from_shape_vec((rows, width), flat)
          .map_err(|e| ArtifactError::incompatible(format!("近邻样本形状错误: {}", e)))?;

        Ok(Classifier {
          classes,
          kind: Kind::KNeighbors {
            n_neighbors,
            samples,
            label_index,
          },
        })
      }
    }
  }
}

impl Classifier {
  pub fn n_features(&self) -> usize {
    match &self.kind {
      Kind::LogisticRegression { linear, .. } | Kind::LinearSvc { linear } => linear.n_features(),
      Kind::KNeighbors { samples, .. } => samples.ncols(),
    }
  }

  pub fn classes(&self) -> &[i64] {
    &self.classes
  }

  /// 分类器能否给出类别概率
  pub fn supports_probabilities(&self) -> bool {
    !matches!(self.kind, Kind::LinearSvc { .. })
  }

  fn linear_code(classes: &[i64], decision: &Array1<f64>) -> i64 {
    if decision.len() == 1 {
      if decision[0] > 0.0 { classes[1] } else { classes[0] }
    } else {
      classes[argmax(&decision.to_vec())]
    }
  }

  fn logistic_proba(decision: &Array1<f64>, multi_class: MultiClass) -> Vec<f64> {
    if decision.len() == 1 {
      // softmax([-d, d]) == sigmoid(2d)
      let p = match multi_class {
        MultiClass::Multinomial => sigmoid(2.0 * decision[0]),
        MultiClass::Ovr => sigmoid(decision[0]),
      };
      return vec![1.0 - p, p];
    }
    match multi_class {
      MultiClass::Multinomial => softmax(decision),
      MultiClass::Ovr => {
        let raw: Vec<f64> = decision.iter().copied().map(sigmoid).collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|p| p / sum).collect()
      }
    }
  }

  fn neighbor_votes(
    n_classes: usize,
    n_neighbors: usize,
    samples: &Array2<f64>,
    label_index: &[usize],
    x: &Array1<f64>,
  ) -> Vec<f64> {
    let mut distances: Vec<(f64, usize)> = samples
      .axis_iter(Axis(0))
      .zip(label_index.iter().copied())
      .map(|(row, label)| {
        let d = row
          .iter()
          .zip(x.iter())
          .map(|(a, b)| (a - b) * (a - b))
          .sum::<f64>();
        (d, label)
      })
      .collect();
    // 稳定排序，等距时保留样本原有顺序
    distances.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut votes = vec![0.0; n_classes];
    for (_, label) in distances.iter().take(n_neighbors) {
      votes[*label] += 1.0;
    }
    votes.into_iter().map(|v| v / n_neighbors as f64).collect()
  }
}

impl Model for Classifier {
  type Input = ReducedVector;
  type Output = Classification;
  type Error = PredictError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    if input.len() != self.n_features() {
      return Err(PredictError::incompatible(format!(
        "分类器期望 {} 维输入, 实际为 {} 维",
        self.n_features(),
        input.len()
      )));
    }
    let x = input.as_array();

    let classes = &self.classes;
    let classification = match &self.kind {
      Kind::LogisticRegression {
        linear,
        multi_class,
      } => {
        let decision = linear.decision(x);
        let probabilities = Self::logistic_proba(&decision, *multi_class);
        Classification {
          code: Self::linear_code(classes, &decision),
          probabilities: Some(probabilities),
        }
      }
      Kind::LinearSvc { linear } => Classification {
        code: Self::linear_code(classes, &linear.decision(x)),
        probabilities: None,
      },
      Kind::KNeighbors {
        n_neighbors,
        samples,
        label_index,
      } => {
        let votes = Self::neighbor_votes(classes.len(), *n_neighbors, samples, label_index, x);
        Classification {
          code: classes[argmax(&votes)],
          probabilities: Some(votes),
        }
      }
    };

    debug!(
      "分类结果: {} 概率: {:?}",
      classification.code, classification.probabilities
    );
    Ok(classification)
  }
}
