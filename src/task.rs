// 该文件是 Xindian （心电） 项目的一部分。
// src/task.rs - 运行任务
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

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::{
  input::ImageFileInput,
  model::{Diagnosis, Model},
  output::Render,
  predictor::PredictionOutcome,
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 处理单张图像
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Output = D;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(result)
  }
}

/// 数据集子目录名与期望类别
pub const DATASET_CLASSES: [(&str, Diagnosis); 4] = [
  ("normal", Diagnosis::Normal),
  ("mi", Diagnosis::MyocardialInfarction),
  ("abnormal", Diagnosis::AbnormalHeartbeat),
  ("history_mi", Diagnosis::HistoryOfMi),
];

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 带标注的数据集样本
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSample {
  pub path: PathBuf,
  pub expected: Diagnosis,
}

/// 扫描数据集目录，按类别与文件名排序；不存在的类别目录跳过
pub fn scan_dataset(root: impl AsRef<Path>) -> std::io::Result<Vec<DatasetSample>> {
  let mut samples = Vec::new();
  for (name, expected) in DATASET_CLASSES {
    let dir = root.as_ref().join(name);
    if !dir.is_dir() {
      warn!("数据集缺少类别目录: {}", dir.display());
      continue;
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if path.is_file() && is_image {
        paths.push(path);
      }
    }
    paths.sort();
    info!("类别 {}: {} 张图像", name, paths.len());
    samples.extend(paths.into_iter().map(|path| DatasetSample { path, expected }));
  }
  Ok(samples)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassTally {
  pub correct: usize,
  pub total: usize,
}

impl ClassTally {
  pub fn accuracy(&self) -> Option<f64> {
    (self.total > 0).then(|| self.correct as f64 / self.total as f64)
  }
}

/// 批量评估的统计结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
  /// 以期望类别编号为键
  pub per_class: BTreeMap<i64, ClassTally>,
  pub failures: usize,
  pub interrupted: bool,
}

impl EvaluationReport {
  /// 失败的预测只计入 `failures`，不参与准确率
  fn record(&mut self, expected: Diagnosis, outcome: &PredictionOutcome) {
    let tally = self.per_class.entry(expected.code()).or_default();
    match outcome.class_code() {
      Some(code) => {
        tally.total += 1;
        if code == expected.code() {
          tally.correct += 1;
        }
      }
      None => self.failures += 1,
    }
  }

  pub fn overall(&self) -> ClassTally {
    self
      .per_class
      .values()
      .fold(ClassTally::default(), |acc, t| ClassTally {
        correct: acc.correct + t.correct,
        total: acc.total + t.total,
      })
  }
}

/// 遍历带标注的数据集并统计准确率
#[derive(Default, Debug)]
pub struct BatchTask {
  limit: Option<usize>,
  interruptible: bool,
}

impl BatchTask {
  pub fn with_limit(mut self, limit: Option<usize>) -> Self {
    self.limit = limit;
    self
  }

  /// 安装 Ctrl-C 处理器，收到信号后在当前样本结束时停止
  pub fn with_interrupt(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }

  fn stop_flag(&self) -> anyhow::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    if self.interruptible {
      let flag = stop.clone();
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        flag.store(true, Ordering::SeqCst);
      })
      .map_err(|e| anyhow::anyhow!("无法设置 Ctrl-C 处理器: {}", e))?;
    }
    Ok(stop)
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = DatasetSample>,
  M: Model<Input = ImageFileInput, Output = PredictionOutcome, Error = ME>,
  O: Render<ImageFileInput, PredictionOutcome, Error = RE>,
> Task<I, M, O> for BatchTask
{
  type Output = EvaluationReport;
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始批量评估...");
    let stop = self.stop_flag()?;
    let mut report = EvaluationReport::default();
    let now = Instant::now();

    for (index, sample) in input.enumerate() {
      if self.limit.map(|n| index >= n).unwrap_or(false) {
        info!("达到指定数量 {}, 退出评估", index);
        break;
      }
      if stop.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出评估");
        report.interrupted = true;
        break;
      }

      let frame = match ImageFileInput::from_path(&sample.path) {
        Ok(frame) => frame,
        Err(e) => {
          warn!("跳过无法读取的文件 {}: {}", sample.path.display(), e);
          continue;
        }
      };
      let outcome = model.infer(&frame)?;
      info!(
        "({}) {} -> {} (期望 {})",
        index + 1,
        sample.path.display(),
        outcome.label(),
        sample.expected.label()
      );
      output.render_result(&frame, &outcome)?;
      report.record(sample.expected, &outcome);
    }

    let overall = report.overall();
    info!(
      "评估完成: {}/{} 正确, 失败 {}, 耗时: {:.2?}",
      overall.correct,
      overall.total,
      report.failures,
      now.elapsed()
    );
    Ok(report)
  }
}
