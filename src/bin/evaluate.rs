// 该文件是 Xindian （心电） 项目的一部分。
// src/bin/evaluate.rs - 数据集批量评估
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

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use url::Url;

use xindian::{
  EcgPredictorBuilder, FromUrl,
  model::Diagnosis,
  output::{OutputChain, OutputWrapper},
  task::{BatchTask, Task, scan_dataset},
};

/// 在带标注的数据集上评估准确率
///
/// 数据集目录下按类别分为 normal、mi、abnormal、history_mi 四个子目录。
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型目录，例如 ecg:///opt/models
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 数据集目录
  #[arg(long, value_name = "DIR")]
  pub dataset: PathBuf,
  /// 最多评估的图像数量
  #[arg(long, value_name = "COUNT")]
  pub limit: Option<usize>,
  /// 导联面板记录目录，例如 folder:///tmp/leads
  #[arg(long, value_name = "LEADS")]
  pub leads: Option<Url>,
  /// 评估报告输出路径，缺省时打印到标准输出
  #[arg(long, value_name = "REPORT")]
  pub report: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型目录: {}", args.model);
  info!("数据集目录: {}", args.dataset.display());

  let predictor = EcgPredictorBuilder::from_url(&args.model)?
    .build()
    .context("加载模型失败")?;
  let samples = scan_dataset(&args.dataset)
    .with_context(|| format!("无法读取数据集 {}", args.dataset.display()))?;

  let mut outputs = Vec::new();
  if let Some(url) = &args.leads {
    outputs.push(OutputWrapper::from_url(url).context("无法创建导联记录输出")?);
  }

  let report = BatchTask::default()
    .with_limit(args.limit)
    .with_interrupt(true)
    .run_task(samples.into_iter(), predictor, OutputChain(outputs))?;

  for (code, tally) in &report.per_class {
    info!(
      "{}: {}/{} ({:.1}%)",
      Diagnosis::from_code(*code).label(),
      tally.correct,
      tally.total,
      tally.accuracy().unwrap_or(0.0) * 100.0
    );
  }
  let overall = report.overall();
  info!(
    "总体准确率: {}/{} ({:.1}%)",
    overall.correct,
    overall.total,
    overall.accuracy().unwrap_or(0.0) * 100.0
  );

  let json = serde_json::to_string_pretty(&report)?;
  match &args.report {
    Some(path) => std::fs::write(path, json)
      .with_context(|| format!("无法写入评估报告 {}", path.display()))?,
    None => println!("{}", json),
  }

  Ok(())
}
