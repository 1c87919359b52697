// 该文件是 Xindian （心电） 项目的一部分。
// src/main.rs - 单张心电图预测
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
use tracing::{error, info};
use url::Url;

use xindian::{
  EcgPredictorBuilder, FromUrl, PredictError, PredictionFailure, PredictionOutcome,
  input::ImageFileInput,
  output::{OutputChain, OutputWrapper, Render},
  task::{OneShotTask, Task},
};

/// Xindian 心电图分类
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型目录，例如 ecg:///opt/models
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///data/ecg.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 结果输出，例如 json:///tmp/result.json；缺省时打印到标准输出
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,
  /// 导联面板记录目录，例如 folder:///tmp/leads
  #[arg(long, value_name = "LEADS")]
  pub leads: Option<Url>,
  /// 临时工作区的父目录
  #[arg(long, value_name = "DIR")]
  pub scratch: Option<PathBuf>,
  /// 波形只保存在内存中，不经过临时工作区
  #[arg(long)]
  pub in_memory: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型目录: {}", args.model);
  info!("输入来源: {}", args.input);

  let mut builder = EcgPredictorBuilder::from_url(&args.model)?
    .stage_through_workspace(!args.in_memory);
  if let Some(scratch) = &args.scratch {
    builder = builder.scratch_root(scratch);
  }
  let predictor = builder.build().context("加载模型失败")?;

  let mut outputs = vec![match &args.output {
    Some(url) => OutputWrapper::from_url(url).context("无法创建结果输出")?,
    None => OutputWrapper::stdout(),
  }];
  if let Some(url) = &args.leads {
    outputs.push(OutputWrapper::from_url(url).context("无法创建导联记录输出")?);
  }
  let output = OutputChain(outputs);

  match ImageFileInput::from_url(&args.input) {
    Ok(input) => {
      let outcome = OneShotTask.run_task(std::iter::once(input), predictor, output)?;
      if !outcome.is_success() {
        std::process::exit(2);
      }
    }
    Err(e) => {
      let e = PredictError::from(e);
      error!("读取输入失败: {}", e);
      let outcome = PredictionOutcome::Failure(PredictionFailure::from(&e));
      output.render_result(&ImageFileInput::from_bytes(Vec::new()), &outcome)?;
      std::process::exit(2);
    }
  }

  Ok(())
}
