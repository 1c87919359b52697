// 该文件是 Xindian （心电） 项目的一部分。
// src/output/lead_record.rs - 导联面板记录输出
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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::EcgCanvas,
  input::{ImageFileInput, ImageFileInputError},
  leads::{PanelKind, divide_leads},
  output::Render,
  path_from_url,
  predictor::PredictionOutcome,
  signal::quantize,
};

#[derive(Error, Debug)]
pub enum LeadRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("输入图像错误: {0}")]
  InputError(#[from] ImageFileInputError),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 把每次预测切出的 13 个导联面板保存为 PNG，便于检查切分版面
///
/// 目录结构为 `<root>/<年>/<月>/<日>/<时-分-秒>-<序号>/`，其中包含
/// `lead_01.png` 到 `lead_12.png`、`rhythm.png` 以及 `result.json`。
/// 带 `?failed` 查询参数时，失败的预测也会记录（默认只记录成功的）。
pub struct LeadRecordOutput {
  directory: PathBuf,
  record_counter: AtomicU16,
  failed: bool,
}

impl FromUrlWithScheme for LeadRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for LeadRecordOutput {
  type Error = LeadRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(LeadRecordOutputError::SchemeMismatch);
    }

    let failed = uri.query_pairs().any(|(k, _)| k == "failed");

    Ok(LeadRecordOutput {
      directory: path_from_url(uri),
      record_counter: AtomicU16::new(0),
      failed,
    })
  }
}

impl LeadRecordOutput {
  fn record_id(&self) -> u16 {
    self.record_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn record_dir(&self) -> Result<PathBuf, LeadRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()))
      .join(format!("{}-{:04X}", now.format("%H-%M-%S"), self.record_id()));
    std::fs::create_dir_all(&directory)?;
    Ok(directory)
  }
}

impl Render<ImageFileInput, PredictionOutcome> for LeadRecordOutput {
  type Error = LeadRecordOutputError;

  fn render_result(
    &self,
    frame: &ImageFileInput,
    result: &PredictionOutcome,
  ) -> Result<(), Self::Error> {
    if !self.failed && !result.is_success() {
      debug!("预测失败，跳过导联记录");
      return Ok(());
    }

    let directory = self.record_dir()?;
    // 无法解码的输入只记录结果
    if let Ok(rgb) = frame.decode() {
      let canvas = EcgCanvas::from_frame(&rgb);
      for panel in divide_leads(&canvas) {
        let name = match panel.kind {
          PanelKind::Lead => format!("lead_{:02}.png", panel.number),
          PanelKind::Rhythm => "rhythm.png".to_string(),
        };
        quantize(&panel.image).save(directory.join(name))?;
      }
    }

    let mut writer = BufWriter::new(File::create(directory.join("result.json"))?);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.flush()?;

    info!("导联面板已保存到: {}", directory.display());
    Ok(())
  }
}
