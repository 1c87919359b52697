// 该文件是 Xindian （心电） 项目的一部分。
// src/output/save_json_file.rs - 保存预测结果为 JSON 文件
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, input::ImageFileInput, output::Render, path_from_url,
  predictor::PredictionOutcome,
};

pub struct SaveJsonFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveJsonFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveJsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for SaveJsonFileOutput {
  type Error = SaveJsonFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveJsonFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveJsonFileOutput {
      path: path_from_url(uri),
    })
  }
}

impl SaveJsonFileOutput {
  pub fn path(&self) -> &PathBuf {
    &self.path
  }
}

impl Render<ImageFileInput, PredictionOutcome> for SaveJsonFileOutput {
  type Error = SaveJsonFileError;

  fn render_result(
    &self,
    _frame: &ImageFileInput,
    result: &PredictionOutcome,
  ) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(&self.path)?);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.flush()?;

    info!("保存预测结果到文件: {}", self.path.display());
    Ok(())
  }
}
