// 该文件是 Xindian （心电） 项目的一部分。
// src/output.rs - 输出定义
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

#[cfg(any(feature = "save_json_file", feature = "lead_record"))]
use crate::FromUrlWithScheme;
use crate::{FromUrl, input::ImageFileInput, predictor::PredictionOutcome};
use thiserror::Error;
use url::Url;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[cfg(feature = "save_json_file")]
mod save_json_file;
#[cfg(feature = "save_json_file")]
pub use self::save_json_file::{SaveJsonFileError, SaveJsonFileOutput};

#[cfg(feature = "lead_record")]
mod lead_record;
#[cfg(feature = "lead_record")]
pub use self::lead_record::{LeadRecordOutput, LeadRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_json_file")]
  #[error("保存 JSON 文件错误: {0}")]
  SaveJsonFileError(#[from] SaveJsonFileError),
  #[cfg(feature = "lead_record")]
  #[error("导联记录输出错误: {0}")]
  LeadRecordOutputError(#[from] LeadRecordOutputError),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把预测结果以 JSON 打印到标准输出
#[derive(Debug, Default)]
pub struct StdoutOutput;

impl Render<ImageFileInput, PredictionOutcome> for StdoutOutput {
  type Error = OutputError;

  fn render_result(
    &self,
    _frame: &ImageFileInput,
    result: &PredictionOutcome,
  ) -> Result<(), Self::Error> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
  }
}

pub enum OutputWrapper {
  Stdout(StdoutOutput),
  #[cfg(feature = "save_json_file")]
  SaveJsonFileOutput(SaveJsonFileOutput),
  #[cfg(feature = "lead_record")]
  LeadRecordOutput(LeadRecordOutput),
}

impl OutputWrapper {
  pub fn stdout() -> Self {
    OutputWrapper::Stdout(StdoutOutput)
  }
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_json_file")]
      SaveJsonFileOutput::SCHEME => {
        let output = SaveJsonFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveJsonFileOutput(output))
      }
      #[cfg(feature = "lead_record")]
      LeadRecordOutput::SCHEME => {
        let output = LeadRecordOutput::from_url(url)?;
        Ok(OutputWrapper::LeadRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<ImageFileInput, PredictionOutcome> for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &ImageFileInput,
    result: &PredictionOutcome,
  ) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Stdout(output) => output.render_result(frame, result),
      #[cfg(feature = "save_json_file")]
      OutputWrapper::SaveJsonFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "lead_record")]
      OutputWrapper::LeadRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

/// 依次交给多个输出
pub struct OutputChain(pub Vec<OutputWrapper>);

impl Render<ImageFileInput, PredictionOutcome> for OutputChain {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &ImageFileInput,
    result: &PredictionOutcome,
  ) -> Result<(), Self::Error> {
    for output in &self.0 {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://localhost/stream").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(_))
    ));
  }

  #[cfg(feature = "save_json_file")]
  #[test]
  fn json_scheme_is_dispatched() {
    let url = Url::parse("json:///tmp/result.json").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::SaveJsonFileOutput(_))
    ));
  }
}
