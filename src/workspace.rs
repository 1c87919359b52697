// 该文件是 Xindian （心电） 项目的一部分。
// src/workspace.rs - 单次预测的临时工作区
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
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::PredictError;
use crate::signal::Waveform;

const WORKSPACE_PREFIX: &str = "xindian-";

/// 一次预测独占的临时目录
///
/// 目录名唯一，创建即进入活动状态；值被丢弃时（包括错误返回和 panic 展开）
/// 目录连同内容一起删除。
#[derive(Debug)]
pub struct ScratchWorkspace {
  dir: TempDir,
}

impl ScratchWorkspace {
  /// 在系统临时目录下创建
  pub fn create() -> std::io::Result<Self> {
    Self::create_in(std::env::temp_dir())
  }

  pub fn create_in(root: impl AsRef<Path>) -> std::io::Result<Self> {
    let dir = tempfile::Builder::new()
      .prefix(WORKSPACE_PREFIX)
      .tempdir_in(root)?;
    debug!("创建临时工作区: {}", dir.path().display());
    Ok(Self { dir })
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  fn lead_path(&self, lead: usize) -> PathBuf {
    self.dir.path().join(format!("lead_{:02}.json", lead))
  }

  /// 写入第 `lead` 个导联（从 1 开始）的波形
  pub fn stage_waveform(&self, lead: usize, waveform: &Waveform) -> Result<(), PredictError> {
    let mut writer = BufWriter::new(File::create(self.lead_path(lead))?);
    serde_json::to_writer(&mut writer, waveform)
      .map_err(|e| PredictError::prediction(format!("写入导联 {} 波形失败: {}", lead, e)))?;
    writer.flush()?;
    Ok(())
  }

  /// 读回第 `lead` 个导联的波形，并校验长度
  pub fn load_waveform(&self, lead: usize) -> Result<Waveform, PredictError> {
    let file = File::open(self.lead_path(lead))?;
    let waveform: Waveform = serde_json::from_reader(BufReader::new(file))
      .map_err(|e| PredictError::prediction(format!("读取导联 {} 波形失败: {}", lead, e)))?;
    Waveform::from_samples(waveform.into_samples())
      .map_err(|e| PredictError::prediction(format!("导联 {}: {}", lead, e)))
  }

  /// 显式释放，删除失败时返回错误
  pub fn close(self) -> std::io::Result<()> {
    let path = self.dir.path().to_path_buf();
    self.dir.close()?;
    debug!("临时工作区已删除: {}", path.display());
    Ok(())
  }
}
