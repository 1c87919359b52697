// 该文件是 Xindian （心电） 项目的一部分。
// src/predictor.rs - 心电图预测器
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

use std::any::Any;
use std::convert::Infallible;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  error::PredictError,
  features::{FEATURE_LEN, assemble},
  frame::EcgCanvas,
  input::ImageFileInput,
  leads::{LEAD_COUNT, PanelKind, divide_leads},
  model::{
    Classification, Classifier, Model, Pca, Reducer, StandardScaler, Status,
    artifact::{
      CLASSIFIER_FILE, ClassifierArtifact, PCA_FILE, PcaArtifact, SCALER_FILE, ScalerArtifact,
      load_artifact, load_optional_artifact,
    },
  },
  path_from_url,
  signal::{Waveform, extract_waveform},
  workspace::ScratchWorkspace,
};

/// 成功的预测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
  pub success: bool,
  pub class_code: i64,
  pub label: String,
  pub message: String,
  /// 0 到 100 之间，分类器不给概率时为 null
  pub confidence: Option<f64>,
  pub status: Status,
  pub num_features: usize,
  pub reduced_features: usize,
}

impl PredictionResult {
  fn new(classification: &Classification, num_features: usize, reduced_features: usize) -> Self {
    let diagnosis = classification.diagnosis();
    PredictionResult {
      success: true,
      class_code: diagnosis.code(),
      label: diagnosis.label().to_string(),
      message: diagnosis.message().to_string(),
      confidence: classification.confidence(),
      status: diagnosis.status(),
      num_features,
      reduced_features,
    }
  }
}

/// 结构化的失败结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFailure {
  pub success: bool,
  pub error: String,
  pub label: String,
  pub message: String,
  pub status: Status,
}

impl PredictionFailure {
  fn new(error: impl Into<String>) -> Self {
    let error = error.into();
    PredictionFailure {
      success: false,
      message: format!("Failed to process ECG image: {}", error),
      error,
      label: "Error".to_string(),
      status: Status::Attention,
    }
  }
}

impl From<&PredictError> for PredictionFailure {
  fn from(err: &PredictError) -> Self {
    PredictionFailure::new(err.to_string())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionOutcome {
  Success(PredictionResult),
  Failure(PredictionFailure),
}

impl PredictionOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, PredictionOutcome::Success(_))
  }

  pub fn class_code(&self) -> Option<i64> {
    match self {
      PredictionOutcome::Success(result) => Some(result.class_code),
      PredictionOutcome::Failure(_) => None,
    }
  }

  pub fn label(&self) -> &str {
    match self {
      PredictionOutcome::Success(result) => &result.label,
      PredictionOutcome::Failure(failure) => &failure.label,
    }
  }
}

const ECG_SCHEME: &str = "ecg";

pub struct EcgPredictorBuilder {
  model_dir: PathBuf,
  scratch_root: Option<PathBuf>,
  stage_through_workspace: bool,
}

impl FromUrlWithScheme for EcgPredictorBuilder {
  const SCHEME: &'static str = ECG_SCHEME;
}

impl FromUrl for EcgPredictorBuilder {
  type Error = PredictError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(PredictError::prediction(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Ok(Self::new(path_from_url(url)))
  }
}

impl EcgPredictorBuilder {
  pub fn new(model_dir: impl Into<PathBuf>) -> Self {
    EcgPredictorBuilder {
      model_dir: model_dir.into(),
      scratch_root: None,
      stage_through_workspace: true,
    }
  }

  /// 临时工作区的父目录，默认为系统临时目录
  pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
    self.scratch_root = Some(root.into());
    self
  }

  /// 波形是否经由临时工作区写入再读回
  pub fn stage_through_workspace(mut self, stage: bool) -> Self {
    self.stage_through_workspace = stage;
    self
  }

  pub fn build(self) -> Result<EcgPredictor, PredictError> {
    info!("加载模型目录: {}", self.model_dir.display());

    let scaler = load_optional_artifact::<ScalerArtifact>(&self.model_dir.join(SCALER_FILE))?
      .map(StandardScaler::try_from)
      .transpose()?;
    match &scaler {
      Some(scaler) => {
        debug!("缩放器输入维数: {}", scaler.n_features());
        if scaler.n_features() != FEATURE_LEN {
          return Err(PredictError::incompatible(format!(
            "缩放器期望 {} 维特征, 实际特征为 {} 维",
            scaler.n_features(),
            FEATURE_LEN
          )));
        }
      }
      None => warn!("未找到 {}，将跳过标准化", SCALER_FILE),
    }

    let pca = Pca::try_from(load_artifact::<PcaArtifact>(
      &self.model_dir.join(PCA_FILE),
    )?)?;
    debug!("PCA: {} -> {}", pca.n_features(), pca.n_components());
    if pca.n_features() != FEATURE_LEN {
      return Err(PredictError::incompatible(format!(
        "PCA 期望 {} 维特征, 实际特征为 {} 维",
        pca.n_features(),
        FEATURE_LEN
      )));
    }

    let classifier = Classifier::try_from(load_artifact::<ClassifierArtifact>(
      &self.model_dir.join(CLASSIFIER_FILE),
    )?)?;
    debug!(
      "分类器输入维数: {}, 类别: {:?}, 支持概率: {}",
      classifier.n_features(),
      classifier.classes(),
      classifier.supports_probabilities()
    );
    if classifier.n_features() != pca.n_components() {
      return Err(PredictError::incompatible(format!(
        "分类器期望 {} 维输入, PCA 输出为 {} 维",
        classifier.n_features(),
        pca.n_components()
      )));
    }

    let reducer = Reducer::new(scaler, pca)?;
    info!("模型加载完成");

    Ok(EcgPredictor {
      reducer,
      classifier,
      scratch_root: self.scratch_root,
      stage_through_workspace: self.stage_through_workspace,
    })
  }
}

/// 加载完成的预测器，构造后只读，可在多个线程间共享
#[derive(Debug, Clone)]
pub struct EcgPredictor {
  reducer: Reducer,
  classifier: Classifier,
  scratch_root: Option<PathBuf>,
  stage_through_workspace: bool,
}

impl EcgPredictor {
  pub fn reduced_features(&self) -> usize {
    self.reducer.n_components()
  }

  fn open_workspace(&self) -> Result<ScratchWorkspace, PredictError> {
    let workspace = match &self.scratch_root {
      Some(root) => ScratchWorkspace::create_in(root)?,
      None => ScratchWorkspace::create()?,
    };
    Ok(workspace)
  }

  /// 完整流水线，错误原样返回；工作区在所有返回路径上都会删除
  pub fn try_predict(&self, input: &ImageFileInput) -> Result<PredictionResult, PredictError> {
    let workspace = self.open_workspace()?;
    let result = self.run_pipeline(input, &workspace);
    let closed = workspace.close();
    let result = result?;
    closed?;
    Ok(result)
  }

  fn run_pipeline(
    &self,
    input: &ImageFileInput,
    workspace: &ScratchWorkspace,
  ) -> Result<PredictionResult, PredictError> {
    let now = Instant::now();
    let frame = input.decode()?;
    let canvas = EcgCanvas::from_frame(&frame);
    let panels = divide_leads(&canvas);
    debug!("图像预处理完成，耗时: {:.2?}", now.elapsed());

    let now = Instant::now();
    let mut waveforms: Vec<Waveform> = Vec::with_capacity(LEAD_COUNT);
    for panel in panels.iter().filter(|p| p.kind == PanelKind::Lead) {
      let waveform = extract_waveform(&panel.image);
      if waveform.is_zero() {
        debug!("导联 {} 未找到波形", panel.number);
      }
      if self.stage_through_workspace {
        workspace.stage_waveform(panel.number, &waveform)?;
      } else {
        waveforms.push(waveform);
      }
    }
    if self.stage_through_workspace {
      for lead in 1..=LEAD_COUNT {
        waveforms.push(workspace.load_waveform(lead)?);
      }
    }
    debug!("波形提取完成，耗时: {:.2?}", now.elapsed());

    let now = Instant::now();
    let features = assemble(&waveforms)?;
    let reduced = self.reducer.infer(&features)?;
    let classification = self.classifier.infer(&reduced)?;
    debug!("分类完成，耗时: {:.2?}", now.elapsed());

    Ok(PredictionResult::new(
      &classification,
      features.len(),
      reduced.len(),
    ))
  }

  /// 对外入口：不返回错误，也不向外传播 panic
  pub fn predict(&self, input: &ImageFileInput) -> PredictionOutcome {
    let now = Instant::now();
    let outcome = guard_prediction(|| self.try_predict(input));
    info!("预测完成: {}，耗时: {:.2?}", outcome.label(), now.elapsed());
    outcome
  }

  pub fn predict_bytes(&self, bytes: impl Into<Vec<u8>>) -> PredictionOutcome {
    self.predict(&ImageFileInput::from_bytes(bytes))
  }

  pub fn predict_path(&self, path: impl AsRef<Path>) -> PredictionOutcome {
    match ImageFileInput::from_path(path.as_ref()) {
      Ok(input) => self.predict(&input),
      Err(e) => {
        let e = PredictError::from(e);
        error!("读取图像失败 {}: {}", path.as_ref().display(), e);
        PredictionOutcome::Failure(PredictionFailure::from(&e))
      }
    }
  }
}

/// 错误与 panic 都转换为 `PredictionFailure`
fn guard_prediction<F>(f: F) -> PredictionOutcome
where
  F: FnOnce() -> Result<PredictionResult, PredictError>,
{
  match catch_unwind(AssertUnwindSafe(f)) {
    Ok(Ok(result)) => PredictionOutcome::Success(result),
    Ok(Err(e)) => {
      error!("预测失败: {}", e);
      PredictionOutcome::Failure(PredictionFailure::from(&e))
    }
    Err(payload) => {
      let e = PredictError::prediction(panic_message(payload.as_ref()));
      error!("预测过程异常终止: {}", e);
      PredictionOutcome::Failure(PredictionFailure::from(&e))
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(msg) = payload.downcast_ref::<&str>() {
    msg.to_string()
  } else if let Some(msg) = payload.downcast_ref::<String>() {
    msg.clone()
  } else {
    "unexpected panic".to_string()
  }
}

impl Model for EcgPredictor {
  type Input = ImageFileInput;
  type Output = PredictionOutcome;
  type Error = Infallible;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Ok(self.predict(input))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_send_sync<T: Send + Sync>() {}

  #[test]
  fn predictor_is_shareable() {
    assert_send_sync::<EcgPredictor>();
  }

  #[test]
  fn failure_shape() {
    let err = PredictError::ImageDecode("empty".to_string());
    let failure = PredictionFailure::from(&err);
    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["label"], "Error");
    assert_eq!(json["status"], "attention");
    assert_eq!(json["error"], "Image decode error: empty");
    assert_eq!(
      json["message"],
      "Failed to process ECG image: Image decode error: empty"
    );
  }

  #[test]
  fn outcome_serializes_untagged() {
    let result = PredictionResult::new(
      &Classification {
        code: 1,
        probabilities: Some(vec![0.25, 0.75]),
      },
      FEATURE_LEN,
      4,
    );
    let json = serde_json::to_value(PredictionOutcome::Success(result)).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["class_code"], 1);
    assert_eq!(json["label"], "Myocardial Infarction");
    assert_eq!(json["status"], "critical");
    assert_eq!(json["confidence"], 75.0);
    assert_eq!(json["num_features"], 3060);
  }

  #[test]
  fn builder_rejects_other_scheme() {
    let url = Url::parse("folder:///models").unwrap();
    assert!(EcgPredictorBuilder::from_url(&url).is_err());
  }

  #[test]
  fn missing_model_dir_reports_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let err = EcgPredictorBuilder::new(dir.path()).build().unwrap_err();
    assert!(matches!(err, PredictError::MissingModelArtifact { .. }));
  }

  #[test]
  fn panic_payloads_become_text() {
    let payload: Box<dyn Any + Send> = Box::new("boom");
    assert_eq!(panic_message(payload.as_ref()), "boom");
    let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
    assert_eq!(panic_message(payload.as_ref()), "bang");
  }

  #[test]
  fn panic_mid_pipeline_becomes_failure() {
    let outcome = guard_prediction(|| panic!("lead extraction exploded"));
    match outcome {
      PredictionOutcome::Failure(failure) => {
        assert!(!failure.success);
        assert_eq!(failure.label, "Error");
        assert_eq!(failure.status, Status::Attention);
        assert!(failure.error.contains("lead extraction exploded"));
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
  }

  #[test]
  fn panic_removes_scratch_workspace() {
    let root = tempfile::tempdir().unwrap();
    let outcome = guard_prediction(|| {
      let workspace = ScratchWorkspace::create_in(root.path()).unwrap();
      assert!(workspace.path().is_dir());
      panic!("failed after staging");
    });
    assert!(!outcome.is_success());
    assert!(std::fs::read_dir(root.path()).unwrap().next().is_none());
  }

  #[test]
  fn errors_pass_through_guard() {
    let outcome = guard_prediction(|| Err(PredictError::prediction("no leads")));
    match outcome {
      PredictionOutcome::Failure(failure) => assert!(failure.error.contains("no leads")),
      other => panic!("unexpected outcome: {:?}", other),
    }
  }
}
