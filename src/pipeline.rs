// 该文件是 Kanjian （看见） 项目的一部分。
// src/pipeline.rs - 检测流水线
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

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use crate::detection::Detection;
use crate::input::{Bitmap, DecodeError, ImageBlob, ImageDecoder};
use crate::model::{GatewayError, InferenceError, ModelGateway, ModelLoadError, ModelLoader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineErrorKind {
  FileRead,
  Decode,
  ModelLoad,
  Inference,
}

impl fmt::Display for PipelineErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      PipelineErrorKind::FileRead => "file-read",
      PipelineErrorKind::Decode => "decode",
      PipelineErrorKind::ModelLoad => "model-load",
      PipelineErrorKind::Inference => "inference",
    };
    f.write_str(name)
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("文件无法读取: {0}")]
  FileRead(#[source] DecodeError),
  #[error("图像无效或已损坏: {0}")]
  Decode(#[source] DecodeError),
  #[error("{0}")]
  ModelLoad(Arc<ModelLoadError>),
  #[error("{0}")]
  Inference(InferenceError),
}

impl PipelineError {
  pub fn kind(&self) -> PipelineErrorKind {
    match self {
      PipelineError::FileRead(_) => PipelineErrorKind::FileRead,
      PipelineError::Decode(_) => PipelineErrorKind::Decode,
      PipelineError::ModelLoad(_) => PipelineErrorKind::ModelLoad,
      PipelineError::Inference(_) => PipelineErrorKind::Inference,
    }
  }
}

impl From<DecodeError> for PipelineError {
  fn from(err: DecodeError) -> Self {
    if err.is_file_read() {
      PipelineError::FileRead(err)
    } else {
      PipelineError::Decode(err)
    }
  }
}

impl From<GatewayError> for PipelineError {
  fn from(err: GatewayError) -> Self {
    match err {
      GatewayError::Load(err) => PipelineError::ModelLoad(err),
      GatewayError::Inference(err) => PipelineError::Inference(err),
    }
  }
}

/// 一次检测的结果：解码后的位图和按模型原始顺序排列的检测列表
#[derive(Debug, Clone)]
pub struct Analysis {
  pub bitmap: Bitmap,
  pub detections: Vec<Detection>,
}

impl Analysis {
  /// 没有检测到任何目标（这不是错误）
  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }
}

/// 检测流水线：解码 → 确保模型已加载 → 推理 → 归一化
///
/// 流水线不过滤、不排序、不去重，模型返回多少条就输出多少条。
pub struct DetectionPipeline<L: ModelLoader> {
  decoder: ImageDecoder,
  gateway: Arc<ModelGateway<L>>,
}

impl<L: ModelLoader> Clone for DetectionPipeline<L> {
  fn clone(&self) -> Self {
    Self {
      decoder: self.decoder,
      gateway: self.gateway.clone(),
    }
  }
}

impl<L: ModelLoader> DetectionPipeline<L> {
  pub fn new(loader: L) -> Self {
    Self::with_gateway(Arc::new(ModelGateway::new(loader)))
  }

  pub fn with_gateway(gateway: Arc<ModelGateway<L>>) -> Self {
    Self {
      decoder: ImageDecoder::new(),
      gateway,
    }
  }

  pub fn gateway(&self) -> &Arc<ModelGateway<L>> {
    &self.gateway
  }

  pub fn decoder(&self) -> &ImageDecoder {
    &self.decoder
  }

  pub async fn run(&self, blob: &ImageBlob) -> Result<Vec<Detection>, PipelineError> {
    self.analyze(blob).await.map(|analysis| analysis.detections)
  }

  pub async fn analyze(&self, blob: &ImageBlob) -> Result<Analysis, PipelineError> {
    let now = Instant::now();
    let name = blob.name();
    info!("开始检测: {}", name);

    let result = self.analyze_inner(blob).await;
    match &result {
      Ok(analysis) if analysis.is_empty() => {
        info!("检测完成: {} 未发现目标，耗时: {:.2?}", name, now.elapsed())
      }
      Ok(analysis) => info!(
        "检测完成: {} 共 {} 个目标，耗时: {:.2?}",
        name,
        analysis.detections.len(),
        now.elapsed()
      ),
      Err(err) => warn!("检测失败 [{}]: {} {}", err.kind(), name, err),
    }
    result
  }

  async fn analyze_inner(&self, blob: &ImageBlob) -> Result<Analysis, PipelineError> {
    let bitmap = self.decoder.decode(blob).await?;
    self
      .gateway
      .ensure_loaded()
      .await
      .map_err(PipelineError::ModelLoad)?;
    let predictions = self.gateway.detect(&bitmap).await?;
    let detections = predictions.into_iter().map(Detection::from).collect();

    Ok(Analysis { bitmap, detections })
  }
}
