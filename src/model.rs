// 该文件是 Kanjian （看见） 项目的一部分。
// src/model.rs - 模型
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

use async_trait::async_trait;
use thiserror::Error;

use crate::detection::RawPrediction;
use crate::input::Bitmap;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 模型加载失败（资源不可用、文件损坏等），用户可以重新提交再试
#[derive(Error, Debug)]
#[error("模型加载错误: {message}")]
pub struct ModelLoadError {
  message: String,
  #[source]
  source: Option<BoxError>,
}

impl ModelLoadError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
    }
  }

  pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
    Self {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

/// 推理调用本身失败
#[derive(Error, Debug)]
#[error("推理错误: {message}")]
pub struct InferenceError {
  message: String,
  #[source]
  source: Option<BoxError>,
}

impl InferenceError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
    }
  }

  pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
    Self {
      message: message.into(),
      source: Some(source.into()),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

/// 已加载的检测模型
#[async_trait]
pub trait DetectionModel: Send + Sync + 'static {
  async fn detect(&self, bitmap: &Bitmap) -> Result<Vec<RawPrediction>, InferenceError>;
}

/// 模型加载器，不带参数，每次调用都会真正加载一次
#[async_trait]
pub trait ModelLoader: Send + Sync + 'static {
  type Model: DetectionModel;

  async fn load(&self) -> Result<Self::Model, ModelLoadError>;
}

mod gateway;
pub use self::gateway::{GatewayError, ModelGateway};

#[cfg(feature = "model_onnx")]
mod yolo_onnx;
#[cfg(feature = "model_onnx")]
pub use self::yolo_onnx::{COCO_CLASSES, OnnxYolo, OnnxYoloError, OnnxYoloLoader};
