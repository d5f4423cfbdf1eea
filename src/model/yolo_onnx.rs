// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/yolo_onnx.rs - ONNX YOLO 目标检测模型
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
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use ndarray::{Array4, Axis};
use ort::session::{Session, SessionOutputs};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use super::{DetectionModel, InferenceError, ModelLoadError, ModelLoader};
use crate::detection::{BBox, RawPrediction};
use crate::input::Bitmap;
use crate::{FromUrl, FromUrlWithScheme, url_file_path};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
const DEFAULT_INPUT_SIZE: u32 = 640;

#[derive(Error, Debug)]
pub enum OnnxYoloError {
  #[error("模型路径必须使用 {0} 方案")]
  ModelPathError(&'static str),
  #[error("参数 {name} 无效: {value}")]
  InvalidParameter { name: String, value: String },
}

/// ONNX YOLO 模型加载器
///
/// URL 形如 `onnx:///models/yolov8n.onnx?confidence=0.5&nms=0.45&size=640`。
#[derive(Debug, Clone)]
pub struct OnnxYoloLoader {
  model_path: PathBuf,
  confidence: f32,
  nms_threshold: f32,
  input_size: u32,
  class_names: Arc<[String]>,
}

impl FromUrlWithScheme for OnnxYoloLoader {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxYoloLoader {
  type Error = OnnxYoloError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxYoloError::ModelPathError(Self::SCHEME));
    }

    let mut loader = Self::new(url_file_path(url));
    for (name, value) in url.query_pairs() {
      let invalid = || OnnxYoloError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
      };
      match name.as_ref() {
        "confidence" => loader.confidence = value.parse().map_err(|_| invalid())?,
        "nms" => loader.nms_threshold = value.parse().map_err(|_| invalid())?,
        "size" => loader.input_size = value.parse().map_err(|_| invalid())?,
        _ => return Err(invalid()),
      }
    }
    if loader.input_size == 0 {
      return Err(OnnxYoloError::InvalidParameter {
        name: "size".to_string(),
        value: "0".to_string(),
      });
    }

    Ok(loader)
  }
}

impl OnnxYoloLoader {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      confidence: DEFAULT_CONFIDENCE,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      input_size: DEFAULT_INPUT_SIZE,
      class_names: COCO_CLASSES.iter().map(|name| name.to_string()).collect(),
    }
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn nms_threshold(mut self, nms_threshold: f32) -> Self {
    self.nms_threshold = nms_threshold;
    self
  }

  pub fn class_names(mut self, class_names: Vec<String>) -> Self {
    self.class_names = class_names.into();
    self
  }
}

#[async_trait]
impl ModelLoader for OnnxYoloLoader {
  type Model = OnnxYolo;

  async fn load(&self) -> Result<Self::Model, ModelLoadError> {
    let config = self.clone();
    info!("加载模型文件: {}", config.model_path.display());

    let session = tokio::task::spawn_blocking({
      let path = config.model_path.clone();
      move || -> ort::Result<Session> { Session::builder()?.commit_from_file(path) }
    })
    .await
    .map_err(|e| ModelLoadError::with_source("模型加载任务异常终止", e))?
    .map_err(|e| {
      ModelLoadError::with_source(
        format!("无法加载模型: {}", config.model_path.display()),
        e,
      )
    })?;

    let input_name = session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .ok_or_else(|| ModelLoadError::new("模型没有输入"))?;
    let output_name = session
      .outputs
      .first()
      .map(|output| output.name.clone())
      .ok_or_else(|| ModelLoadError::new("模型没有输出"))?;
    debug!("模型输入: {}, 输出: {}", input_name, output_name);

    Ok(OnnxYolo {
      inner: Arc::new(OnnxYoloInner {
        session,
        input_name,
        output_name,
        config,
      }),
    })
  }
}

struct OnnxYoloInner {
  session: Session,
  input_name: String,
  output_name: String,
  config: OnnxYoloLoader,
}

/// 已加载的 ONNX YOLO 模型
pub struct OnnxYolo {
  inner: Arc<OnnxYoloInner>,
}

#[async_trait]
impl DetectionModel for OnnxYolo {
  async fn detect(&self, bitmap: &Bitmap) -> Result<Vec<RawPrediction>, InferenceError> {
    let inner = self.inner.clone();
    let bitmap = bitmap.clone();
    tokio::task::spawn_blocking(move || inner.infer(bitmap.as_rgb_image()))
      .await
      .map_err(|e| InferenceError::with_source("推理任务异常终止", e))?
  }
}

/// 模型内部的候选框
struct Candidate {
  class_id: usize,
  score: f32,
  bbox: BBox,
}

impl OnnxYoloInner {
  /// 预处理图像：缩放到模型输入尺寸，转为 NCHW 浮点张量
  fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
    let size = self.config.input_size;
    let resized =
      image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle);

    let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
      for c in 0..3 {
        input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
      }
    }
    input
  }

  fn infer(&self, image: &RgbImage) -> Result<Vec<RawPrediction>, InferenceError> {
    let input = self.preprocess(image);

    let inputs = ort::inputs![self.input_name.as_str() => input.view()]
      .map_err(|e| InferenceError::with_source("无法构造模型输入", e))?;
    let outputs: SessionOutputs = self
      .session
      .run(inputs)
      .map_err(|e| InferenceError::with_source("模型运行失败", e))?;
    let output = outputs[self.output_name.as_str()]
      .try_extract_tensor::<f32>()
      .map_err(|e| InferenceError::with_source("无法读取模型输出", e))?;
    let output = output.t();

    let scale_x = image.width() as f32 / self.config.input_size as f32;
    let scale_y = image.height() as f32 / self.config.input_size as f32;

    let mut candidates = Vec::new();
    for row in output.axis_iter(Axis(0)) {
      let row: Vec<f32> = row.iter().copied().collect();
      if row.len() <= 4 {
        return Err(InferenceError::new(format!(
          "模型输出形状不符合预期: 每行 {} 个值",
          row.len()
        )));
      }

      // 找到最高类别分数
      let (class_id, score) = row[4..]
        .iter()
        .copied()
        .enumerate()
        .fold((0usize, f32::MIN), |best, item| if item.1 > best.1 { item } else { best });
      if score < self.config.confidence {
        continue;
      }

      // 中心点坐标转为左上角坐标，并缩放到原始图像尺寸
      let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
      candidates.push(Candidate {
        class_id,
        score,
        bbox: BBox::new(
          (cx - w / 2.0) * scale_x,
          (cy - h / 2.0) * scale_y,
          w * scale_x,
          h * scale_y,
        ),
      });
    }

    let kept = nms(candidates, self.config.nms_threshold);
    Ok(
      kept
        .into_iter()
        .map(|candidate| RawPrediction {
          class: self
            .config
            .class_names
            .get(candidate.class_id)
            .cloned()
            .unwrap_or_else(|| candidate.class_id.to_string()),
          score: candidate.score,
          bbox: candidate.bbox.into(),
        })
        .collect(),
    )
  }
}

/// 按类别做非极大值抑制，结果按置信度降序
fn nms(mut candidates: Vec<Candidate>, threshold: f32) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut result: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    let suppressed = result.iter().any(|kept| {
      kept.class_id == candidate.class_id && kept.bbox.iou(&candidate.bbox) >= threshold
    });
    if !suppressed {
      result.push(candidate);
    }
  }
  result
}
