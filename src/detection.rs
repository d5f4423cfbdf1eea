// 该文件是 Kanjian （看见） 项目的一部分。
// src/detection.rs - 检测结果数据模型
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

use serde::{Deserialize, Serialize};

/// 类别名称
///
/// 类别词表由外部模型决定，这里不做枚举，也不做校验。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabel(Arc<str>);

impl ClassLabel {
  pub fn new(name: impl AsRef<str>) -> Self {
    Self(Arc::from(name.as_ref()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ClassLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ClassLabel {
  fn from(name: &str) -> Self {
    Self::new(name)
  }
}

impl From<String> for ClassLabel {
  fn from(name: String) -> Self {
    Self(Arc::from(name))
  }
}

impl AsRef<str> for ClassLabel {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

/// 边界框，源图像像素坐标，原点在左上角
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl BBox {
  pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// 由 [x_min, y_min, x_max, y_max] 构造
  pub fn from_corners(corners: [f32; 4]) -> Self {
    let [x_min, y_min, x_max, y_max] = corners;
    Self::new(x_min, y_min, x_max - x_min, y_max - y_min)
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  pub fn area(&self) -> f32 {
    self.width.max(0.0) * self.height.max(0.0)
  }

  /// 交并比
  pub fn iou(&self, other: &BBox) -> f32 {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

impl From<[f32; 4]> for BBox {
  fn from([x, y, width, height]: [f32; 4]) -> Self {
    Self::new(x, y, width, height)
  }
}

impl From<BBox> for [f32; 4] {
  fn from(bbox: BBox) -> Self {
    [bbox.x, bbox.y, bbox.width, bbox.height]
  }
}

/// 模型直接给出的预测
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
  pub class: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x, y, width, height]
}

/// 归一化后的检测结果，生成后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub class: ClassLabel,
  pub confidence: f32,
  pub bbox: BBox,
}

impl From<RawPrediction> for Detection {
  fn from(pred: RawPrediction) -> Self {
    Self {
      class: ClassLabel::from(pred.class),
      confidence: pred.score,
      bbox: BBox::from(pred.bbox),
    }
  }
}
