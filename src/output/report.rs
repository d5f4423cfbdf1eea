// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/report.rs - 检测报告
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

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::aggregate::{ClassShare, ConfidencePoint, class_distribution, confidence_series};
use crate::detection::Detection;
use crate::pipeline::Analysis;

pub const NO_OBJECTS_MESSAGE: &str =
  "No objects were detected in this image. Try another image with clearer objects.";

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
  pub width: u32,
  pub height: u32,
}

/// 给图表和摘要使用的检测报告
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
  pub source: String,
  pub generated_at: DateTime<Utc>,
  pub image: ImageSize,
  pub total: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  pub class_distribution: Vec<ClassShare>,
  pub confidence_scores: Vec<ConfidencePoint>,
  pub detections: Vec<Detection>,
}

impl DetectionReport {
  pub fn new(source: impl Into<String>, analysis: &Analysis) -> Self {
    let (width, height) = analysis.bitmap.dimensions();
    let detections = &analysis.detections;

    Self {
      source: source.into(),
      generated_at: Utc::now(),
      image: ImageSize { width, height },
      total: detections.len(),
      message: detections
        .is_empty()
        .then(|| NO_OBJECTS_MESSAGE.to_string()),
      class_distribution: class_distribution(detections),
      confidence_scores: confidence_series(detections),
      detections: detections.clone(),
    }
  }

  pub fn to_json(&self) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, self.to_json()?)?;
    info!("保存检测报告: {}", path.display());
    Ok(())
  }

  /// 文本摘要，每行一条
  pub fn summary_lines(&self) -> Vec<String> {
    let mut lines = vec![format!("Total Objects Detected: {}", self.total)];
    if let Some(message) = &self.message {
      lines.push(message.clone());
      return lines;
    }
    lines.push("Object Class Breakdown:".to_string());
    for share in &self.class_distribution {
      lines.push(format!("  - {}: {}", share.class, share.count));
    }
    lines
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::{BBox, ClassLabel};
  use crate::input::Bitmap;
  use image::RgbImage;

  fn analysis(detections: Vec<Detection>) -> Analysis {
    Analysis {
      bitmap: Bitmap::from(RgbImage::new(100, 80)),
      detections,
    }
  }

  #[test]
  fn report_carries_chart_datasets() {
    let report = DetectionReport::new(
      "dog.jpg",
      &analysis(vec![Detection {
        class: ClassLabel::new("dog"),
        confidence: 0.93,
        bbox: BBox::new(10.0, 10.0, 40.0, 40.0),
      }]),
    );
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["total"], 1);
    assert_eq!(json["image"]["width"], 100);
    assert_eq!(json["class_distribution"][0]["class"], "dog");
    assert_eq!(json["class_distribution"][0]["count"], 1);
    assert_eq!(json["confidence_scores"][0]["label"], "Object 1");
    assert_eq!(json["confidence_scores"][0]["value"], 93.0);
    assert_eq!(json["confidence_scores"][0]["color"], "#9966FF");
    assert!(json.get("message").is_none());
  }

  #[test]
  fn empty_result_has_message() {
    let report = DetectionReport::new("empty.png", &analysis(Vec::new()));
    assert_eq!(report.total, 0);
    assert_eq!(report.message.as_deref(), Some(NO_OBJECTS_MESSAGE));
    assert_eq!(report.summary_lines().len(), 2);
  }

  #[test]
  fn save_writes_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("result.json");
    let report = DetectionReport::new("empty.png", &analysis(Vec::new()));
    report.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["source"], "empty.png");
  }
}
