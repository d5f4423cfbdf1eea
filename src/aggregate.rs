// 该文件是 Kanjian （看见） 项目的一部分。
// src/aggregate.rs - 检测结果统计
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

use std::collections::HashMap;

use serde::Serialize;

use crate::color::{ClassColor, color_for_class};
use crate::detection::{ClassLabel, Detection};

/// 每个类别的数量，按第一次出现的顺序排列（顺序仅用于展示）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCounts {
  entries: Vec<(ClassLabel, usize)>,
}

impl ClassCounts {
  pub fn get(&self, class: &str) -> Option<usize> {
    self
      .entries
      .iter()
      .find(|(label, _)| label.as_str() == class)
      .map(|(_, count)| *count)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn total(&self) -> usize {
    self.entries.iter().map(|(_, count)| count).sum()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&ClassLabel, usize)> {
    self.entries.iter().map(|(label, count)| (label, *count))
  }
}

/// 饼图数据中的一项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassShare {
  pub class: ClassLabel,
  pub count: usize,
  pub color: ClassColor,
}

/// 柱状图数据中的一项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidencePoint {
  pub label: String,
  /// 百分比，保留一位小数
  pub value: f64,
  pub color: ClassColor,
}

pub fn class_counts(detections: &[Detection]) -> ClassCounts {
  let mut index: HashMap<&ClassLabel, usize> = HashMap::new();
  let mut entries: Vec<(ClassLabel, usize)> = Vec::new();

  for det in detections {
    match index.get(&det.class) {
      Some(&at) => entries[at].1 += 1,
      None => {
        index.insert(&det.class, entries.len());
        entries.push((det.class.clone(), 1));
      }
    }
  }

  ClassCounts { entries }
}

pub fn class_distribution(detections: &[Detection]) -> Vec<ClassShare> {
  class_counts(detections)
    .iter()
    .map(|(class, count)| ClassShare {
      class: class.clone(),
      count,
      color: color_for_class(class.as_str()),
    })
    .collect()
}

pub fn confidence_series(detections: &[Detection]) -> Vec<ConfidencePoint> {
  detections
    .iter()
    .enumerate()
    .map(|(i, det)| ConfidencePoint {
      label: format!("Object {}", i + 1),
      value: confidence_percent(det.confidence),
      color: color_for_class(det.class.as_str()),
    })
    .collect()
}

fn confidence_percent(confidence: f32) -> f64 {
  (confidence as f64 * 1000.0).round() / 10.0
}
