// 该文件是 Kanjian （看见） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

/// Kanjian 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 onnx:///models/yolov8n.onnx?confidence=0.5&nms=0.45
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入图像，例如 image:///data/street.jpg
  /// 支持格式: *.jpg, *.jpeg, *.png, *.gif, *.webp
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 叠加结果输出路径，例如 image:///data/street.out.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,

  /// JSON 报告输出路径
  #[arg(long, value_name = "FILE")]
  pub report: Option<PathBuf>,

  /// 标签字体文件（TTF/OTF），缺省时使用内置字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}
