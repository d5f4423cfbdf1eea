// 该文件是 Kanjian （看见） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use kanjian::{
  DetectionPipeline, FromUrl,
  input::ImageBlob,
  model::OnnxYoloLoader,
  output::{DetectionReport, LabelFont, OverlayRenderer, SaveImageFileOutput},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  if let Some(output) = &args.output {
    info!("输出路径: {}", output);
  }

  let blob = ImageBlob::from_url(&args.input)?;
  let loader = OnnxYoloLoader::from_url(&args.model)?;
  let output = args
    .output
    .as_ref()
    .map(SaveImageFileOutput::from_url)
    .transpose()?;

  let pipeline = DetectionPipeline::new(loader);
  let analysis = pipeline.analyze(&blob).await?;

  let report = DetectionReport::new(blob.name(), &analysis);
  for line in report.summary_lines() {
    info!("{}", line);
  }
  for (i, det) in analysis.detections.iter().enumerate() {
    info!(
      "  #{} {}: {:.2}% at ({:.0}, {:.0}, {:.0}x{:.0})",
      i + 1,
      det.class,
      det.confidence * 100.0,
      det.bbox.x,
      det.bbox.y,
      det.bbox.width,
      det.bbox.height
    );
  }

  if let Some(output) = output {
    let font = match &args.font {
      Some(path) => LabelFont::from_file(path)?,
      None => LabelFont::embedded()?,
    };
    let renderer = OverlayRenderer::new(Some(font));
    let image = renderer.render(&analysis.bitmap, &analysis.detections);
    output.save(&image)?;
  }

  if let Some(path) = &args.report {
    report.save(path)?;
  }

  if analysis.is_empty() {
    info!("没有检测到目标");
  }

  Ok(())
}
