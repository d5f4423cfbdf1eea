// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/overlay.rs - 目标检测结果可视化
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

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::color::color_for_class;
use crate::detection::Detection;
use crate::input::{Bitmap, ImageBlob, ImageDecoder};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 14.0;
const LABEL_HEIGHT: i64 = 20;
const LABEL_TEXT_INSET: i64 = 5;
const LABEL_PADDING: i64 = 10;
const LABEL_CHAR_WIDTH: f32 = 8.0; // 没有字体时按字符数估算宽度
const STROKE_WIDTH: u32 = 3;
const TEXT_COLOR: [u8; 3] = [255, 255, 255]; // 白色

/// 超出此范围的坐标按此截断，避免后续加减溢出
const COORD_LIMIT: i64 = 1 << 40;

/// 内置字体
static EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/font.ttf");

#[derive(Error, Debug)]
pub enum FontError {
  #[error("无法读取字体文件 {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("字体数据无效: {0}")]
  Invalid(#[from] ab_glyph::InvalidFont),
}

/// 标签文字使用的字体
#[derive(Clone, Debug)]
pub struct LabelFont(FontArc);

impl LabelFont {
  pub fn from_bytes(data: Vec<u8>) -> Result<Self, FontError> {
    Ok(Self(FontArc::try_from_vec(data)?))
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FontError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| FontError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_bytes(data)
  }

  /// 随程序一起分发的默认字体
  pub fn embedded() -> Result<Self, FontError> {
    debug!("使用内置字体");
    Ok(Self(FontArc::try_from_slice(EMBEDDED_FONT)?))
  }
}

/// 叠加层样式
#[derive(Debug, Clone)]
pub struct OverlayStyle {
  pub stroke_width: u32,
  /// 标签背景高度，背景底边贴着边框上沿
  pub label_height: i64,
  /// 文字相对背景左边和边框上沿的缩进
  pub text_inset: i64,
  /// 标签背景比文字多出的宽度
  pub label_padding: i64,
  pub font_size: f32,
  pub text_color: [u8; 3],
  pub fallback_char_width: f32,
}

impl Default for OverlayStyle {
  fn default() -> Self {
    Self {
      stroke_width: STROKE_WIDTH,
      label_height: LABEL_HEIGHT,
      text_inset: LABEL_TEXT_INSET,
      label_padding: LABEL_PADDING,
      font_size: LABEL_FONT_SIZE,
      text_color: TEXT_COLOR,
      fallback_char_width: LABEL_CHAR_WIDTH,
    }
  }
}

/// 在源图像的副本上绘制边框和标签
///
/// 坐标原样使用，不缩放、不裁剪到图像范围；超出画布的部分由画布自身截掉。
/// 输出与输入像素尺寸相同。
pub struct OverlayRenderer {
  style: OverlayStyle,
  font: Option<LabelFont>,
}

impl OverlayRenderer {
  pub fn new(font: Option<LabelFont>) -> Self {
    Self::with_style(OverlayStyle::default(), font)
  }

  pub fn with_style(style: OverlayStyle, font: Option<LabelFont>) -> Self {
    if font.is_none() {
      warn!("未提供标签字体，只绘制标签背景");
    }
    Self { style, font }
  }

  pub fn style(&self) -> &OverlayStyle {
    &self.style
  }

  pub fn label_text(det: &Detection) -> String {
    format!("{} {}%", det.class, (det.confidence * 100.0).round() as i64)
  }

  pub fn render(&self, bitmap: &Bitmap, detections: &[Detection]) -> RgbImage {
    let mut image = bitmap.as_rgb_image().clone();
    for det in detections {
      self.draw_detection(&mut image, det);
    }
    image
  }

  /// 先解码再渲染；源图像加载失败时什么也不做
  pub async fn render_source(
    &self,
    decoder: &ImageDecoder,
    blob: &ImageBlob,
    detections: &[Detection],
  ) -> Option<RgbImage> {
    match decoder.decode(blob).await {
      Ok(bitmap) => Some(self.render(&bitmap, detections)),
      Err(err) => {
        info!("源图像加载失败，跳过渲染: {}", err);
        None
      }
    }
  }

  fn draw_detection(&self, image: &mut RgbImage, det: &Detection) {
    let color = color_for_class(det.class.as_str()).rgb();

    let x0 = to_pixel(det.bbox.x);
    let y0 = to_pixel(det.bbox.y);
    let x1 = to_pixel(det.bbox.right());
    let y1 = to_pixel(det.bbox.bottom());

    // 线宽以路径为中心
    let stroke = self.style.stroke_width.max(1) as i64;
    let lo = stroke / 2;
    let hi = stroke - lo - 1;

    fill_clipped(image, (x0 - lo, y0 - lo), (x1 + hi, y0 + hi), color);
    fill_clipped(image, (x0 - lo, y1 - lo), (x1 + hi, y1 + hi), color);
    fill_clipped(image, (x0 - lo, y0 - lo), (x0 + hi, y1 + hi), color);
    fill_clipped(image, (x1 - lo, y0 - lo), (x1 + hi, y1 + hi), color);

    // 标签背景在边框上方
    let label = Self::label_text(det);
    let label_width = self.text_width(&label) + self.style.label_padding;
    let label_top = y0 - self.style.label_height;
    let visible = fill_clipped(
      image,
      (x0, label_top),
      (x0 + label_width - 1, y0 - 1),
      color,
    );

    if let (true, Some(font)) = (visible, &self.font) {
      let scale = PxScale::from(self.style.font_size);
      let ascent = font.0.as_scaled(scale).ascent().round() as i64;
      let text_x = x0 + self.style.text_inset;
      let text_y = y0 - self.style.text_inset - ascent;
      if let (Ok(text_x), Ok(text_y)) = (i32::try_from(text_x), i32::try_from(text_y)) {
        draw_text_mut(
          image,
          Rgb(self.style.text_color),
          text_x,
          text_y,
          scale,
          &font.0,
          &label,
        );
      }
    }
  }

  fn text_width(&self, text: &str) -> i64 {
    match &self.font {
      Some(font) => text_size(PxScale::from(self.style.font_size), &font.0, text).0 as i64,
      None => (text.chars().count() as f32 * self.style.fallback_char_width).ceil() as i64,
    }
  }
}

fn to_pixel(v: f32) -> i64 {
  (v.round() as i64).clamp(-COORD_LIMIT, COORD_LIMIT)
}

/// 填充闭区间 [from, to] 内与画布相交的部分，返回是否有像素落在画布上
fn fill_clipped(image: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) -> bool {
  let (w, h) = (image.width() as i64, image.height() as i64);
  let x_start = from.0.max(0);
  let y_start = from.1.max(0);
  let x_end = to.0.min(w - 1);
  let y_end = to.1.min(h - 1);

  if x_start > x_end || y_start > y_end {
    return false;
  }

  let rect = Rect::at(x_start as i32, y_start as i32)
    .of_size((x_end - x_start + 1) as u32, (y_end - y_start + 1) as u32);
  draw_filled_rect_mut(image, rect, color);
  true
}
