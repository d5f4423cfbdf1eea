// 该文件是 Kanjian （看见） 项目的一部分。
// src/input.rs - 图像输入与解码
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
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

mod read_image_file;
pub use self::read_image_file::ImageFileInputError;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("无法读取图像文件 {}: {source}", .path.display())]
  FileRead {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("不是有效的图像: {0}")]
  InvalidImage(#[from] image::ImageError),
  #[error("解码任务异常终止: {0}")]
  TaskAborted(#[from] tokio::task::JoinError),
}

impl DecodeError {
  /// 读取阶段失败（而非解码阶段）
  pub fn is_file_read(&self) -> bool {
    matches!(self, DecodeError::FileRead { .. })
  }
}

/// 待检测的图像数据
///
/// 本地文件在读取前只记录路径；远程下载或其它途径得到的数据直接放在内存里，
/// 两者在解码之后没有区别。
#[derive(Debug, Clone)]
pub enum ImageBlob {
  File(PathBuf),
  Memory {
    name: Option<String>,
    bytes: Arc<[u8]>,
  },
}

impl ImageBlob {
  pub fn from_path(path: impl Into<PathBuf>) -> Self {
    ImageBlob::File(path.into())
  }

  pub fn from_bytes(name: Option<String>, bytes: impl Into<Vec<u8>>) -> Self {
    ImageBlob::Memory {
      name,
      bytes: Arc::from(bytes.into()),
    }
  }

  /// 用于日志和报告的名称
  pub fn name(&self) -> String {
    match self {
      ImageBlob::File(path) => path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string()),
      ImageBlob::Memory { name, .. } => name.clone().unwrap_or_else(|| "<memory>".to_string()),
    }
  }

  pub fn path(&self) -> Option<&Path> {
    match self {
      ImageBlob::File(path) => Some(path),
      ImageBlob::Memory { .. } => None,
    }
  }
}

/// 解码后的位图，克隆开销很小
#[derive(Debug, Clone)]
pub struct Bitmap {
  image: Arc<RgbImage>,
}

impl Bitmap {
  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  pub fn as_rgb_image(&self) -> &RgbImage {
    &self.image
  }
}

impl From<RgbImage> for Bitmap {
  fn from(image: RgbImage) -> Self {
    Self {
      image: Arc::new(image),
    }
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDecoder;

impl ImageDecoder {
  pub fn new() -> Self {
    Self
  }

  /// 读取原始字节
  pub async fn read(&self, blob: &ImageBlob) -> Result<Arc<[u8]>, DecodeError> {
    match blob {
      ImageBlob::File(path) => {
        let bytes = tokio::fs::read(path)
          .await
          .map_err(|source| DecodeError::FileRead {
            path: path.clone(),
            source,
          })?;
        debug!("读取图像文件: {} ({} 字节)", path.display(), bytes.len());
        Ok(Arc::from(bytes))
      }
      ImageBlob::Memory { bytes, .. } => Ok(bytes.clone()),
    }
  }

  /// 把字节解码为位图，解码在阻塞线程池中进行
  pub async fn decode_bytes(&self, bytes: Arc<[u8]>) -> Result<Bitmap, DecodeError> {
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
    Ok(Bitmap::from(image.to_rgb8()))
  }

  pub async fn decode(&self, blob: &ImageBlob) -> Result<Bitmap, DecodeError> {
    let now = Instant::now();
    let bytes = self.read(blob).await?;
    let bitmap = self.decode_bytes(bytes).await?;
    info!(
      "图像解码完成: {} {}x{}，耗时: {:.2?}",
      blob.name(),
      bitmap.width(),
      bitmap.height(),
      now.elapsed()
    );
    Ok(bitmap)
  }
}
