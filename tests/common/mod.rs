#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio::sync::Notify;

use kanjian::RawPrediction;
use kanjian::input::Bitmap;
use kanjian::model::{DetectionModel, InferenceError, ModelLoadError, ModelLoader};

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
  encoded_bytes(width, height, ImageFormat::Png)
}

pub fn encoded_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
  let mut buf = Vec::new();
  DynamicImage::ImageRgb8(image)
    .write_to(&mut Cursor::new(&mut buf), format)
    .expect("encode image");
  buf
}

pub fn prediction(class: &str, score: f32, bbox: [f32; 4]) -> RawPrediction {
  RawPrediction {
    class: class.to_string(),
    score,
    bbox,
  }
}

#[derive(Debug)]
pub struct FakeModel {
  predictions: Vec<RawPrediction>,
  fail_inference: bool,
  pub seen_sizes: parking_lot::Mutex<Vec<(u32, u32)>>,
}

#[async_trait]
impl DetectionModel for FakeModel {
  async fn detect(&self, bitmap: &Bitmap) -> Result<Vec<RawPrediction>, InferenceError> {
    self.seen_sizes.lock().push(bitmap.dimensions());
    if self.fail_inference {
      return Err(InferenceError::new("malformed bitmap"));
    }
    Ok(self.predictions.clone())
  }
}

/// 可控的模型加载器：统计加载次数，可按次数失败，可用 Notify 卡住加载
pub struct FakeLoader {
  pub loads: Arc<AtomicUsize>,
  failures_left: AtomicUsize,
  gate: Option<Arc<Notify>>,
  predictions: Vec<RawPrediction>,
  fail_inference: bool,
}

impl FakeLoader {
  pub fn new(predictions: Vec<RawPrediction>) -> Self {
    Self {
      loads: Arc::new(AtomicUsize::new(0)),
      failures_left: AtomicUsize::new(0),
      gate: None,
      predictions,
      fail_inference: false,
    }
  }

  pub fn failing_loads(self, count: usize) -> Self {
    self.failures_left.store(count, Ordering::SeqCst);
    self
  }

  pub fn gated(mut self, gate: Arc<Notify>) -> Self {
    self.gate = Some(gate);
    self
  }

  pub fn failing_inference(mut self) -> Self {
    self.fail_inference = true;
    self
  }

  pub fn load_counter(&self) -> Arc<AtomicUsize> {
    self.loads.clone()
  }
}

#[async_trait]
impl ModelLoader for FakeLoader {
  type Model = FakeModel;

  async fn load(&self) -> Result<Self::Model, ModelLoadError> {
    self.loads.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &self.gate {
      gate.notified().await;
    }

    let failed = self
      .failures_left
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
      .is_ok();
    if failed {
      return Err(ModelLoadError::new("network unavailable"));
    }

    Ok(FakeModel {
      predictions: self.predictions.clone(),
      fail_inference: self.fail_inference,
      seen_sizes: parking_lot::Mutex::new(Vec::new()),
    })
  }
}
