mod common;

use std::sync::atomic::Ordering;

use common::{FakeLoader, encoded_bytes, png_bytes, prediction};
use image::ImageFormat;
use kanjian::input::ImageDecoder;
use kanjian::aggregate::{class_counts, confidence_series};
use kanjian::color::color_for_class;
use kanjian::input::ImageBlob;
use kanjian::{BBox, DetectionPipeline, PipelineErrorKind};

#[tokio::test]
async fn detects_single_dog() -> anyhow::Result<()> {
  let loader = FakeLoader::new(vec![prediction("dog", 0.93, [10.0, 10.0, 40.0, 40.0])]);
  let pipeline = DetectionPipeline::new(loader);
  let blob = ImageBlob::from_bytes(Some("dog.png".to_string()), png_bytes(100, 100));

  let analysis = pipeline.analyze(&blob).await?;
  assert_eq!(analysis.bitmap.dimensions(), (100, 100));

  let detections = analysis.detections;
  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].class.as_str(), "dog");
  assert_eq!(detections[0].confidence, 0.93);
  assert_eq!(detections[0].bbox, BBox::new(10.0, 10.0, 40.0, 40.0));

  let counts = class_counts(&detections);
  assert_eq!(counts.len(), 1);
  assert_eq!(counts.get("dog"), Some(1));

  let series = confidence_series(&detections);
  assert_eq!(series.len(), 1);
  assert_eq!(series[0].label, "Object 1");
  assert_eq!(series[0].value, 93.0);
  assert_eq!(series[0].color, color_for_class("dog"));

  Ok(())
}

#[tokio::test]
async fn passes_every_prediction_through_in_order() -> anyhow::Result<()> {
  let raw = vec![
    prediction("person", 0.12, [0.0, 0.0, 50.0, 80.0]),
    prediction("person", 0.99, [1.0, 1.0, 50.0, 80.0]),
    prediction("car", 0.01, [-30.0, 500.0, 900.0, 10.0]),
    prediction("person", 0.12, [0.0, 0.0, 50.0, 80.0]),
    prediction("traffic light", 0.5, [60.0, 5.0, 0.0, 0.0]),
  ];
  let pipeline = DetectionPipeline::new(FakeLoader::new(raw.clone()));
  let blob = ImageBlob::from_bytes(None, png_bytes(64, 48));

  let detections = pipeline.run(&blob).await?;
  assert_eq!(detections.len(), raw.len());
  for (det, raw) in detections.iter().zip(&raw) {
    assert_eq!(det.class.as_str(), raw.class);
    assert_eq!(det.confidence, raw.score);
    assert_eq!(<[f32; 4]>::from(det.bbox), raw.bbox);
  }

  Ok(())
}

#[tokio::test]
async fn empty_result_is_not_an_error() -> anyhow::Result<()> {
  let pipeline = DetectionPipeline::new(FakeLoader::new(Vec::new()));
  let blob = ImageBlob::from_bytes(None, png_bytes(10, 10));

  let analysis = pipeline.analyze(&blob).await?;
  assert!(analysis.is_empty());
  assert!(class_counts(&analysis.detections).is_empty());

  Ok(())
}

#[tokio::test]
async fn corrupt_bytes_fail_with_decode_error() {
  let loader = FakeLoader::new(vec![prediction("dog", 0.9, [0.0, 0.0, 1.0, 1.0])]);
  let loads = loader.load_counter();
  let pipeline = DetectionPipeline::new(loader);
  let blob = ImageBlob::from_bytes(Some("broken.jpg".to_string()), b"\xFF\xD8not really a jpeg".to_vec());

  let err = pipeline.run(&blob).await.unwrap_err();
  assert_eq!(err.kind(), PipelineErrorKind::Decode);
  // 解码失败时不会触及模型
  assert_eq!(loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_file_fails_with_file_read_error() -> anyhow::Result<()> {
  let dir = tempfile::tempdir()?;
  let pipeline = DetectionPipeline::new(FakeLoader::new(Vec::new()));
  let blob = ImageBlob::from_path(dir.path().join("missing.png"));

  let err = pipeline.run(&blob).await.unwrap_err();
  assert_eq!(err.kind(), PipelineErrorKind::FileRead);

  Ok(())
}

#[tokio::test]
async fn reads_image_from_disk() -> anyhow::Result<()> {
  let dir = tempfile::tempdir()?;
  let path = dir.path().join("sample.png");
  std::fs::write(&path, png_bytes(32, 24))?;

  let pipeline = DetectionPipeline::new(FakeLoader::new(vec![prediction(
    "cat",
    0.5,
    [1.0, 2.0, 3.0, 4.0],
  )]));
  let analysis = pipeline.analyze(&ImageBlob::from_path(&path)).await?;
  assert_eq!(analysis.bitmap.dimensions(), (32, 24));
  assert_eq!(analysis.detections.len(), 1);

  Ok(())
}

#[tokio::test]
async fn decodes_gif_webp_and_jpeg() -> anyhow::Result<()> {
  let decoder = ImageDecoder::new();
  for (name, format) in [
    ("sample.gif", ImageFormat::Gif),
    ("sample.webp", ImageFormat::WebP),
    ("sample.jpg", ImageFormat::Jpeg),
  ] {
    let blob = ImageBlob::from_bytes(Some(name.to_string()), encoded_bytes(21, 13, format));
    let bitmap = decoder.decode(&blob).await?;
    assert_eq!(bitmap.dimensions(), (21, 13), "{}", name);
  }

  Ok(())
}

#[tokio::test]
async fn load_failure_is_not_memoized() -> anyhow::Result<()> {
  let loader = FakeLoader::new(vec![prediction("dog", 0.9, [0.0, 0.0, 5.0, 5.0])]).failing_loads(1);
  let loads = loader.load_counter();
  let pipeline = DetectionPipeline::new(loader);
  let blob = ImageBlob::from_bytes(None, png_bytes(20, 20));

  let err = pipeline.run(&blob).await.unwrap_err();
  assert_eq!(err.kind(), PipelineErrorKind::ModelLoad);
  assert!(!pipeline.gateway().is_loaded());
  assert_eq!(loads.load(Ordering::SeqCst), 1);

  let detections = pipeline.run(&blob).await?;
  assert_eq!(detections.len(), 1);
  assert_eq!(loads.load(Ordering::SeqCst), 2);

  // 加载成功后不再重复加载
  pipeline.run(&blob).await?;
  assert_eq!(loads.load(Ordering::SeqCst), 2);

  Ok(())
}

#[tokio::test]
async fn inference_failure_is_reported_separately() {
  let pipeline = DetectionPipeline::new(FakeLoader::new(Vec::new()).failing_inference());
  let blob = ImageBlob::from_bytes(None, png_bytes(20, 20));

  let err = pipeline.run(&blob).await.unwrap_err();
  assert_eq!(err.kind(), PipelineErrorKind::Inference);
  // 模型本身已加载成功
  assert!(pipeline.gateway().is_loaded());
}

#[tokio::test]
async fn model_sees_decoded_bitmap() -> anyhow::Result<()> {
  let pipeline = DetectionPipeline::new(FakeLoader::new(Vec::new()));
  pipeline
    .run(&ImageBlob::from_bytes(None, png_bytes(7, 3)))
    .await?;

  let model = pipeline.gateway().ensure_loaded().await.map_err(|e| anyhow::anyhow!("{e}"))?;
  assert_eq!(*model.seen_sizes.lock(), vec![(7, 3)]);

  Ok(())
}
