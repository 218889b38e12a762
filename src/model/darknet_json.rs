// 该文件是 Odol （超限货车） 项目的一部分。
// src/model/darknet_json.rs - 读取 darknet JSON 检测结果
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  collections::HashMap,
  fs::File,
  io::BufReader,
  path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::{Detection, RelativeBox},
  frame::Frame,
  model::Detector,
  normalize::{NormalizeError, to_pixel},
  url_path,
};

#[derive(Error, Debug)]
pub enum DarknetJsonError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("没有图像 {0} 的检测记录")]
  NoRecord(String),
  #[error("坐标转换错误: {0}")]
  NormalizeError(#[from] NormalizeError),
}

#[derive(Debug, Clone, Deserialize)]
struct RelativeCoordinates {
  center_x: f32,
  center_y: f32,
  width: f32,
  height: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct DarknetObject {
  #[serde(default)]
  class_id: Option<usize>,
  name: String,
  relative_coordinates: RelativeCoordinates,
  confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct DarknetFrame {
  #[serde(default)]
  frame_id: Option<u64>,
  filename: String,
  #[serde(default)]
  objects: Vec<DarknetObject>,
}

/// 回放 darknet `-out result.json` 的检测结果
///
/// 按完整文件名匹配图像，找不到时再按文件名（不含目录）匹配。
#[derive(Debug, Clone)]
pub struct DarknetJsonDetector {
  records: HashMap<String, Vec<DarknetObject>>,
  by_file_name: HashMap<String, String>,
}

impl FromUrlWithScheme for DarknetJsonDetector {
  const SCHEME: &'static str = "darknet-json";
}

impl FromUrl for DarknetJsonDetector {
  type Error = DarknetJsonError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DarknetJsonError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Self::from_path(url_path(url))
  }
}

fn file_name_of(name: &str) -> Option<String> {
  Path::new(name)
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
}

impl DarknetJsonDetector {
  pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, DarknetJsonError> {
    let path = path.into();
    info!("加载检测结果文件: {}", path.display());
    let reader = BufReader::new(File::open(&path)?);
    let frames: Vec<DarknetFrame> = serde_json::from_reader(reader)?;
    Ok(Self::from_frames(frames))
  }

  pub fn from_json(json: &str) -> Result<Self, DarknetJsonError> {
    let frames: Vec<DarknetFrame> = serde_json::from_str(json)?;
    Ok(Self::from_frames(frames))
  }

  fn from_frames(frames: Vec<DarknetFrame>) -> Self {
    let mut records = HashMap::with_capacity(frames.len());
    let mut by_file_name = HashMap::with_capacity(frames.len());

    for frame in frames {
      debug!(
        "帧 {:?}: {} 包含 {} 个目标",
        frame.frame_id,
        frame.filename,
        frame.objects.len()
      );
      if let Some(file_name) = file_name_of(&frame.filename) {
        by_file_name
          .entry(file_name)
          .or_insert_with(|| frame.filename.clone());
      }
      if records.insert(frame.filename.clone(), frame.objects).is_some() {
        warn!("重复的检测记录，使用最后一条: {}", frame.filename);
      }
    }

    info!("共加载 {} 张图像的检测记录", records.len());
    Self {
      records,
      by_file_name,
    }
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  fn lookup(&self, name: &str) -> Option<&[DarknetObject]> {
    if let Some(objects) = self.records.get(name) {
      return Some(objects.as_slice());
    }
    let key = self.by_file_name.get(&file_name_of(name)?)?;
    self.records.get(key).map(Vec::as_slice)
  }
}

impl Detector for DarknetJsonDetector {
  type Error = DarknetJsonError;

  fn detect(
    &self,
    frame: &Frame,
    confidence_threshold: f32,
  ) -> Result<Vec<Detection>, Self::Error> {
    let objects = self
      .lookup(frame.name())
      .ok_or_else(|| DarknetJsonError::NoRecord(frame.name().to_string()))?;

    objects
      .iter()
      .filter(|obj| obj.confidence >= confidence_threshold)
      .map(|obj| {
        let coords = &obj.relative_coordinates;
        let relative = RelativeBox {
          x: coords.center_x,
          y: coords.center_y,
          w: coords.width,
          h: coords.height,
        };
        let bbox = to_pixel(&relative, frame.height(), frame.width())?;
        debug!(
          "{} (类别 {:?}): {:.2}% at ({:.0}, {:.0}, {:.0}x{:.0})",
          obj.name,
          obj.class_id,
          obj.confidence * 100.0,
          bbox.cx,
          bbox.cy,
          bbox.w,
          bbox.h
        );
        Ok(Detection::new(obj.name.clone(), obj.confidence, bbox))
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;
  use image::RgbImage;

  const RESULT_JSON: &str = r#"[
{
 "frame_id":1,
 "filename":"data/truk/truk-001.jpg",
 "objects": [
  {"class_id":0, "name":"roda", "relative_coordinates":{"center_x":0.25, "center_y":0.75, "width":0.1, "height":0.2}, "confidence":0.98},
  {"class_id":0, "name":"roda", "relative_coordinates":{"center_x":0.75, "center_y":0.75, "width":0.1, "height":0.2}, "confidence":0.40},
  {"class_id":1, "name":"truk_odol", "relative_coordinates":{"center_x":0.5, "center_y":0.5, "width":0.8, "height":0.6}, "confidence":0.91}
 ]
},
{
 "frame_id":2,
 "filename":"data/truk/truk-002.jpg",
 "objects": [ ]
}
]"#;

  fn frame(name: &str) -> Frame {
    Frame::new(name, RgbImage::new(400, 200))
  }

  #[test]
  fn test_replay_exact_filename() {
    let detector = DarknetJsonDetector::from_json(RESULT_JSON).unwrap();
    assert_eq!(detector.len(), 2);

    let dets = detector.detect(&frame("data/truk/truk-001.jpg"), 0.1).unwrap();
    assert_eq!(dets.len(), 3);
    assert_eq!(dets[0].label(), "roda");
    assert_relative_eq!(dets[0].bbox().cx, 100.0, epsilon = 1e-3);
    assert_relative_eq!(dets[0].bbox().cy, 150.0, epsilon = 1e-3);
    assert_relative_eq!(dets[0].bbox().w, 40.0, epsilon = 1e-3);
    assert_relative_eq!(dets[0].bbox().h, 40.0, epsilon = 1e-3);
    assert_eq!(dets[2].label(), "truk_odol");
    assert_relative_eq!(dets[2].bbox().w, 320.0, epsilon = 1e-3);
  }

  #[test]
  fn test_threshold_and_file_name_fallback() {
    let detector = DarknetJsonDetector::from_json(RESULT_JSON).unwrap();
    let dets = detector.detect(&frame("/mnt/other/truk-001.jpg"), 0.5).unwrap();
    assert_eq!(dets.len(), 2);
    assert!(dets.iter().all(|d| d.confidence() >= 0.5));

    assert!(
      detector
        .detect(&frame("truk-002.jpg"), 0.5)
        .unwrap()
        .is_empty()
    );
  }

  #[test]
  fn test_missing_record() {
    let detector = DarknetJsonDetector::from_json(RESULT_JSON).unwrap();
    assert!(matches!(
      detector.detect(&frame("truk-404.jpg"), 0.5),
      Err(DarknetJsonError::NoRecord(name)) if name == "truk-404.jpg"
    ));
  }

  #[test]
  fn test_scheme_mismatch() {
    let url = Url::parse("image:///tmp/result.json").unwrap();
    assert!(matches!(
      DarknetJsonDetector::from_url(&url),
      Err(DarknetJsonError::SchemeMismatch(_))
    ));
  }
}
