// 该文件是 Odol （超限货车） 项目的一部分。
// src/output/report.rs - 判定报告（JSON Lines）
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

use std::{
  fs::{File, OpenOptions},
  io::{BufWriter, Write},
  sync::Mutex,
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::Render,
  pipeline::{ImageOutcome, ImageReport},
  url_path,
};

#[derive(Error, Debug)]
pub enum ReportOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("报告文件路径为空")]
  EmptyPath,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("报告文件被锁定")]
  Poisoned,
}

/// 每张图像追加一行 JSON
pub struct ReportOutput {
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for ReportOutput {
  const SCHEME: &'static str = "report";
}

impl FromUrl for ReportOutput {
  type Error = ReportOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(ReportOutputError::SchemeMismatch);
    }
    let path = url_path(uri);
    if path.as_os_str().is_empty() {
      return Err(ReportOutputError::EmptyPath);
    }
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    info!("判定报告写入: {}", path.display());
    Ok(ReportOutput {
      writer: Mutex::new(BufWriter::new(file)),
    })
  }
}

/// 生成报告中的一行，不含换行符
pub fn to_json_line(report: &ImageReport, at: DateTime<Utc>) -> Result<String, serde_json::Error> {
  let error = match &report.outcome {
    ImageOutcome::Unresolved(err) => Some(err.to_string()),
    ImageOutcome::DetectionFailed(msg) => Some(msg.clone()),
    _ => None,
  };

  let mut line = json!({
    "image": report.image_id,
    "evaluated_at": at.to_rfc3339_opts(SecondsFormat::Millis, true),
    "width": report.shape.width,
    "height": report.shape.height,
    "outcome": report.outcome.kind(),
    "legal": report.outcome.is_legal(),
    "detections": report.detections,
  });

  if let Value::Object(fields) = &mut line {
    if let Some(verdict) = report.outcome.verdict() {
      fields.insert("verdict".to_string(), serde_json::to_value(verdict)?);
    }
    if let Some(landmarks) = report.outcome.landmarks() {
      fields.insert("roles".to_string(), serde_json::to_value(landmarks)?);
    }
    if let Some(error) = error {
      fields.insert("error".to_string(), Value::String(error));
    }
  }

  serde_json::to_string(&line)
}

impl Render<Frame, ImageReport> for ReportOutput {
  type Error = ReportOutputError;

  fn render_result(&self, _frame: &Frame, result: &ImageReport) -> Result<(), Self::Error> {
    let line = to_json_line(result, Utc::now())?;
    let mut writer = self.writer.lock().map_err(|_| ReportOutputError::Poisoned)?;
    writeln!(writer, "{}", line)?;
    writer.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    batch::ImageShape,
    detection::{Detection, PixelBox},
    landmark::{LandmarkError, LandmarkSet},
    overhang::OverhangRule,
  };
  use chrono::TimeZone;
  use image::RgbImage;

  fn shape() -> ImageShape {
    ImageShape {
      height: 480,
      width: 640,
      channels: 3,
    }
  }

  fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap()
  }

  #[test]
  fn test_verdict_line() {
    let landmarks = LandmarkSet {
      front_wheel: Detection::new("roda", 0.9, PixelBox::new(100.0, 250.0, 40.0, 40.0)),
      rear_wheel: Detection::new("roda", 0.8, PixelBox::new(300.0, 250.0, 40.0, 40.0)),
      chassis: Detection::new("truk_odol", 0.95, PixelBox::new(200.0, 200.0, 250.0, 150.0)),
      auxiliary: Vec::new(),
    };
    let verdict = OverhangRule::default().evaluate_landmarks(&landmarks);
    let report = ImageReport {
      image_id: "truk-001.jpg".to_string(),
      shape: shape(),
      detections: vec![landmarks.chassis.clone()],
      outcome: ImageOutcome::Verdict { landmarks, verdict },
    };

    let line = to_json_line(&report, at()).unwrap();
    assert!(!line.contains('\n'));
    let value: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["image"], "truk-001.jpg");
    assert_eq!(value["evaluated_at"], "2026-03-01T08:30:00.000Z");
    assert_eq!(value["outcome"], "legal");
    assert_eq!(value["legal"], true);
    assert_eq!(value["width"], 640);
    assert_eq!(value["verdict"]["axle_spacing"], 200.0);
    assert_eq!(value["roles"]["chassis"]["label"], "truk_odol");
    assert_eq!(value["detections"].as_array().unwrap().len(), 1);
    assert!(value.get("error").is_none());
  }

  #[test]
  fn test_unresolved_line() {
    let report = ImageReport {
      image_id: "truk-002.jpg".to_string(),
      shape: shape(),
      detections: Vec::new(),
      outcome: ImageOutcome::Unresolved(LandmarkError::AmbiguousLandmarks { count: 6 }),
    };
    let value: Value = serde_json::from_str(&to_json_line(&report, at()).unwrap()).unwrap();
    assert_eq!(value["outcome"], "ambiguous_landmarks");
    assert!(value["legal"].is_null());
    assert!(value.get("verdict").is_none());
    assert!(value.get("roles").is_none());
    assert!(value["error"].as_str().unwrap().contains('6'));
  }

  #[test]
  fn test_render_appends() {
    let dir = std::env::temp_dir().join(format!("odol-report-{}", std::process::id()));
    let path = dir.join("run.jsonl");
    let url = Url::parse(&format!("report://{}", path.display())).unwrap();
    let report = ImageReport {
      image_id: "truk-003.jpg".to_string(),
      shape: shape(),
      detections: Vec::new(),
      outcome: ImageOutcome::DetectionFailed("timeout".to_string()),
    };
    let frame = Frame::new("truk-003.jpg", RgbImage::new(1, 1));

    let output = ReportOutput::from_url(&url).unwrap();
    output.render_result(&frame, &report).unwrap();
    output.render_result(&frame, &report).unwrap();
    drop(output);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.contains("\"detection_failed\""));

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
