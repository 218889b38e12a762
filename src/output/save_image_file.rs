// 该文件是 Odol （超限货车） 项目的一部分。
// src/output/save_image_file.rs - 保存标注后的图像文件
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

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::{Render, draw::Draw},
  pipeline::ImageReport,
  url_path,
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把标注后的图像保存到目录，不覆盖已有文件
pub struct AnnotatedImageOutput {
  directory: PathBuf,
  draw: Draw,
}

impl FromUrlWithScheme for AnnotatedImageOutput {
  const SCHEME: &'static str = "draw";
}

impl FromUrl for AnnotatedImageOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut draw = Draw::default();
    if let Some((_, font)) = uri.query_pairs().find(|(k, _)| k == "font") {
      draw = draw.with_font(Draw::load_font(Path::new(&*font))?);
    } else {
      warn!("未指定字体，标注图像中不绘制文字");
    }

    let directory = url_path(uri);
    std::fs::create_dir_all(&directory)?;

    Ok(AnnotatedImageOutput { directory, draw })
  }
}

/// 目标文件已存在时依次尝试 `name (1).ext`、`name (2).ext`……
pub fn uniquify(path: &Path) -> PathBuf {
  if !path.exists() {
    return path.to_path_buf();
  }

  let stem = path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  let extension = path
    .extension()
    .map(|e| format!(".{}", e.to_string_lossy()))
    .unwrap_or_default();

  let mut counter = 1;
  loop {
    let candidate = path.with_file_name(format!("{} ({}){}", stem, counter, extension));
    if !candidate.exists() {
      return candidate;
    }
    counter += 1;
  }
}

impl AnnotatedImageOutput {
  fn target_path(&self, image_id: &str) -> PathBuf {
    let name = Path::new(image_id)
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "frame.png".to_string());
    uniquify(&self.directory.join(name))
  }
}

impl Render<Frame, ImageReport> for AnnotatedImageOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &ImageReport) -> Result<(), Self::Error> {
    let image = self.draw.draw_report(frame.image(), result);
    let path = self.target_path(&result.image_id);
    image.save(&path)?;
    info!("保存图像到文件: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{batch::ImageShape, landmark::LandmarkError, pipeline::ImageOutcome};
  use image::RgbImage;

  fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("odol-draw-{}-{}", name, std::process::id()))
  }

  #[test]
  fn test_uniquify() {
    let dir = temp_dir("uniquify");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("truk.jpg");
    assert_eq!(uniquify(&path), path);

    std::fs::write(&path, b"").unwrap();
    assert_eq!(uniquify(&path), dir.join("truk (1).jpg"));
    std::fs::write(dir.join("truk (1).jpg"), b"").unwrap();
    assert_eq!(uniquify(&path), dir.join("truk (2).jpg"));

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn test_render_saves_without_overwrite() {
    let dir = temp_dir("render");
    let url = Url::parse(&format!("draw://{}", dir.display())).unwrap();
    let output = AnnotatedImageOutput::from_url(&url).unwrap();

    let frame = Frame::new("/data/truk/truk-005.png", RgbImage::new(32, 16));
    let report = ImageReport {
      image_id: frame.name().to_string(),
      shape: ImageShape {
        height: 16,
        width: 32,
        channels: 3,
      },
      detections: Vec::new(),
      outcome: ImageOutcome::Unresolved(LandmarkError::InsufficientLandmarks { count: 0 }),
    };
    output.render_result(&frame, &report).unwrap();
    output.render_result(&frame, &report).unwrap();

    assert!(dir.join("truk-005.png").is_file());
    assert!(dir.join("truk-005 (1).png").is_file());

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn test_missing_font_is_error() {
    let url = Url::parse("draw:///tmp/odol-draw?font=/tidak/ada.ttf").unwrap();
    assert!(matches!(
      AnnotatedImageOutput::from_url(&url),
      Err(SaveImageFileError::IoError(_))
    ));
  }
}
