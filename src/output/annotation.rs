// 该文件是 Odol （超限货车） 项目的一部分。
// src/output/annotation.rs - darknet 标注文件输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  dataset::ClassNames,
  detection::Detection,
  frame::Frame,
  output::Render,
  pipeline::ImageReport,
  url_path,
};

#[derive(Error, Debug)]
pub enum AnnotationOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("未设置类别名称表")]
  MissingClassNames,
  #[error("类别名称表中没有 {0}")]
  UnknownLabel(String),
  #[error("检测结果 {0} 没有相对坐标")]
  NotNormalized(String),
}

/// 每张图像写出一个 `<stem>.txt`，每行
/// `<类别编号> <x> <y> <w> <h> <置信度>`，坐标为相对值
pub struct AnnotationOutput {
  directory: Option<PathBuf>,
  class_names: Option<Arc<ClassNames>>,
}

impl FromUrlWithScheme for AnnotationOutput {
  const SCHEME: &'static str = "labels";
}

impl FromUrl for AnnotationOutput {
  type Error = AnnotationOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(AnnotationOutputError::SchemeMismatch);
    }
    let path = url_path(uri);
    let directory = (!path.as_os_str().is_empty()).then_some(path);
    Ok(AnnotationOutput {
      directory,
      class_names: None,
    })
  }
}

impl AnnotationOutput {
  pub fn new(directory: Option<PathBuf>, class_names: Arc<ClassNames>) -> Self {
    AnnotationOutput {
      directory,
      class_names: Some(class_names),
    }
  }

  pub fn with_class_names(mut self, class_names: Arc<ClassNames>) -> Self {
    self.class_names = Some(class_names);
    self
  }

  /// 标注文件路径：默认与图像同目录
  pub fn annotation_path(&self, image_id: &str) -> PathBuf {
    let image_path = Path::new(image_id);
    match &self.directory {
      Some(dir) => {
        let stem = image_path.file_stem().unwrap_or(image_path.as_os_str());
        dir.join(format!("{}.txt", stem.to_string_lossy()))
      }
      None => image_path.with_extension("txt"),
    }
  }

  pub fn format_lines(&self, detections: &[Detection]) -> Result<String, AnnotationOutputError> {
    let class_names = self
      .class_names
      .as_ref()
      .ok_or(AnnotationOutputError::MissingClassNames)?;

    let mut content = String::new();
    for det in detections {
      let index = class_names
        .index_of(det.label())
        .ok_or_else(|| AnnotationOutputError::UnknownLabel(det.label().to_string()))?;
      let rel = det
        .relative()
        .ok_or_else(|| AnnotationOutputError::NotNormalized(det.label().to_string()))?;
      content.push_str(&format!(
        "{} {:.4} {:.4} {:.4} {:.4} {:.4}\n",
        index,
        rel.x,
        rel.y,
        rel.w,
        rel.h,
        det.confidence()
      ));
    }
    Ok(content)
  }
}

impl Render<Frame, ImageReport> for AnnotationOutput {
  type Error = AnnotationOutputError;

  fn render_result(&self, _frame: &Frame, result: &ImageReport) -> Result<(), Self::Error> {
    let content = self.format_lines(&result.detections)?;
    let path = self.annotation_path(&result.image_id);
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    info!("标注已写入: {}", path.display());
    Ok(())
  }
}
