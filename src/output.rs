// 该文件是 Odol （超限货车） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, dataset::ClassNames, frame::Frame, pipeline::ImageReport,
};

pub trait Render<F, O>: Sized {
  type Error;
  fn render_result(&self, frame: &F, result: &O) -> Result<(), Self::Error>;
}

/// 依次交给每个输出，遇到第一个错误即返回
impl<F, O, R: Render<F, O>> Render<F, O> for Vec<R> {
  type Error = R::Error;

  fn render_result(&self, frame: &F, result: &O) -> Result<(), Self::Error> {
    for output in self {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}

mod annotation;
mod console;
mod report;

pub use self::annotation::{AnnotationOutput, AnnotationOutputError};
pub use self::console::{ConsoleOutput, ConsoleOutputError, format_report};
pub use self::report::{ReportOutput, ReportOutputError, to_json_line};

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{AnnotatedImageOutput, SaveImageFileError, uniquify};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("控制台输出错误: {0}")]
  ConsoleOutputError(#[from] ConsoleOutputError),
  #[error("标注文件输出错误: {0}")]
  AnnotationOutputError(#[from] AnnotationOutputError),
  #[error("判定报告输出错误: {0}")]
  ReportOutputError(#[from] ReportOutputError),
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  ConsoleOutput(ConsoleOutput),
  AnnotationOutput(AnnotationOutput),
  ReportOutput(ReportOutput),
  #[cfg(feature = "save_image_file")]
  AnnotatedImageOutput(AnnotatedImageOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ConsoleOutput::SCHEME => Ok(OutputWrapper::ConsoleOutput(ConsoleOutput::from_url(url)?)),
      AnnotationOutput::SCHEME => Ok(OutputWrapper::AnnotationOutput(
        AnnotationOutput::from_url(url)?,
      )),
      ReportOutput::SCHEME => Ok(OutputWrapper::ReportOutput(ReportOutput::from_url(url)?)),
      #[cfg(feature = "save_image_file")]
      AnnotatedImageOutput::SCHEME => Ok(OutputWrapper::AnnotatedImageOutput(
        AnnotatedImageOutput::from_url(url)?,
      )),
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl OutputWrapper {
  /// 标注文件需要类别名称表来查类别编号
  pub fn with_class_names(self, class_names: Arc<ClassNames>) -> Self {
    match self {
      OutputWrapper::AnnotationOutput(output) => {
        OutputWrapper::AnnotationOutput(output.with_class_names(class_names))
      }
      other => other,
    }
  }
}

impl Render<Frame, ImageReport> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &ImageReport) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::ConsoleOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::AnnotationOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::ReportOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::AnnotatedImageOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dispatch_by_scheme() {
    let url = Url::parse("console:?ext").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::ConsoleOutput(_))
    ));

    let url = Url::parse("labels:").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::AnnotationOutput(_))
    ));

    let url = Url::parse("rtsp://localhost/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
  }
}
