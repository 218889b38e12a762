// 该文件是 Odol （超限货车） 项目的一部分。
// src/model.rs - 检测器接口
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::{detection::Detection, frame::Frame};

/// 外部目标检测器。
///
/// 实现者需要保证同一张图像的检测结果顺序稳定，地标选择依赖这一顺序。
pub trait Detector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn detect(&self, frame: &Frame, confidence_threshold: f32)
  -> Result<Vec<Detection>, Self::Error>;

  /// 批量检测，每张图像对应一个结果，顺序与输入一致。
  ///
  /// 默认逐张调用 [`Detector::detect`]，层级阈值和 NMS 阈值交给支持它们的实现。
  fn detect_batch(
    &self,
    frames: &[Frame],
    batch_size: usize,
    confidence_threshold: f32,
    _hier_threshold: f32,
    _nms_threshold: Option<f32>,
  ) -> Vec<Result<Vec<Detection>, Self::Error>> {
    frames
      .iter()
      .take(batch_size)
      .map(|frame| self.detect(frame, confidence_threshold))
      .collect()
  }
}

mod darknet_json;
pub use self::darknet_json::{DarknetJsonDetector, DarknetJsonError};
