// 该文件是 Odol （超限货车） 项目的一部分。
// src/pipeline.rs - 检测结果到判定结果的处理流程
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

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  batch::{BatchError, HasShape, ImageShape, check_batch_shape},
  detection::Detection,
  frame::Frame,
  landmark::{LandmarkError, LandmarkSelector, LandmarkSet, RoleMatcher},
  model::Detector,
  normalize::{NormalizeError, normalize_detections},
  overhang::{LegalityVerdict, OverhangRule},
  suppression::{SuppressionConfig, SuppressionError, SuppressionFilter},
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("批次错误: {0}")]
  BatchError(#[from] BatchError),
  #[error("坐标转换错误: {0}")]
  NormalizeError(#[from] NormalizeError),
  #[error("过滤配置错误: {0}")]
  SuppressionError(#[from] SuppressionError),
  #[error("检测器错误: {0}")]
  DetectorError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
  pub suppression: SuppressionConfig,
  pub rule: OverhangRule,
  /// 轴距不为正时不给出判定
  pub reject_degenerate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
  Verdict {
    landmarks: LandmarkSet,
    verdict: LegalityVerdict,
  },
  DegenerateGeometry {
    landmarks: LandmarkSet,
    verdict: LegalityVerdict,
  },
  Unresolved(LandmarkError),
  DetectionFailed(String),
}

impl ImageOutcome {
  pub fn verdict(&self) -> Option<&LegalityVerdict> {
    match self {
      ImageOutcome::Verdict { verdict, .. } | ImageOutcome::DegenerateGeometry { verdict, .. } => {
        Some(verdict)
      }
      _ => None,
    }
  }

  pub fn landmarks(&self) -> Option<&LandmarkSet> {
    match self {
      ImageOutcome::Verdict { landmarks, .. }
      | ImageOutcome::DegenerateGeometry { landmarks, .. } => Some(landmarks),
      ImageOutcome::Unresolved(LandmarkError::Unclassified { landmarks, .. }) => Some(&**landmarks),
      _ => None,
    }
  }

  /// 只有给出判定时才有值
  pub fn is_legal(&self) -> Option<bool> {
    match self {
      ImageOutcome::Verdict { verdict, .. } => Some(verdict.legal),
      _ => None,
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      ImageOutcome::Verdict { verdict, .. } if verdict.legal => "legal",
      ImageOutcome::Verdict { .. } => "illegal",
      ImageOutcome::DegenerateGeometry { .. } => "degenerate_geometry",
      ImageOutcome::Unresolved(LandmarkError::InsufficientLandmarks { .. }) => {
        "insufficient_landmarks"
      }
      ImageOutcome::Unresolved(LandmarkError::AmbiguousLandmarks { .. }) => "ambiguous_landmarks",
      ImageOutcome::Unresolved(LandmarkError::Unclassified { .. }) => "unclassified",
      ImageOutcome::DetectionFailed(_) => "detection_failed",
    }
  }
}

/// 单张图像的处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReport {
  pub image_id: String,
  pub shape: ImageShape,
  /// 过滤后并附带相对坐标的检测结果，保持检测器输出顺序
  pub detections: Vec<Detection>,
  pub outcome: ImageOutcome,
}

pub struct Pipeline<M> {
  filter: SuppressionFilter,
  selector: LandmarkSelector<M>,
  rule: OverhangRule,
  reject_degenerate: bool,
}

impl<M: RoleMatcher> Pipeline<M> {
  pub fn new(config: PipelineConfig, matcher: M) -> Result<Self, PipelineError> {
    let filter = SuppressionFilter::new(config.suppression)?;
    Ok(Self {
      filter,
      selector: LandmarkSelector::new(matcher),
      rule: config.rule,
      reject_degenerate: config.reject_degenerate,
    })
  }

  pub fn suppression(&self) -> &SuppressionConfig {
    self.filter.config()
  }

  /// 对一张图像的原始检测结果做过滤、地标选择与判定
  pub fn evaluate(
    &self,
    image_id: &str,
    shape: ImageShape,
    raw: &[Detection],
  ) -> Result<ImageReport, PipelineError> {
    let filtered = self.filter.filter(raw);
    debug!(
      "{}: 过滤前 {} 个检测结果, 过滤后 {} 个",
      image_id,
      raw.len(),
      filtered.len()
    );
    let detections = normalize_detections(&filtered, shape.height, shape.width)?;
    let outcome = self.decide(image_id, &detections);

    Ok(ImageReport {
      image_id: image_id.to_string(),
      shape,
      detections,
      outcome,
    })
  }

  fn decide(&self, image_id: &str, detections: &[Detection]) -> ImageOutcome {
    let landmarks = match self.selector.select(detections) {
      Ok(landmarks) => landmarks,
      Err(e) => {
        warn!("{}: {}", image_id, e);
        return ImageOutcome::Unresolved(e);
      }
    };

    let verdict = self.rule.evaluate_landmarks(&landmarks);
    if verdict.is_degenerate() {
      warn!(
        "{}: 轴距 {:.2} 不为正，车轮检测可能顺序错乱或重复",
        image_id, verdict.axle_spacing
      );
      if self.reject_degenerate {
        return ImageOutcome::DegenerateGeometry { landmarks, verdict };
      }
    }

    info!(
      "{}: 前悬 {:.2}/{:.2}, 后悬 {:.2}/{:.2}, {}",
      image_id,
      verdict.front_overhang,
      verdict.front_threshold,
      verdict.rear_overhang,
      verdict.rear_threshold,
      if verdict.legal { "合法" } else { "违规" }
    );
    ImageOutcome::Verdict { landmarks, verdict }
  }

  /// 单张图像，检测器错误直接返回给调用方
  pub fn run_image<D: Detector>(
    &self,
    detector: &D,
    frame: &Frame,
  ) -> Result<ImageReport, PipelineError> {
    let raw = detector
      .detect(frame, self.suppression().confidence_threshold)
      .map_err(|e| PipelineError::DetectorError(Box::new(e)))?;
    self.evaluate(frame.name(), frame.shape(), &raw)
  }

  /// 批量处理。尺寸校验失败时不做任何检测；
  /// 单张图像的检测失败记录在该图像的结果中，其余图像继续处理。
  pub fn run_batch<D: Detector>(
    &self,
    detector: &D,
    frames: &[Frame],
    batch_size: usize,
  ) -> Result<Vec<ImageReport>, PipelineError> {
    let (height, width) = check_batch_shape(frames, batch_size)?;
    info!("批次: {} 张 {}x{} 图像", frames.len(), width, height);

    let config = self.suppression();
    let mut results = detector
      .detect_batch(
        frames,
        batch_size,
        config.confidence_threshold,
        config.hier_threshold,
        config.nms_threshold,
      )
      .into_iter();

    let mut reports = Vec::with_capacity(frames.len());
    for frame in frames {
      let report = match results.next() {
        Some(Ok(raw)) => self.evaluate(frame.name(), frame.shape(), &raw)?,
        Some(Err(e)) => {
          error!("{}: 检测失败: {}", frame.name(), e);
          self.failed(frame, e.to_string())
        }
        None => {
          error!("{}: 检测器没有返回结果", frame.name());
          self.failed(frame, "检测器没有返回结果".to_string())
        }
      };
      reports.push(report);
    }

    Ok(reports)
  }

  fn failed(&self, frame: &Frame, message: String) -> ImageReport {
    ImageReport {
      image_id: frame.name().to_string(),
      shape: frame.shape(),
      detections: Vec::new(),
      outcome: ImageOutcome::DetectionFailed(message),
    }
  }
}
