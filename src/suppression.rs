// 该文件是 Odol （超限货车） 项目的一部分。
// src/suppression.rs - 置信度过滤与非极大值抑制
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
use tracing::debug;

use crate::detection::Detection;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
pub const DEFAULT_HIER_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SuppressionError {
  #[error("置信度阈值必须在 0 与 1 之间（不含端点）: {0}")]
  InvalidConfidenceThreshold(f32),
  #[error("NMS 阈值必须在 0 与 1 之间: {0}")]
  InvalidNmsThreshold(f32),
  #[error("层级阈值必须在 0 与 1 之间: {0}")]
  InvalidHierThreshold(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuppressionConfig {
  /// 置信度阈值
  pub confidence_threshold: f32,
  /// NMS IoU 阈值，`None` 时不做抑制
  pub nms_threshold: Option<f32>,
  /// 层级分类阈值，直接交给检测器的批量接口
  pub hier_threshold: f32,
}

impl Default for SuppressionConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      nms_threshold: Some(DEFAULT_NMS_THRESHOLD),
      hier_threshold: DEFAULT_HIER_THRESHOLD,
    }
  }
}

impl SuppressionConfig {
  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  /// 阈值为 0 时关闭 NMS
  pub fn with_nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = (threshold != 0.0).then_some(threshold);
    self
  }

  pub fn with_hier_threshold(mut self, threshold: f32) -> Self {
    self.hier_threshold = threshold;
    self
  }

  pub fn validate(&self) -> Result<(), SuppressionError> {
    let thresh = self.confidence_threshold;
    if !(thresh > 0.0 && thresh < 1.0) {
      return Err(SuppressionError::InvalidConfidenceThreshold(thresh));
    }
    if let Some(nms) = self.nms_threshold
      && !(nms > 0.0 && nms <= 1.0)
    {
      return Err(SuppressionError::InvalidNmsThreshold(nms));
    }
    let hier = self.hier_threshold;
    if !(0.0..=1.0).contains(&hier) {
      return Err(SuppressionError::InvalidHierThreshold(hier));
    }
    Ok(())
  }
}

/// 单张图像检测结果的过滤器，配置在构造时校验
#[derive(Debug, Clone)]
pub struct SuppressionFilter {
  config: SuppressionConfig,
}

impl SuppressionFilter {
  pub fn new(config: SuppressionConfig) -> Result<Self, SuppressionError> {
    config.validate()?;
    Ok(Self { config })
  }

  pub fn config(&self) -> &SuppressionConfig {
    &self.config
  }

  /// 过滤低置信度结果后按类别做贪心 NMS。
  ///
  /// 置信度高者优先，置信度相同时检测器输出顺序靠前者优先。
  /// 返回值保持检测器的输出顺序。
  pub fn filter(&self, detections: &[Detection]) -> Vec<Detection> {
    let candidates: Vec<&Detection> = detections
      .iter()
      .filter(|det| det.confidence() >= self.config.confidence_threshold)
      .collect();

    let Some(nms) = self.config.nms_threshold else {
      return candidates.into_iter().cloned().collect();
    };

    // 稳定排序，相同置信度保持原有顺序
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
      candidates[b]
        .confidence()
        .total_cmp(&candidates[a].confidence())
    });

    let mut suppressed = vec![false; candidates.len()];
    for (rank, &best) in order.iter().enumerate() {
      if suppressed[best] {
        continue;
      }
      for &other in &order[rank + 1..] {
        if suppressed[other] || candidates[other].label() != candidates[best].label() {
          continue;
        }
        let iou = candidates[best].bbox().iou(candidates[other].bbox());
        if iou >= nms {
          debug!(
            "抑制重复检测 {} ({:.4}), IoU = {:.4}",
            candidates[other].label(),
            candidates[other].confidence(),
            iou
          );
          suppressed[other] = true;
        }
      }
    }

    candidates
      .into_iter()
      .zip(suppressed)
      .filter(|(_, suppressed)| !suppressed)
      .map(|(det, _)| det.clone())
      .collect()
  }
}
