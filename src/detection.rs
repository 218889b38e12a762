// 该文件是 Odol （超限货车） 项目的一部分。
// src/detection.rs - 检测结果定义
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

use serde::Serialize;

/// 像素坐标系下的边界框，(cx, cy) 为中心点
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelBox {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
}

impl PixelBox {
  pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self { cx, cy, w, h }
  }

  pub fn left(&self) -> f32 {
    self.cx - self.w / 2.0
  }

  pub fn right(&self) -> f32 {
    self.cx + self.w / 2.0
  }

  pub fn top(&self) -> f32 {
    self.cy - self.h / 2.0
  }

  pub fn bottom(&self) -> f32 {
    self.cy + self.h / 2.0
  }

  pub fn area(&self) -> f32 {
    self.w.max(0.0) * self.h.max(0.0)
  }

  /// 计算两个边界框的 IoU
  pub fn iou(&self, other: &PixelBox) -> f32 {
    let x1 = self.left().max(other.left());
    let y1 = self.top().max(other.top());
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

/// 相对坐标系下的边界框，各分量取值 0..1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RelativeBox {
  pub x: f32,
  pub y: f32,
  pub w: f32,
  pub h: f32,
}

/// 检测器输出的一条检测结果
///
/// 创建之后不再修改：后续阶段只做筛选，或者通过 [`Detection::with_relative`]
/// 生成一个附带相对坐标的新值。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  label: String,
  confidence: f32,
  bbox: PixelBox,
  #[serde(skip_serializing_if = "Option::is_none")]
  relative: Option<RelativeBox>,
}

impl Detection {
  pub fn new(label: impl Into<String>, confidence: f32, bbox: PixelBox) -> Self {
    Self {
      label: label.into(),
      confidence,
      bbox,
      relative: None,
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn bbox(&self) -> &PixelBox {
    &self.bbox
  }

  pub fn relative(&self) -> Option<&RelativeBox> {
    self.relative.as_ref()
  }

  pub fn with_relative(self, relative: RelativeBox) -> Self {
    Self {
      relative: Some(relative),
      ..self
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[test]
  fn test_box_edges() {
    let b = PixelBox::new(200.0, 100.0, 250.0, 50.0);
    assert_eq!(b.left(), 75.0);
    assert_eq!(b.right(), 325.0);
    assert_eq!(b.top(), 75.0);
    assert_eq!(b.bottom(), 125.0);
    assert_eq!(b.area(), 12500.0);
  }

  #[test]
  fn test_iou() {
    let a = PixelBox::new(5.0, 5.0, 10.0, 10.0);
    assert_relative_eq!(a.iou(&a), 1.0);

    // 右移一半：交集 50，并集 150
    let b = PixelBox::new(10.0, 5.0, 10.0, 10.0);
    assert_relative_eq!(a.iou(&b), 1.0 / 3.0, epsilon = 1e-6);

    let far = PixelBox::new(100.0, 100.0, 10.0, 10.0);
    assert_eq!(a.iou(&far), 0.0);

    let empty = PixelBox::new(0.0, 0.0, 0.0, 0.0);
    assert_eq!(empty.iou(&empty), 0.0);
  }

  #[test]
  fn test_with_relative_keeps_original_fields() {
    let det = Detection::new("roda", 0.9, PixelBox::new(10.0, 20.0, 4.0, 8.0));
    assert!(det.relative().is_none());

    let rel = RelativeBox {
      x: 0.1,
      y: 0.2,
      w: 0.04,
      h: 0.08,
    };
    let annotated = det.clone().with_relative(rel);
    assert_eq!(annotated.label(), det.label());
    assert_eq!(annotated.bbox(), det.bbox());
    assert_eq!(annotated.relative(), Some(&rel));
  }
}
