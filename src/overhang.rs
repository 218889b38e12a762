// 该文件是 Odol （超限货车） 项目的一部分。
// src/overhang.rs - 前后悬合法性判定
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

use crate::{detection::PixelBox, landmark::LandmarkSet};

/// 前悬上限与轴距之比
pub const FRONT_OVERHANG_RATIO: f32 = 0.475;
/// 后悬上限与轴距之比
pub const REAR_OVERHANG_RATIO: f32 = 0.625;

/// 判定结果，包含全部中间量，均为像素单位
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegalityVerdict {
  pub bumper_front: f32,
  pub bumper_rear: f32,
  pub front_overhang: f32,
  pub rear_overhang: f32,
  pub axle_spacing: f32,
  pub front_threshold: f32,
  pub rear_threshold: f32,
  pub legal: bool,
}

impl LegalityVerdict {
  /// 轴距不为正说明车轮检测顺序错乱或重复
  pub fn is_degenerate(&self) -> bool {
    !(self.axle_spacing > 0.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverhangRule {
  pub front_ratio: f32,
  pub rear_ratio: f32,
}

impl Default for OverhangRule {
  fn default() -> Self {
    Self {
      front_ratio: FRONT_OVERHANG_RATIO,
      rear_ratio: REAR_OVERHANG_RATIO,
    }
  }
}

impl OverhangRule {
  /// 车头朝向图像左侧；只用到各框的 cx 与车身宽度
  pub fn evaluate(
    &self,
    front_wheel: &PixelBox,
    rear_wheel: &PixelBox,
    chassis: &PixelBox,
  ) -> LegalityVerdict {
    let bumper_front = chassis.cx - chassis.w / 2.0;
    let bumper_rear = chassis.cx + chassis.w / 2.0;
    let front_overhang = front_wheel.cx - bumper_front;
    let rear_overhang = bumper_rear - rear_wheel.cx;
    let axle_spacing = rear_wheel.cx - front_wheel.cx;
    let front_threshold = self.front_ratio * axle_spacing;
    let rear_threshold = self.rear_ratio * axle_spacing;

    LegalityVerdict {
      bumper_front,
      bumper_rear,
      front_overhang,
      rear_overhang,
      axle_spacing,
      front_threshold,
      rear_threshold,
      legal: front_overhang <= front_threshold && rear_overhang <= rear_threshold,
    }
  }

  pub fn evaluate_landmarks(&self, landmarks: &LandmarkSet) -> LegalityVerdict {
    self.evaluate(
      landmarks.front_wheel.bbox(),
      landmarks.rear_wheel.bbox(),
      landmarks.chassis.bbox(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  fn bx(cx: f32, w: f32) -> PixelBox {
    PixelBox::new(cx, 0.0, w, 0.0)
  }

  #[test]
  fn test_reference_truck() {
    let rule = OverhangRule::default();
    let verdict = rule.evaluate(&bx(100.0, 30.0), &bx(300.0, 30.0), &bx(200.0, 250.0));

    assert_relative_eq!(verdict.bumper_front, 75.0);
    assert_relative_eq!(verdict.bumper_rear, 325.0);
    assert_relative_eq!(verdict.axle_spacing, 200.0);
    assert_relative_eq!(verdict.front_threshold, 95.0, epsilon = 1e-4);
    assert_relative_eq!(verdict.rear_threshold, 125.0, epsilon = 1e-4);
    assert_relative_eq!(verdict.front_overhang, 25.0);
    assert_relative_eq!(verdict.rear_overhang, 25.0);
    assert!(verdict.legal);
    assert!(!verdict.is_degenerate());

    // 同样的输入总是给出同样的结果
    let again = rule.evaluate(&bx(100.0, 99.0), &bx(300.0, 1.0), &bx(200.0, 250.0));
    assert_eq!(verdict, again);
  }

  #[test]
  fn test_rear_overhang_too_long() {
    let verdict = OverhangRule::default().evaluate(&bx(100.0, 0.0), &bx(200.0, 0.0), &bx(210.0, 300.0));
    // 车身 60..360, 轴距 100
    assert_relative_eq!(verdict.front_overhang, 40.0);
    assert_relative_eq!(verdict.rear_overhang, 160.0);
    assert!(verdict.front_overhang <= verdict.front_threshold);
    assert!(verdict.rear_overhang > verdict.rear_threshold);
    assert!(!verdict.legal);
  }

  #[test]
  fn test_front_overhang_too_long() {
    let verdict = OverhangRule::default().evaluate(&bx(200.0, 0.0), &bx(300.0, 0.0), &bx(220.0, 200.0));
    // 车身 120..320
    assert_relative_eq!(verdict.front_overhang, 80.0);
    assert_relative_eq!(verdict.rear_overhang, 20.0);
    assert!(!verdict.legal);
  }

  #[test]
  fn test_boundary_is_legal() {
    let rule = OverhangRule {
      front_ratio: 0.5,
      rear_ratio: 0.5,
    };
    // 轴距 100，前后悬都恰好 50
    let verdict = rule.evaluate(&bx(100.0, 0.0), &bx(200.0, 0.0), &bx(150.0, 200.0));
    assert_eq!(verdict.front_overhang, verdict.front_threshold);
    assert_eq!(verdict.rear_overhang, verdict.rear_threshold);
    assert!(verdict.legal);
  }

  #[test]
  fn test_degenerate_axle_spacing() {
    let verdict = OverhangRule::default().evaluate(&bx(300.0, 0.0), &bx(100.0, 0.0), &bx(200.0, 250.0));
    assert_relative_eq!(verdict.axle_spacing, -200.0);
    assert!(verdict.is_degenerate());
    assert!(!verdict.legal);

    let same = OverhangRule::default().evaluate(&bx(150.0, 0.0), &bx(150.0, 0.0), &bx(150.0, 100.0));
    assert_eq!(same.front_threshold, 0.0);
    assert_eq!(same.rear_threshold, 0.0);
    assert!(same.is_degenerate());
    assert!(!same.legal);
  }
}
