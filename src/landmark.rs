// 该文件是 Odol （超限货车） 项目的一部分。
// src/landmark.rs - 车轮与车身地标选择
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

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::detection::Detection;

/// 默认的车轮类别名称
pub const DEFAULT_WHEEL_LABEL: &str = "roda";
/// 按标签匹配时允许的最大车轮数量
pub const DEFAULT_MAX_WHEELS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkRole {
  FrontWheel,
  RearWheel,
  Chassis,
  Auxiliary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandmarkSet {
  pub front_wheel: Detection,
  pub rear_wheel: Detection,
  pub chassis: Detection,
  pub auxiliary: Vec<Detection>,
}

impl LandmarkSet {
  /// 按角色表组装地标集合，`roles` 与 `detections` 一一对应
  fn from_roles(detections: &[Detection], roles: &[LandmarkRole]) -> Option<Self> {
    let find = |role: LandmarkRole| {
      roles
        .iter()
        .position(|r| *r == role)
        .and_then(|index| detections.get(index).cloned())
    };

    Some(LandmarkSet {
      front_wheel: find(LandmarkRole::FrontWheel)?,
      rear_wheel: find(LandmarkRole::RearWheel)?,
      chassis: find(LandmarkRole::Chassis)?,
      auxiliary: roles
        .iter()
        .zip(detections)
        .filter(|(role, _)| **role == LandmarkRole::Auxiliary)
        .map(|(_, det)| det.clone())
        .collect(),
    })
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LandmarkError {
  #[error("地标不足: 仅有 {count} 个检测结果")]
  InsufficientLandmarks { count: usize },
  #[error("地标存在歧义: 共 {count} 个检测结果")]
  AmbiguousLandmarks { count: usize },
  #[error("{count} 个检测结果没有对应的判定规则")]
  Unclassified {
    count: usize,
    landmarks: Box<LandmarkSet>,
  },
}

/// 角色匹配的结果
#[derive(Debug, Clone, PartialEq)]
pub struct RoleMatch {
  /// 与输入检测结果一一对应的角色
  pub roles: Vec<LandmarkRole>,
  /// 是否可以对该组合做合法性判定
  pub classifiable: bool,
}

pub trait RoleMatcher {
  fn match_roles(&self, detections: &[Detection]) -> Result<RoleMatch, LandmarkError>;
}

/// 按过滤后检测结果数量和位置分配角色，最后一个总是车身
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalMatcher;

impl RoleMatcher for PositionalMatcher {
  fn match_roles(&self, detections: &[Detection]) -> Result<RoleMatch, LandmarkError> {
    use LandmarkRole::*;

    let count = detections.len();
    let (roles, classifiable) = match count {
      0..=2 => return Err(LandmarkError::InsufficientLandmarks { count }),
      3 => (vec![FrontWheel, RearWheel, Chassis], true),
      4 => (vec![FrontWheel, Auxiliary, RearWheel, Chassis], true),
      5 => (
        vec![FrontWheel, Auxiliary, Auxiliary, RearWheel, Chassis],
        false,
      ),
      _ => return Err(LandmarkError::AmbiguousLandmarks { count }),
    };

    Ok(RoleMatch {
      roles,
      classifiable,
    })
  }
}

/// 按类别名称分配角色。
///
/// 最左侧车轮为前轮，最右侧车轮为后轮，其余车轮为辅助地标；
/// 多个车身候选时取置信度最高者。
#[derive(Debug, Clone)]
pub struct LabelMatcher {
  wheel_labels: HashSet<String>,
  chassis_labels: HashSet<String>,
  max_wheels: usize,
}

impl Default for LabelMatcher {
  fn default() -> Self {
    Self {
      wheel_labels: HashSet::from([DEFAULT_WHEEL_LABEL.to_string()]),
      chassis_labels: HashSet::new(),
      max_wheels: DEFAULT_MAX_WHEELS,
    }
  }
}

impl LabelMatcher {
  pub fn with_wheel_labels<I, S>(mut self, labels: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.wheel_labels = labels.into_iter().map(Into::into).collect();
    self
  }

  /// 为空时所有非车轮类别都视作车身候选
  pub fn with_chassis_labels<I, S>(mut self, labels: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.chassis_labels = labels.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_max_wheels(mut self, max_wheels: usize) -> Self {
    self.max_wheels = max_wheels;
    self
  }

  fn is_wheel(&self, det: &Detection) -> bool {
    self.wheel_labels.contains(det.label())
  }

  fn is_chassis(&self, det: &Detection) -> bool {
    if self.chassis_labels.is_empty() {
      !self.is_wheel(det)
    } else {
      self.chassis_labels.contains(det.label())
    }
  }
}

impl RoleMatcher for LabelMatcher {
  fn match_roles(&self, detections: &[Detection]) -> Result<RoleMatch, LandmarkError> {
    let count = detections.len();
    let wheels: Vec<usize> = (0..count)
      .filter(|&i| self.is_wheel(&detections[i]))
      .collect();
    let chassis: Vec<usize> = (0..count)
      .filter(|&i| !self.is_wheel(&detections[i]) && self.is_chassis(&detections[i]))
      .collect();

    debug!(
      "按标签匹配: {} 个车轮候选, {} 个车身候选",
      wheels.len(),
      chassis.len()
    );

    if wheels.len() < 2 || chassis.is_empty() {
      return Err(LandmarkError::InsufficientLandmarks { count });
    }
    if wheels.len() > self.max_wheels {
      return Err(LandmarkError::AmbiguousLandmarks { count });
    }

    let cx = |i: &usize| detections[*i].bbox().cx;
    // min_by 取相等元素中的第一个，max_by 取最后一个
    let front = wheels
      .iter()
      .min_by(|a, b| cx(a).total_cmp(&cx(b)))
      .copied()
      .ok_or(LandmarkError::InsufficientLandmarks { count })?;
    let rear = wheels
      .iter()
      .max_by(|a, b| cx(a).total_cmp(&cx(b)))
      .copied()
      .ok_or(LandmarkError::InsufficientLandmarks { count })?;
    let body = chassis
      .iter()
      .min_by(|a, b| {
        detections[**b]
          .confidence()
          .total_cmp(&detections[**a].confidence())
      })
      .copied()
      .ok_or(LandmarkError::InsufficientLandmarks { count })?;

    let mut roles = vec![LandmarkRole::Auxiliary; count];
    roles[front] = LandmarkRole::FrontWheel;
    roles[rear] = LandmarkRole::RearWheel;
    roles[body] = LandmarkRole::Chassis;

    Ok(RoleMatch {
      roles,
      classifiable: true,
    })
  }
}

/// 地标选择器，先匹配角色，再组装地标集合
#[derive(Debug, Clone, Default)]
pub struct LandmarkSelector<M> {
  matcher: M,
}

impl<M: RoleMatcher> LandmarkSelector<M> {
  pub fn new(matcher: M) -> Self {
    Self { matcher }
  }

  pub fn select(&self, detections: &[Detection]) -> Result<LandmarkSet, LandmarkError> {
    let count = detections.len();
    let RoleMatch {
      roles,
      classifiable,
    } = self.matcher.match_roles(detections)?;

    let landmarks = LandmarkSet::from_roles(detections, &roles)
      .ok_or(LandmarkError::InsufficientLandmarks { count })?;

    if !classifiable {
      return Err(LandmarkError::Unclassified {
        count,
        landmarks: Box::new(landmarks),
      });
    }

    Ok(landmarks)
  }
}

/// 运行时选择的匹配方式
#[derive(Debug, Clone)]
pub enum Matcher {
  Positional(PositionalMatcher),
  Label(LabelMatcher),
}

impl Default for Matcher {
  fn default() -> Self {
    Matcher::Positional(PositionalMatcher)
  }
}

impl RoleMatcher for Matcher {
  fn match_roles(&self, detections: &[Detection]) -> Result<RoleMatch, LandmarkError> {
    match self {
      Matcher::Positional(matcher) => matcher.match_roles(detections),
      Matcher::Label(matcher) => matcher.match_roles(detections),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::PixelBox;

  fn det(label: &str, confidence: f32, cx: f32) -> Detection {
    Detection::new(label, confidence, PixelBox::new(cx, 200.0, 40.0, 40.0))
  }

  fn positional() -> LandmarkSelector<PositionalMatcher> {
    LandmarkSelector::new(PositionalMatcher)
  }

  #[test]
  fn test_positional_count_boundaries() {
    let pool: Vec<Detection> = (0..7)
      .map(|i| det("roda", 0.9, 100.0 * i as f32))
      .collect();

    for n in 0..=2 {
      assert_eq!(
        positional().select(&pool[..n]),
        Err(LandmarkError::InsufficientLandmarks { count: n })
      );
    }
    assert!(positional().select(&pool[..3]).is_ok());
    assert!(positional().select(&pool[..4]).is_ok());
    assert!(matches!(
      positional().select(&pool[..5]),
      Err(LandmarkError::Unclassified { count: 5, .. })
    ));
    for n in 6..=7 {
      assert_eq!(
        positional().select(&pool[..n]),
        Err(LandmarkError::AmbiguousLandmarks { count: n })
      );
    }
  }

  #[test]
  fn test_positional_three() {
    let dets = vec![det("roda", 0.9, 100.0), det("roda", 0.8, 300.0), det("truk", 0.7, 200.0)];
    let set = positional().select(&dets).unwrap();
    assert_eq!(set.front_wheel, dets[0]);
    assert_eq!(set.rear_wheel, dets[1]);
    assert_eq!(set.chassis, dets[2]);
    assert!(set.auxiliary.is_empty());
  }

  #[test]
  fn test_positional_four() {
    let dets = vec![
      det("roda", 0.9, 100.0),
      det("roda", 0.9, 250.0),
      det("roda", 0.8, 300.0),
      det("truk", 0.7, 200.0),
    ];
    let set = positional().select(&dets).unwrap();
    assert_eq!(set.front_wheel, dets[0]);
    assert_eq!(set.rear_wheel, dets[2]);
    assert_eq!(set.chassis, dets[3]);
    assert_eq!(set.auxiliary, vec![dets[1].clone()]);
  }

  #[test]
  fn test_positional_five_reports_roles() {
    let dets: Vec<Detection> = (0..5).map(|i| det("x", 0.9, i as f32)).collect();
    match positional().select(&dets) {
      Err(LandmarkError::Unclassified { count, landmarks }) => {
        assert_eq!(count, 5);
        assert_eq!(landmarks.front_wheel, dets[0]);
        assert_eq!(landmarks.rear_wheel, dets[3]);
        assert_eq!(landmarks.chassis, dets[4]);
        assert_eq!(landmarks.auxiliary.len(), 2);
      }
      other => panic!("unexpected: {:?}", other),
    }
  }

  #[test]
  fn test_label_matcher_orders_wheels_by_position() {
    // 检测器输出顺序与车轮位置无关
    let dets = vec![
      det("truk_odol", 0.95, 200.0),
      det("roda", 0.9, 320.0),
      det("roda", 0.85, 90.0),
      det("roda", 0.8, 250.0),
    ];
    let selector = LandmarkSelector::new(LabelMatcher::default());
    let set = selector.select(&dets).unwrap();
    assert_eq!(set.front_wheel, dets[2]);
    assert_eq!(set.rear_wheel, dets[1]);
    assert_eq!(set.chassis, dets[0]);
    assert_eq!(set.auxiliary, vec![dets[3].clone()]);
  }

  #[test]
  fn test_label_matcher_picks_most_confident_chassis() {
    let dets = vec![
      det("roda", 0.9, 100.0),
      det("truk_normal", 0.6, 200.0),
      det("roda", 0.9, 300.0),
      det("truk_odol", 0.8, 210.0),
      det("truk_normal", 0.8, 220.0),
    ];
    let set = LandmarkSelector::new(LabelMatcher::default())
      .select(&dets)
      .unwrap();
    assert_eq!(set.chassis, dets[3]);
    assert_eq!(set.auxiliary.len(), 2);
  }

  #[test]
  fn test_label_matcher_chassis_labels() {
    let dets = vec![
      det("wheel", 0.9, 100.0),
      det("plate", 0.99, 150.0),
      det("wheel", 0.9, 300.0),
      det("body", 0.7, 200.0),
    ];
    let matcher = LabelMatcher::default()
      .with_wheel_labels(["wheel"])
      .with_chassis_labels(["body"]);
    let set = LandmarkSelector::new(matcher).select(&dets).unwrap();
    assert_eq!(set.chassis, dets[3]);
    assert_eq!(set.auxiliary, vec![dets[1].clone()]);
  }

  #[test]
  fn test_label_matcher_failures() {
    let selector = LandmarkSelector::new(LabelMatcher::default().with_max_wheels(2));
    let one_wheel = vec![det("roda", 0.9, 100.0), det("truk", 0.9, 200.0)];
    assert_eq!(
      selector.select(&one_wheel),
      Err(LandmarkError::InsufficientLandmarks { count: 2 })
    );

    let no_chassis = vec![det("roda", 0.9, 100.0), det("roda", 0.9, 300.0)];
    assert_eq!(
      selector.select(&no_chassis),
      Err(LandmarkError::InsufficientLandmarks { count: 2 })
    );

    let too_many = vec![
      det("roda", 0.9, 100.0),
      det("roda", 0.9, 200.0),
      det("roda", 0.9, 300.0),
      det("truk", 0.9, 200.0),
    ];
    assert_eq!(
      selector.select(&too_many),
      Err(LandmarkError::AmbiguousLandmarks { count: 4 })
    );
  }

  #[test]
  fn test_runtime_matcher_dispatch() {
    let dets = vec![det("truk", 0.9, 200.0), det("roda", 0.9, 300.0), det("roda", 0.9, 100.0)];
    let positional = LandmarkSelector::new(Matcher::default()).select(&dets).unwrap();
    assert_eq!(positional.chassis, dets[2]);

    let labeled = LandmarkSelector::new(Matcher::Label(LabelMatcher::default()))
      .select(&dets)
      .unwrap();
    assert_eq!(labeled.chassis, dets[0]);
    assert_eq!(labeled.front_wheel, dets[2]);
  }

  #[test]
  fn test_label_matcher_wheel_ties() {
    // 同一位置的车轮，前轮取最早的，后轮取最晚的
    let dets = vec![
      det("roda", 0.9, 100.0),
      det("truk", 0.9, 150.0),
      det("roda", 0.8, 100.0),
      det("roda", 0.9, 300.0),
      det("roda", 0.7, 300.0),
    ];
    let matched = LabelMatcher::default().match_roles(&dets).unwrap();
    use LandmarkRole::*;
    assert_eq!(
      matched.roles,
      [FrontWheel, Chassis, Auxiliary, Auxiliary, RearWheel]
    );
    assert!(matched.classifiable);
  }

  /// 角色数量多于检测结果的匹配器
  struct OverlongMatcher;

  impl RoleMatcher for OverlongMatcher {
    fn match_roles(&self, _: &[Detection]) -> Result<RoleMatch, LandmarkError> {
      use LandmarkRole::*;
      Ok(RoleMatch {
        roles: vec![FrontWheel, RearWheel, Auxiliary, Chassis],
        classifiable: true,
      })
    }
  }

  #[test]
  fn test_roles_beyond_detections() {
    let dets = vec![det("roda", 0.9, 100.0), det("roda", 0.9, 300.0), det("truk", 0.9, 200.0)];
    assert_eq!(
      LandmarkSelector::new(OverlongMatcher).select(&dets),
      Err(LandmarkError::InsufficientLandmarks { count: 3 })
    );
  }
}
