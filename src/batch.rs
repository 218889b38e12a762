// 该文件是 Odol （超限货车） 项目的一部分。
// src/batch.rs - 批次尺寸校验
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

use std::fmt;

use image::{DynamicImage, RgbImage};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImageShape {
  pub height: u32,
  pub width: u32,
  pub channels: u8,
}

impl fmt::Display for ImageShape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}x{}", self.width, self.height, self.channels)
  }
}

pub trait HasShape {
  fn shape(&self) -> ImageShape;
}

impl HasShape for ImageShape {
  fn shape(&self) -> ImageShape {
    *self
  }
}

impl HasShape for RgbImage {
  fn shape(&self) -> ImageShape {
    ImageShape {
      height: self.height(),
      width: self.width(),
      channels: 3,
    }
  }
}

impl HasShape for DynamicImage {
  fn shape(&self) -> ImageShape {
    ImageShape {
      height: self.height(),
      width: self.width(),
      channels: self.color().channel_count(),
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
  #[error("批次中没有图像")]
  EmptyBatch,
  #[error("批次中图像尺寸不一致: 第 {index} 张为 {found}, 期望 {expected}")]
  ShapeMismatch {
    index: usize,
    expected: ImageShape,
    found: ImageShape,
  },
  #[error("批次图像数量 {count} 超过批次容量 {capacity}")]
  CapacityExceeded { count: usize, capacity: usize },
}

/// 检查一个批次内所有图像尺寸一致且数量不超过容量，返回共同的 (height, width)
pub fn check_batch_shape<I: HasShape>(
  images: &[I],
  capacity: usize,
) -> Result<(u32, u32), BatchError> {
  let expected = images.first().ok_or(BatchError::EmptyBatch)?.shape();

  if let Some((index, found)) = images
    .iter()
    .map(HasShape::shape)
    .enumerate()
    .find(|(_, shape)| *shape != expected)
  {
    return Err(BatchError::ShapeMismatch {
      index,
      expected,
      found,
    });
  }

  if images.len() > capacity {
    return Err(BatchError::CapacityExceeded {
      count: images.len(),
      capacity,
    });
  }

  Ok((expected.height, expected.width))
}
