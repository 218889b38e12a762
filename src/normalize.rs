// 该文件是 Odol （超限货车） 项目的一部分。
// src/normalize.rs - 像素坐标与相对坐标转换
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

use crate::detection::{Detection, PixelBox, RelativeBox};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
  #[error("图像尺寸无效: {width}x{height}")]
  InvalidImageDimensions { width: u32, height: u32 },
}

fn check_dimensions(height: u32, width: u32) -> Result<(f32, f32), NormalizeError> {
  if width == 0 || height == 0 {
    return Err(NormalizeError::InvalidImageDimensions { width, height });
  }
  Ok((height as f32, width as f32))
}

/// YOLO 标注格式使用相对坐标
pub fn to_relative(
  bbox: &PixelBox,
  height: u32,
  width: u32,
) -> Result<RelativeBox, NormalizeError> {
  let (height, width) = check_dimensions(height, width)?;
  Ok(RelativeBox {
    x: bbox.cx / width,
    y: bbox.cy / height,
    w: bbox.w / width,
    h: bbox.h / height,
  })
}

pub fn to_pixel(
  relative: &RelativeBox,
  height: u32,
  width: u32,
) -> Result<PixelBox, NormalizeError> {
  let (height, width) = check_dimensions(height, width)?;
  Ok(PixelBox {
    cx: relative.x * width,
    cy: relative.y * height,
    w: relative.w * width,
    h: relative.h * height,
  })
}

/// 为每条检测结果附加相对坐标
pub fn normalize_detections(
  detections: &[Detection],
  height: u32,
  width: u32,
) -> Result<Vec<Detection>, NormalizeError> {
  detections
    .iter()
    .map(|det| {
      let relative = to_relative(det.bbox(), height, width)?;
      Ok(det.clone().with_relative(relative))
    })
    .collect()
}
