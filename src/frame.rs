// 该文件是 Odol （超限货车） 项目的一部分。
// src/frame.rs - 带名称的图像帧
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

use image::RgbImage;

use crate::batch::{HasShape, ImageShape};

const RGB_CHANNELS: u8 = 3;

/// 一张待检测的图像，`name` 为图像标识（通常是文件路径）
#[derive(Debug, Clone)]
pub struct Frame {
  name: String,
  image: RgbImage,
}

impl Frame {
  pub fn new(name: impl Into<String>, image: RgbImage) -> Self {
    Self {
      name: name.into(),
      image,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn channels(&self) -> u8 {
    RGB_CHANNELS
  }
}

impl HasShape for Frame {
  fn shape(&self) -> ImageShape {
    ImageShape {
      height: self.height(),
      width: self.width(),
      channels: self.channels(),
    }
  }
}
