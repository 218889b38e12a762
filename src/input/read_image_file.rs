// 该文件是 Odol （超限货车） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, frame::Frame, url_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Image file not found: {0}")]
  MissingImage(PathBuf),
}

/// 单张图像
pub const IMAGE_SCHEME: &str = "image";
/// 每行一个图像路径的文本文件
pub const LIST_SCHEME: &str = "list";
/// 图像目录
pub const FOLDER_SCHEME: &str = "folder";

const FOLDER_EXTENSIONS: [&str; 3] = ["jpg", "png", "jpeg"];

/// 从磁盘依次读取图像
pub struct ImageFileInput {
  paths: VecDeque<PathBuf>,
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let path = url_path(url);
    let paths = match url.scheme() {
      IMAGE_SCHEME => vec![path],
      LIST_SCHEME => read_list(&path)?,
      FOLDER_SCHEME => read_folder(&path)?,
      other => {
        error!(
          "URI scheme mismatch: expected one of '{}', '{}', '{}', found '{}'",
          IMAGE_SCHEME, LIST_SCHEME, FOLDER_SCHEME, other
        );
        return Err(ImageFileInputError::SchemaMismatch);
      }
    };

    if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
      return Err(ImageFileInputError::MissingImage(missing.clone()));
    }

    info!("共 {} 张待检测图像", paths.len());
    Ok(ImageFileInput {
      paths: paths.into(),
    })
  }
}

impl ImageFileInput {
  pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
    ImageFileInput {
      paths: paths.into_iter().collect(),
    }
  }

  pub fn remaining(&self) -> usize {
    self.paths.len()
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<Frame, ImageFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.paths.pop_front().map(|path| load_frame(&path))
  }
}

/// 读取图像并转为 RGB，帧名为路径
pub fn load_frame(path: &Path) -> Result<Frame, ImageFileInputError> {
  debug!("读取图像: {}", path.display());
  let image = ImageReader::open(path)?.decode()?.to_rgb8();
  Ok(Frame::new(path.to_string_lossy(), image))
}

fn read_list(path: &Path) -> Result<Vec<PathBuf>, ImageFileInputError> {
  let content = std::fs::read_to_string(path)?;
  Ok(
    content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(PathBuf::from)
      .collect(),
  )
}

/// 目录中的图像按扩展名分组，组内按文件名排序
fn read_folder(dir: &Path) -> Result<Vec<PathBuf>, ImageFileInputError> {
  let mut entries = Vec::new();
  for entry in std::fs::read_dir(dir)? {
    let path = entry?.path();
    if path.is_file() {
      entries.push(path);
    }
  }

  let mut paths = Vec::with_capacity(entries.len());
  for ext in FOLDER_EXTENSIONS {
    let mut group: Vec<PathBuf> = entries
      .iter()
      .filter(|p| {
        p.extension()
          .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
      })
      .cloned()
      .collect();
    group.sort();
    paths.extend(group);
  }
  Ok(paths)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("odol-input-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  fn folder_url(dir: &Path) -> Url {
    Url::parse(&format!("folder://{}", dir.display())).unwrap()
  }

  #[test]
  fn test_folder_order() {
    let dir = temp_dir("folder");
    for name in ["b.png", "a.png", "c.jpg", "d.jpeg", "notes.txt"] {
      RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]))
        .save_with_format(dir.join(name), image::ImageFormat::Png)
        .unwrap();
    }

    let input = ImageFileInput::from_url(&folder_url(&dir)).unwrap();
    let names: Vec<String> = input
      .paths
      .iter()
      .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
      .collect();
    assert_eq!(names, ["c.jpg", "a.png", "b.png", "d.jpeg"]);

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn test_list_and_load() {
    let dir = temp_dir("list");
    let image_path = dir.join("truk.png");
    RgbImage::from_pixel(6, 4, Rgb([10, 20, 30]))
      .save(&image_path)
      .unwrap();
    let list_path = dir.join("test.txt");
    std::fs::write(&list_path, format!("{}\n\n", image_path.display())).unwrap();

    let url = Url::parse(&format!("list://{}", list_path.display())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    assert_eq!(input.remaining(), 1);

    let frame = input.next().unwrap().unwrap();
    assert_eq!(frame.width(), 6);
    assert_eq!(frame.height(), 4);
    assert_eq!(frame.name(), image_path.to_string_lossy());
    assert!(input.next().is_none());

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn test_missing_image() {
    let url = Url::parse("image:///tidak/ada/truk.jpg").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::MissingImage(_))
    ));
  }

  #[test]
  fn test_unreadable_image_is_per_item_error() {
    let dir = temp_dir("broken");
    let path = dir.join("rusak.jpg");
    std::fs::write(&path, b"bukan gambar").unwrap();

    let mut input = ImageFileInput::from_paths([path]);
    assert!(input.next().unwrap().is_err());
    assert!(input.next().is_none());

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
