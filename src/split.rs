// 该文件是 Odol （超限货车） 项目的一部分。
// src/split.rs - 训练集与测试集划分
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SplitError {
  #[error("测试集比例必须在 (0, 100] 之间: {0}")]
  InvalidPercentage(f64),
  #[error("I/O 错误 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SplitError + '_ {
  move |source| SplitError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// 每隔多少张取一张作为测试集，0.5 时取偶数
pub fn test_stride(percentage: f64) -> Result<u64, SplitError> {
  if !(percentage > 0.0 && percentage <= 100.0) {
    return Err(SplitError::InvalidPercentage(percentage));
  }
  Ok((100.0 / percentage).round_ties_even() as u64)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSplit {
  pub train: Vec<String>,
  pub test: Vec<String>,
}

impl DatasetSplit {
  /// 每行一个条目，写出训练集与测试集清单
  pub fn write_manifests(&self, train_path: &Path, test_path: &Path) -> Result<(), SplitError> {
    write_lines(train_path, &self.train)?;
    write_lines(test_path, &self.test)?;
    info!(
      "训练集 {} 张 -> {}, 测试集 {} 张 -> {}",
      self.train.len(),
      train_path.display(),
      self.test.len(),
      test_path.display()
    );
    Ok(())
  }
}

fn write_lines(path: &Path, lines: &[String]) -> Result<(), SplitError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(io_error(parent))?;
  }
  let mut writer = BufWriter::new(File::create(path).map_err(io_error(path))?);
  for line in lines {
    writeln!(writer, "{}", line).map_err(io_error(path))?;
  }
  writer.flush().map_err(io_error(path))
}

/// 按顺序划分：计数器从 1 开始，等于步长时归入测试集并重置
pub fn split_names<S: AsRef<str>>(
  names: &[S],
  percentage: f64,
  prefix: &str,
) -> Result<DatasetSplit, SplitError> {
  let stride = test_stride(percentage)?;
  let prefix = prefix.trim_end_matches('/');

  let mut split = DatasetSplit::default();
  let mut counter = 1;
  for name in names {
    let entry = if prefix.is_empty() {
      name.as_ref().to_string()
    } else {
      format!("{}/{}", prefix, name.as_ref())
    };
    if counter == stride {
      counter = 1;
      split.test.push(entry);
    } else {
      split.train.push(entry);
      counter += 1;
    }
  }
  Ok(split)
}

/// 目录下指定扩展名的文件名，按名称排序
pub fn list_images(dir: &Path, extension: &str) -> Result<Vec<String>, SplitError> {
  let mut names = Vec::new();
  for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
    let path = entry.map_err(io_error(dir))?.path();
    if path.is_file()
      && path.extension().is_some_and(|e| e == extension)
      && let Some(name) = path.file_name()
    {
      names.push(name.to_string_lossy().into_owned());
    }
  }
  names.sort();
  Ok(names)
}

pub fn split_directory(
  dir: &Path,
  extension: &str,
  percentage: f64,
  prefix: &str,
) -> Result<DatasetSplit, SplitError> {
  let names = list_images(dir, extension)?;
  info!("{} 中共 {} 个 .{} 文件", dir.display(), names.len(), extension);
  split_names(&names, percentage, prefix)
}
