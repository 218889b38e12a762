// 该文件是 Odol （超限货车） 项目的一部分。
// src/dataset.rs - darknet 数据文件与类别名称
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum DataFileError {
  #[error("无法读取 {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("数据文件缺少字段: {0}")]
  MissingKey(&'static str),
  #[error("字段 {key} 的值无效: {value}")]
  InvalidValue { key: String, value: String },
  #[error("类别名称文件为空: {0}")]
  EmptyNames(PathBuf),
}

fn read_to_string(path: &Path) -> Result<String, DataFileError> {
  std::fs::read_to_string(path).map_err(|source| DataFileError::IoError {
    path: path.to_path_buf(),
    source,
  })
}

/// darknet 的 `obj.data` 文件
#[derive(Debug, Clone, PartialEq)]
pub struct DataFile {
  pub classes: usize,
  pub names: PathBuf,
}

impl DataFile {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DataFileError> {
    let path = path.as_ref();
    info!("读取数据文件: {}", path.display());
    Self::parse(&read_to_string(path)?)
  }

  /// 解析 `key = value` 格式，`#` 开头为注释
  pub fn parse(content: &str) -> Result<Self, DataFileError> {
    let mut classes = None;
    let mut names = None;

    for line in content.lines() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let Some((key, value)) = line.split_once('=') else {
        warn!("忽略无法解析的行: {}", line);
        continue;
      };
      let (key, value) = (key.trim(), value.trim());
      match key {
        "classes" => {
          let count = value
            .parse::<usize>()
            .map_err(|_| DataFileError::InvalidValue {
              key: key.to_string(),
              value: value.to_string(),
            })?;
          classes = Some(count);
        }
        "names" => names = Some(PathBuf::from(value)),
        // 训练相关字段与判定无关
        _ => {}
      }
    }

    Ok(DataFile {
      classes: classes.ok_or(DataFileError::MissingKey("classes"))?,
      names: names.ok_or(DataFileError::MissingKey("names"))?,
    })
  }

  pub fn load_class_names(&self) -> Result<ClassNames, DataFileError> {
    let names = ClassNames::from_path(&self.names)?;
    if names.len() != self.classes {
      warn!(
        "数据文件声明 {} 个类别，名称文件中有 {} 个",
        self.classes,
        names.len()
      );
    }
    Ok(names)
  }
}

/// 类别名称表，行号即类别编号
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DataFileError> {
    let path = path.as_ref();
    let names = Self::parse(&read_to_string(path)?);
    if names.is_empty() {
      return Err(DataFileError::EmptyNames(path.to_path_buf()));
    }
    info!("加载 {} 个类别名称", names.len());
    Ok(names)
  }

  pub fn parse(content: &str) -> Self {
    content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .collect()
  }

  pub fn index_of(&self, label: &str) -> Option<usize> {
    self.0.iter().position(|name| name == label)
  }

  pub fn name(&self, index: usize) -> Option<&str> {
    self.0.get(index).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }
}

impl<S: Into<String>> FromIterator<S> for ClassNames {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    ClassNames(iter.into_iter().map(Into::into).collect())
  }
}
