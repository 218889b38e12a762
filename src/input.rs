// 该文件是 Odol （超限货车） 项目的一部分。
// src/input.rs - 图像输入
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

use std::path::Path;

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod prompt;
mod read_image_file;

pub use self::prompt::{PromptInput, PromptInputError};
pub use self::read_image_file::{
  FOLDER_SCHEME, IMAGE_SCHEME, ImageFileInput, ImageFileInputError, LIST_SCHEME, load_frame,
};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Prompt input error: {0}")]
  PromptInputError(#[from] PromptInputError),
  #[error("Invalid input source: {0}")]
  InvalidSource(String),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  ImageFile(ImageFileInput),
  Prompt(PromptInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      IMAGE_SCHEME | LIST_SCHEME | FOLDER_SCHEME => {
        Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?))
      }
      PromptInput::SCHEME => Ok(InputWrapper::Prompt(PromptInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ImageFile(input) => input.next().map(|r| r.map_err(InputError::from)),
      InputWrapper::Prompt(input) => input.next().map(|r| r.map_err(InputError::from)),
    }
  }
}

/// 将命令行给出的输入来源转为 URL。
///
/// 带方案的来源原样解析；普通路径按扩展名判断：图片扩展名为单张图像，
/// `.txt` 为路径列表，其余视为目录。没有输入时进入交互模式。
pub fn input_url(source: Option<&str>) -> Result<Url, InputError> {
  let Some(source) = source.filter(|s| !s.trim().is_empty()) else {
    return Url::parse(&format!("{}:", PromptInput::SCHEME))
      .map_err(|e| InputError::InvalidSource(e.to_string()));
  };

  if source.contains("://") || source == format!("{}:", PromptInput::SCHEME) {
    return Url::parse(source).map_err(|e| InputError::InvalidSource(e.to_string()));
  }

  let path = Path::new(source);
  let extension = path
    .extension()
    .map(|ext| ext.to_string_lossy().to_lowercase());
  let scheme = match extension.as_deref() {
    Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => IMAGE_SCHEME,
    Some("txt") => LIST_SCHEME,
    _ => FOLDER_SCHEME,
  };

  let absolute = std::path::absolute(path)
    .map_err(|e| InputError::InvalidSource(format!("{}: {}", source, e)))?;
  let encoded: Vec<String> = absolute
    .to_string_lossy()
    .split('/')
    .map(|segment| urlencoding::encode(segment).into_owned())
    .collect();

  Url::parse(&format!("{}://{}", scheme, encoded.join("/")))
    .map_err(|e| InputError::InvalidSource(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::url_path;

  #[test]
  fn test_input_url_by_extension() {
    let url = input_url(Some("/data/truk/a.JPG")).unwrap();
    assert_eq!(url.scheme(), IMAGE_SCHEME);
    assert_eq!(url_path(&url), Path::new("/data/truk/a.JPG"));

    assert_eq!(input_url(Some("/data/test.txt")).unwrap().scheme(), LIST_SCHEME);
    assert_eq!(input_url(Some("/data/truk")).unwrap().scheme(), FOLDER_SCHEME);
  }

  #[test]
  fn test_input_url_keeps_spaces() {
    let url = input_url(Some("/data/truk odol/b (1).png")).unwrap();
    assert_eq!(url_path(&url), Path::new("/data/truk odol/b (1).png"));
  }

  #[test]
  fn test_input_url_explicit_and_prompt() {
    assert_eq!(
      input_url(Some("list:///data/test.txt")).unwrap().scheme(),
      LIST_SCHEME
    );
    assert_eq!(input_url(None).unwrap().scheme(), PromptInput::SCHEME);
    assert_eq!(input_url(Some("  ")).unwrap().scheme(), PromptInput::SCHEME);
    assert_eq!(input_url(Some("prompt:")).unwrap().scheme(), PromptInput::SCHEME);
  }

  #[test]
  fn test_scheme_mismatch() {
    let url = Url::parse("rtsp://camera/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));
  }
}
