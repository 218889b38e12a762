// 该文件是 Odol （超限货车） 项目的一部分。
// src/input/prompt.rs - 交互式输入图像路径
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
  io::{BufRead, Write},
  path::PathBuf,
};

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::read_image_file::{ImageFileInputError, load_frame},
};

const PROMPT: &str = "请输入图像路径: ";

#[derive(Error, Debug)]
pub enum PromptInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("{0}")]
  ImageFileInputError(#[from] ImageFileInputError),
}

/// 逐行读取图像路径；空行、`q` 或输入结束时停止
pub struct PromptInput {
  reader: Box<dyn BufRead>,
  echo: bool,
  finished: bool,
}

impl FromUrlWithScheme for PromptInput {
  const SCHEME: &'static str = "prompt";
}

impl FromUrl for PromptInput {
  type Error = PromptInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(PromptInputError::SchemaMismatch);
    }
    Ok(PromptInput {
      reader: Box::new(std::io::stdin().lock()),
      echo: true,
      finished: false,
    })
  }
}

impl PromptInput {
  /// 从任意输入读取路径，不打印提示
  pub fn from_reader(reader: impl BufRead + 'static) -> Self {
    PromptInput {
      reader: Box::new(reader),
      echo: false,
      finished: false,
    }
  }

  fn read_path(&mut self) -> Result<Option<PathBuf>, PromptInputError> {
    if self.echo {
      let mut stdout = std::io::stdout();
      write!(stdout, "{}", PROMPT)?;
      stdout.flush()?;
    }

    let mut line = String::new();
    if self.reader.read_line(&mut line)? == 0 {
      return Ok(None);
    }
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("q") {
      return Ok(None);
    }
    Ok(Some(PathBuf::from(line)))
  }
}

impl Iterator for PromptInput {
  type Item = Result<Frame, PromptInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    match self.read_path() {
      Ok(Some(path)) => Some(load_frame(&path).map_err(|e| {
        warn!("无法读取图像 {}: {}", path.display(), e);
        PromptInputError::from(e)
      })),
      Ok(None) => {
        self.finished = true;
        None
      }
      Err(e) => {
        self.finished = true;
        Some(Err(e))
      }
    }
  }
}
