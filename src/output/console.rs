// 该文件是 Odol （超限货车） 项目的一部分。
// src/output/console.rs - 控制台输出
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

use std::{fmt::Write as _, io::Write};

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::Render,
  pipeline::{ImageOutcome, ImageReport},
};

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 在标准输出打印检测结果与判定数值
pub struct ConsoleOutput {
  ext_output: bool,
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch(url.scheme().to_string()));
    }
    let ext_output = url.query_pairs().any(|(k, _)| k == "ext");
    Ok(ConsoleOutput { ext_output })
  }
}

/// 生成一张图像的文字报告
pub fn format_report(report: &ImageReport, ext_output: bool) -> String {
  let mut text = String::new();
  let _ = writeln!(text, "{}: {}", report.image_id, report.shape);

  for det in &report.detections {
    let _ = write!(
      text,
      "{}: {:.0}%",
      det.label(),
      det.confidence() * 100.0
    );
    if ext_output {
      let bbox = det.bbox();
      let _ = write!(
        text,
        "\t(left_x: {:4.0}   top_y: {:4.0}   width: {:4.0}   height: {:4.0})",
        bbox.left(),
        bbox.top(),
        bbox.w,
        bbox.h
      );
    }
    text.push('\n');
  }

  match &report.outcome {
    ImageOutcome::Verdict { verdict, .. } | ImageOutcome::DegenerateGeometry { verdict, .. } => {
      let _ = writeln!(text, "前保险杠: {:.1}", verdict.bumper_front);
      let _ = writeln!(text, "前悬: {:.1}", verdict.front_overhang);
      let _ = writeln!(text, "后保险杠: {:.1}", verdict.bumper_rear);
      let _ = writeln!(text, "后悬: {:.1}", verdict.rear_overhang);
      let _ = writeln!(text, "轴距: {:.1}", verdict.axle_spacing);
      let _ = writeln!(text, "前悬阈值: {:.1}", verdict.front_threshold);
      let _ = writeln!(text, "后悬阈值: {:.1}", verdict.rear_threshold);
      let conclusion = match &report.outcome {
        ImageOutcome::DegenerateGeometry { .. } => "轴距无效，无法判定",
        _ if verdict.legal => "车身合法",
        _ => "车身违规",
      };
      let _ = writeln!(text, "{}", conclusion);
    }
    ImageOutcome::Unresolved(err) => {
      let _ = writeln!(text, "无法判定: {}", err);
    }
    ImageOutcome::DetectionFailed(msg) => {
      let _ = writeln!(text, "检测失败: {}", msg);
    }
  }

  text
}

impl Render<Frame, ImageReport> for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn render_result(&self, _frame: &Frame, result: &ImageReport) -> Result<(), Self::Error> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", format_report(result, self.ext_output))?;
    Ok(())
  }
}
