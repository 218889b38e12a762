// 该文件是 Odol （超限货车） 项目的一部分。
// src/task.rs - 检测任务
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
  sync::mpsc::{Receiver, channel},
  thread,
  time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::{
  frame::Frame,
  landmark::RoleMatcher,
  model::Detector,
  output::Render,
  pipeline::{ImageOutcome, ImageReport, Pipeline},
};

pub trait Task<I, D, M, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    detector: &D,
    pipeline: &Pipeline<M>,
    output: &O,
  ) -> Result<RunSummary, Self::Error>;
}

/// 一次运行的统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
  pub images: usize,
  pub legal: usize,
  pub illegal: usize,
  /// 没有给出判定的图像，包括轴距无效
  pub unresolved: usize,
  /// 读取或检测失败的图像
  pub failed: usize,
  pub elapsed: Duration,
}

impl RunSummary {
  pub fn record(&mut self, report: &ImageReport) {
    self.images += 1;
    match &report.outcome {
      ImageOutcome::Verdict { verdict, .. } if verdict.legal => self.legal += 1,
      ImageOutcome::Verdict { .. } => self.illegal += 1,
      ImageOutcome::DegenerateGeometry { .. } | ImageOutcome::Unresolved(_) => {
        self.unresolved += 1
      }
      ImageOutcome::DetectionFailed(_) => self.failed += 1,
    }
  }

  fn record_input_failure(&mut self) {
    self.images += 1;
    self.failed += 1;
  }

  fn log(&self) {
    info!(
      "共处理 {} 张图像: 合法 {}, 违规 {}, 无法判定 {}, 失败 {}, 耗时 {:.2?}",
      self.images, self.legal, self.illegal, self.unresolved, self.failed, self.elapsed
    );
  }
}

fn install_interrupt_handler() -> anyhow::Result<Receiver<()>> {
  let (tx, rx) = channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .context("无法设置 Ctrl-C 处理函数")?;
  Ok(rx)
}

fn interrupted(rx: &Option<Receiver<()>>) -> bool {
  if rx.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
    warn!("中断信号接收，退出任务循环");
    return true;
  }
  false
}

fn reached(limit: Option<usize>, count: usize) -> bool {
  if limit.is_some_and(|n| count >= n) {
    info!("达到指定图像数量 {}, 退出任务循环", count);
    return true;
  }
  false
}

/// 逐张处理，检测器错误终止任务
#[derive(Default, Debug)]
pub struct SequentialTask {
  max_images: Option<usize>,
  interruptible: bool,
}

impl SequentialTask {
  pub fn with_max_images(mut self, max_images: Option<usize>) -> Self {
    self.max_images = max_images;
    self
  }

  pub fn with_interrupt(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }
}

impl<I, IE, D, M, O, RE> Task<I, D, M, O> for SequentialTask
where
  I: Iterator<Item = Result<Frame, IE>>,
  IE: std::error::Error + Send + Sync + 'static,
  D: Detector,
  M: RoleMatcher,
  O: Render<Frame, ImageReport, Error = RE>,
  RE: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    detector: &D,
    pipeline: &Pipeline<M>,
    output: &O,
  ) -> Result<RunSummary, Self::Error> {
    info!("开始任务...");
    let rx = if self.interruptible {
      Some(install_interrupt_handler()?)
    } else {
      None
    };

    let start = Instant::now();
    let mut summary = RunSummary::default();
    for item in input {
      match item {
        Ok(frame) => {
          info!("处理第 {} 张图像: {}", summary.images + 1, frame.name());
          let now = Instant::now();
          let report = pipeline
            .run_image(detector, &frame)
            .with_context(|| format!("处理图像 {} 失败", frame.name()))?;
          output.render_result(&frame, &report)?;
          info!("完成，耗时: {:.2?}", now.elapsed());
          summary.record(&report);
        }
        Err(e) => {
          error!("无法读取图像: {}", e);
          summary.record_input_failure();
        }
      }

      if reached(self.max_images, summary.images) || interrupted(&rx) {
        break;
      }
    }

    summary.elapsed = start.elapsed();
    summary.log();
    Ok(summary)
  }
}

/// 按批处理，单张图像的检测失败不影响其余图像
#[derive(Debug)]
pub struct BatchTask {
  batch_size: usize,
  max_images: Option<usize>,
  interruptible: bool,
}

impl Default for BatchTask {
  fn default() -> Self {
    BatchTask {
      batch_size: 1,
      max_images: None,
      interruptible: false,
    }
  }
}

impl BatchTask {
  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size.max(1);
    self
  }

  pub fn with_max_images(mut self, max_images: Option<usize>) -> Self {
    self.max_images = max_images;
    self
  }

  pub fn with_interrupt(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }

  fn flush<D, M, O, RE>(
    &self,
    frames: &mut Vec<Frame>,
    detector: &D,
    pipeline: &Pipeline<M>,
    output: &O,
    summary: &mut RunSummary,
  ) -> anyhow::Result<()>
  where
    D: Detector,
    M: RoleMatcher,
    O: Render<Frame, ImageReport, Error = RE>,
    RE: std::error::Error + Send + Sync + 'static,
  {
    if frames.is_empty() {
      return Ok(());
    }
    let now = Instant::now();
    let reports = pipeline
      .run_batch(detector, frames, self.batch_size)
      .context("批次处理失败")?;
    for (frame, report) in frames.iter().zip(&reports) {
      output.render_result(frame, report)?;
      summary.record(report);
    }
    info!("批次完成 ({} 张)，耗时: {:.2?}", reports.len(), now.elapsed());
    frames.clear();
    Ok(())
  }
}

impl<I, IE, D, M, O, RE> Task<I, D, M, O> for BatchTask
where
  I: Iterator<Item = Result<Frame, IE>>,
  IE: std::error::Error + Send + Sync + 'static,
  D: Detector,
  M: RoleMatcher,
  O: Render<Frame, ImageReport, Error = RE>,
  RE: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    detector: &D,
    pipeline: &Pipeline<M>,
    output: &O,
  ) -> Result<RunSummary, Self::Error> {
    info!("开始任务，批大小 {}", self.batch_size);
    let rx = if self.interruptible {
      Some(install_interrupt_handler()?)
    } else {
      None
    };

    let start = Instant::now();
    let mut summary = RunSummary::default();
    let mut frames = Vec::with_capacity(self.batch_size);
    let mut taken = 0;

    for item in input {
      match item {
        Ok(frame) => frames.push(frame),
        Err(e) => {
          error!("无法读取图像: {}", e);
          summary.record_input_failure();
        }
      }
      taken += 1;

      let limit = reached(self.max_images, taken);
      if frames.len() >= self.batch_size || limit {
        self.flush(&mut frames, detector, pipeline, output, &mut summary)?;
      }
      if limit || interrupted(&rx) {
        break;
      }
    }
    self.flush(&mut frames, detector, pipeline, output, &mut summary)?;

    summary.elapsed = start.elapsed();
    summary.log();
    Ok(summary)
  }
}
