// 该文件是 Odol （超限货车） 项目的一部分。
// src/bin/overhang_check.rs - 货车悬长合法性检查
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, ensure};
use clap::{Parser, ValueEnum};
use tracing::info;
use url::Url;

use odol::{
  FromUrl, FromUrlWithScheme,
  dataset::DataFile,
  input::{InputWrapper, PromptInput, input_url},
  landmark::{DEFAULT_WHEEL_LABEL, LabelMatcher, Matcher, PositionalMatcher},
  model::DarknetJsonDetector,
  output::OutputWrapper,
  pipeline::{Pipeline, PipelineConfig},
  suppression::SuppressionConfig,
  task::{BatchTask, SequentialTask, Task},
  url_path,
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LandmarkMode {
  /// 按检测结果的数量与顺序分配角色
  Positional,
  /// 按类别名称分配角色
  Labeled,
}

/// 货车悬长合法性检查参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// darknet 数据文件（obj.data）
  #[arg(long, default_value = "./data/obj.data", value_name = "FILE")]
  data: PathBuf,

  /// 检测器，例如 darknet-json:///path/result.json
  #[arg(long, value_name = "DETECTOR")]
  detector: Url,

  /// 输入来源：图片、路径列表（.txt）、目录或带方案的 URL；
  /// 不指定时交互式输入图像路径
  #[arg(long, value_name = "SOURCE")]
  input: Option<String>,

  /// 输出，可重复：console:、console:?ext、labels:、report:///a.jsonl、draw:///dir
  #[arg(long, value_name = "OUTPUT", default_value = "console:")]
  output: Vec<Url>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.6", value_name = "THRESHOLD")]
  thresh: f32,

  /// NMS IoU 阈值，0 表示不做 NMS
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  nms_thresh: f32,

  /// 层级分类阈值
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  hier_thresh: f32,

  #[arg(long, default_value = "1", value_name = "COUNT")]
  batch_size: usize,

  /// 地标角色的分配方式
  #[arg(long, value_enum, default_value = "positional")]
  landmarks: LandmarkMode,

  /// 车轮类别名称（labeled 模式），可重复
  #[arg(long, default_value = DEFAULT_WHEEL_LABEL, value_name = "LABEL")]
  wheel_label: Vec<String>,

  /// 车身类别名称（labeled 模式），可重复；不指定时所有非车轮类别都是候选
  #[arg(long, value_name = "LABEL")]
  chassis_label: Vec<String>,

  /// 轴距不为正时不给出判定
  #[arg(long)]
  reject_degenerate: bool,

  /// 最多处理的图像数量
  #[arg(long, value_name = "COUNT")]
  max_images: Option<usize>,
}

fn check_arguments(args: &Args) -> Result<()> {
  ensure!(
    args.data.is_file(),
    "数据文件不存在: {}",
    args.data.display()
  );
  ensure!(
    args.detector.scheme() == DarknetJsonDetector::SCHEME,
    "不支持的检测器: {}",
    args.detector
  );
  let detector_path = url_path(&args.detector);
  ensure!(
    detector_path.is_file(),
    "检测结果文件不存在: {}",
    detector_path.display()
  );
  ensure!(args.batch_size > 0, "批大小必须大于 0");
  Ok(())
}

fn matcher(args: &Args) -> Matcher {
  match args.landmarks {
    LandmarkMode::Positional => Matcher::Positional(PositionalMatcher),
    LandmarkMode::Labeled => Matcher::Label(
      LabelMatcher::default()
        .with_wheel_labels(args.wheel_label.iter().cloned())
        .with_chassis_labels(args.chassis_label.iter().cloned()),
    ),
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  check_arguments(&args)?;

  let config = PipelineConfig {
    suppression: SuppressionConfig::default()
      .with_confidence_threshold(args.thresh)
      .with_nms_threshold(args.nms_thresh)
      .with_hier_threshold(args.hier_thresh),
    reject_degenerate: args.reject_degenerate,
    ..Default::default()
  };
  let pipeline = Pipeline::new(config, matcher(&args)).context("阈值配置无效")?;

  let data = DataFile::from_path(&args.data)?;
  let class_names = Arc::new(data.load_class_names()?);

  info!("检测器: {}", args.detector);
  let detector = DarknetJsonDetector::from_url(&args.detector)?;

  let source = input_url(args.input.as_deref())?;
  info!("输入来源: {}", source);
  let interactive = source.scheme() == PromptInput::SCHEME;
  let input = InputWrapper::from_url(&source)?;

  let mut outputs = Vec::with_capacity(args.output.len());
  for url in &args.output {
    info!("输出: {}", url);
    outputs.push(OutputWrapper::from_url(url)?.with_class_names(class_names.clone()));
  }

  let summary = if interactive {
    SequentialTask::default()
      .with_max_images(args.max_images)
      .run_task(input, &detector, &pipeline, &outputs)?
  } else {
    BatchTask::default()
      .with_batch_size(args.batch_size)
      .with_max_images(args.max_images)
      .with_interrupt(true)
      .run_task(input, &detector, &pipeline, &outputs)?
  };

  println!(
    "共 {} 张图像: 合法 {}, 违规 {}, 无法判定 {}, 失败 {}",
    summary.images, summary.legal, summary.illegal, summary.unresolved, summary.failed
  );
  Ok(())
}
