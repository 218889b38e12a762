// 该文件是 Odol （超限货车） 项目的一部分。
// src/bin/dataset_split.rs - 生成训练集与测试集清单
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use odol::split::split_directory;

/// 按比例把图像目录划分为训练集与测试集
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// 图像目录
  #[arg(long, value_name = "DIR")]
  dir: PathBuf,

  /// 测试集比例 (0, 100]
  #[arg(long, default_value = "10", value_name = "PERCENT")]
  percentage: f64,

  /// 清单中每行的路径前缀，默认为图像目录
  #[arg(long, value_name = "PREFIX")]
  prefix: Option<String>,

  /// 图像扩展名
  #[arg(long, default_value = "jpg", value_name = "EXT")]
  extension: String,

  #[arg(long, default_value = "data/train.txt", value_name = "FILE")]
  train: PathBuf,

  #[arg(long, default_value = "data/test.txt", value_name = "FILE")]
  test: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let prefix = args
    .prefix
    .clone()
    .unwrap_or_else(|| args.dir.to_string_lossy().into_owned());
  info!("图像目录: {}, 测试集比例 {}%", args.dir.display(), args.percentage);

  let split = split_directory(&args.dir, &args.extension, args.percentage, &prefix)
    .with_context(|| format!("无法划分 {}", args.dir.display()))?;
  split.write_manifests(&args.train, &args.test)?;

  println!("训练集 {} 张, 测试集 {} 张", split.train.len(), split.test.len());
  Ok(())
}
