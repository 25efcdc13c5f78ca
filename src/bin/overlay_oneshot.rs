// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/overlay_oneshot.rs - 单帧叠加输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_overlay::{
  FromUrl,
  config::OverlayConfig,
  input::ImageFileInput,
  model::ReplayDetector,
  output::{SaveImageFileOutput, draw::Draw},
  pipeline::OverlayPipeline,
  task::{OneShotTask, RepeatShotTask, Task},
};
use tracing::info;

/// 单帧检测叠加
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测记录 (replay:///path/to/detections.txt)
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像 (image:///path/to/frame.jpg?rotation=90)
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出图像 (image:///path/to/overlay.png)
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 对同一帧重复推理的次数
  #[arg(long, value_name = "TIMES")]
  pub repeat: Option<usize>,

  #[command(flatten)]
  pub overlay: OverlayConfig,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测记录: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let model = ReplayDetector::from_url(&args.model)?;
  let output = SaveImageFileOutput::from_url(&args.output)?
    .with_draw(Draw::from_font_file(args.overlay.font.as_deref())?);
  let pipeline = OverlayPipeline::new(model, args.overlay.snapped())?;

  let summary = match args.repeat {
    Some(times) => RepeatShotTask::default()
      .with_times(times)
      .run_task(input, pipeline, output)?,
    None => OneShotTask.run_task(input, pipeline, output)?,
  };
  info!("处理完成: {:?}", summary);

  Ok(())
}
