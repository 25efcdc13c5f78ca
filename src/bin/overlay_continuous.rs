// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/overlay_continuous.rs - 连续帧叠加与延迟统计
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
  input::InputWrapper,
  model::ReplayDetector,
  output::{OutputWrapper, draw::Draw},
  pipeline::OverlayPipeline,
  task::{ContinuousTask, Task},
};
use tracing::info;

/// 连续检测叠加
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测记录 (replay:///path/to/detections.txt)
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源 (image:///path/to/frame.jpg?repeat=100)
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径 (image:///... 或 folder:///...?record)
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  #[command(flatten)]
  pub overlay: OverlayConfig,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测记录: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let model = ReplayDetector::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?
    .with_draw(Draw::from_font_file(args.overlay.font.as_deref())?);
  let pipeline = OverlayPipeline::new(model, args.overlay.snapped())?;

  let summary = ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .run_task(input, pipeline, output)?;

  let report = serde_json::json!({
    "processed": summary.processed,
    "skipped": summary.skipped,
    "publish_count": summary.publish_count,
    "fps": summary.fps,
    "latency_ms": summary.statistics.map(|s| serde_json::json!({
      "min": s.min,
      "first_quartile": s.first_quartile,
      "median": s.median,
      "third_quartile": s.third_quartile,
      "max": s.max,
    })),
  });
  println!("{}", report);

  Ok(())
}
