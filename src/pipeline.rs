// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 逐帧处理流程
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # 叠加层流程
//!
//! 每一帧：裁剪出模型输入 → 计时推理 → 记录延迟 → 把检测结果映射回显示帧。

use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  config::{ConfigError, OverlayConfig},
  geometry::{GeometryError, RectF, Size, build_transform, crop_to_model_input},
  input::SourceFrame,
  model::{Detection, Model},
  output::{Overlay, Surface, boxplot::BoxPlot},
  stats::{LatencyStatistics, OrderStatistics, StatsError, ThroughputMeter},
  tracker::{ColorPalette, DetectionTracker, FrameConfiguration, TrackedDetection},
};

// 统计面板中线宽、字号相对面板高度的比例
const PLOT_LINE_WIDTH_DIVISOR: f32 = 40.0;
const PLOT_TEXT_SIZE_DIVISOR: f32 = 4.0;

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("几何错误: {0}")]
  Geometry(#[from] GeometryError),
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("统计错误: {0}")]
  Stats(#[from] StatsError),
  #[error("模型推理错误: {0}")]
  Model(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 单帧处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
  Processed {
    /// 模型给出的检测数（过滤前）
    detections: usize,
    latency_ms: u32,
    /// 本帧触发发布时的新统计量
    published: Option<OrderStatistics>,
  },
  /// 几何尺寸无效，跳过该帧
  Skipped,
}

pub struct OverlayPipeline<M> {
  model: M,
  config: OverlayConfig,
  tracker: DetectionTracker,
  latency: LatencyStatistics,
  throughput: ThroughputMeter,
}

impl<M> OverlayPipeline<M>
where
  M: Model<Input = RgbImage, Output = Vec<Detection>>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(model: M, config: OverlayConfig) -> Result<Self, PipelineError> {
    config.validate()?;

    let palette = match config.palette_seed {
      Some(seed) => ColorPalette::with_seed(config.class_count, seed),
      None => ColorPalette::from_entropy(config.class_count),
    };
    let tracker = DetectionTracker::new(palette);
    tracker.set_confidence_threshold(config.confidence_threshold);
    tracker.set_crop_overlay(config.crop_overlay_enabled());

    let latency = LatencyStatistics::new(config.window_capacity)?;

    info!(
      "叠加层流程初始化: 模型输入 {0}x{0}, 裁剪 {1:?}, 阈值 {2}, 窗口 {3}",
      config.model_input_size, config.crop_mode, config.confidence_threshold, config.window_capacity
    );

    Ok(Self {
      model,
      config,
      tracker,
      latency,
      throughput: ThroughputMeter::new(),
    })
  }

  /// 处理一帧
  ///
  /// 尺寸无效的帧被跳过；变换不可逆与推理失败作为错误返回。
  pub fn process_frame(&mut self, frame: &SourceFrame) -> Result<FrameOutcome, PipelineError> {
    let display = self.config.display_size(frame.size(), frame.rotation);
    let square = self.config.crop_mode.is_square();
    let model_input = self.config.model_input();

    let skip = |err: GeometryError| -> Result<FrameOutcome, PipelineError> {
      match err {
        GeometryError::InvalidGeometry(_) => {
          warn!("跳过该帧: {}", err);
          Ok(FrameOutcome::Skipped)
        }
        other => Err(other.into()),
      }
    };

    let input = match crop_to_model_input(
      &frame.image,
      display,
      frame.rotation,
      model_input.width,
      true,
      square,
    ) {
      Ok(input) => input,
      Err(err) => return skip(err),
    };
    let forward = match build_transform(display, model_input, 0, self.config.crop_mode.fit_policy())
    {
      Ok(forward) => forward,
      Err(err) => return skip(err),
    };
    let inverse = forward.invert()?;

    self
      .tracker
      .configure_frame(FrameConfiguration::with_square_crop(
        display.width,
        display.height,
        self.config.show_confidence,
        self.config.color_mode,
      ));

    let start = Instant::now();
    let detections = self
      .model
      .infer(&input)
      .map_err(|e| PipelineError::Model(Box::new(e)))?;
    let latency_ms = u32::try_from(start.elapsed().as_millis()).unwrap_or(u32::MAX);

    let published = self.latency.record(latency_ms);
    if let Some(fps) = self.throughput.tick(Instant::now()) {
      debug!("处理帧率: {:.1} fps", fps);
    }
    self.tracker.update(&detections, &inverse);

    debug!("推理完成, 耗时 {} ms, 检测 {} 个", latency_ms, detections.len());
    Ok(FrameOutcome::Processed {
      detections: detections.len(),
      latency_ms,
      published,
    })
  }
}

impl<M> OverlayPipeline<M> {
  pub fn config(&self) -> &OverlayConfig {
    &self.config
  }

  pub fn tracker(&self) -> &DetectionTracker {
    &self.tracker
  }

  pub fn latency(&self) -> &LatencyStatistics {
    &self.latency
  }

  pub fn fps(&self) -> Option<f32> {
    self.throughput.fps()
  }

  pub fn display_size_for(&self, frame: &SourceFrame) -> Size {
    self.config.display_size(frame.size(), frame.rotation)
  }
}

impl<M> Overlay for OverlayPipeline<M> {
  fn display_size(&self, frame: &SourceFrame) -> Size {
    self.display_size_for(frame)
  }

  fn draw_detections(&self, surface: &mut dyn Surface) {
    self.tracker.render(surface);
  }

  fn draw_statistics(&self, surface: &mut dyn Surface, region: RectF) {
    let height = region.height();
    let plot = BoxPlot::new(
      (height / PLOT_LINE_WIDTH_DIVISOR).max(1.0),
      height / PLOT_TEXT_SIZE_DIVISOR,
    );
    plot.render(surface, region, self.latency.snapshot().as_ref());
  }

  fn detections(&self) -> Vec<TrackedDetection> {
    self.tracker.tracked()
  }

  fn statistics(&self) -> Option<OrderStatistics> {
    self.latency.snapshot()
  }
}
