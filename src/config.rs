// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 叠加层参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use thiserror::Error;
use tracing::warn;

use crate::{
  geometry::{FitPolicy, Size},
  stats::DEFAULT_WINDOW_CAPACITY,
  tracker::{ColorMode, DEFAULT_CONFIDENCE_THRESHOLD},
};

pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 300;
pub const DEFAULT_CLASS_COUNT: usize = 80;

const WINDOW_STEP: usize = 10;
const THRESHOLD_STEP_PERCENT: u32 = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值超出 [0, 1]: {0}")]
  InvalidThreshold(f32),
  #[error("{0} 不能为零")]
  ZeroValue(&'static str),
}

/// 模型输入的裁剪方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CropMode {
  /// 取可见区域中心的正方形，等比例铺满模型输入
  Square,
  /// 取完整可见区域，两轴独立拉伸到模型输入
  #[default]
  Full,
}

impl CropMode {
  pub fn is_square(&self) -> bool {
    matches!(self, CropMode::Square)
  }

  /// 显示帧 → 模型输入的缩放方式
  pub fn fit_policy(&self) -> FitPolicy {
    match self {
      CropMode::Square => FitPolicy::Cover,
      CropMode::Full => FitPolicy::Stretch,
    }
  }
}

/// 叠加层参数
#[derive(Args, Debug, Clone, PartialEq)]
pub struct OverlayConfig {
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence_threshold: f32,

  /// 模型输入边长（正方形）
  #[arg(long, default_value_t = DEFAULT_MODEL_INPUT_SIZE, value_name = "PIXELS")]
  pub model_input_size: u32,

  /// 延迟统计窗口容量
  #[arg(long, default_value_t = DEFAULT_WINDOW_CAPACITY, value_name = "SAMPLES")]
  pub window_capacity: usize,

  /// 检测框取色方式
  #[arg(long, value_enum, default_value_t = ColorMode::Classes)]
  pub color_mode: ColorMode,

  /// 模型输入裁剪方式
  #[arg(long, value_enum, default_value_t = CropMode::Full)]
  pub crop_mode: CropMode,

  /// 在正方形裁剪区域外绘制遮罩，缺省随裁剪方式；仅在 square 模式下生效
  #[arg(long, value_name = "BOOL")]
  pub crop_overlay: Option<bool>,

  /// 标签中显示置信度
  #[arg(long)]
  pub show_confidence: bool,

  /// 显示帧宽度，缺省为旋转后的源帧宽度
  #[arg(long, value_name = "PIXELS")]
  pub display_width: Option<u32>,

  /// 显示帧高度，缺省为旋转后的源帧高度
  #[arg(long, value_name = "PIXELS")]
  pub display_height: Option<u32>,

  /// 类别数量（调色板大小）
  #[arg(long, default_value_t = DEFAULT_CLASS_COUNT, value_name = "COUNT")]
  pub class_count: usize,

  /// 调色板随机种子，缺省时每次运行不同
  #[arg(long, value_name = "SEED")]
  pub palette_seed: Option<u64>,

  /// 标签字体文件 (TTF/OTF)，缺省时不绘制文字
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

impl Default for OverlayConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      model_input_size: DEFAULT_MODEL_INPUT_SIZE,
      window_capacity: DEFAULT_WINDOW_CAPACITY,
      color_mode: ColorMode::Classes,
      crop_mode: CropMode::Full,
      crop_overlay: None,
      show_confidence: false,
      display_width: None,
      display_height: None,
      class_count: DEFAULT_CLASS_COUNT,
      palette_seed: None,
      font: None,
    }
  }
}

impl OverlayConfig {
  /// 按设置界面的步进取整：窗口容量取 10 的倍数（至少 10），阈值向下取到 5%
  pub fn snapped(&self) -> Self {
    let window_capacity = (self.window_capacity / WINDOW_STEP * WINDOW_STEP).max(WINDOW_STEP);
    let percent = (self.confidence_threshold * 100.0).round().max(0.0) as u32;
    let confidence_threshold =
      (percent / THRESHOLD_STEP_PERCENT * THRESHOLD_STEP_PERCENT) as f32 / 100.0;

    if window_capacity != self.window_capacity {
      warn!(
        "统计窗口容量 {} 调整为 {}",
        self.window_capacity, window_capacity
      );
    }
    if (confidence_threshold - self.confidence_threshold).abs() > f32::EPSILON {
      warn!(
        "置信度阈值 {} 调整为 {}",
        self.confidence_threshold, confidence_threshold
      );
    }

    Self {
      window_capacity,
      confidence_threshold,
      ..self.clone()
    }
  }

  /// 是否绘制裁剪遮罩：只有正方形裁剪才有模型看不到的区域
  pub fn crop_overlay_enabled(&self) -> bool {
    self.crop_mode.is_square() && self.crop_overlay.unwrap_or(true)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      return Err(ConfigError::InvalidThreshold(self.confidence_threshold));
    }
    if self.model_input_size == 0 {
      return Err(ConfigError::ZeroValue("模型输入尺寸"));
    }
    if self.window_capacity == 0 {
      return Err(ConfigError::ZeroValue("统计窗口容量"));
    }
    if self.class_count == 0 {
      return Err(ConfigError::ZeroValue("类别数量"));
    }
    if self.display_width == Some(0) || self.display_height == Some(0) {
      return Err(ConfigError::ZeroValue("显示帧尺寸"));
    }
    Ok(())
  }

  /// 显示帧尺寸：未指定的边取旋转后的源帧尺寸
  pub fn display_size(&self, source: Size, rotation_degrees: i32) -> Size {
    let effective = source.rotated(rotation_degrees);
    Size::new(
      self.display_width.unwrap_or(effective.width),
      self.display_height.unwrap_or(effective.height),
    )
  }

  pub fn model_input(&self) -> Size {
    Size::square(self.model_input_size)
  }
}
