// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 叠加层光栅化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, RgbImage, Rgba, RgbaImage, imageops};
use imageproc::{
  drawing::{
    Blend, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
    text_size,
  },
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  geometry::{GeometryError, RectF, Size, crop_to_model_input},
  input::SourceFrame,
  output::{Overlay, Surface},
};

// 未加载字体时估算文字宽度用的字宽比例
const LABEL_CHAR_WIDTH_RATIO: f32 = 0.55;
// 虚线段与间隔长度
const DASH_LENGTH: f32 = 25.0;
// 统计面板高度：显示帧高度的 1/5，至少 48 像素
const PANEL_HEIGHT_DIVISOR: u32 = 5;
const PANEL_MIN_HEIGHT: u32 = 48;
const PANEL_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 绘制参数
#[derive(Clone, Default)]
pub struct Draw {
  font: Option<FontArc>,
}

impl std::fmt::Debug for Draw {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Draw")
      .field("font", &self.font.is_some())
      .finish()
  }
}

impl Draw {
  pub fn new(font: Option<FontArc>) -> Self {
    Self { font }
  }

  /// 从磁盘加载字体；`None` 时不绘制文字
  pub fn from_font_file(path: Option<&Path>) -> Result<Self, DrawError> {
    let Some(path) = path else {
      debug!("未指定字体, 标签文字将被省略");
      return Ok(Self::default());
    };
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    info!("加载字体: {}", path.display());
    Ok(Self::new(Some(font)))
  }

  /// 合成一帧显示图像：显示帧 + 检测叠加层，下方附统计面板
  pub fn compose<O: Overlay + ?Sized>(
    &self,
    frame: &SourceFrame,
    overlay: &O,
  ) -> Result<RgbaImage, GeometryError> {
    let display = overlay.display_size(frame);
    let visible = display_frame(frame, display)?;

    let panel_height = (display.height / PANEL_HEIGHT_DIVISOR).max(PANEL_MIN_HEIGHT);
    let mut canvas = RgbaImage::from_pixel(
      display.width,
      display.height + panel_height,
      PANEL_BACKGROUND,
    );
    imageops::replace(
      &mut canvas,
      &DynamicImage::ImageRgb8(visible).to_rgba8(),
      0,
      0,
    );

    let mut surface = CanvasSurface::new(canvas, self.font.clone());
    overlay.draw_detections(&mut surface);
    overlay.draw_statistics(
      &mut surface,
      RectF::new(
        0.0,
        display.height as f32,
        display.width as f32,
        (display.height + panel_height) as f32,
      ),
    );
    let mut image = surface.into_image();
    // 混合后的透明度可能因舍入略低于 255，输出帧一律不透明
    for pixel in image.pixels_mut() {
      pixel.0[3] = u8::MAX;
    }
    Ok(image)
  }
}

/// 源帧按显示方向旋转、裁出与显示帧同宽高比的可见区域并缩放到显示尺寸
pub fn display_frame(frame: &SourceFrame, display: Size) -> Result<RgbImage, GeometryError> {
  display.ensure_valid("显示帧尺寸")?;

  let visible = crop_to_model_input(&frame.image, display, frame.rotation, 0, false, false)?;
  if visible.dimensions() == (display.width, display.height) {
    return Ok(visible);
  }
  Ok(imageops::resize(
    &visible,
    display.width,
    display.height,
    imageops::FilterType::Triangle,
  ))
}

/// 基于 `RgbaImage` 的绘制目标，按透明度混合
pub struct CanvasSurface {
  canvas: Blend<RgbaImage>,
  font: Option<FontArc>,
}

impl CanvasSurface {
  pub fn new(image: RgbaImage, font: Option<FontArc>) -> Self {
    Self {
      canvas: Blend(image),
      font,
    }
  }

  pub fn image(&self) -> &RgbaImage {
    &self.canvas.0
  }

  pub fn into_image(self) -> RgbaImage {
    self.canvas.0
  }
}

/// 四舍五入到像素网格；宽或高不足一个像素时为 `None`
fn pixel_rect(rect: &RectF) -> Option<Rect> {
  let left = rect.left.round() as i32;
  let top = rect.top.round() as i32;
  let width = rect.right.round() as i32 - left;
  let height = rect.bottom.round() as i32 - top;
  if width <= 0 || height <= 0 {
    return None;
  }
  Some(Rect::at(left, top).of_size(width as u32, height as u32))
}

fn dash_segments(from: (f32, f32), to: (f32, f32)) -> Vec<((f32, f32), (f32, f32))> {
  let (dx, dy) = (to.0 - from.0, to.1 - from.1);
  let length = dx.hypot(dy);
  if length == 0.0 {
    return Vec::new();
  }

  let point = |t: f32| (from.0 + dx * t / length, from.1 + dy * t / length);
  let mut segments = Vec::new();
  let mut start = 0.0;
  while start < length {
    let end = (start + DASH_LENGTH).min(length);
    segments.push((point(start), point(end)));
    start += DASH_LENGTH * 2.0;
  }
  segments
}

fn stroke_count(stroke_width: f32) -> i32 {
  stroke_width.round().max(1.0) as i32
}

impl Surface for CanvasSurface {
  fn width(&self) -> u32 {
    self.canvas.0.width()
  }

  fn height(&self) -> u32 {
    self.canvas.0.height()
  }

  fn fill_rect(&mut self, rect: &RectF, color: Rgba<u8>) {
    if let Some(rect) = pixel_rect(rect) {
      draw_filled_rect_mut(&mut self.canvas, rect, color);
    }
  }

  fn stroke_rect(&mut self, rect: &RectF, stroke_width: f32, color: Rgba<u8>) {
    let Some(outer) = pixel_rect(rect) else {
      return;
    };
    // 由外向内逐圈加粗
    for inset in 0..stroke_count(stroke_width) {
      let width = outer.width() as i32 - 2 * inset;
      let height = outer.height() as i32 - 2 * inset;
      if width <= 0 || height <= 0 {
        break;
      }
      let ring = Rect::at(outer.left() + inset, outer.top() + inset)
        .of_size(width as u32, height as u32);
      draw_hollow_rect_mut(&mut self.canvas, ring, color);
    }
  }

  fn draw_line(
    &mut self,
    from: (f32, f32),
    to: (f32, f32),
    stroke_width: f32,
    color: Rgba<u8>,
    dashed: bool,
  ) {
    let segments = if dashed {
      dash_segments(from, to)
    } else {
      vec![(from, to)]
    };

    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let length = dx.hypot(dy);
    let normal = if length == 0.0 {
      (0.0, 0.0)
    } else {
      (-dy / length, dx / length)
    };

    let count = stroke_count(stroke_width);
    for (start, end) in segments {
      for i in 0..count {
        let offset = (i - count / 2) as f32;
        let shift = (normal.0 * offset, normal.1 * offset);
        draw_line_segment_mut(
          &mut self.canvas,
          (start.0 + shift.0, start.1 + shift.1),
          (end.0 + shift.0, end.1 + shift.1),
          color,
        );
      }
    }
  }

  fn draw_text(&mut self, x: f32, y: f32, size: f32, text: &str, color: Rgba<u8>) {
    if let Some(font) = self.font.as_ref() {
      draw_text_mut(
        &mut self.canvas,
        color,
        x.round() as i32,
        y.round() as i32,
        PxScale::from(size),
        font,
        text,
      );
    }
  }

  fn text_width(&self, text: &str, size: f32) -> f32 {
    match self.font.as_ref() {
      Some(font) => text_size(PxScale::from(size), font, text).0 as f32,
      None => text.chars().count() as f32 * size * LABEL_CHAR_WIDTH_RATIO,
    }
  }
}
