// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tracker.rs - 检测结果过滤、上色与显示空间映射
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # 检测跟踪器
//!
//! 名为“跟踪”，实际只做逐帧的过滤、上色和坐标回映射：
//! 每次 [`DetectionTracker::update`] 都整体替换结果列表，不保留跨帧的目标身份。

use std::{
  str::FromStr,
  sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use image::{Rgb, Rgba};
use tracing::debug;

use crate::{
  geometry::{AffineTransform, RectF},
  model::Detection,
  output::Surface,
};

mod palette;
pub use self::palette::{ColorPalette, confidence_color, hsv_to_rgb};

/// 检测框在显示帧中的最小边长
pub const MIN_BOX_SIZE: f32 = 16.0;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

const MASK_COLOR: Rgba<u8> = Rgba([0, 0, 0, 180]);
const LABEL_TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BOX_ALPHA: u8 = 200;
const STROKE_WIDTH_DIVISOR: f32 = 70.0;
const TEXT_SIZE_DIVISOR: f32 = 25.0;

/// 检测框取色方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorMode {
  /// 按类别查调色板
  #[default]
  Classes,
  /// 按置信度红绿渐变
  Confidence,
}

impl FromStr for ColorMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "classes" => Ok(ColorMode::Classes),
      "confidence" => Ok(ColorMode::Confidence),
      other => Err(format!("未知的取色方式: {}", other)),
    }
  }
}

/// 显示帧配置
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameConfiguration {
  pub width: u32,
  pub height: u32,
  /// 正方形裁剪区域的两条边界，之外为遮罩区
  pub crop_top: i32,
  pub crop_bottom: i32,
  pub show_confidence: bool,
  pub color_mode: ColorMode,
}

impl FrameConfiguration {
  pub fn new(
    width: u32,
    height: u32,
    crop_top: i32,
    crop_bottom: i32,
    show_confidence: bool,
    color_mode: ColorMode,
  ) -> Self {
    Self {
      width,
      height,
      crop_top,
      crop_bottom,
      show_confidence,
      color_mode,
    }
  }

  /// 以显示帧居中的正方形为有效区域，沿长边计算两条边界
  pub fn with_square_crop(
    width: u32,
    height: u32,
    show_confidence: bool,
    color_mode: ColorMode,
  ) -> Self {
    let long = width.max(height) as i32;
    let short = width.min(height) as i32;
    let crop_top = (long - short) / 2;
    Self::new(
      width,
      height,
      crop_top,
      crop_top + short,
      show_confidence,
      color_mode,
    )
  }

  /// 两块遮罩：竖屏时在上下，横屏时在左右
  pub fn dead_zones(&self) -> [RectF; 2] {
    let width = self.width as f32;
    let height = self.height as f32;
    let top = self.crop_top as f32;
    let bottom = self.crop_bottom as f32;
    if self.width < self.height {
      [
        RectF::new(0.0, 0.0, width, top),
        RectF::new(0.0, bottom, width, height),
      ]
    } else {
      [
        RectF::new(0.0, 0.0, top, height),
        RectF::new(bottom, 0.0, width, height),
      ]
    }
  }

  pub fn stroke_width(&self) -> f32 {
    self.width as f32 / STROKE_WIDTH_DIVISOR
  }

  pub fn text_size(&self) -> f32 {
    self.width as f32 / TEXT_SIZE_DIVISOR
  }
}

/// 映射到显示空间并上色后的检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedDetection {
  pub bbox: RectF,
  pub confidence: f32,
  pub title: String,
  pub color: Rgb<u8>,
}

impl TrackedDetection {
  pub fn label(&self, show_confidence: bool) -> String {
    if show_confidence {
      format!("{} {:.1}%", self.title, 100.0 * self.confidence)
        .trim_start()
        .to_string()
    } else {
      self.title.clone()
    }
  }
}

#[derive(Debug)]
struct TrackerState {
  frame: FrameConfiguration,
  tracked: Vec<TrackedDetection>,
  visible: bool,
  crop_overlay: bool,
  confidence_threshold: f32,
}

/// 检测跟踪器
///
/// 所有状态由一把读写锁保护：绘制只会看到更新前或更新后的完整状态。
#[derive(Debug)]
pub struct DetectionTracker {
  palette: ColorPalette,
  state: RwLock<TrackerState>,
}

impl DetectionTracker {
  pub fn new(palette: ColorPalette) -> Self {
    Self {
      palette,
      state: RwLock::new(TrackerState {
        frame: FrameConfiguration::default(),
        tracked: Vec::new(),
        visible: true,
        crop_overlay: false,
        confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      }),
    }
  }

  pub fn palette(&self) -> &ColorPalette {
    &self.palette
  }

  fn read(&self) -> RwLockReadGuard<'_, TrackerState> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, TrackerState> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn configure_frame(&self, frame: FrameConfiguration) {
    self.write().frame = frame;
  }

  pub fn frame_configuration(&self) -> FrameConfiguration {
    self.read().frame.clone()
  }

  pub fn set_crop_overlay(&self, enabled: bool) {
    self.write().crop_overlay = enabled;
  }

  pub fn set_confidence_threshold(&self, threshold: f32) {
    self.write().confidence_threshold = threshold;
  }

  /// 隐藏时同时清空当前结果
  pub fn set_visible(&self, visible: bool) {
    let mut state = self.write();
    if !visible {
      state.tracked.clear();
    }
    state.visible = visible;
  }

  pub fn is_visible(&self) -> bool {
    self.read().visible
  }

  /// 过滤、回映射并上色，然后整体替换结果列表
  ///
  /// `inverse` 把模型输入空间映射回显示空间，尺寸过滤作用于映射后的框。
  pub fn update(&self, detections: &[Detection], inverse: &AffineTransform) {
    let mut state = self.write();
    let threshold = state.confidence_threshold;
    let color_mode = state.frame.color_mode;

    let tracked: Vec<TrackedDetection> = detections
      .iter()
      .filter_map(|detection| {
        let bbox = inverse.map_rect(detection.bbox.as_ref()?);
        // 最小边长在显示空间里判断
        if bbox.width() < MIN_BOX_SIZE || bbox.height() < MIN_BOX_SIZE {
          return None;
        }
        if detection.confidence < threshold {
          return None;
        }

        let color = match color_mode {
          ColorMode::Confidence => confidence_color(detection.confidence),
          ColorMode::Classes => self
            .palette
            .get(detection.class_id)
            .unwrap_or_else(|| confidence_color(detection.confidence)),
        };

        Some(TrackedDetection {
          bbox,
          confidence: detection.confidence,
          title: detection.title.clone(),
          color,
        })
      })
      .collect();

    debug!("保留 {} / {} 个检测结果", tracked.len(), detections.len());
    state.tracked = tracked;
  }

  pub fn tracked(&self) -> Vec<TrackedDetection> {
    self.read().tracked.clone()
  }

  /// 绘制遮罩与检测框
  ///
  /// 遮罩在不可见时也会绘制。
  pub fn render<S: Surface + ?Sized>(&self, surface: &mut S) {
    let state = self.read();

    if state.crop_overlay {
      for zone in state.frame.dead_zones() {
        surface.fill_rect(&zone, MASK_COLOR);
      }
    }

    if !state.visible {
      return;
    }

    let stroke = state.frame.stroke_width();
    let text_size = state.frame.text_size();
    for detection in state.tracked.iter() {
      let [r, g, b] = detection.color.0;
      let color = Rgba([r, g, b, BOX_ALPHA]);
      surface.stroke_rect(&detection.bbox, stroke, color);

      let label = detection.label(state.frame.show_confidence);
      if label.is_empty() {
        continue;
      }
      let text_width = surface.text_width(&label, text_size);
      let background = RectF::new(
        detection.bbox.left,
        detection.bbox.top - text_size,
        detection.bbox.left + text_width,
        detection.bbox.top,
      );
      surface.fill_rect(&background, color);
      surface.draw_text(
        background.left,
        background.top,
        text_size,
        &label,
        LABEL_TEXT_COLOR,
      );
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::geometry::{FitPolicy, Size, build_transform};

  #[derive(Debug, Clone, PartialEq)]
  pub(crate) enum DrawOp {
    Fill(RectF, Rgba<u8>),
    Stroke(RectF, Rgba<u8>),
    Line((f32, f32), (f32, f32), bool),
    Text(String),
  }

  /// 记录绘制调用的测试画布
  pub(crate) struct RecordingSurface {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
  }

  impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
      Self {
        width,
        height,
        ops: Vec::new(),
      }
    }
  }

  impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
      self.width
    }

    fn height(&self) -> u32 {
      self.height
    }

    fn fill_rect(&mut self, rect: &RectF, color: Rgba<u8>) {
      self.ops.push(DrawOp::Fill(*rect, color));
    }

    fn stroke_rect(&mut self, rect: &RectF, _stroke_width: f32, color: Rgba<u8>) {
      self.ops.push(DrawOp::Stroke(*rect, color));
    }

    fn draw_line(
      &mut self,
      from: (f32, f32),
      to: (f32, f32),
      _stroke_width: f32,
      _color: Rgba<u8>,
      dashed: bool,
    ) {
      self.ops.push(DrawOp::Line(from, to, dashed));
    }

    fn draw_text(&mut self, _x: f32, _y: f32, _size: f32, text: &str, _color: Rgba<u8>) {
      self.ops.push(DrawOp::Text(text.to_string()));
    }

    fn text_width(&self, text: &str, size: f32) -> f32 {
      text.chars().count() as f32 * size * 0.5
    }
  }

  fn detection(bbox: RectF, confidence: f32, class_id: u32) -> Detection {
    Detection::new(bbox, confidence, class_id, "person")
  }

  fn tracker() -> DetectionTracker {
    let tracker = DetectionTracker::new(ColorPalette::with_seed(10, 11));
    tracker.configure_frame(FrameConfiguration::with_square_crop(
      320,
      640,
      true,
      ColorMode::Classes,
    ));
    tracker
  }

  #[test]
  fn undersized_boxes_are_dropped_regardless_of_confidence() {
    let tracker = tracker();
    tracker.update(
      &[
        detection(RectF::new(0.0, 0.0, 10.0, 100.0), 0.99, 0),
        detection(RectF::new(0.0, 0.0, 100.0, 15.9), 1.0, 0),
        detection(RectF::new(0.0, 0.0, 16.0, 16.0), 0.9, 0),
      ],
      &AffineTransform::identity(),
    );
    let tracked = tracker.tracked();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].bbox, RectF::new(0.0, 0.0, 16.0, 16.0));
  }

  #[test]
  fn minimum_size_is_checked_in_display_space() {
    let tracker = tracker();

    // 大显示帧：模型中 10 px 的框放大到 36 px
    let large = build_transform(Size::new(1080, 1920), Size::square(300), 0, FitPolicy::Cover)
      .unwrap()
      .invert()
      .unwrap();
    tracker.update(
      &[detection(RectF::new(100.0, 100.0, 110.0, 110.0), 0.9, 0)],
      &large,
    );
    let tracked = tracker.tracked();
    assert_eq!(tracked.len(), 1);
    assert!((tracked[0].bbox.width() - 36.0).abs() < 1e-3);

    // 小显示帧：模型中 20 px 的框缩小到 10 px
    let small = build_transform(Size::square(150), Size::square(300), 0, FitPolicy::Cover)
      .unwrap()
      .invert()
      .unwrap();
    tracker.update(&[detection(RectF::new(0.0, 0.0, 20.0, 20.0), 0.9, 0)], &small);
    assert!(tracker.tracked().is_empty());
  }

  #[test]
  fn render_sees_whole_update_under_contention() {
    let tracker = tracker();
    let one = [detection(RectF::new(0.0, 0.0, 40.0, 40.0), 0.9, 1)];
    let three = [
      detection(RectF::new(100.0, 100.0, 140.0, 140.0), 0.9, 1),
      detection(RectF::new(150.0, 150.0, 190.0, 190.0), 0.9, 2),
      detection(RectF::new(200.0, 200.0, 240.0, 240.0), 0.9, 3),
    ];
    tracker.update(&one, &AffineTransform::identity());

    std::thread::scope(|scope| {
      scope.spawn(|| {
        for i in 0..500 {
          let detections: &[Detection] = if i % 2 == 0 { &three } else { &one };
          tracker.update(detections, &AffineTransform::identity());
        }
      });
      scope.spawn(|| {
        for _ in 0..500 {
          let mut surface = RecordingSurface::new(320, 640);
          tracker.render(&mut surface);
          let strokes: Vec<RectF> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
              DrawOp::Stroke(rect, _) => Some(*rect),
              _ => None,
            })
            .collect();
          match strokes.len() {
            1 => assert_eq!(strokes[0], RectF::new(0.0, 0.0, 40.0, 40.0)),
            3 => assert_eq!(strokes[0], RectF::new(100.0, 100.0, 140.0, 140.0)),
            n => panic!("绘制到不完整的结果列表: {} 个框", n),
          }
        }
      });
    });
  }

  #[test]
  fn missing_boxes_and_low_confidence_are_dropped() {
    let tracker = tracker();
    let mut missing = detection(RectF::new(0.0, 0.0, 50.0, 50.0), 0.9, 0);
    missing.bbox = None;
    tracker.update(
      &[missing, detection(RectF::new(0.0, 0.0, 50.0, 50.0), 0.3, 0)],
      &AffineTransform::identity(),
    );
    assert!(tracker.tracked().is_empty());

    tracker.set_confidence_threshold(0.25);
    tracker.update(
      &[detection(RectF::new(0.0, 0.0, 50.0, 50.0), 0.3, 0)],
      &AffineTransform::identity(),
    );
    assert_eq!(tracker.tracked().len(), 1);
  }

  #[test]
  fn boxes_are_mapped_into_display_space() {
    let tracker = tracker();
    let forward = build_transform(Size::new(320, 640), Size::square(300), 0, FitPolicy::Cover).unwrap();
    let inverse = forward.invert().unwrap();
    tracker.update(
      &[detection(RectF::new(0.0, 0.0, 150.0, 150.0), 0.8, 2)],
      &inverse,
    );
    let bbox = tracker.tracked()[0].bbox;
    assert!((bbox.left - 0.0).abs() < 1e-3);
    assert!((bbox.top - 160.0).abs() < 1e-3);
    assert!((bbox.right - 160.0).abs() < 1e-3);
    assert!((bbox.bottom - 320.0).abs() < 1e-3);
  }

  #[test]
  fn colors_follow_mode() {
    let tracker = tracker();
    let detections = [detection(RectF::new(0.0, 0.0, 40.0, 40.0), 0.57, 3)];

    tracker.update(&detections, &AffineTransform::identity());
    assert_eq!(tracker.tracked()[0].color, tracker.palette().get(3).unwrap());

    tracker.configure_frame(FrameConfiguration::with_square_crop(
      320,
      640,
      false,
      ColorMode::Confidence,
    ));
    tracker.update(&detections, &AffineTransform::identity());
    assert_eq!(tracker.tracked()[0].color, Rgb([123, 132, 0]));
  }

  #[test]
  fn update_replaces_previous_list() {
    let tracker = tracker();
    tracker.update(
      &[
        detection(RectF::new(0.0, 0.0, 40.0, 40.0), 0.9, 1),
        detection(RectF::new(50.0, 50.0, 90.0, 90.0), 0.9, 1),
      ],
      &AffineTransform::identity(),
    );
    assert_eq!(tracker.tracked().len(), 2);
    tracker.update(&[], &AffineTransform::identity());
    assert!(tracker.tracked().is_empty());
  }

  #[test]
  fn square_crop_borders_follow_long_axis() {
    let portrait = FrameConfiguration::with_square_crop(320, 640, false, ColorMode::Classes);
    assert_eq!((portrait.crop_top, portrait.crop_bottom), (160, 480));
    assert_eq!(
      portrait.dead_zones(),
      [
        RectF::new(0.0, 0.0, 320.0, 160.0),
        RectF::new(0.0, 480.0, 320.0, 640.0)
      ]
    );

    let landscape = FrameConfiguration::with_square_crop(640, 320, false, ColorMode::Classes);
    assert_eq!(
      landscape.dead_zones(),
      [
        RectF::new(0.0, 0.0, 160.0, 320.0),
        RectF::new(480.0, 0.0, 640.0, 320.0)
      ]
    );
  }

  #[test]
  fn masks_draw_even_when_hidden() {
    let tracker = tracker();
    tracker.set_crop_overlay(true);
    tracker.update(
      &[detection(RectF::new(0.0, 0.0, 40.0, 40.0), 0.9, 1)],
      &AffineTransform::identity(),
    );
    tracker.set_visible(false);
    assert!(tracker.tracked().is_empty());

    let mut surface = RecordingSurface::new(320, 640);
    tracker.render(&mut surface);
    assert_eq!(surface.ops.len(), 2);
    assert!(surface.ops.iter().all(|op| matches!(op, DrawOp::Fill(_, c) if *c == MASK_COLOR)));
  }

  #[test]
  fn render_draws_box_and_label() {
    let tracker = tracker();
    tracker.update(
      &[detection(RectF::new(10.0, 40.0, 60.0, 90.0), 0.912, 1)],
      &AffineTransform::identity(),
    );
    let mut surface = RecordingSurface::new(320, 640);
    tracker.render(&mut surface);

    assert!(matches!(surface.ops[0], DrawOp::Stroke(rect, _) if rect == RectF::new(10.0, 40.0, 60.0, 90.0)));
    assert_eq!(surface.ops.last(), Some(&DrawOp::Text("person 91.2%".to_string())));
  }

  #[test]
  fn rendering_twice_is_idempotent() {
    let tracker = tracker();
    tracker.set_crop_overlay(true);
    tracker.update(
      &[detection(RectF::new(10.0, 40.0, 60.0, 90.0), 0.7, 4)],
      &AffineTransform::identity(),
    );

    let before = tracker.tracked();
    let mut first = RecordingSurface::new(320, 640);
    tracker.render(&mut first);
    let mut second = RecordingSurface::new(320, 640);
    tracker.render(&mut second);

    assert_eq!(first.ops, second.ops);
    assert_eq!(tracker.tracked(), before);
  }

  #[test]
  fn color_mode_parses_preference_values() {
    assert_eq!("classes".parse::<ColorMode>(), Ok(ColorMode::Classes));
    assert_eq!("confidence".parse::<ColorMode>(), Ok(ColorMode::Confidence));
    assert!("rainbow".parse::<ColorMode>().is_err());
  }
}
