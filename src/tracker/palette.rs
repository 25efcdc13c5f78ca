// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tracker/palette.rs - 检测框颜色
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::Rgb;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

const PALETTE_SATURATION: f32 = 1.0;
const PALETTE_VALUE: f32 = 0.7;

const CONFIDENCE_BUCKETS: f32 = 20.0;
const CONFIDENCE_STEP: i32 = 12;

/// 按类别编号取色的调色板
///
/// 每个检测会话生成一次，色相在类别数上均匀分布后随机打乱，生成后不再改变。
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
  colors: Vec<Rgb<u8>>,
}

impl ColorPalette {
  pub fn generate<R: Rng + ?Sized>(classes: usize, rng: &mut R) -> Self {
    let step = if classes > 1 {
      360.0 / (classes - 1) as f32
    } else {
      0.0
    };

    let mut colors: Vec<Rgb<u8>> = (0..classes)
      .map(|i| hsv_to_rgb(step * i as f32, PALETTE_SATURATION, PALETTE_VALUE))
      .collect();
    colors.shuffle(rng);

    Self { colors }
  }

  pub fn with_seed(classes: usize, seed: u64) -> Self {
    Self::generate(classes, &mut StdRng::seed_from_u64(seed))
  }

  pub fn from_entropy(classes: usize) -> Self {
    Self::generate(classes, &mut StdRng::from_entropy())
  }

  pub fn len(&self) -> usize {
    self.colors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.colors.is_empty()
  }

  pub fn colors(&self) -> &[Rgb<u8>] {
    &self.colors
  }

  /// 超出调色板的类别编号按取模回绕
  pub fn get(&self, class_id: u32) -> Option<Rgb<u8>> {
    if self.colors.is_empty() {
      return None;
    }
    Some(self.colors[class_id as usize % self.colors.len()])
  }
}

/// 置信度 → 红绿渐变，共 20 档
///
/// 第 `b` 档为 `(max(0, 255 - 12b), min(255, 12b), 0)`。
pub fn confidence_color(confidence: f32) -> Rgb<u8> {
  let bucket = ((confidence * CONFIDENCE_BUCKETS) as i32).clamp(0, CONFIDENCE_BUCKETS as i32);
  let red = (255 - bucket * CONFIDENCE_STEP).max(0);
  let green = (bucket * CONFIDENCE_STEP).min(255);
  Rgb([red as u8, green as u8, 0])
}

/// HSV 转 RGB
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sorted(colors: &[Rgb<u8>]) -> Vec<[u8; 3]> {
    let mut raw: Vec<[u8; 3]> = colors.iter().map(|c| c.0).collect();
    raw.sort();
    raw
  }

  #[test]
  fn one_color_per_class() {
    let palette = ColorPalette::with_seed(80, 7);
    assert_eq!(palette.len(), 80);

    let unshuffled: Vec<Rgb<u8>> = (0..80)
      .map(|i| hsv_to_rgb(360.0 / 79.0 * i as f32, 1.0, 0.7))
      .collect();
    assert_eq!(sorted(palette.colors()), sorted(&unshuffled));
  }

  #[test]
  fn same_seed_same_palette() {
    assert_eq!(ColorPalette::with_seed(20, 42), ColorPalette::with_seed(20, 42));
  }

  #[test]
  fn lookups_never_change_after_generation() {
    let palette = ColorPalette::with_seed(10, 1);
    let first: Vec<_> = (0..10).map(|id| palette.get(id)).collect();
    let second: Vec<_> = (0..10).map(|id| palette.get(id)).collect();
    assert_eq!(first, second);
  }

  #[test]
  fn out_of_range_class_wraps() {
    let palette = ColorPalette::with_seed(4, 3);
    assert_eq!(palette.get(5), palette.get(1));
    assert_eq!(ColorPalette::with_seed(0, 3).get(0), None);
  }

  #[test]
  fn single_class_palette_is_red() {
    let palette = ColorPalette::with_seed(1, 0);
    assert_eq!(palette.get(0), Some(Rgb([178, 0, 0])));
  }

  #[test]
  fn confidence_gradient_buckets() {
    assert_eq!(confidence_color(0.0), Rgb([255, 0, 0]));
    assert_eq!(confidence_color(0.5), Rgb([135, 120, 0]));
    assert_eq!(confidence_color(0.57), Rgb([123, 132, 0]));
    assert_eq!(confidence_color(1.0), Rgb([15, 240, 0]));
    // 超出 [0, 1] 的置信度被夹到首末两档
    assert_eq!(confidence_color(1.7), Rgb([15, 240, 0]));
    assert_eq!(confidence_color(-0.2), Rgb([255, 0, 0]));
  }
}
