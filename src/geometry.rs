// 该文件是 Shanan （山南西风） 项目的一部分。
// src/geometry.rs - 坐标空间、矩形与几何错误
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

//! # 几何模块
//!
//! 处理三个坐标空间之间的映射：
//! - 原始传感器帧
//! - 裁剪/缩放后的模型输入帧（正方形）
//! - 显示帧
//!
//! 旋转只影响宽高是否交换（转置标志），缩放方式由 [`FitPolicy`] 决定。

use thiserror::Error;

mod crop;
mod transform;

pub use self::crop::{
  CropPlan, apply_crop_plan, crop_to_model_input, plan_crop, visible_frame_size,
};
pub use self::transform::{AffineTransform, build_transform};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
  /// 宽或高为零
  #[error("无效的几何尺寸: {0}")]
  InvalidGeometry(String),
  /// 变换矩阵不可逆（缩放为零）
  #[error("变换矩阵不可逆, 行列式: {0}")]
  DegenerateTransform(f32),
}

impl GeometryError {
  pub fn invalid(what: &str, size: Size) -> Self {
    GeometryError::InvalidGeometry(format!("{} = {}x{}", what, size.width, size.height))
  }
}

/// 宽高对（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
  pub width: u32,
  pub height: u32,
}

impl Size {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub const fn square(side: u32) -> Self {
    Self {
      width: side,
      height: side,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  /// 旋转后的有效尺寸：90° 类旋转交换宽高
  pub fn rotated(&self, rotation_degrees: i32) -> Self {
    if is_transposed(rotation_degrees) {
      Self::new(self.height, self.width)
    } else {
      *self
    }
  }

  pub(crate) fn ensure_valid(&self, what: &str) -> Result<(), GeometryError> {
    if self.is_empty() {
      return Err(GeometryError::invalid(what, *self));
    }
    Ok(())
  }
}

/// 转置标志：`(|rotation| + 90) % 180 == 0`
pub fn is_transposed(rotation_degrees: i32) -> bool {
  (rotation_degrees.unsigned_abs() + 90) % 180 == 0
}

/// 四条边表示的矩形，坐标系 y 轴向下
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl RectF {
  pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  pub fn from_size(size: Size) -> Self {
    Self::new(0.0, 0.0, size.width as f32, size.height as f32)
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }

  pub fn center(&self) -> (f32, f32) {
    (
      (self.left + self.right) / 2.0,
      (self.top + self.bottom) / 2.0,
    )
  }

  pub fn corners(&self) -> [(f32, f32); 4] {
    [
      (self.left, self.top),
      (self.right, self.top),
      (self.right, self.bottom),
      (self.left, self.bottom),
    ]
  }
}

/// 源图像放入目标区域时的缩放方式
///
/// 旧实现中的布尔值 `containDstAspect = true` 的实际效果是“填满目标、允许溢出”，
/// 对应这里的 [`FitPolicy::Cover`]；常见 CSS 语义里的 contain 对应 [`FitPolicy::Contain`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FitPolicy {
  /// 按较大的缩放因子等比缩放，填满目标，超出部分落在边界外
  #[default]
  Cover,
  /// 按较小的缩放因子等比缩放，源图完整可见，留出黑边
  Contain,
  /// 两轴独立缩放，源图恰好拉伸到目标尺寸
  Stretch,
}

impl FitPolicy {
  /// 旧配置中 `containDstAspect` 布尔值的字面效果
  pub fn from_contain_dst_aspect(contain_dst_aspect: bool) -> Self {
    if contain_dst_aspect {
      FitPolicy::Cover
    } else {
      FitPolicy::Contain
    }
  }

  /// 根据两轴缩放因子给出实际使用的 (sx, sy)
  pub fn scale_factors(&self, scale_x: f32, scale_y: f32) -> (f32, f32) {
    match self {
      FitPolicy::Cover => {
        let s = scale_x.max(scale_y);
        (s, s)
      }
      FitPolicy::Contain => {
        let s = scale_x.min(scale_y);
        (s, s)
      }
      FitPolicy::Stretch => (scale_x, scale_y),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transpose_flag_follows_quarter_turns() {
    assert!(!is_transposed(0));
    assert!(is_transposed(90));
    assert!(!is_transposed(180));
    assert!(is_transposed(270));
    assert!(is_transposed(-90));
    assert!(is_transposed(-270));
    assert!(!is_transposed(45));
  }

  #[test]
  fn rotated_size_swaps_axes() {
    let size = Size::new(320, 640);
    assert_eq!(size.rotated(90), Size::new(640, 320));
    assert_eq!(size.rotated(180), size);
  }

  #[test]
  fn legacy_flag_maps_to_cover() {
    assert_eq!(FitPolicy::from_contain_dst_aspect(true), FitPolicy::Cover);
    assert_eq!(
      FitPolicy::from_contain_dst_aspect(false),
      FitPolicy::Contain
    );
  }

  #[test]
  fn fit_policy_picks_scale() {
    let (sx, sy) = FitPolicy::Cover.scale_factors(1.5, 2.0);
    assert_eq!((sx, sy), (2.0, 2.0));
    let (sx, sy) = FitPolicy::Contain.scale_factors(1.5, 2.0);
    assert_eq!((sx, sy), (1.5, 1.5));
    let (sx, sy) = FitPolicy::Stretch.scale_factors(1.5, 2.0);
    assert_eq!((sx, sy), (1.5, 2.0));
  }
}
