// 该文件是 Shanan （山南西风） 项目的一部分。
// src/geometry/transform.rs - 二维仿射变换
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

use tracing::debug;

use super::{FitPolicy, GeometryError, RectF, Size};

/// 2x3 仿射矩阵
///
/// ```text
/// | sx  kx  tx |
/// | ky  sy  ty |
/// ```
///
/// `post_*` 系列方法在现有变换之后追加一步。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
  sx: f32,
  kx: f32,
  tx: f32,
  ky: f32,
  sy: f32,
  ty: f32,
}

impl Default for AffineTransform {
  fn default() -> Self {
    Self::identity()
  }
}

impl AffineTransform {
  pub const fn identity() -> Self {
    Self {
      sx: 1.0,
      kx: 0.0,
      tx: 0.0,
      ky: 0.0,
      sy: 1.0,
      ty: 0.0,
    }
  }

  pub const fn from_rows(row0: [f32; 3], row1: [f32; 3]) -> Self {
    Self {
      sx: row0[0],
      kx: row0[1],
      tx: row0[2],
      ky: row1[0],
      sy: row1[1],
      ty: row1[2],
    }
  }

  pub fn rows(&self) -> [[f32; 3]; 2] {
    [[self.sx, self.kx, self.tx], [self.ky, self.sy, self.ty]]
  }

  pub fn translation(dx: f32, dy: f32) -> Self {
    Self::from_rows([1.0, 0.0, dx], [0.0, 1.0, dy])
  }

  pub fn scaling(sx: f32, sy: f32) -> Self {
    Self::from_rows([sx, 0.0, 0.0], [0.0, sy, 0.0])
  }

  /// 绕原点旋转，y 轴向下时正角度为顺时针
  pub fn rotation(degrees: f32) -> Self {
    let (sin, cos) = sin_cos_degrees(degrees);
    Self::from_rows([cos, -sin, 0.0], [sin, cos, 0.0])
  }

  /// 先应用 `self`，再应用 `next`
  pub fn then(&self, next: &AffineTransform) -> Self {
    let o = next;
    Self {
      sx: o.sx * self.sx + o.kx * self.ky,
      kx: o.sx * self.kx + o.kx * self.sy,
      tx: o.sx * self.tx + o.kx * self.ty + o.tx,
      ky: o.ky * self.sx + o.sy * self.ky,
      sy: o.ky * self.kx + o.sy * self.sy,
      ty: o.ky * self.tx + o.sy * self.ty + o.ty,
    }
  }

  pub fn post_translate(self, dx: f32, dy: f32) -> Self {
    self.then(&Self::translation(dx, dy))
  }

  pub fn post_rotate(self, degrees: f32) -> Self {
    self.then(&Self::rotation(degrees))
  }

  pub fn post_scale(self, sx: f32, sy: f32) -> Self {
    self.then(&Self::scaling(sx, sy))
  }

  pub fn determinant(&self) -> f32 {
    self.sx * self.sy - self.kx * self.ky
  }

  /// 精确求逆；缩放为零时矩阵不可逆
  pub fn invert(&self) -> Result<Self, GeometryError> {
    let det = self.determinant();
    if det == 0.0 || !det.is_finite() {
      return Err(GeometryError::DegenerateTransform(det));
    }

    let sx = self.sy / det;
    let kx = -self.kx / det;
    let ky = -self.ky / det;
    let sy = self.sx / det;

    Ok(Self {
      sx,
      kx,
      tx: -(sx * self.tx + kx * self.ty),
      ky,
      sy,
      ty: -(ky * self.tx + sy * self.ty),
    })
  }

  pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
    (
      self.sx * x + self.kx * y + self.tx,
      self.ky * x + self.sy * y + self.ty,
    )
  }

  /// 映射四个角点并取包围盒
  pub fn map_rect(&self, rect: &RectF) -> RectF {
    let mut out = RectF::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
    for (x, y) in rect.corners() {
      let (mx, my) = self.map_point(x, y);
      out.left = out.left.min(mx);
      out.top = out.top.min(my);
      out.right = out.right.max(mx);
      out.bottom = out.bottom.max(my);
    }
    out
  }

  /// 各轴的缩放幅度（列向量长度）
  pub fn axis_scales(&self) -> (f32, f32) {
    (
      (self.sx * self.sx + self.ky * self.ky).sqrt(),
      (self.kx * self.kx + self.sy * self.sy).sqrt(),
    )
  }

  /// 行优先的 3x3 齐次矩阵，供像素重采样使用
  pub fn to_projection_matrix(&self) -> [f32; 9] {
    [
      self.sx, self.kx, self.tx, self.ky, self.sy, self.ty, 0.0, 0.0, 1.0,
    ]
  }
}

fn sin_cos_degrees(degrees: f32) -> (f32, f32) {
  let normalized = degrees.rem_euclid(360.0);
  // 90° 的整数倍使用精确值，避免 1e-8 级别的误差累积
  if normalized == 0.0 {
    (0.0, 1.0)
  } else if normalized == 90.0 {
    (1.0, 0.0)
  } else if normalized == 180.0 {
    (0.0, -1.0)
  } else if normalized == 270.0 {
    (-1.0, 0.0)
  } else {
    normalized.to_radians().sin_cos()
  }
}

/// 计算从 `src` 空间到 `dst` 空间的变换
///
/// 顺序固定为：平移到源中心 → 旋转 → 按策略缩放 → 平移到目标中心。
/// 旋转为 90° 类时先交换源宽高再计算缩放因子；有效输入尺寸与目标一致时不缩放。
pub fn build_transform(
  src: Size,
  dst: Size,
  rotation_degrees: i32,
  policy: FitPolicy,
) -> Result<AffineTransform, GeometryError> {
  src.ensure_valid("源尺寸")?;
  dst.ensure_valid("目标尺寸")?;

  let mut matrix = AffineTransform::translation(-(src.width as f32) / 2.0, -(src.height as f32) / 2.0);
  if rotation_degrees != 0 {
    matrix = matrix.post_rotate(rotation_degrees as f32);
  }

  let input = src.rotated(rotation_degrees);
  if input != dst {
    let scale_x = dst.width as f32 / input.width as f32;
    let scale_y = dst.height as f32 / input.height as f32;
    let (sx, sy) = policy.scale_factors(scale_x, scale_y);
    debug!(
      "变换缩放: 输入 {}x{} -> 目标 {}x{}, 策略 {:?}, 缩放 ({}, {})",
      input.width, input.height, dst.width, dst.height, policy, sx, sy
    );
    matrix = matrix.post_scale(sx, sy);
  }

  Ok(matrix.post_translate(dst.width as f32 / 2.0, dst.height as f32 / 2.0))
}
