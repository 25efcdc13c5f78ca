// 该文件是 Shanan （山南西风） 项目的一部分。
// src/geometry/crop.rs - 可见区域裁剪与模型输入生成
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

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::debug;

use super::{AffineTransform, GeometryError, RectF, Size, is_transposed};

/// 源帧中与目标宽高比一致的最大可见区域（已考虑转置）
///
/// 结果按整数像素截断。
pub fn visible_frame_size(
  src: Size,
  aspect: Size,
  rotation_degrees: i32,
) -> Result<Size, GeometryError> {
  src.ensure_valid("源尺寸")?;
  aspect.ensure_valid("目标宽高比")?;

  let effective = src.rotated(rotation_degrees);
  let src_w = effective.width as f32;
  let src_h = effective.height as f32;
  let aspect_w = aspect.width as f32;
  let aspect_h = aspect.height as f32;

  let visible = if aspect_w / src_w >= aspect_h / src_h {
    Size::new(effective.width, (src_w * aspect_h / aspect_w) as u32)
  } else {
    Size::new((src_h * aspect_w / aspect_h) as u32, effective.height)
  };

  visible.ensure_valid("可见区域")?;
  Ok(visible)
}

/// 裁剪方案：源缓冲区上的裁剪矩形，以及把它变换到输出图像的矩阵
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropPlan {
  /// 未转置的源缓冲区上的裁剪区域 (x, y, w, h)
  pub crop_x: u32,
  pub crop_y: u32,
  pub crop_size: Size,
  /// 旋转后（显示方向）的裁剪尺寸
  pub visible_crop: Size,
  /// 源缓冲区坐标 → 输出图像坐标（裁剪平移、旋转、缩放合为一个矩阵）
  pub transform: AffineTransform,
  pub output: Size,
  pub scaled: bool,
}

impl CropPlan {
  pub fn crop_rect(&self) -> RectF {
    RectF::new(
      self.crop_x as f32,
      self.crop_y as f32,
      (self.crop_x + self.crop_size.width) as f32,
      (self.crop_y + self.crop_size.height) as f32,
    )
  }

  /// 以像素中心为采样点的变换
  fn pixel_grid_transform(&self) -> AffineTransform {
    AffineTransform::translation(0.5, 0.5)
      .then(&self.transform)
      .post_translate(-0.5, -0.5)
  }
}

/// 计算裁剪方案，不触碰像素数据
///
/// - `square_crop` 为真时取可见区域的短边做正方形中心裁剪
/// - `scale_to_model` 为真时两轴独立缩放到 `model_input_size`，可能改变宽高比
pub fn plan_crop(
  src: Size,
  aspect: Size,
  rotation_degrees: i32,
  model_input_size: u32,
  scale_to_model: bool,
  square_crop: bool,
) -> Result<CropPlan, GeometryError> {
  if scale_to_model && model_input_size == 0 {
    return Err(GeometryError::invalid(
      "模型输入尺寸",
      Size::square(model_input_size),
    ));
  }

  let visible = visible_frame_size(src, aspect, rotation_degrees)?;
  let visible_crop = if square_crop {
    let side = visible.width.min(visible.height);
    Size::square(side)
  } else {
    visible
  };

  let transpose = is_transposed(rotation_degrees);
  let effective = src.rotated(rotation_degrees);
  let offset_x = (visible_crop.width as f32 - effective.width as f32).abs() as u32 / 2;
  let offset_y = (visible_crop.height as f32 - effective.height as f32).abs() as u32 / 2;

  let (crop_x, crop_y, crop_size) = if transpose {
    (offset_y, offset_x, visible_crop.rotated(90))
  } else {
    (offset_x, offset_y, visible_crop)
  };

  let mut transform = AffineTransform::translation(-(crop_x as f32), -(crop_y as f32));
  if rotation_degrees != 0 {
    transform = transform.post_rotate(rotation_degrees as f32);
  }
  if scale_to_model {
    transform = transform.post_scale(
      model_input_size as f32 / visible_crop.width as f32,
      model_input_size as f32 / visible_crop.height as f32,
    );
  }

  let crop_rect = RectF::new(
    crop_x as f32,
    crop_y as f32,
    (crop_x + crop_size.width) as f32,
    (crop_y + crop_size.height) as f32,
  );
  let bounds = transform.map_rect(&crop_rect);
  let transform = transform.post_translate(-bounds.left, -bounds.top);
  let output = Size::new(
    bounds.width().round() as u32,
    bounds.height().round() as u32,
  );
  output.ensure_valid("输出尺寸")?;

  debug!(
    "裁剪方案: 源 {}x{}, 可见 {}x{}, 裁剪 ({}, {}) {}x{}, 输出 {}x{}",
    src.width,
    src.height,
    visible.width,
    visible.height,
    crop_x,
    crop_y,
    crop_size.width,
    crop_size.height,
    output.width,
    output.height
  );

  Ok(CropPlan {
    crop_x,
    crop_y,
    crop_size,
    visible_crop,
    transform,
    output,
    scaled: scale_to_model,
  })
}

/// 从源帧中裁出可见区域，并（可选地）缩放到模型输入尺寸
///
/// 旋转与缩放在同一次重采样中完成。
pub fn crop_to_model_input(
  src: &RgbImage,
  aspect: Size,
  rotation_degrees: i32,
  model_input_size: u32,
  scale_to_model: bool,
  square_crop: bool,
) -> Result<RgbImage, GeometryError> {
  let (width, height) = src.dimensions();
  let plan = plan_crop(
    Size::new(width, height),
    aspect,
    rotation_degrees,
    model_input_size,
    scale_to_model,
    square_crop,
  )?;
  apply_crop_plan(src, &plan)
}

/// 按裁剪方案重采样像素
pub fn apply_crop_plan(src: &RgbImage, plan: &CropPlan) -> Result<RgbImage, GeometryError> {
  let grid = plan.pixel_grid_transform();
  let projection = Projection::from_matrix(grid.to_projection_matrix())
    .ok_or(GeometryError::DegenerateTransform(grid.determinant()))?;

  // 纯裁剪/旋转是整像素搬运，最近邻即可保持原值
  let interpolation = if plan.scaled {
    Interpolation::Bilinear
  } else {
    Interpolation::Nearest
  };

  let mut output = RgbImage::new(plan.output.width, plan.output.height);
  warp_into(src, &projection, interpolation, Rgb([0, 0, 0]), &mut output);
  Ok(output)
}
