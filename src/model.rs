// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::geometry::RectF;

/// 检测模型：输入一帧模型输入图像，输出检测结果
///
/// 模型本身对本库不透明。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个检测结果，坐标位于模型输入空间
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  /// 检测框；检测器可能给出缺失的框
  pub bbox: Option<RectF>,
  pub confidence: f32,
  pub class_id: u32,
  pub title: String,
}

impl Detection {
  pub fn new(bbox: RectF, confidence: f32, class_id: u32, title: impl Into<String>) -> Self {
    Self {
      bbox: Some(bbox),
      confidence,
      class_id,
      title: title.into(),
    }
  }
}

mod replay;
pub use self::replay::{ReplayDetector, ReplayError};
