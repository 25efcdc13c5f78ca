// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::Rgba;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl,
  geometry::{RectF, Size},
  input::SourceFrame,
  stats::OrderStatistics,
  tracker::TrackedDetection,
};

pub trait Render<Frame, Overlay>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, overlay: &Overlay) -> Result<(), Self::Error>;
}

/// 叠加层绘制目标
///
/// 坐标为显示帧像素，y 轴向下。颜色带透明度，由实现负责混合。
pub trait Surface {
  fn width(&self) -> u32;
  fn height(&self) -> u32;
  fn fill_rect(&mut self, rect: &RectF, color: Rgba<u8>);
  fn stroke_rect(&mut self, rect: &RectF, stroke_width: f32, color: Rgba<u8>);
  fn draw_line(
    &mut self,
    from: (f32, f32),
    to: (f32, f32),
    stroke_width: f32,
    color: Rgba<u8>,
    dashed: bool,
  );
  /// `(x, y)` 为文字左上角
  fn draw_text(&mut self, x: f32, y: f32, size: f32, text: &str, color: Rgba<u8>);
  fn text_width(&self, text: &str, size: f32) -> f32;
}

/// 每帧处理后可供输出绘制与记录的叠加内容
pub trait Overlay {
  /// 该帧对应的显示帧尺寸
  fn display_size(&self, frame: &SourceFrame) -> Size;
  fn draw_detections(&self, surface: &mut dyn Surface);
  fn draw_statistics(&self, surface: &mut dyn Surface, region: RectF);
  fn detections(&self) -> Vec<TrackedDetection>;
  fn statistics(&self) -> Option<OrderStatistics>;
}

pub mod boxplot;
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(any(feature = "save_image_file", feature = "directory_record"))]
    use crate::FromUrlWithScheme;

    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl OutputWrapper {
  /// 替换绘制参数（字体等）
  #[cfg(any(feature = "save_image_file", feature = "directory_record"))]
  pub fn with_draw(self, draw: draw::Draw) -> Self {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        OutputWrapper::SaveImageFileOutput(output.with_draw(draw))
      }
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => {
        OutputWrapper::DirectoryRecordOutput(output.with_draw(draw))
      }
      #[allow(unreachable_patterns)]
      _ => {
        let _ = draw;
        self
      }
    }
  }
}

impl<O: Overlay> Render<SourceFrame, O> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &SourceFrame, overlay: &O) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, overlay)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, overlay)
        .map_err(OutputError::from),
      #[allow(unreachable_patterns)]
      _ => {
        let _ = (frame, overlay);
        Ok(())
      }
    }
  }
}
