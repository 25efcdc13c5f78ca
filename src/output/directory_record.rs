// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  fs::OpenOptions,
  io::Write,
  path::{Path, PathBuf},
  sync::atomic::{AtomicU16, Ordering},
};

use chrono::{Datelike, Utc};
use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::GeometryError,
  input::SourceFrame,
  output::{
    Overlay, Render,
    draw::{Draw, display_frame},
  },
  stats::OrderStatistics,
  tracker::TrackedDetection,
};

const STATISTICS_FILE: &str = "statistics.jsonl";

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("几何错误: {0}")]
  GeometryError(#[from] GeometryError),
}

/// 检测结果文本记录，每行 `title, confidence, left, top, right, bottom`（显示帧坐标）
pub fn detection_records(detections: &[TrackedDetection]) -> String {
  detections
    .iter()
    .map(|d| {
      format!(
        "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}",
        d.title, d.confidence, d.bbox.left, d.bbox.top, d.bbox.right, d.bbox.bottom
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// 一行 JSON 统计记录
pub fn statistics_record(frame: &Path, statistics: Option<&OrderStatistics>) -> String {
  let value = match statistics {
    Some(s) => serde_json::json!({
      "frame": frame.display().to_string(),
      "min": s.min,
      "first_quartile": s.first_quartile,
      "median": s.median,
      "third_quartile": s.third_quartile,
      "max": s.max,
    }),
    None => serde_json::json!({
      "frame": frame.display().to_string(),
      "statistics": null,
    }),
  };
  value.to_string()
}

/// 按日期分目录保存每一帧
///
/// - `folder:///path`：保存叠加后的图像
/// - `folder:///path?record`：保存无叠加的显示帧，旁边写入检测记录，并追加一行统计
/// - `always`：没有检测结果的帧也保存
#[derive(Debug)]
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  record: bool,
  always: bool,
  frame_counter: AtomicU16,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(Self::new(uri.path(), record, always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, record: bool, always: bool) -> Self {
    Self {
      directory: directory.into(),
      draw: Draw::default(),
      record,
      always,
      frame_counter: AtomicU16::new(0),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  fn frame_id(&self) -> u16 {
    self
      .frame_counter
      .fetch_add(1, Ordering::Relaxed)
      .wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn append_statistics(
    &self,
    frame: &Path,
    statistics: Option<&OrderStatistics>,
  ) -> Result<(), DirectoryRecordOutputError> {
    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(self.directory.join(STATISTICS_FILE))?;
    writeln!(file, "{}", statistics_record(frame, statistics))?;
    Ok(())
  }
}

impl<O: Overlay> Render<SourceFrame, O> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &SourceFrame, overlay: &O) -> Result<(), Self::Error> {
    let detections = overlay.detections();
    if !self.always && detections.is_empty() {
      debug!("无检测结果, 跳过保存");
      return Ok(());
    }

    let path = self.frame_path()?;
    if self.record {
      display_frame(frame, overlay.display_size(frame))?.save(&path)?;
      std::fs::write(path.with_extension("txt"), detection_records(&detections))?;
      self.append_statistics(&path, overlay.statistics().as_ref())?;
    } else {
      let image = self.draw.compose(frame, overlay)?;
      DynamicImage::ImageRgba8(image).to_rgb8().save(&path)?;
    }
    debug!("保存帧: {}", path.display());
    Ok(())
  }
}
