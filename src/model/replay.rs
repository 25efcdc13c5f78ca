// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/replay.rs - 回放检测结果的检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::RectF,
  model::{Detection, Model},
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("第 {line} 行格式错误: {reason}")]
  ParseError { line: usize, reason: String },
}

/// 从记录文件回放检测结果
///
/// 每行一个检测：`class_id, title, confidence, left, top, right, bottom`，
/// 坐标为模型输入空间的像素。空行与 `#` 开头的行被忽略。
/// 每一帧都返回同一组结果。
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
  detections: Vec<Detection>,
}

impl FromUrlWithScheme for ReplayDetector {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayDetector {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayError::SchemeMismatch);
    }
    Self::from_path(url.path())
  }
}

impl ReplayDetector {
  pub fn new(detections: Vec<Detection>) -> Self {
    Self { detections }
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
    let path = path.as_ref();
    info!("加载检测记录: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let detector = Self::parse(&text)?;
    info!("检测记录加载完成, 共 {} 项", detector.detections.len());
    Ok(detector)
  }

  pub fn parse(text: &str) -> Result<Self, ReplayError> {
    let mut detections = Vec::new();
    for (index, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      detections.push(parse_line(index + 1, line)?);
    }
    Ok(Self { detections })
  }

  pub fn detections(&self) -> &[Detection] {
    &self.detections
  }
}

fn parse_line(line_no: usize, line: &str) -> Result<Detection, ReplayError> {
  let fields: Vec<&str> = line.split(',').map(str::trim).collect();
  if fields.len() != 7 {
    return Err(ReplayError::ParseError {
      line: line_no,
      reason: format!("期望 7 个字段, 实际 {} 个", fields.len()),
    });
  }

  let number = |idx: usize| -> Result<f32, ReplayError> {
    fields[idx].parse::<f32>().map_err(|e| ReplayError::ParseError {
      line: line_no,
      reason: format!("字段 {} '{}': {}", idx + 1, fields[idx], e),
    })
  };

  let class_id = fields[0]
    .parse::<u32>()
    .map_err(|e| ReplayError::ParseError {
      line: line_no,
      reason: format!("类别编号 '{}': {}", fields[0], e),
    })?;

  Ok(Detection {
    bbox: Some(RectF::new(number(3)?, number(4)?, number(5)?, number(6)?)),
    confidence: number(2)?,
    class_id,
    title: fields[1].to_string(),
  })
}

impl Model for ReplayDetector {
  type Input = RgbImage;
  type Output = Vec<Detection>;
  type Error = ReplayError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!(
      "回放 {} 个检测结果, 输入 {}x{}",
      self.detections.len(),
      input.width(),
      input.height()
    );
    Ok(self.detections.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_records_and_skips_comments() {
    let text = "# class, title, score, l, t, r, b\n\n0, person, 0.91, 10, 20, 110, 220\n17, horse, 0.4, 0, 0, 50.5, 60\n";
    let detector = ReplayDetector::parse(text).unwrap();
    let detections = detector.detections();
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].class_id, 0);
    assert_eq!(detections[0].title, "person");
    assert_eq!(
      detections[0].bbox,
      Some(RectF::new(10.0, 20.0, 110.0, 220.0))
    );
    assert_eq!(detections[1].confidence, 0.4);
  }

  #[test]
  fn reports_line_of_malformed_record() {
    let err = ReplayDetector::parse("0, person, 0.9, 1, 2, 3, 4\n1, cat, high, 1, 2, 3, 4").unwrap_err();
    assert!(matches!(err, ReplayError::ParseError { line: 2, .. }));
  }

  #[test]
  fn rejects_foreign_scheme() {
    let url = Url::parse("image:///tmp/record.txt").unwrap();
    assert!(matches!(
      ReplayDetector::from_url(&url),
      Err(ReplayError::SchemeMismatch)
    ));
  }

  #[test]
  fn infer_returns_same_list_each_frame() {
    let detector = ReplayDetector::new(vec![Detection::new(
      RectF::new(0.0, 0.0, 20.0, 20.0),
      0.8,
      3,
      "car",
    )]);
    let frame = RgbImage::new(4, 4);
    assert_eq!(detector.infer(&frame).unwrap(), detector.infer(&frame).unwrap());
  }
}
