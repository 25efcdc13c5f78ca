// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::SourceFrame};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("无效的查询参数 {key}={value}")]
  InvalidQuery { key: String, value: String },
}

/// 从单个图像文件产生帧
///
/// URL 形如 `image:///path/to/frame.jpg?rotation=90&repeat=10`，
/// 同一张图像按 `repeat` 次数重复输出（缺省一次）。
#[derive(Debug, Clone)]
pub struct ImageFileInput {
  image: RgbImage,
  rotation: i32,
  remaining: usize,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let mut rotation = 0;
    let mut repeat = 1;
    for (key, value) in url.query_pairs() {
      let invalid = || ImageFileInputError::InvalidQuery {
        key: key.to_string(),
        value: value.to_string(),
      };
      match key.as_ref() {
        "rotation" => rotation = value.parse().map_err(|_| invalid())?,
        "repeat" => repeat = value.parse().map_err(|_| invalid())?,
        _ => {}
      }
    }

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    info!(
      "加载图像 {}: {}x{}, 旋转 {}°, 重复 {} 次",
      path,
      image.width(),
      image.height(),
      rotation,
      repeat
    );

    Ok(Self::new(image, rotation, repeat))
  }
}

impl ImageFileInput {
  pub fn new(image: RgbImage, rotation: i32, repeat: usize) -> Self {
    Self {
      image,
      rotation,
      remaining: repeat,
    }
  }
}

impl Iterator for ImageFileInput {
  type Item = SourceFrame;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    Some(SourceFrame::new(self.image.clone(), self.rotation))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn repeats_requested_number_of_frames() {
    let input = ImageFileInput::new(RgbImage::new(4, 2), 90, 3);
    let frames: Vec<SourceFrame> = input.collect();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.rotation == 90));
  }

  #[test]
  fn reads_query_parameters() {
    let path = std::env::temp_dir().join("shanan-overlay-input-test.png");
    RgbImage::new(6, 3).save(&path).unwrap();
    let url = Url::parse(&format!(
      "image://{}?rotation=270&repeat=2",
      path.display()
    ))
    .unwrap();

    let frames: Vec<SourceFrame> = ImageFileInput::from_url(&url).unwrap().collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].rotation, 270);
    assert_eq!(frames[0].image.dimensions(), (6, 3));
    std::fs::remove_file(path).ok();
  }

  #[test]
  fn rejects_bad_rotation() {
    let url = Url::parse("image:///tmp/none.png?rotation=left").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::InvalidQuery { .. })
    ));
  }
}
