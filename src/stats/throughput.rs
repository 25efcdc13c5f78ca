// 该文件是 Shanan （山南西风） 项目的一部分。
// src/stats/throughput.rs - 处理帧率
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

use std::time::{Duration, Instant};

const REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// 按秒刷新的帧率计数器
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
  since: Option<Instant>,
  frames: u32,
  fps: Option<f32>,
}

impl Default for ThroughputMeter {
  fn default() -> Self {
    Self::new()
  }
}

impl ThroughputMeter {
  pub fn new() -> Self {
    Self {
      since: None,
      frames: 0,
      fps: None,
    }
  }

  /// 计入一帧；距上次刷新满一秒时重新计算并返回帧率
  pub fn tick(&mut self, now: Instant) -> Option<f32> {
    let Some(since) = self.since else {
      self.since = Some(now);
      return None;
    };

    self.frames += 1;
    let elapsed = now.saturating_duration_since(since);
    if elapsed < REFRESH_INTERVAL {
      return None;
    }

    let fps = self.frames as f32 / elapsed.as_secs_f32();
    self.fps = Some(fps);
    self.frames = 0;
    self.since = Some(now);
    Some(fps)
  }

  pub fn fps(&self) -> Option<f32> {
    self.fps
  }
}
