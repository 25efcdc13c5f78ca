// 该文件是 Shanan （山南西风） 项目的一部分。
// src/stats.rs - 推理延迟滑动窗口统计
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

//! # 延迟统计
//!
//! 固定容量的滑动窗口：窗口填满时发布一份排序后的副本及其顺序统计量，
//! 随后丢弃最旧的样本。

use std::{
  collections::VecDeque,
  sync::{Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tracing::debug;

mod throughput;
pub use self::throughput::ThroughputMeter;

pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
  #[error("统计窗口为空")]
  EmptyWindow,
  #[error("无效的窗口容量: {0}")]
  InvalidCapacity(usize),
}

/// 顺序统计量（毫秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderStatistics {
  pub min: u32,
  pub max: u32,
  pub median: u32,
  pub first_quartile: u32,
  pub third_quartile: u32,
}

/// 由升序样本计算顺序统计量
///
/// 中位数取 `sorted[len / 2]`，偶数长度时不取平均。
pub fn compute_statistics(sorted: &[u32]) -> Result<OrderStatistics, StatsError> {
  let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
    return Err(StatsError::EmptyWindow);
  };

  Ok(OrderStatistics {
    min,
    max,
    median: median(sorted)?,
    first_quartile: quartile(sorted, 1)?,
    third_quartile: quartile(sorted, 3)?,
  })
}

pub fn median(sorted: &[u32]) -> Result<u32, StatsError> {
  sorted
    .get(sorted.len() / 2)
    .copied()
    .ok_or(StatsError::EmptyWindow)
}

/// 第 `k` 四分位数，位置 `k / 4 * (len + 1)`
///
/// 位置为整数时直接取值，否则取相邻两项的截断平均。下标超出末尾时夹到最后一项。
pub fn quartile(sorted: &[u32], k: u32) -> Result<u32, StatsError> {
  if sorted.is_empty() {
    return Err(StatsError::EmptyWindow);
  }

  let last = sorted.len() - 1;
  let position = k as f32 / 4.0 * (sorted.len() + 1) as f32;
  let index = (position.floor() as usize).min(last);

  if position.fract() == 0.0 {
    Ok(sorted[index])
  } else {
    let next = (index + 1).min(last);
    Ok(((sorted[index] as u64 + sorted[next] as u64) / 2) as u32)
  }
}

/// 固定容量的样本窗口
#[derive(Debug, Clone)]
pub struct LatencyWindow {
  samples: VecDeque<u32>,
  capacity: usize,
}

impl LatencyWindow {
  pub fn new(capacity: usize) -> Result<Self, StatsError> {
    if capacity == 0 {
      return Err(StatsError::InvalidCapacity(capacity));
    }
    Ok(Self {
      samples: VecDeque::with_capacity(capacity),
      capacity,
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  /// 加入一个样本；窗口填满时返回排序后的副本并丢弃最旧样本
  pub fn record(&mut self, sample_ms: u32) -> Option<Vec<u32>> {
    self.samples.push_back(sample_ms);
    if self.samples.len() < self.capacity {
      return None;
    }

    let mut sorted: Vec<u32> = self.samples.iter().copied().collect();
    sorted.sort_unstable();
    self.samples.pop_front();
    Some(sorted)
  }
}

#[derive(Debug)]
struct StatisticsState {
  window: LatencyWindow,
  published: Vec<u32>,
  statistics: Option<OrderStatistics>,
  publish_count: u64,
  last_sample: Option<u32>,
}

/// 线程安全的延迟统计
///
/// 读者看到的总是某一次发布的完整结果。
#[derive(Debug)]
pub struct LatencyStatistics {
  state: Mutex<StatisticsState>,
}

impl LatencyStatistics {
  pub fn new(capacity: usize) -> Result<Self, StatsError> {
    Ok(Self {
      state: Mutex::new(StatisticsState {
        window: LatencyWindow::new(capacity)?,
        published: Vec::new(),
        statistics: None,
        publish_count: 0,
        last_sample: None,
      }),
    })
  }

  fn lock(&self) -> MutexGuard<'_, StatisticsState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 记录一次推理耗时，发布时返回新的统计量
  pub fn record(&self, sample_ms: u32) -> Option<OrderStatistics> {
    let mut state = self.lock();
    state.last_sample = Some(sample_ms);

    let sorted = state.window.record(sample_ms)?;
    let statistics = compute_statistics(&sorted).ok()?;
    state.published = sorted;
    state.statistics = Some(statistics);
    state.publish_count += 1;

    debug!(
      "发布延迟统计 #{}: 最小 {} ms, 中位 {} ms, 最大 {} ms",
      state.publish_count, statistics.min, statistics.median, statistics.max
    );
    Some(statistics)
  }

  /// 最近一次发布的统计量，首次发布前为 `None`
  pub fn snapshot(&self) -> Option<OrderStatistics> {
    self.lock().statistics
  }

  pub fn published_window(&self) -> Vec<u32> {
    self.lock().published.clone()
  }

  pub fn publish_count(&self) -> u64 {
    self.lock().publish_count
  }

  pub fn last_sample(&self) -> Option<u32> {
    self.lock().last_sample
  }

  pub fn capacity(&self) -> usize {
    self.lock().window.capacity()
  }

  pub fn pending_samples(&self) -> usize {
    self.lock().window.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn window_publishes_when_full_and_evicts_oldest() {
    let stats = LatencyStatistics::new(3).unwrap();
    assert_eq!(stats.record(10), None);
    assert_eq!(stats.record(20), None);
    assert!(stats.record(30).is_some());
    assert_eq!(stats.published_window(), vec![10, 20, 30]);

    let second = stats.record(40).unwrap();
    assert_eq!(stats.publish_count(), 2);
    assert_eq!(stats.published_window(), vec![20, 30, 40]);
    assert_eq!(second.min, 20);
    assert_eq!(second.max, 40);
    assert_eq!(second.median, 30);
    assert_eq!(stats.pending_samples(), 2);
    assert_eq!(stats.last_sample(), Some(40));
  }

  #[test]
  fn published_copy_is_sorted() {
    let mut window = LatencyWindow::new(4).unwrap();
    for sample in [9, 3, 7] {
      assert_eq!(window.record(sample), None);
    }
    assert_eq!(window.record(1), Some(vec![1, 3, 7, 9]));
    assert_eq!(window.len(), 3);
  }

  #[test]
  fn quartile_of_seven_samples() {
    let sorted = [1, 2, 3, 4, 5, 6, 7];
    assert_eq!(quartile(&sorted, 1), Ok(3));
    assert_eq!(quartile(&sorted, 3), Ok(7));
    assert_eq!(median(&sorted), Ok(4));
  }

  #[test]
  fn fractional_quartile_truncates_midpoint() {
    // 位置 1/4 * 5 = 1.25 -> (20 + 35) / 2
    let sorted = [10, 20, 35, 50];
    assert_eq!(quartile(&sorted, 1), Ok(27));
    // 位置 3.75 越过末尾，两项都夹到最后一项
    assert_eq!(quartile(&sorted, 3), Ok(50));
  }

  #[test]
  fn median_of_even_window_takes_upper_middle() {
    assert_eq!(median(&[1, 2, 3, 4]), Ok(3));
  }

  #[test]
  fn single_sample_statistics() {
    let statistics = compute_statistics(&[12]).unwrap();
    assert_eq!(
      statistics,
      OrderStatistics {
        min: 12,
        max: 12,
        median: 12,
        first_quartile: 12,
        third_quartile: 12,
      }
    );
  }

  #[test]
  fn empty_window_is_an_error() {
    assert_eq!(compute_statistics(&[]), Err(StatsError::EmptyWindow));
    assert_eq!(quartile(&[], 1), Err(StatsError::EmptyWindow));
    assert!(matches!(
      LatencyStatistics::new(0),
      Err(StatsError::InvalidCapacity(0))
    ));
  }

  #[test]
  fn snapshot_is_empty_before_first_publish() {
    let stats = LatencyStatistics::new(DEFAULT_WINDOW_CAPACITY).unwrap();
    stats.record(5);
    assert_eq!(stats.snapshot(), None);
    assert_eq!(stats.publish_count(), 0);
  }
}
