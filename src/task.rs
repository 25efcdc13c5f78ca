// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 任务循环
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

use std::{thread, time::Duration};

use image::RgbImage;
use tracing::{info, warn};

use crate::{
  input::SourceFrame,
  model::{Detection, Model},
  output::Render,
  pipeline::{FrameOutcome, OverlayPipeline},
  stats::OrderStatistics,
};

/// 任务结束时的汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSummary {
  pub processed: usize,
  pub skipped: usize,
  pub publish_count: u64,
  pub statistics: Option<OrderStatistics>,
  pub fps: Option<f32>,
}

impl TaskSummary {
  fn collect<M>(processed: usize, skipped: usize, pipeline: &OverlayPipeline<M>) -> Self {
    Self {
      processed,
      skipped,
      publish_count: pipeline.latency().publish_count(),
      statistics: pipeline.latency().snapshot(),
      fps: pipeline.fps(),
    }
  }
}

pub trait Task<I, P, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: P, output: O) -> Result<TaskSummary, Self::Error>;
}

pub struct OneShotTask;

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = SourceFrame>,
  M: Model<Input = RgbImage, Output = Vec<Detection>, Error = ME>,
  O: Render<SourceFrame, OverlayPipeline<M>, Error = RE>,
> Task<I, OverlayPipeline<M>, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    mut pipeline: OverlayPipeline<M>,
    output: O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    match pipeline.process_frame(&frame)? {
      FrameOutcome::Processed { .. } => {
        info!("推理完成，耗时: {:.2?}", now.elapsed());
        output.render_result(&frame, &pipeline)?;
        info!("渲染完成，耗时: {:.2?}", now.elapsed());
        Ok(TaskSummary::collect(1, 0, &pipeline))
      }
      FrameOutcome::Skipped => Err(anyhow::anyhow!("输入帧尺寸无效")),
    }
  }
}

/// 对同一帧重复推理，用于填满延迟窗口
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = SourceFrame>,
  M: Model<Input = RgbImage, Output = Vec<Detection>, Error = ME>,
  O: Render<SourceFrame, OverlayPipeline<M>, Error = RE>,
> Task<I, OverlayPipeline<M>, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    mut pipeline: OverlayPipeline<M>,
    output: O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，重复推理 {} 次...", self.times);

    let mut processed = 0;
    for i in 0..self.times {
      match pipeline.process_frame(&frame)? {
        FrameOutcome::Processed { latency_ms, .. } => {
          processed += 1;
          info!("({})推理完成，耗时: {} ms", i, latency_ms);
        }
        FrameOutcome::Skipped => return Err(anyhow::anyhow!("输入帧尺寸无效")),
      }
    }
    output.render_result(&frame, &pipeline)?;

    if let Some(statistics) = pipeline.latency().snapshot() {
      warn!(
        "推理时间中位数: {} ms (Q1 {} ms, Q3 {} ms)",
        statistics.median, statistics.first_quartile, statistics.third_quartile
      );
    }

    Ok(TaskSummary::collect(processed, 0, &pipeline))
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = SourceFrame>,
  M: Model<Input = RgbImage, Output = Vec<Detection>, Error = ME>,
  O: Render<SourceFrame, OverlayPipeline<M>, Error = RE>,
> Task<I, OverlayPipeline<M>, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    mut pipeline: OverlayPipeline<M>,
    output: O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    if let Err(err) = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    }) {
      warn!("无法设置中断信号处理: {}", err);
    }

    let mut frame_index: usize = 0;
    let mut processed = 0;
    let mut skipped = 0;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_index);
      match pipeline.process_frame(&frame)? {
        FrameOutcome::Processed { .. } => {
          processed += 1;
          let elapsed_a = now.elapsed();
          output.render_result(&frame, &pipeline)?;
          let elapsed_b = now.elapsed();
          info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
        }
        FrameOutcome::Skipped => skipped += 1,
      }
      now = std::time::Instant::now();

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(TaskSummary::collect(processed, skipped, &pipeline))
  }
}
