// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/boxplot.rs - 推理延迟箱线图
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::Rgba;

use crate::{geometry::RectF, output::Surface, stats::OrderStatistics};

pub const GATHERING_MESSAGE: &str = "Gathering data ...";

const BOX_COLOR: Rgba<u8> = Rgba([255, 193, 7, 255]);
const WHISKER_COLOR: Rgba<u8> = Rgba([0, 168, 150, 255]);
const CONNECTOR_COLOR: Rgba<u8> = Rgba([0, 102, 204, 255]);
const MESSAGE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// 箱线图各元素在区域内的位置（相对区域左上角）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxPlotLayout {
  pub first_quartile_x: f32,
  pub median_x: f32,
  pub third_quartile_x: f32,
  pub min_whisker_x: f32,
  pub max_whisker_x: f32,
  /// 箱体占区域上半部分
  pub box_top: f32,
  pub box_bottom: f32,
  /// 须线上下各缩进箱体高度的四分之一
  pub whisker_top: f32,
  pub whisker_bottom: f32,
  /// 虚线连接位于箱体中线
  pub connector_y: f32,
  /// 最小/最大值标签基线
  pub axis_baseline: f32,
  /// 中位数标签基线
  pub median_baseline: f32,
}

impl BoxPlotLayout {
  pub fn new(statistics: &OrderStatistics, width: f32, height: f32, line_width: f32) -> Self {
    let plot_height = height * 0.5;
    let whisker_padding = plot_height * 0.25;
    let span = statistics.max.abs_diff(statistics.min) as f32;
    let position = |value: u32| {
      if span == 0.0 {
        0.0
      } else {
        (value as f32 - statistics.min as f32) / span * width
      }
    };

    Self {
      first_quartile_x: position(statistics.first_quartile),
      median_x: position(statistics.median),
      third_quartile_x: position(statistics.third_quartile),
      min_whisker_x: line_width / 2.0,
      max_whisker_x: width - line_width / 2.0,
      box_top: line_width / 2.0,
      box_bottom: plot_height,
      whisker_top: whisker_padding,
      whisker_bottom: plot_height - whisker_padding,
      connector_y: plot_height / 2.0,
      axis_baseline: height * 0.75,
      median_baseline: height,
    }
  }
}

/// 箱线图绘制器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxPlot {
  pub line_width: f32,
  pub text_size: f32,
}

impl BoxPlot {
  pub fn new(line_width: f32, text_size: f32) -> Self {
    Self {
      line_width,
      text_size,
    }
  }

  /// 在 `region` 内绘制；尚无统计结果时只显示提示文字
  pub fn render<S: Surface + ?Sized>(
    &self,
    surface: &mut S,
    region: RectF,
    statistics: Option<&OrderStatistics>,
  ) {
    let width = region.width();
    let height = region.height();
    let at = |x: f32, y: f32| (region.left + x, region.top + y);

    let Some(statistics) = statistics else {
      let text_width = surface.text_width(GATHERING_MESSAGE, self.text_size);
      let (x, y) = at(width / 2.0 - text_width / 2.0, height * 0.25);
      surface.draw_text(x, y - self.text_size, self.text_size, GATHERING_MESSAGE, MESSAGE_COLOR);
      return;
    };

    let layout = BoxPlotLayout::new(statistics, width, height, self.line_width);

    // 四分位到两端须线的虚线
    surface.draw_line(
      at(layout.first_quartile_x, layout.connector_y),
      at(layout.min_whisker_x, layout.connector_y),
      self.line_width,
      CONNECTOR_COLOR,
      true,
    );
    surface.draw_line(
      at(layout.third_quartile_x, layout.connector_y),
      at(width, layout.connector_y),
      self.line_width,
      CONNECTOR_COLOR,
      true,
    );

    let (left, top) = at(layout.first_quartile_x, layout.box_top);
    let (right, bottom) = at(layout.third_quartile_x, layout.box_bottom);
    surface.stroke_rect(&RectF::new(left, top, right, bottom), self.line_width, BOX_COLOR);

    for x in [layout.min_whisker_x, layout.max_whisker_x] {
      surface.draw_line(
        at(x, layout.whisker_top),
        at(x, layout.whisker_bottom),
        self.line_width * 2.0,
        WHISKER_COLOR,
        false,
      );
    }
    surface.draw_line(
      at(layout.median_x, layout.box_top),
      at(layout.median_x, layout.box_bottom),
      self.line_width * 2.0,
      WHISKER_COLOR,
      false,
    );

    let min_text = format!("{} ms", statistics.min);
    let max_text = format!("{} ms", statistics.max);
    let median_text = format!("{} ms", statistics.median);

    let (x, y) = at(0.0, layout.axis_baseline);
    surface.draw_text(x, y - self.text_size, self.text_size, &min_text, WHISKER_COLOR);

    let max_width = surface.text_width(&max_text, self.text_size);
    let (x, y) = at(width - max_width, layout.axis_baseline);
    surface.draw_text(x, y - self.text_size, self.text_size, &max_text, WHISKER_COLOR);

    let median_width = surface.text_width(&median_text, self.text_size);
    let (x, y) = at(layout.median_x - median_width / 2.0, layout.median_baseline);
    surface.draw_text(x, y - self.text_size, self.text_size, &median_text, WHISKER_COLOR);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tracker::tests::{DrawOp, RecordingSurface};

  fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
  }

  fn statistics() -> OrderStatistics {
    OrderStatistics {
      min: 10,
      max: 50,
      median: 30,
      first_quartile: 20,
      third_quartile: 40,
    }
  }

  #[test]
  fn positions_scale_linearly_between_extremes() {
    let layout = BoxPlotLayout::new(&statistics(), 400.0, 100.0, 4.0);
    assert!(approx_eq(layout.first_quartile_x, 100.0));
    assert!(approx_eq(layout.median_x, 200.0));
    assert!(approx_eq(layout.third_quartile_x, 300.0));
    assert!(approx_eq(layout.min_whisker_x, 2.0));
    assert!(approx_eq(layout.max_whisker_x, 398.0));
  }

  #[test]
  fn vertical_proportions() {
    let layout = BoxPlotLayout::new(&statistics(), 400.0, 100.0, 4.0);
    assert!(approx_eq(layout.box_bottom, 50.0));
    assert!(approx_eq(layout.whisker_top, 12.5));
    assert!(approx_eq(layout.whisker_bottom, 37.5));
    assert!(approx_eq(layout.connector_y, 25.0));
    assert!(approx_eq(layout.axis_baseline, 75.0));
    assert!(approx_eq(layout.median_baseline, 100.0));
  }

  #[test]
  fn constant_window_collapses_to_left_edge() {
    let flat = OrderStatistics {
      min: 7,
      max: 7,
      median: 7,
      first_quartile: 7,
      third_quartile: 7,
    };
    let layout = BoxPlotLayout::new(&flat, 400.0, 100.0, 4.0);
    assert_eq!(layout.median_x, 0.0);
    assert_eq!(layout.first_quartile_x, 0.0);
  }

  #[test]
  fn shows_message_before_first_publish() {
    let mut surface = RecordingSurface::new(400, 100);
    BoxPlot::new(4.0, 16.0).render(&mut surface, RectF::new(0.0, 0.0, 400.0, 100.0), None);
    assert_eq!(surface.ops, vec![DrawOp::Text(GATHERING_MESSAGE.to_string())]);
  }

  #[test]
  fn draws_dashed_connectors_and_labels() {
    let mut surface = RecordingSurface::new(400, 200);
    BoxPlot::new(4.0, 16.0).render(
      &mut surface,
      RectF::new(0.0, 100.0, 400.0, 200.0),
      Some(&statistics()),
    );
    let dashed = surface
      .ops
      .iter()
      .filter(|op| matches!(op, DrawOp::Line(_, _, true)))
      .count();
    assert_eq!(dashed, 2);
    assert!(surface.ops.contains(&DrawOp::Line((100.0, 125.0), (2.0, 125.0), true)));
    assert!(surface.ops.contains(&DrawOp::Text("30 ms".to_string())));
    assert!(surface.ops.contains(&DrawOp::Text("10 ms".to_string())));
    assert!(surface.ops.contains(&DrawOp::Text("50 ms".to_string())));
  }
}
