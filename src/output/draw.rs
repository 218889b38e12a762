// 该文件是 Odol （超限货车） 项目的一部分。
// src/output/draw.rs - 判定结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use tracing::info;

use crate::{
  detection::PixelBox,
  pipeline::{ImageOutcome, ImageReport},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const LABEL_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const WHEEL_COLOR: [u8; 3] = [255, 255, 0];
const LEGAL_COLOR: [u8; 3] = [0, 200, 0];
const ILLEGAL_COLOR: [u8; 3] = [255, 0, 0];
const UNRESOLVED_COLOR: [u8; 3] = [255, 255, 255];

// 左上角的结果面板
const PANEL_WIDTH: u32 = 250;
const PANEL_HEIGHT: u32 = 90;
const PANEL_LINE_HEIGHT: i32 = 22;

pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  label_color: [u8; 3],
  font: Option<FontVec>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      label_color: LABEL_COLOR,
      font: None,
    }
  }
}

/// 面板上显示的文字
pub fn panel_lines(report: &ImageReport) -> Vec<String> {
  let mut lines = Vec::with_capacity(4);
  if let Some(landmarks) = report.outcome.landmarks() {
    let (front, rear) = (landmarks.front_wheel.bbox(), landmarks.rear_wheel.bbox());
    lines.push(format!("前轮: ({:.0}, {:.0})", front.cx, front.cy));
    lines.push(format!("后轮: ({:.0}, {:.0})", rear.cx, rear.cy));
    lines.push(format!("车身: {}", landmarks.chassis.label()));
  }
  lines.push(
    match &report.outcome {
      ImageOutcome::Verdict { verdict, .. } if verdict.legal => "合法",
      ImageOutcome::Verdict { .. } => "违规",
      ImageOutcome::DegenerateGeometry { .. } => "轴距无效",
      ImageOutcome::Unresolved(_) => "无法判定",
      ImageOutcome::DetectionFailed(_) => "检测失败",
    }
    .to_string(),
  );
  lines
}

/// 像素框转为绘制区域，超出图像的部分被裁掉；面积为零时返回 None
fn clamp_rect(bbox: &PixelBox, width: u32, height: u32) -> Option<Rect> {
  let (w, h) = (width as f32, height as f32);
  let x_min = bbox.left().floor().clamp(0.0, w - 1.0) as i32;
  let y_min = bbox.top().floor().clamp(0.0, h - 1.0) as i32;
  let x_max = bbox.right().ceil().clamp(0.0, w - 1.0) as i32;
  let y_max = bbox.bottom().ceil().clamp(0.0, h - 1.0) as i32;
  if x_min >= x_max || y_min >= y_max {
    return None;
  }
  Some(Rect::at(x_min, y_min).of_size((x_max - x_min) as u32, (y_max - y_min) as u32))
}

impl Draw {
  pub fn with_font(mut self, font: FontVec) -> Self {
    self.font = Some(font);
    self
  }

  pub fn load_font(path: &Path) -> Result<FontVec, std::io::Error> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    info!("加载字体: {}", path.display());
    Ok(font)
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 没有判定结果时使用中性颜色
  fn outcome_color(report: &ImageReport) -> [u8; 3] {
    match report.outcome.is_legal() {
      Some(true) => LEGAL_COLOR,
      Some(false) => ILLEGAL_COLOR,
      None => UNRESOLVED_COLOR,
    }
  }

  fn draw_text(&self, image: &mut RgbImage, x: i32, y: i32, color: [u8; 3], text: &str) {
    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb(color),
        x,
        y,
        PxScale::from(self.font_size),
        font,
        text,
      );
    }
  }

  fn draw_bbox_with_label(
    &self,
    image: &mut RgbImage,
    bbox: &PixelBox,
    label: &str,
    score: f32,
    color: [u8; 3],
  ) {
    let Some(rect) = clamp_rect(bbox, image.width(), image.height()) else {
      return;
    };

    // 边框加粗为2像素
    draw_hollow_rect_mut(image, rect, Rgb(color));
    if rect.width() > 2 && rect.height() > 2 {
      let inner = Rect::at(rect.left() + 1, rect.top() + 1).of_size(rect.width() - 2, rect.height() - 2);
      draw_hollow_rect_mut(image, inner, Rgb(color));
    }

    if !self.has_font() {
      return;
    }

    let text = format!("{} {:.2}", label, score);
    let text_width = (text.chars().count() as f32 * self.label_char_width) as i32;
    let label_x = rect.left();
    let label_y = (rect.top() - self.label_text_height).max(0);
    let label_width = text_width.min(image.width() as i32 - label_x).max(0) as u32;

    if label_width > 0 {
      let background = Rect::at(label_x, label_y).of_size(label_width, self.label_text_height as u32);
      draw_filled_rect_mut(image, background, Rgb(color));
      self.draw_text(
        image,
        label_x,
        label_y + self.label_text_vertical_padding,
        [255, 255, 255],
        &text,
      );
    }
  }

  fn draw_panel(&self, image: &mut RgbImage, report: &ImageReport) {
    let width = PANEL_WIDTH.min(image.width());
    let height = PANEL_HEIGHT.min(image.height());
    if width == 0 || height == 0 {
      return;
    }
    draw_filled_rect_mut(image, Rect::at(0, 0).of_size(width, height), Rgb([0, 0, 0]));

    let color = Self::outcome_color(report);
    for (i, line) in panel_lines(report).iter().enumerate() {
      self.draw_text(image, 6, 2 + i as i32 * PANEL_LINE_HEIGHT, color, line);
    }
  }

  /// 在图像副本上绘制检测框、地标与结果面板
  pub fn draw_report(&self, image: &RgbImage, report: &ImageReport) -> RgbImage {
    let mut image = image.clone();

    for det in &report.detections {
      self.draw_bbox_with_label(&mut image, det.bbox(), det.label(), det.confidence(), self.label_color);
    }

    if let Some(landmarks) = report.outcome.landmarks() {
      let chassis_color = Self::outcome_color(report);
      for wheel in [&landmarks.front_wheel, &landmarks.rear_wheel] {
        self.draw_bbox_with_label(&mut image, wheel.bbox(), wheel.label(), wheel.confidence(), WHEEL_COLOR);
      }
      let chassis = &landmarks.chassis;
      self.draw_bbox_with_label(&mut image, chassis.bbox(), chassis.label(), chassis.confidence(), chassis_color);
    }

    self.draw_panel(&mut image, report);
    image
  }
}
