// 该文件是 Shouwang （守望） 项目的一部分。
// src/frame.rs - 帧、矩形与调色板定义
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

use std::fmt;

use chrono::{DateTime, Local};
use image::{GrayImage, RgbImage, imageops::FilterType};

pub const COLOR_RED: Color = Color([255, 0, 0]);
pub const COLOR_GREEN: Color = Color([0, 255, 0]);
pub const COLOR_BLUE: Color = Color([0, 0, 255]);
pub const COLOR_YELLOW: Color = Color([255, 255, 0]);
pub const COLOR_CYAN: Color = Color([0, 255, 255]);
pub const COLOR_MAGENTA: Color = Color([255, 0, 255]);

/// 检测器标注颜色，按配置顺序循环分配
pub const PALETTE: [Color; 6] = [
  COLOR_RED,
  COLOR_GREEN,
  COLOR_BLUE,
  COLOR_YELLOW,
  COLOR_CYAN,
  COLOR_MAGENTA,
];

/// RGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 3]);

impl Color {
  pub fn from_palette(index: usize) -> Self {
    PALETTE[index % PALETTE.len()]
  }
}

/// 帧像素坐标下的矩形，始终完全位于帧内
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl Rect {
  pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// 将任意矩形裁剪到 `frame_width` x `frame_height` 的帧内。
  ///
  /// 裁剪后面积为零时返回 `None`。
  pub fn clamped(
    x: i64,
    y: i64,
    width: i64,
    height: i64,
    frame_width: u32,
    frame_height: u32,
  ) -> Option<Self> {
    let x_min = x.clamp(0, frame_width as i64);
    let y_min = y.clamp(0, frame_height as i64);
    let x_max = (x + width).clamp(0, frame_width as i64);
    let y_max = (y + height).clamp(0, frame_height as i64);

    if x_min >= x_max || y_min >= y_max {
      return None;
    }

    Some(Self {
      x: x_min as u32,
      y: y_min as u32,
      width: (x_max - x_min) as u32,
      height: (y_max - y_min) as u32,
    })
  }
}

impl fmt::Display for Rect {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
  }
}

/// 采集得到的一帧彩色图像
///
/// 创建后不可修改；标注（画框）总是在副本上进行。
#[derive(Debug, Clone)]
pub struct Frame {
  image: RgbImage,
  index: u64,
  captured_at: DateTime<Local>,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, captured_at: DateTime<Local>) -> Self {
    Self {
      image,
      index,
      captured_at,
    }
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn captured_at(&self) -> DateTime<Local> {
    self.captured_at
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 灰度副本，供检测器使用
  pub fn to_gray(&self) -> GrayImage {
    image::imageops::grayscale(&self.image)
  }

  /// 宽度超过 `max_width` 时按比例缩小
  pub fn downscaled(self, max_width: u32) -> Self {
    let (width, height) = scaled_resolution(self.width(), self.height(), max_width);
    if width == self.width() {
      return self;
    }

    let image = image::imageops::resize(&self.image, width, height, FilterType::Triangle);
    Self { image, ..self }
  }
}

/// 按最大宽度等比缩放后的分辨率
pub fn scaled_resolution(width: u32, height: u32, max_width: u32) -> (u32, u32) {
  if width <= max_width || width == 0 {
    return (width, height);
  }
  let scaled_height = (max_width as u64 * height as u64 / width as u64).max(1) as u32;
  (max_width, scaled_height)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clamps_rect_into_frame() {
    let rect = Rect::clamped(-5, 10, 20, 100, 40, 30).unwrap();
    assert_eq!(rect, Rect::new(0, 10, 15, 20));
    assert!(Rect::clamped(50, 0, 10, 10, 40, 30).is_none());
  }

  #[test]
  fn downscales_wide_frames_only() {
    let frame = Frame::new(RgbImage::new(800, 600), 0, Local::now());
    let small = frame.downscaled(400);
    assert_eq!((small.width(), small.height()), (400, 300));

    let frame = Frame::new(RgbImage::new(320, 240), 0, Local::now());
    let same = frame.downscaled(400);
    assert_eq!((same.width(), same.height()), (320, 240));
  }

  #[test]
  fn palette_cycles() {
    assert_eq!(Color::from_palette(0), COLOR_RED);
    assert_eq!(Color::from_palette(7), COLOR_GREEN);
  }
}
