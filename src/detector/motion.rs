// 该文件是 Shouwang （守望） 项目的一部分。
// src/detector/motion.rs - 帧差运动检测器
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

//! 帧差运动检测
//!
//! 当前帧与上一帧（均经过高斯模糊）做差，二值化、膨胀后提取外轮廓，
//! 过滤掉面积过小的轮廓。剩余轮廓的总面积占整帧的百分比低于
//! `diff_threshold` 时，整帧视为没有运动。

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use imageproc::point::Point;
use tracing::debug;

use crate::{
  detector::{Detect, Detection},
  frame::Rect,
};

// 相当于 3x3 结构元素膨胀两次
const DILATE_RADIUS: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct MotionConfig {
  /// 运动区域占整帧面积的最小百分比
  pub diff_threshold: f64,
  /// 高斯模糊核大小（奇数）
  pub blurring_size: u32,
  /// 单个轮廓的最小面积（像素）
  pub object_min_area: f64,
  /// 像素差二值化阈值
  pub pixel_intensity_threshold: u8,
}

impl Default for MotionConfig {
  fn default() -> Self {
    Self {
      diff_threshold: 0.5,
      blurring_size: 21,
      object_min_area: 500.0,
      pixel_intensity_threshold: 25,
    }
  }
}

pub struct MotionDetector {
  config: MotionConfig,
  sigma: f32,
  previous: Option<GrayImage>,
}

impl MotionDetector {
  pub fn new(config: MotionConfig) -> Self {
    Self {
      sigma: kernel_sigma(config.blurring_size),
      config,
      previous: None,
    }
  }

  fn diff_mask(&self, previous: &GrayImage, current: &GrayImage) -> GrayImage {
    let threshold = self.config.pixel_intensity_threshold;
    GrayImage::from_fn(current.width(), current.height(), |x, y| {
      let a = previous.get_pixel(x, y)[0];
      let b = current.get_pixel(x, y)[0];
      if a.abs_diff(b) > threshold {
        Luma([255])
      } else {
        Luma([0])
      }
    })
  }

  fn compare(&self, previous: &GrayImage, current: &GrayImage) -> Detection {
    let mask = dilate(&self.diff_mask(previous, current), Norm::LInf, DILATE_RADIUS);
    let (width, height) = current.dimensions();

    let mut rects = Vec::new();
    let mut total_area = 0.0;
    for contour in find_contours::<i32>(&mask) {
      if contour.border_type != BorderType::Outer || contour.parent.is_some() {
        continue;
      }

      let area = polygon_area(&contour.points);
      if area < self.config.object_min_area {
        continue;
      }

      total_area += area;
      if let Some(rect) = bounding_rect(&contour.points, width, height) {
        rects.push(rect);
      }
    }

    let frame_area = (width as f64 * height as f64).max(1.0);
    let percentage = total_area * 100.0 / frame_area;
    if percentage < self.config.diff_threshold {
      if !rects.is_empty() {
        debug!(
          "运动区域占比 {:.2}% 低于阈值 {:.2}%，忽略 {} 个轮廓",
          percentage,
          self.config.diff_threshold,
          rects.len()
        );
      }
      return Detection::none();
    }

    Detection::from_rects(rects)
  }
}

impl Detect for MotionDetector {
  fn detect(&mut self, frame: &GrayImage) -> Detection {
    let blurred = gaussian_blur_f32(frame, self.sigma);

    let detection = match self.previous.as_ref() {
      Some(previous) if previous.dimensions() == blurred.dimensions() => {
        self.compare(previous, &blurred)
      }
      _ => Detection::none(),
    };

    self.previous = Some(blurred);
    detection
  }
}

/// OpenCV 在 sigma 为 0 时由核大小推导 sigma 的公式
fn kernel_sigma(kernel_size: u32) -> f32 {
  let size = kernel_size.max(1) as f32;
  0.3 * ((size - 1.0) * 0.5 - 1.0) + 0.8
}

/// 鞋带公式求多边形面积
fn polygon_area(points: &[Point<i32>]) -> f64 {
  if points.len() < 3 {
    return 0.0;
  }
  let twice_area: i64 = points
    .iter()
    .zip(points.iter().cycle().skip(1))
    .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
    .sum();
  twice_area.abs() as f64 / 2.0
}

fn bounding_rect(points: &[Point<i32>], width: u32, height: u32) -> Option<Rect> {
  let x_min = points.iter().map(|p| p.x).min()?;
  let x_max = points.iter().map(|p| p.x).max()?;
  let y_min = points.iter().map(|p| p.y).min()?;
  let y_max = points.iter().map(|p| p.y).max()?;
  Rect::clamped(
    x_min as i64,
    y_min as i64,
    (x_max - x_min + 1) as i64,
    (y_max - y_min + 1) as i64,
    width,
    height,
  )
}
