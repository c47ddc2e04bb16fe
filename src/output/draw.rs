// 该文件是 Shouwang （守望） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;

use crate::{
  detector::DetectionResult,
  frame::{Color, Rect},
};

const BOX_THICKNESS: u32 = 2;

/// 在 `image` 上绘制一个边框（加粗为 2 像素），边框向矩形内侧加粗
pub fn draw_rect(image: &mut RgbImage, rect: &Rect, color: Color) {
  for t in 0..BOX_THICKNESS {
    if rect.width <= 2 * t || rect.height <= 2 * t {
      break;
    }
    let inner = imageproc::rect::Rect::at((rect.x + t) as i32, (rect.y + t) as i32)
      .of_size(rect.width - 2 * t, rect.height - 2 * t);
    draw_hollow_rect_mut(image, inner, Rgb(color.0));
  }
}

/// 返回一张标注了所有检测框的新图像，每个检测器使用自己的颜色
pub fn annotate(image: &RgbImage, result: &DetectionResult) -> RgbImage {
  let mut annotated = image.clone();
  for outcome in result.iter() {
    for rect in &outcome.detection.rects {
      draw_rect(&mut annotated, rect, outcome.color);
    }
  }
  annotated
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detector::{Detect, Detection, NamedDetector};
  use crate::frame::{COLOR_GREEN, COLOR_RED};
  use image::GrayImage;

  struct Boxes(Vec<Rect>);

  impl Detect for Boxes {
    fn detect(&mut self, _frame: &GrayImage) -> Detection {
      Detection::from_rects(self.0.clone())
    }
  }

  #[test]
  fn draws_two_pixel_border() {
    let mut image = RgbImage::new(20, 20);
    draw_rect(&mut image, &Rect::new(2, 2, 10, 10), COLOR_RED);

    assert_eq!(image.get_pixel(2, 2), &Rgb([255, 0, 0]));
    assert_eq!(image.get_pixel(3, 3), &Rgb([255, 0, 0]));
    assert_eq!(image.get_pixel(11, 11), &Rgb([255, 0, 0]));
    assert_eq!(image.get_pixel(6, 6), &Rgb([0, 0, 0]));
    assert_eq!(image.get_pixel(12, 12), &Rgb([0, 0, 0]));
  }

  #[test]
  fn annotates_with_detector_colors() {
    let mut detectors = vec![
      NamedDetector::new("door", COLOR_RED, Boxes(vec![Rect::new(0, 0, 5, 5)])),
      NamedDetector::new("yard", COLOR_GREEN, Boxes(vec![Rect::new(10, 10, 5, 5)])),
    ];
    let source = RgbImage::new(20, 20);
    let result = DetectionResult::run(&mut detectors, &GrayImage::new(20, 20));
    let annotated = annotate(&source, &result);

    assert_eq!(annotated.get_pixel(0, 0), &Rgb(COLOR_RED.0));
    assert_eq!(annotated.get_pixel(10, 10), &Rgb(COLOR_GREEN.0));
    // 原图不受影响
    assert_eq!(source.get_pixel(0, 0), &Rgb([0, 0, 0]));
  }
}
