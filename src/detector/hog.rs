// 该文件是 Shouwang （守望） 项目的一部分。
// src/detector/hog.rs - HOG 行人检测器
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

use image::GrayImage;
use opencv::{
  core::{Rect as CvRect, Size, Vector},
  objdetect::HOGDescriptor,
  prelude::*,
};
use tracing::warn;

use crate::detector::{
  Detect, Detection, DetectorError,
  cascade::{gray_to_mat, to_rects},
};

const HIT_THRESHOLD: f64 = 0.0;
const GROUP_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct HogConfig {
  pub scale_factor: f64,
  pub padding: (i32, i32),
  pub win_stride: (i32, i32),
}

impl Default for HogConfig {
  fn default() -> Self {
    Self {
      scale_factor: 1.05,
      padding: (8, 8),
      win_stride: (4, 4),
    }
  }
}

/// 使用 OpenCV 默认行人 SVM 的 HOG 检测器
pub struct HogDetector {
  hog: HOGDescriptor,
  config: HogConfig,
}

impl HogDetector {
  pub fn new(config: HogConfig) -> Result<Self, DetectorError> {
    let mut hog = HOGDescriptor::default().map_err(|e| DetectorError::HogCreate(e.to_string()))?;
    let people = HOGDescriptor::get_default_people_detector()
      .map_err(|e| DetectorError::HogCreate(e.to_string()))?;
    hog
      .set_svm_detector(&people)
      .map_err(|e| DetectorError::HogCreate(e.to_string()))?;
    Ok(Self { hog, config })
  }

  fn detect_people(&self, frame: &GrayImage) -> opencv::Result<Vector<CvRect>> {
    let mat = gray_to_mat(frame)?;
    let mut found = Vector::<CvRect>::new();
    self.hog.detect_multi_scale(
      &mat,
      &mut found,
      HIT_THRESHOLD,
      Size::new(self.config.win_stride.0, self.config.win_stride.1),
      Size::new(self.config.padding.0, self.config.padding.1),
      self.config.scale_factor,
      GROUP_THRESHOLD,
      false,
    )?;
    Ok(found)
  }
}

impl Detect for HogDetector {
  fn detect(&mut self, frame: &GrayImage) -> Detection {
    match self.detect_people(frame) {
      Ok(found) => Detection::from_rects(to_rects(&found, frame)),
      Err(e) => {
        warn!("HOG 行人检测失败: {}", e);
        Detection::none()
      }
    }
  }
}
