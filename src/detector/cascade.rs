// 该文件是 Shouwang （守望） 项目的一部分。
// src/detector/cascade.rs - 级联分类器检测器
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

use std::path::PathBuf;

use image::GrayImage;
use opencv::{
  core::{Mat, Rect as CvRect, Size, Vector},
  objdetect::CascadeClassifier,
  prelude::*,
};
use tracing::{info, warn};

use crate::{
  detector::{Detect, Detection, DetectorError},
  frame::Rect,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeConfig {
  pub cascade_file: PathBuf,
  pub scale_factor: f64,
  pub min_neighbours: i32,
  /// 最小目标边长（像素）
  pub min_size: i32,
}

/// Haar/LBP 级联分类器
pub struct CascadeDetector {
  classifier: CascadeClassifier,
  config: CascadeConfig,
}

impl CascadeDetector {
  pub fn new(config: CascadeConfig) -> Result<Self, DetectorError> {
    let path = config.cascade_file.display().to_string();
    let load_error = |reason: String| DetectorError::CascadeLoad {
      path: path.clone(),
      reason,
    };

    let classifier = CascadeClassifier::new(&path).map_err(|e| load_error(e.to_string()))?;
    if classifier.empty().map_err(|e| load_error(e.to_string()))? {
      return Err(load_error("分类器为空".to_string()));
    }

    info!("级联分类器已加载: {}", path);
    Ok(Self { classifier, config })
  }

  fn detect_objects(&mut self, frame: &GrayImage) -> opencv::Result<Vector<CvRect>> {
    let mat = gray_to_mat(frame)?;
    let mut objects = Vector::<CvRect>::new();
    let min_size = Size::new(self.config.min_size, self.config.min_size);
    self.classifier.detect_multi_scale(
      &mat,
      &mut objects,
      self.config.scale_factor,
      self.config.min_neighbours,
      0,
      min_size,
      Size::new(0, 0),
    )?;
    Ok(objects)
  }
}

impl Detect for CascadeDetector {
  fn detect(&mut self, frame: &GrayImage) -> Detection {
    match self.detect_objects(frame) {
      Ok(objects) => Detection::from_rects(to_rects(&objects, frame)),
      Err(e) => {
        warn!("级联分类器检测失败: {}", e);
        Detection::none()
      }
    }
  }
}

/// 拷贝为单通道 `Mat`，检测期间不借用帧缓冲
pub(super) fn gray_to_mat(frame: &GrayImage) -> opencv::Result<Mat> {
  let borrowed =
    Mat::from_slice_rows_cols(frame.as_raw(), frame.height() as usize, frame.width() as usize)?;
  borrowed.try_clone()
}

pub(super) fn to_rects(objects: &Vector<CvRect>, frame: &GrayImage) -> Vec<Rect> {
  objects
    .iter()
    .filter_map(|r| {
      Rect::clamped(
        r.x as i64,
        r.y as i64,
        r.width as i64,
        r.height as i64,
        frame.width(),
        frame.height(),
      )
    })
    .collect()
}
