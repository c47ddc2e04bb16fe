// 该文件是 Shouwang （守望） 项目的一部分。
// src/detector.rs - 检测器
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
use thiserror::Error;

use crate::frame::{Color, Rect};

/// 检测能力
///
/// 输入总是同一尺寸的灰度帧。`detect` 不会失败：内部出错时返回未检测到。
pub trait Detect {
  fn detect(&mut self, frame: &GrayImage) -> Detection;
}

impl<D: Detect + ?Sized> Detect for Box<D> {
  fn detect(&mut self, frame: &GrayImage) -> Detection {
    (**self).detect(frame)
  }
}

/// 单个检测器对一帧的结论
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
  pub detected: bool,
  pub rects: Vec<Rect>,
}

impl Detection {
  pub fn none() -> Self {
    Self::default()
  }

  pub fn from_rects(rects: Vec<Rect>) -> Self {
    Self {
      detected: !rects.is_empty(),
      rects,
    }
  }
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("无法加载级联分类器 {path}: {reason}")]
  CascadeLoad { path: String, reason: String },
  #[error("无法创建 HOG 行人检测器: {0}")]
  HogCreate(String),
  #[error("检测器类型 `{0}` 需要启用 `opencv_detectors` 特性")]
  Unsupported(&'static str),
}

mod motion;
pub use self::motion::{MotionConfig, MotionDetector};

#[cfg(feature = "opencv_detectors")]
mod cascade;
#[cfg(feature = "opencv_detectors")]
pub use self::cascade::{CascadeConfig, CascadeDetector};

#[cfg(feature = "opencv_detectors")]
mod hog;
#[cfg(feature = "opencv_detectors")]
pub use self::hog::{HogConfig, HogDetector};

/// 可配置的检测器变体
pub enum Detector {
  #[cfg(feature = "opencv_detectors")]
  Cascade(CascadeDetector),
  #[cfg(feature = "opencv_detectors")]
  PedestrianHog(HogDetector),
  MotionDiff(MotionDetector),
}

impl Detector {
  pub fn kind(&self) -> &'static str {
    match self {
      #[cfg(feature = "opencv_detectors")]
      Detector::Cascade(_) => "cascade",
      #[cfg(feature = "opencv_detectors")]
      Detector::PedestrianHog(_) => "pedestrian",
      Detector::MotionDiff(_) => "motion",
    }
  }
}

impl Detect for Detector {
  fn detect(&mut self, frame: &GrayImage) -> Detection {
    match self {
      #[cfg(feature = "opencv_detectors")]
      Detector::Cascade(detector) => detector.detect(frame),
      #[cfg(feature = "opencv_detectors")]
      Detector::PedestrianHog(detector) => detector.detect(frame),
      Detector::MotionDiff(detector) => detector.detect(frame),
    }
  }
}

/// 带名字和标注颜色的检测器
pub struct NamedDetector<D = Detector> {
  name: String,
  color: Color,
  detector: D,
}

impl<D: Detect> NamedDetector<D> {
  pub fn new(name: impl Into<String>, color: Color, detector: D) -> Self {
    Self {
      name: name.into(),
      color,
      detector,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn color(&self) -> Color {
    self.color
  }

  pub fn detect(&mut self, frame: &GrayImage) -> Detection {
    self.detector.detect(frame)
  }
}

/// 一个检测器在某一帧上的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorOutcome {
  pub name: String,
  pub color: Color,
  pub detection: Detection,
}

/// 一帧的全部检测结果，按检测器配置顺序排列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionResult {
  outcomes: Vec<DetectorOutcome>,
}

impl DetectionResult {
  /// 对 `frame` 运行全部检测器
  pub fn run<D: Detect>(detectors: &mut [NamedDetector<D>], frame: &GrayImage) -> Self {
    let outcomes = detectors
      .iter_mut()
      .map(|detector| DetectorOutcome {
        name: detector.name().to_string(),
        color: detector.color(),
        detection: detector.detect(frame),
      })
      .collect();
    Self { outcomes }
  }

  /// 没有帧可用时的结果：所有检测器均未检测到
  pub fn nothing<D: Detect>(detectors: &[NamedDetector<D>]) -> Self {
    let outcomes = detectors
      .iter()
      .map(|detector| DetectorOutcome {
        name: detector.name().to_string(),
        color: detector.color(),
        detection: Detection::none(),
      })
      .collect();
    Self { outcomes }
  }

  pub fn get(&self, name: &str) -> Option<&Detection> {
    self
      .outcomes
      .iter()
      .find(|outcome| outcome.name == name)
      .map(|outcome| &outcome.detection)
  }

  pub fn iter(&self) -> impl Iterator<Item = &DetectorOutcome> {
    self.outcomes.iter()
  }

  pub fn any_detected(&self) -> bool {
    self.outcomes.iter().any(|outcome| outcome.detection.detected)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::{COLOR_BLUE, COLOR_RED};

  struct Fixed(bool);

  impl Detect for Fixed {
    fn detect(&mut self, _frame: &GrayImage) -> Detection {
      if self.0 {
        Detection::from_rects(vec![Rect::new(1, 1, 2, 2)])
      } else {
        Detection::none()
      }
    }
  }

  #[test]
  fn runs_every_detector_in_order() {
    let mut detectors = vec![
      NamedDetector::new("door", COLOR_RED, Fixed(true)),
      NamedDetector::new("yard", COLOR_BLUE, Fixed(false)),
    ];
    let result = DetectionResult::run(&mut detectors, &GrayImage::new(4, 4));

    let names: Vec<_> = result.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["door", "yard"]);
    assert!(result.get("door").unwrap().detected);
    assert!(!result.get("yard").unwrap().detected);
    assert!(result.any_detected());
  }

  #[test]
  fn nothing_reports_all_clear() {
    let detectors = vec![NamedDetector::new("door", COLOR_RED, Fixed(true))];
    let result = DetectionResult::nothing(&detectors);
    assert!(!result.any_detected());
    assert_eq!(result.get("door"), Some(&Detection::none()));
  }
}
