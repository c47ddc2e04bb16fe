// 该文件是 Shouwang （守望） 项目的一部分。
// src/config.rs - 配置文件加载与校验
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

//! # 配置
//!
//! 配置文件为 JSON。原始结构 [`Config`] 中的字段都是可选的，
//! [`Config::validate`] 填入默认值并校验，得到 [`Settings`]。
//! 校验失败时错误信息中给出出错字段的路径，例如 `detectors[1].blurring_size`。
//!
//! ```json
//! {
//!   "camera": { "source": "v4l:///dev/video0?width=640&height=480", "max_width": 400 },
//!   "fps": 10,
//!   "recording": {
//!     "enable": true,
//!     "directory": "/var/lib/shouwang",
//!     "file_base": "front",
//!     "file_limit": 10,
//!     "time_limit": 60
//!   },
//!   "detectors": [
//!     { "name": "front-door", "type": "motion", "diff_threshold": 0.5 }
//!   ],
//!   "actions": [
//!     { "command": "/usr/local/bin/notify", "detectors": ["front-door"],
//!       "triggers": ["detect"], "cool_down_time": 30, "save_frame": true }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  action::{ActionConfig, Trigger},
  detector::{Detector, DetectorError, MotionConfig, MotionDetector, NamedDetector},
  frame::Color,
  output::{RecorderSettings, Rotation, VideoFormat},
  task::cycle_period,
};

#[cfg(feature = "opencv_detectors")]
use crate::detector::{CascadeConfig, CascadeDetector, HogConfig, HogDetector};

pub const DEFAULT_CAMERA: &str = "v4l:///dev/video0";
pub const DEFAULT_FPS: f64 = 20.0;
pub const DEFAULT_MAX_WIDTH: u32 = 400;
pub const DEFAULT_FILE_LIMIT: usize = 10;
pub const DEFAULT_TIME_LIMIT: f64 = 60.0;

#[cfg(feature = "opencv_detectors")]
const CASCADE_SCALE_FACTOR: f64 = 1.1;
#[cfg(feature = "opencv_detectors")]
const CASCADE_MIN_NEIGHBOURS: i32 = 3;
#[cfg(feature = "opencv_detectors")]
const CASCADE_MIN_SIZE: i32 = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("无法读取配置文件 {0}: {1}")]
  Read(PathBuf, std::io::Error),
  #[error("配置文件格式错误: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("配置项 `{field}` 无效: {reason}")]
  InvalidField { field: String, reason: String },
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
  ConfigError::InvalidField {
    field: field.into(),
    reason: reason.into(),
  }
}

/// 配置文件的原始内容
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
  #[serde(default)]
  pub camera: CameraSection,
  pub fps: Option<f64>,
  #[serde(default)]
  pub recording: RecordingSection,
  #[serde(default)]
  pub detectors: Vec<DetectorSection>,
  #[serde(default)]
  pub actions: Vec<ActionSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraSection {
  pub source: Option<String>,
  pub max_width: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordingSection {
  pub enable: Option<bool>,
  pub directory: Option<PathBuf>,
  pub file_base: Option<String>,
  pub file_limit: Option<usize>,
  pub time_limit: Option<f64>,
  pub format: Option<String>,
  pub rotation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorSection {
  pub name: Option<String>,
  #[serde(rename = "type")]
  pub kind: Option<String>,
  // cascade
  pub cascade_file: Option<PathBuf>,
  pub min_neighbours: Option<i32>,
  pub min_size: Option<i32>,
  // cascade / pedestrian
  pub scale_factor: Option<f64>,
  // pedestrian
  pub padding: Option<(i32, i32)>,
  pub win_stride: Option<(i32, i32)>,
  // motion
  pub diff_threshold: Option<f64>,
  pub blurring_size: Option<u32>,
  pub object_min_area: Option<f64>,
  pub pixel_intensity_threshold: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionSection {
  pub command: Option<String>,
  #[serde(default)]
  pub args: Vec<String>,
  #[serde(default)]
  pub detectors: Vec<String>,
  pub triggers: Option<Vec<String>>,
  /// 秒
  pub cool_down_time: Option<f64>,
  pub save_frame: Option<bool>,
  pub save_frame_dir: Option<PathBuf>,
  /// 秒
  pub timeout: Option<f64>,
}

/// 校验后的完整配置
#[derive(Debug, Clone)]
pub struct Settings {
  pub camera: Url,
  pub max_width: u32,
  pub fps: f64,
  /// `None` 表示不录像
  pub recording: Option<RecordingSettings>,
  pub detectors: Vec<DetectorSettings>,
  pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSettings {
  pub directory: PathBuf,
  pub file_base: String,
  pub file_limit: usize,
  /// 单个文件的时长（秒）
  pub time_limit: f64,
  pub format: VideoFormat,
  pub rotation: Rotation,
}

impl RecordingSettings {
  /// 单个文件的帧数上限 `round(time_limit * fps)`，至少为 1
  pub fn frame_limit(&self, fps: f64) -> u64 {
    (self.time_limit * fps).round().max(1.0) as u64
  }

  pub fn recorder_settings(&self, fps: f64, resolution: (u32, u32)) -> RecorderSettings {
    RecorderSettings {
      directory: self.directory.clone(),
      file_base: self.file_base.clone(),
      format: self.format,
      fps,
      resolution,
      frame_limit: self.frame_limit(fps),
      file_limit: self.file_limit,
      rotation: self.rotation,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectorKind {
  #[cfg(feature = "opencv_detectors")]
  Cascade(CascadeConfig),
  #[cfg(feature = "opencv_detectors")]
  PedestrianHog(HogConfig),
  MotionDiff(MotionConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
  pub name: String,
  pub color: Color,
  pub kind: DetectorKind,
}

impl DetectorSettings {
  pub fn build(&self) -> Result<NamedDetector, DetectorError> {
    let detector = match &self.kind {
      #[cfg(feature = "opencv_detectors")]
      DetectorKind::Cascade(config) => Detector::Cascade(CascadeDetector::new(config.clone())?),
      #[cfg(feature = "opencv_detectors")]
      DetectorKind::PedestrianHog(config) => {
        Detector::PedestrianHog(HogDetector::new(config.clone())?)
      }
      DetectorKind::MotionDiff(config) => Detector::MotionDiff(MotionDetector::new(config.clone())),
    };
    info!("检测器 {} ({}) 已创建", self.name, detector.kind());
    Ok(NamedDetector::new(self.name.clone(), self.color, detector))
  }
}

impl Config {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text =
      std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    Self::from_json(&text)
  }

  pub fn from_json(text: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(text)?)
  }

  pub fn validate(&self) -> Result<Settings, ConfigError> {
    let source = self.camera.source.as_deref().unwrap_or(DEFAULT_CAMERA);
    let camera = Url::parse(source).map_err(|e| invalid("camera.source", e.to_string()))?;

    let max_width = self.camera.max_width.unwrap_or(DEFAULT_MAX_WIDTH);
    if max_width == 0 {
      return Err(invalid("camera.max_width", "必须大于 0"));
    }

    let fps = self.fps.unwrap_or(DEFAULT_FPS);
    if !(fps.is_finite() && fps > 0.0) {
      return Err(invalid("fps", "必须是正数"));
    }
    if cycle_period(fps).is_none() {
      return Err(invalid("fps", "太小，循环间隔超出范围"));
    }

    let recording = self.recording.validate()?;

    if self.detectors.is_empty() {
      return Err(invalid("detectors", "至少需要一个检测器"));
    }
    let mut names = HashSet::new();
    let mut detectors = Vec::with_capacity(self.detectors.len());
    // 调色板按检测器配置顺序依次分配
    for (palette_index, section) in self.detectors.iter().enumerate() {
      let field = format!("detectors[{}]", palette_index);
      let detector = section.validate(&field, Color::from_palette(palette_index))?;
      if !names.insert(detector.name.clone()) {
        return Err(invalid(
          format!("{}.name", field),
          format!("检测器名称 `{}` 重复", detector.name),
        ));
      }
      detectors.push(detector);
    }

    let actions = self
      .actions
      .iter()
      .enumerate()
      .map(|(i, section)| section.validate(&format!("actions[{}]", i), &names))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Settings {
      camera,
      max_width,
      fps,
      recording,
      detectors,
      actions,
    })
  }
}

impl RecordingSection {
  fn validate(&self) -> Result<Option<RecordingSettings>, ConfigError> {
    if !self.enable.unwrap_or(false) {
      return Ok(None);
    }

    let directory = self
      .directory
      .clone()
      .ok_or_else(|| invalid("recording.directory", "开启录像时必须指定"))?;
    let file_base = self
      .file_base
      .clone()
      .filter(|base| !base.is_empty())
      .ok_or_else(|| invalid("recording.file_base", "开启录像时必须指定"))?;
    if file_base.contains(std::path::is_separator) {
      return Err(invalid("recording.file_base", "不能包含路径分隔符"));
    }

    let file_limit = self.file_limit.unwrap_or(DEFAULT_FILE_LIMIT);
    if file_limit == 0 {
      return Err(invalid("recording.file_limit", "必须至少为 1"));
    }
    let time_limit = self.time_limit.unwrap_or(DEFAULT_TIME_LIMIT);
    if !(time_limit.is_finite() && time_limit > 0.0) {
      return Err(invalid("recording.time_limit", "必须是正数"));
    }

    let format = match self.format.as_deref() {
      Some(format) => format
        .parse()
        .map_err(|e: crate::output::OutputError| invalid("recording.format", e.to_string()))?,
      None => VideoFormat::default(),
    };
    let rotation = match self.rotation.as_deref() {
      Some(rotation) => rotation.parse().map_err(|e: crate::output::RecorderError| {
        invalid("recording.rotation", e.to_string())
      })?,
      None => Rotation::default(),
    };

    Ok(Some(RecordingSettings {
      directory,
      file_base,
      file_limit,
      time_limit,
      format,
      rotation,
    }))
  }
}

impl DetectorSection {
  fn validate(&self, field: &str, color: Color) -> Result<DetectorSettings, ConfigError> {
    let name = self
      .name
      .clone()
      .filter(|name| !name.is_empty())
      .ok_or_else(|| invalid(format!("{}.name", field), "必须指定"))?;
    let kind = self
      .kind
      .as_deref()
      .ok_or_else(|| invalid(format!("{}.type", field), "必须指定"))?;

    let kind = match kind {
      "cascade" => self.cascade(field)?,
      "pedestrian" | "hog" => self.pedestrian(field)?,
      "motion" => DetectorKind::MotionDiff(self.motion(field)?),
      other => {
        return Err(invalid(
          format!("{}.type", field),
          format!("未知的检测器类型 `{}`", other),
        ));
      }
    };

    Ok(DetectorSettings { name, color, kind })
  }

  #[cfg(feature = "opencv_detectors")]
  fn check_scale_factor(&self, field: &str, default: f64) -> Result<f64, ConfigError> {
    let scale_factor = self.scale_factor.unwrap_or(default);
    if !(scale_factor.is_finite() && scale_factor > 1.0) {
      return Err(invalid(format!("{}.scale_factor", field), "必须大于 1"));
    }
    Ok(scale_factor)
  }

  #[cfg(feature = "opencv_detectors")]
  fn cascade(&self, field: &str) -> Result<DetectorKind, ConfigError> {
    let cascade_file = self
      .cascade_file
      .clone()
      .ok_or_else(|| invalid(format!("{}.cascade_file", field), "必须指定"))?;
    let scale_factor = self.check_scale_factor(field, CASCADE_SCALE_FACTOR)?;
    let min_neighbours = self.min_neighbours.unwrap_or(CASCADE_MIN_NEIGHBOURS);
    if min_neighbours < 0 {
      return Err(invalid(format!("{}.min_neighbours", field), "不能为负数"));
    }
    let min_size = self.min_size.unwrap_or(CASCADE_MIN_SIZE);
    if min_size < 1 {
      return Err(invalid(format!("{}.min_size", field), "必须至少为 1"));
    }
    Ok(DetectorKind::Cascade(CascadeConfig {
      cascade_file,
      scale_factor,
      min_neighbours,
      min_size,
    }))
  }

  #[cfg(not(feature = "opencv_detectors"))]
  fn cascade(&self, field: &str) -> Result<DetectorKind, ConfigError> {
    Err(invalid(
      format!("{}.type", field),
      DetectorError::Unsupported("cascade").to_string(),
    ))
  }

  #[cfg(feature = "opencv_detectors")]
  fn pedestrian(&self, field: &str) -> Result<DetectorKind, ConfigError> {
    let defaults = HogConfig::default();
    let scale_factor = self.check_scale_factor(field, defaults.scale_factor)?;
    let padding = self.padding.unwrap_or(defaults.padding);
    let win_stride = self.win_stride.unwrap_or(defaults.win_stride);
    if win_stride.0 < 1 || win_stride.1 < 1 {
      return Err(invalid(format!("{}.win_stride", field), "必须至少为 1"));
    }
    Ok(DetectorKind::PedestrianHog(HogConfig {
      scale_factor,
      padding,
      win_stride,
    }))
  }

  #[cfg(not(feature = "opencv_detectors"))]
  fn pedestrian(&self, field: &str) -> Result<DetectorKind, ConfigError> {
    Err(invalid(
      format!("{}.type", field),
      DetectorError::Unsupported("pedestrian").to_string(),
    ))
  }

  fn motion(&self, field: &str) -> Result<MotionConfig, ConfigError> {
    let defaults = MotionConfig::default();

    let diff_threshold = self.diff_threshold.unwrap_or(defaults.diff_threshold);
    if !(0.0..=100.0).contains(&diff_threshold) {
      return Err(invalid(
        format!("{}.diff_threshold", field),
        "必须在 0 到 100 之间",
      ));
    }
    let blurring_size = self.blurring_size.unwrap_or(defaults.blurring_size);
    if blurring_size % 2 == 0 {
      return Err(invalid(
        format!("{}.blurring_size", field),
        "必须是正奇数",
      ));
    }
    let object_min_area = self.object_min_area.unwrap_or(defaults.object_min_area);
    if !(object_min_area.is_finite() && object_min_area >= 0.0) {
      return Err(invalid(format!("{}.object_min_area", field), "不能为负数"));
    }

    Ok(MotionConfig {
      diff_threshold,
      blurring_size,
      object_min_area,
      pixel_intensity_threshold: self
        .pixel_intensity_threshold
        .unwrap_or(defaults.pixel_intensity_threshold),
    })
  }
}

impl ActionSection {
  fn validate(&self, field: &str, detectors: &HashSet<String>) -> Result<ActionConfig, ConfigError> {
    let command = self
      .command
      .clone()
      .filter(|command| !command.is_empty())
      .ok_or_else(|| invalid(format!("{}.command", field), "必须指定"))?;
    let mut config = ActionConfig::new(command);
    config.args = self.args.clone();

    if let Some(unknown) = self.detectors.iter().find(|name| !detectors.contains(*name)) {
      return Err(invalid(
        format!("{}.detectors", field),
        format!("没有名为 `{}` 的检测器", unknown),
      ));
    }
    config.detectors = self.detectors.clone();

    if let Some(triggers) = &self.triggers {
      if triggers.is_empty() {
        return Err(invalid(format!("{}.triggers", field), "不能为空"));
      }
      config.trigger_on_detect = false;
      config.trigger_on_no_detect = false;
      for (i, trigger) in triggers.iter().enumerate() {
        match trigger.parse::<Trigger>() {
          Ok(Trigger::Detect) => config.trigger_on_detect = true,
          Ok(Trigger::NoDetect) => config.trigger_on_no_detect = true,
          Err(e) => return Err(invalid(format!("{}.triggers[{}]", field, i), e.to_string())),
        }
      }
    }

    if let Some(seconds) = self.cool_down_time {
      if !(seconds.is_finite() && seconds >= 0.0) {
        return Err(invalid(format!("{}.cool_down_time", field), "不能为负数"));
      }
      let millis = (seconds * 1000.0).round();
      config.cool_down = (millis < i64::MAX as f64)
        .then(|| TimeDelta::try_milliseconds(millis as i64))
        .flatten()
        .ok_or_else(|| invalid(format!("{}.cool_down_time", field), "超出范围"))?;
    }

    config.save_frame = self.save_frame.unwrap_or(false);
    if let Some(dir) = &self.save_frame_dir {
      config.save_frame_dir = dir.clone();
    }

    if let Some(seconds) = self.timeout {
      if !(seconds.is_finite() && seconds > 0.0) {
        return Err(invalid(format!("{}.timeout", field), "必须是正数"));
      }
      config.timeout = Some(
        Duration::try_from_secs_f64(seconds)
          .map_err(|e| invalid(format!("{}.timeout", field), e.to_string()))?,
      );
    }

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::{COLOR_GREEN, COLOR_RED};

  fn field_of(result: Result<Settings, ConfigError>) -> String {
    match result {
      Err(ConfigError::InvalidField { field, .. }) => field,
      Err(e) => panic!("unexpected error: {}", e),
      Ok(_) => panic!("configuration should be rejected"),
    }
  }

  fn parse(text: &str) -> Result<Settings, ConfigError> {
    Config::from_json(text)?.validate()
  }

  #[test]
  fn fills_in_defaults() {
    let settings = parse(r#"{ "detectors": [{ "name": "yard", "type": "motion" }] }"#).unwrap();

    assert_eq!(settings.camera.as_str(), DEFAULT_CAMERA);
    assert_eq!(settings.max_width, DEFAULT_MAX_WIDTH);
    assert_eq!(settings.fps, DEFAULT_FPS);
    assert!(settings.recording.is_none());
    assert!(settings.actions.is_empty());
    assert_eq!(
      settings.detectors[0].kind,
      DetectorKind::MotionDiff(MotionConfig::default())
    );
  }

  #[test]
  fn assigns_palette_in_order() {
    let settings = parse(
      r#"{ "detectors": [
        { "name": "a", "type": "motion" },
        { "name": "b", "type": "motion" }
      ] }"#,
    )
    .unwrap();
    assert_eq!(settings.detectors[0].color, COLOR_RED);
    assert_eq!(settings.detectors[1].color, COLOR_GREEN);
  }

  #[test]
  fn resolves_recording_section() {
    let settings = parse(
      r#"{
        "fps": 2,
        "recording": { "enable": true, "directory": "/tmp/rec", "file_base": "cam",
                       "file_limit": 2, "time_limit": 1, "rotation": "past_limit" },
        "detectors": [{ "name": "a", "type": "motion" }]
      }"#,
    )
    .unwrap();

    let recording = settings.recording.unwrap();
    assert_eq!(recording.file_limit, 2);
    assert_eq!(recording.rotation, Rotation::PastLimit);
    assert_eq!(recording.frame_limit(settings.fps), 2);
    let recorder = recording.recorder_settings(settings.fps, (320, 240));
    assert_eq!(recorder.frame_limit, 2);
    assert_eq!(recorder.resolution, (320, 240));
  }

  #[test]
  fn frame_limit_is_at_least_one() {
    let recording = RecordingSettings {
      directory: PathBuf::from("/tmp"),
      file_base: "cam".to_string(),
      file_limit: 1,
      time_limit: 0.01,
      format: VideoFormat::Mjpeg,
      rotation: Rotation::AtLimit,
    };
    assert_eq!(recording.frame_limit(5.0), 1);
  }

  #[test]
  fn resolves_action_section() {
    let settings = parse(
      r#"{
        "detectors": [{ "name": "door", "type": "motion" }],
        "actions": [{ "command": "notify", "args": ["-v"], "detectors": ["door"],
                      "triggers": ["Match", "undetect"], "cool_down_time": 2.5,
                      "save_frame": true, "save_frame_dir": "/tmp/frames", "timeout": 3 }]
      }"#,
    )
    .unwrap();

    let action = &settings.actions[0];
    assert_eq!(action.command, "notify");
    assert_eq!(action.args, ["-v"]);
    assert!(action.trigger_on_detect && action.trigger_on_no_detect);
    assert_eq!(action.cool_down, TimeDelta::milliseconds(2500));
    assert!(action.save_frame);
    assert_eq!(action.save_frame_dir, PathBuf::from("/tmp/frames"));
    assert_eq!(action.timeout, Some(Duration::from_secs(3)));
  }

  #[test]
  fn action_defaults() {
    let settings = parse(
      r#"{ "detectors": [{ "name": "door", "type": "motion" }],
           "actions": [{ "command": "notify" }] }"#,
    )
    .unwrap();
    let action = &settings.actions[0];
    assert!(action.trigger_on_detect);
    assert!(!action.trigger_on_no_detect);
    assert_eq!(action.cool_down, TimeDelta::zero());
    assert!(action.detectors.is_empty());
    assert!(!action.save_frame);
    assert_eq!(action.timeout, None);
  }

  #[test]
  fn names_offending_fields() {
    let cases = [
      (r#"{ "detectors": [] }"#, "detectors"),
      (r#"{ "fps": 0, "detectors": [{ "name": "a", "type": "motion" }] }"#, "fps"),
      (
        r#"{ "detectors": [{ "name": "a", "type": "motion" },
                           { "name": "b", "type": "motion", "blurring_size": 4 }] }"#,
        "detectors[1].blurring_size",
      ),
      (
        r#"{ "detectors": [{ "name": "a", "type": "laser" }] }"#,
        "detectors[0].type",
      ),
      (
        r#"{ "detectors": [{ "name": "a", "type": "motion" }, { "name": "a", "type": "motion" }] }"#,
        "detectors[1].name",
      ),
      (
        r#"{ "recording": { "enable": true, "directory": "/tmp", "file_base": "c", "file_limit": 0 },
             "detectors": [{ "name": "a", "type": "motion" }] }"#,
        "recording.file_limit",
      ),
      (
        r#"{ "recording": { "enable": true, "file_base": "c" },
             "detectors": [{ "name": "a", "type": "motion" }] }"#,
        "recording.directory",
      ),
      (
        r#"{ "detectors": [{ "name": "a", "type": "motion" }],
             "actions": [{ "command": "x", "triggers": ["sometimes"] }] }"#,
        "actions[0].triggers[0]",
      ),
      (
        r#"{ "detectors": [{ "name": "a", "type": "motion" }],
             "actions": [{ "command": "x", "detectors": ["b"] }] }"#,
        "actions[0].detectors",
      ),
      (
        r#"{ "detectors": [{ "name": "a", "type": "motion" }],
             "actions": [{ "command": "x", "cool_down_time": -1 }] }"#,
        "actions[0].cool_down_time",
      ),
      (
        r#"{ "detectors": [{ "name": "a", "type": "motion" }],
             "actions": [{ "command": "x", "cool_down_time": 1e20 }] }"#,
        "actions[0].cool_down_time",
      ),
      (
        r#"{ "detectors": [{ "name": "a", "type": "motion" }],
             "actions": [{ "command": "x", "timeout": 1e20 }] }"#,
        "actions[0].timeout",
      ),
      (
        r#"{ "fps": 1e-300, "detectors": [{ "name": "a", "type": "motion" }] }"#,
        "fps",
      ),
    ];

    for (text, field) in cases {
      assert_eq!(field_of(parse(text)), field, "{}", text);
    }
  }

  #[test]
  fn rejects_unknown_keys() {
    assert!(matches!(
      Config::from_json(r#"{ "detector": [] }"#),
      Err(ConfigError::Parse(_))
    ));
  }

  #[test]
  fn builds_motion_detector() {
    let settings = parse(r#"{ "detectors": [{ "name": "yard", "type": "motion" }] }"#).unwrap();
    let detector = settings.detectors[0].build().unwrap();
    assert_eq!(detector.name(), "yard");
    assert_eq!(detector.color(), COLOR_RED);
  }
}
