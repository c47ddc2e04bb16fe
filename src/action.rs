// 该文件是 Shouwang （守望） 项目的一部分。
// src/action.rs - 检测状态变化时执行的外部命令
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

//! # 动作
//!
//! 检测器状态发生变化时，按配置调用外部命令。命令通过环境变量获得
//! 触发信息：
//!
//! | 变量 | 内容 |
//! |---|---|
//! | `TIME_STAMP_RAW` | 帧采集时间，Unix 秒（浮点） |
//! | `TIME_STAMP_DATE` | 本地时间 `YYYY-MM-DD HH:MM:SS` |
//! | `DETECTOR` | 检测器名称 |
//! | `TRIGGER` | `detect` 或 `no-detect` |
//! | `IMAGE_PATH` | 当前帧的临时 JPEG 路径，或 `No image` |
//!
//! 命令同步执行，返回码只记录日志，不影响主循环。

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeDelta};
use image::codecs::jpeg::JpegEncoder;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::frame::Frame;

pub const ENV_TIME_STAMP_RAW: &str = "TIME_STAMP_RAW";
pub const ENV_TIME_STAMP_DATE: &str = "TIME_STAMP_DATE";
pub const ENV_DETECTOR: &str = "DETECTOR";
pub const ENV_TRIGGER: &str = "TRIGGER";
pub const ENV_IMAGE_PATH: &str = "IMAGE_PATH";

/// 没有保存帧时 `IMAGE_PATH` 的取值
pub const NO_IMAGE: &str = "No image";

const STILL_FRAME_PREFIX: &str = "shouwang-";
const STILL_FRAME_SUFFIX: &str = ".jpg";
const TIMEOUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum ActionError {
  #[error("未知的触发条件: {0}")]
  UnknownTrigger(String),
  #[error("无法启动命令 `{command}`: {source}")]
  Spawn { command: String, source: io::Error },
  #[error("等待命令结束失败: {0}")]
  Wait(io::Error),
  #[error("命令 `{command}` 超时 ({timeout:?})，已终止")]
  Timeout { command: String, timeout: Duration },
  #[error("无法保存当前帧到 {dir}: {reason}")]
  SaveFrame { dir: PathBuf, reason: String },
}

/// 触发条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
  Detect,
  NoDetect,
}

impl Trigger {
  pub fn from_detected(detected: bool) -> Self {
    if detected {
      Trigger::Detect
    } else {
      Trigger::NoDetect
    }
  }

  /// 传给子进程的 `TRIGGER` 取值
  pub fn as_env(&self) -> &'static str {
    match self {
      Trigger::Detect => "detect",
      Trigger::NoDetect => "no-detect",
    }
  }
}

impl FromStr for Trigger {
  type Err = ActionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "detect" | "detection" | "match" => Ok(Trigger::Detect),
      "undetect" | "no-detect" | "no-match" => Ok(Trigger::NoDetect),
      _ => Err(ActionError::UnknownTrigger(s.to_string())),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionConfig {
  pub command: String,
  pub args: Vec<String>,
  /// 适用的检测器名称，为空表示全部
  pub detectors: Vec<String>,
  pub trigger_on_detect: bool,
  pub trigger_on_no_detect: bool,
  pub cool_down: TimeDelta,
  pub save_frame: bool,
  pub save_frame_dir: PathBuf,
  pub timeout: Option<Duration>,
}

impl ActionConfig {
  pub fn new(command: impl Into<String>) -> Self {
    Self {
      command: command.into(),
      args: Vec::new(),
      detectors: Vec::new(),
      trigger_on_detect: true,
      trigger_on_no_detect: false,
      cool_down: TimeDelta::zero(),
      save_frame: false,
      save_frame_dir: std::env::temp_dir(),
      timeout: None,
    }
  }

  pub fn triggers_on(&self, trigger: Trigger) -> bool {
    match trigger {
      Trigger::Detect => self.trigger_on_detect,
      Trigger::NoDetect => self.trigger_on_no_detect,
    }
  }

  pub fn applies_to(&self, detector_name: &str) -> bool {
    self.detectors.is_empty() || self.detectors.iter().any(|name| name == detector_name)
  }

  fn display_command(&self) -> String {
    std::iter::once(self.command.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// 构造子进程命令，环境变量只设置在子进程上
pub fn build_command(
  config: &ActionConfig,
  detector_name: &str,
  trigger: Trigger,
  timestamp: DateTime<Local>,
  image_path: &str,
) -> Command {
  let raw = timestamp.timestamp_micros() as f64 / 1_000_000.0;
  let mut command = Command::new(&config.command);
  command
    .args(&config.args)
    .env(ENV_TIME_STAMP_RAW, raw.to_string())
    .env(
      ENV_TIME_STAMP_DATE,
      timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
    .env(ENV_DETECTOR, detector_name)
    .env(ENV_TRIGGER, trigger.as_env())
    .env(ENV_IMAGE_PATH, image_path);
  command
}

fn save_still_frame(dir: &Path, frame: &Frame) -> Result<NamedTempFile, ActionError> {
  let to_error = |reason: String| ActionError::SaveFrame {
    dir: dir.to_path_buf(),
    reason,
  };

  let mut file = tempfile::Builder::new()
    .prefix(STILL_FRAME_PREFIX)
    .suffix(STILL_FRAME_SUFFIX)
    .tempfile_in(dir)
    .map_err(|e| to_error(e.to_string()))?;
  JpegEncoder::new(file.as_file_mut())
    .encode_image(frame.image())
    .map_err(|e| to_error(e.to_string()))?;
  file.flush().map_err(|e| to_error(e.to_string()))?;
  Ok(file)
}

/// 等待子进程退出，超时后只终止直接子进程，由它启动的后代进程不受影响
fn wait_child(mut child: Child, timeout: Option<Duration>) -> io::Result<Option<ExitStatus>> {
  let Some(timeout) = timeout else {
    return child.wait().map(Some);
  };

  let start = Instant::now();
  loop {
    if let Some(status) = child.try_wait()? {
      return Ok(Some(status));
    }
    if start.elapsed() >= timeout {
      if let Err(e) = child.kill() {
        warn!("无法终止超时的子进程 {}: {}", child.id(), e);
      }
      if let Err(e) = child.wait() {
        warn!("无法回收超时的子进程 {}: {}", child.id(), e);
      }
      return Ok(None);
    }
    thread::sleep(TIMEOUT_POLL_INTERVAL);
  }
}

struct ActionSlot {
  config: ActionConfig,
  last_invocation: Option<DateTime<Local>>,
}

impl ActionSlot {
  /// 冷却结束时间超出可表示范围时视为一直处于冷却中
  fn cooling_down(&self, now: DateTime<Local>) -> bool {
    let Some(last) = self.last_invocation else {
      return false;
    };
    if now < last {
      warn!("系统时间回退 ({} -> {})，重新开始冷却计时", last, now);
      return false;
    }
    last
      .checked_add_signed(self.config.cool_down)
      .is_none_or(|until| now < until)
  }

  fn run(
    &self,
    detector_name: &str,
    trigger: Trigger,
    frame: Option<&Frame>,
    now: DateTime<Local>,
  ) -> Result<ExitStatus, ActionError> {
    let still = match frame {
      Some(frame) if self.config.save_frame => {
        Some(save_still_frame(&self.config.save_frame_dir, frame)?)
      }
      _ => None,
    };
    let image_path = still
      .as_ref()
      .map(|file| file.path().display().to_string())
      .unwrap_or_else(|| NO_IMAGE.to_string());

    let display_cmd = self.config.display_command();
    info!(
      "执行动作 `{}` (检测器: {}, 触发: {}, 图像: {})",
      display_cmd,
      detector_name,
      trigger.as_env(),
      image_path
    );

    let child = build_command(&self.config, detector_name, trigger, now, &image_path)
      .spawn()
      .map_err(|source| ActionError::Spawn {
        command: display_cmd.clone(),
        source,
      })?;
    let status = wait_child(child, self.config.timeout).map_err(ActionError::Wait);

    // 无论命令结果如何都删除临时图像
    if let Some(still) = still
      && let Err(e) = still.close()
    {
      warn!("无法删除临时图像 {}: {}", image_path, e);
    }

    match status? {
      Some(status) => Ok(status),
      None => Err(ActionError::Timeout {
        command: display_cmd,
        timeout: self.config.timeout.unwrap_or_default(),
      }),
    }
  }
}

/// 按触发条件、适用检测器和冷却时间调度动作
pub struct ActionDispatcher {
  actions: Vec<ActionSlot>,
}

impl ActionDispatcher {
  pub fn new(configs: Vec<ActionConfig>) -> Self {
    Self {
      actions: configs
        .into_iter()
        .map(|config| ActionSlot {
          config,
          last_invocation: None,
        })
        .collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  /// 检测器 `detector_name` 的状态变为 `detected` 时调用
  ///
  /// `now` 是该帧的采集时间，用于冷却判断和传给子进程的时间戳。
  /// 返回实际启动的动作数量。
  pub fn invoke(
    &mut self,
    detected: bool,
    detector_name: &str,
    frame: Option<&Frame>,
    now: DateTime<Local>,
  ) -> usize {
    let trigger = Trigger::from_detected(detected);
    let mut invoked = 0;

    for slot in self.actions.iter_mut() {
      if !slot.config.triggers_on(trigger) || !slot.config.applies_to(detector_name) {
        continue;
      }
      if slot.cooling_down(now) {
        debug!(
          "动作 `{}` 仍在冷却中，跳过",
          slot.config.display_command()
        );
        continue;
      }
      slot.last_invocation = Some(now);
      invoked += 1;

      match slot.run(detector_name, trigger, frame, now) {
        Ok(status) if status.success() => {
          info!("动作 `{}` 执行完成", slot.config.display_command());
        }
        Ok(status) => warn!(
          "动作 `{}` 返回非零状态 ({})",
          slot.config.display_command(),
          status
        ),
        Err(e) => warn!("{}", e),
      }
    }

    invoked
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use image::RgbImage;

  fn at(seconds: i64) -> DateTime<Local> {
    Local.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
  }

  fn shell(script: &str) -> ActionConfig {
    let mut config = ActionConfig::new("sh");
    config.args = vec!["-c".to_string(), script.to_string()];
    config
  }

  fn env_of<'a>(command: &'a Command, key: &str) -> Option<&'a str> {
    command
      .get_envs()
      .find(|(k, _)| *k == key)
      .and_then(|(_, v)| v)
      .and_then(|v| v.to_str())
  }

  #[test]
  fn parses_trigger_vocabulary() {
    for word in ["detect", "Detection", "MATCH"] {
      assert_eq!(word.parse::<Trigger>().unwrap(), Trigger::Detect);
    }
    for word in ["undetect", "no-detect", "No-Match"] {
      assert_eq!(word.parse::<Trigger>().unwrap(), Trigger::NoDetect);
    }
    assert!(matches!(
      "sometimes".parse::<Trigger>(),
      Err(ActionError::UnknownTrigger(_))
    ));
  }

  #[test]
  fn command_carries_trigger_environment() {
    let mut config = ActionConfig::new("notify");
    config.args = vec!["--loud".to_string()];
    let timestamp = Local.timestamp_opt(1_700_000_000, 250_000_000).unwrap();
    let command = build_command(&config, "front-door", Trigger::Detect, timestamp, NO_IMAGE);

    assert_eq!(command.get_program(), "notify");
    assert_eq!(command.get_args().collect::<Vec<_>>(), ["--loud"]);
    assert_eq!(env_of(&command, ENV_TIME_STAMP_RAW), Some("1700000000.25"));
    assert_eq!(
      env_of(&command, ENV_TIME_STAMP_DATE),
      Some(timestamp.format("%Y-%m-%d %H:%M:%S").to_string().as_str())
    );
    assert_eq!(env_of(&command, ENV_DETECTOR), Some("front-door"));
    assert_eq!(env_of(&command, ENV_TRIGGER), Some("detect"));
    assert_eq!(env_of(&command, ENV_IMAGE_PATH), Some("No image"));
    assert!(std::env::var(ENV_DETECTOR).is_err());
  }

  #[test]
  fn respects_trigger_flags_and_detectors() {
    let mut config = ActionConfig::new("true");
    config.detectors = vec!["door".to_string()];
    let mut dispatcher = ActionDispatcher::new(vec![config]);

    assert_eq!(dispatcher.invoke(false, "door", None, at(0)), 0);
    assert_eq!(dispatcher.invoke(true, "yard", None, at(1)), 0);
    assert_eq!(dispatcher.invoke(true, "door", None, at(2)), 1);
  }

  #[test]
  fn empty_detector_list_applies_to_all() {
    let mut config = ActionConfig::new("true");
    config.trigger_on_detect = false;
    config.trigger_on_no_detect = true;
    let mut dispatcher = ActionDispatcher::new(vec![config]);

    assert_eq!(dispatcher.invoke(false, "anything", None, at(0)), 1);
    assert_eq!(dispatcher.invoke(true, "anything", None, at(10)), 0);
  }

  #[test]
  fn cool_down_suppresses_repeats() {
    let mut config = ActionConfig::new("true");
    config.cool_down = TimeDelta::seconds(5);
    let mut dispatcher = ActionDispatcher::new(vec![config]);

    assert_eq!(dispatcher.invoke(true, "door", None, at(0)), 1);
    assert_eq!(dispatcher.invoke(true, "door", None, at(2)), 0);
    assert_eq!(dispatcher.invoke(true, "door", None, at(4)), 0);
    // 恰好到达冷却结束时刻即可再次触发
    assert_eq!(dispatcher.invoke(true, "door", None, at(5)), 1);
  }

  #[test]
  fn unbounded_cool_down_never_expires() {
    let mut config = ActionConfig::new("true");
    config.cool_down = TimeDelta::MAX;
    let mut dispatcher = ActionDispatcher::new(vec![config]);

    assert_eq!(dispatcher.invoke(true, "door", None, at(0)), 1);
    assert_eq!(dispatcher.invoke(true, "door", None, at(1)), 0);
    assert_eq!(dispatcher.invoke(true, "door", None, at(86_400 * 365)), 0);
  }

  #[test]
  fn clock_moving_backwards_restarts_cool_down() {
    let mut config = ActionConfig::new("true");
    config.cool_down = TimeDelta::seconds(5);
    let mut dispatcher = ActionDispatcher::new(vec![config]);

    assert_eq!(dispatcher.invoke(true, "door", None, at(3600)), 1);
    // 时间被拨回一小时，不会被阻塞一小时
    assert_eq!(dispatcher.invoke(true, "door", None, at(0)), 1);
    assert_eq!(dispatcher.invoke(true, "door", None, at(2)), 0);
    assert_eq!(dispatcher.invoke(true, "door", None, at(5)), 1);
  }

  #[test]
  fn counts_configured_actions() {
    assert!(ActionDispatcher::new(Vec::new()).is_empty());
    let dispatcher =
      ActionDispatcher::new(vec![ActionConfig::new("true"), ActionConfig::new("false")]);
    assert_eq!(dispatcher.len(), 2);
    assert!(!dispatcher.is_empty());
  }

  #[test]
  fn failing_commands_only_warn() {
    let mut dispatcher = ActionDispatcher::new(vec![
      ActionConfig::new("false"),
      ActionConfig::new("/nonexistent/shouwang-action"),
      ActionConfig::new("true"),
    ]);
    assert_eq!(dispatcher.invoke(true, "door", None, at(0)), 3);
  }

  #[test]
  fn saves_and_removes_still_frame() {
    let frames_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("seen");

    let mut config = shell(&format!(
      "test -s \"$IMAGE_PATH\" && basename \"$IMAGE_PATH\" > {}",
      out.display()
    ));
    config.save_frame = true;
    config.save_frame_dir = frames_dir.path().to_path_buf();
    let mut dispatcher = ActionDispatcher::new(vec![config]);

    let frame = Frame::new(RgbImage::new(8, 8), 0, at(0));
    assert_eq!(dispatcher.invoke(true, "door", Some(&frame), at(0)), 1);

    let name = std::fs::read_to_string(&out).unwrap();
    assert!(name.starts_with(STILL_FRAME_PREFIX));
    assert!(name.trim_end().ends_with(STILL_FRAME_SUFFIX));
    assert_eq!(std::fs::read_dir(frames_dir.path()).unwrap().count(), 0);
  }

  #[test]
  fn missing_frame_uses_sentinel() {
    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("image");

    let mut config = shell(&format!("printf '%s' \"$IMAGE_PATH\" > {}", out.display()));
    config.save_frame = true;
    let mut dispatcher = ActionDispatcher::new(vec![config]);

    assert_eq!(dispatcher.invoke(true, "door", None, at(0)), 1);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), NO_IMAGE);
  }

  #[test]
  fn timeout_kills_slow_command() {
    let mut config = shell("sleep 5");
    config.timeout = Some(Duration::from_millis(100));
    let mut dispatcher = ActionDispatcher::new(vec![config]);

    let start = Instant::now();
    assert_eq!(dispatcher.invoke(true, "door", None, at(0)), 1);
    assert!(start.elapsed() < Duration::from_secs(4));
  }
}
