// 该文件是 Shouwang （守望） 项目的一部分。
// src/output/recorder.rs - 循环录像
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

//! # 循环录像
//!
//! 录像文件按 `<file_base><index>.<ext>` 命名，编号在同一目录内单调递增，
//! 重启后从已有最大编号加一继续。每个文件最多写入 `frame_limit` 帧，
//! 目录中最多保留 `file_limit` 个文件，超出时按编号（而不是修改时间）
//! 删除最旧的文件。

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::output::{OutputError, OutputWriter, VideoFormat};

#[derive(Error, Debug)]
pub enum RecorderError {
  #[error("无法读取录像目录 {0}: {1}")]
  ScanDirectory(PathBuf, io::Error),
  #[error("无法创建录像文件 {0}: {1}")]
  OpenFile(PathBuf, OutputError),
  #[error("写入录像帧失败: {0}")]
  Write(OutputError),
  #[error("无法删除旧录像文件 {0}: {1}")]
  Evict(PathBuf, io::Error),
  #[error("录像器已关闭")]
  Closed,
  #[error("未知的轮转方式: {0}")]
  UnknownRotation(String),
}

/// 何时切换到下一个录像文件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
  /// 文件已有 `frame_limit` 帧时切换
  #[default]
  AtLimit,
  /// 文件已有 `frame_limit + 1` 帧时切换
  PastLimit,
}

impl Rotation {
  pub fn should_rotate(self, frames: u64, frame_limit: u64) -> bool {
    match self {
      Rotation::AtLimit => frames >= frame_limit,
      Rotation::PastLimit => frames > frame_limit,
    }
  }
}

impl FromStr for Rotation {
  type Err = RecorderError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "at_limit" => Ok(Rotation::AtLimit),
      "past_limit" => Ok(Rotation::PastLimit),
      _ => Err(RecorderError::UnknownRotation(s.to_string())),
    }
  }
}

#[derive(Debug, Clone)]
pub struct RecorderSettings {
  pub directory: PathBuf,
  pub file_base: String,
  pub format: VideoFormat,
  pub fps: f64,
  pub resolution: (u32, u32),
  pub frame_limit: u64,
  pub file_limit: usize,
  pub rotation: Rotation,
}

impl RecorderSettings {
  pub fn file_path(&self, index: u64) -> PathBuf {
    self.directory.join(format!(
      "{}{}.{}",
      self.file_base,
      index,
      self.format.extension()
    ))
  }
}

/// 录像目录扫描结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingScan {
  pub lowest: Option<u64>,
  pub highest: Option<u64>,
  pub count: usize,
}

/// 扫描 `directory` 中名为 `<file_base><数字>.<extension>` 的文件
pub fn scan_recordings(
  directory: &Path,
  file_base: &str,
  extension: &str,
) -> io::Result<RecordingScan> {
  let suffix = format!(".{}", extension);
  let mut scan = RecordingScan::default();

  for entry in std::fs::read_dir(directory)? {
    let entry = entry?;
    let name = entry.file_name();
    let Some(index) = name
      .to_str()
      .and_then(|name| name.strip_prefix(file_base))
      .and_then(|rest| rest.strip_suffix(suffix.as_str()))
      .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
      .and_then(|digits| digits.parse::<u64>().ok())
    else {
      continue;
    };

    scan.count += 1;
    scan.lowest = Some(scan.lowest.map_or(index, |lowest| lowest.min(index)));
    scan.highest = Some(scan.highest.map_or(index, |highest| highest.max(index)));
  }

  Ok(scan)
}

struct RecordingFile {
  index: u64,
  path: PathBuf,
  writer: Box<dyn OutputWriter + Send>,
  frames: u64,
}

/// 有界保留的循环录像器
///
/// 只有在 `enable` 之后 `write` 才会真正写入帧。
pub struct Recorder {
  settings: RecorderSettings,
  current: Option<RecordingFile>,
  lowest_index: Option<u64>,
  live_files: usize,
  enabled: bool,
}

impl Recorder {
  /// 扫描录像目录并打开下一个编号的文件
  pub fn initialize(settings: RecorderSettings) -> Result<Self, RecorderError> {
    std::fs::create_dir_all(&settings.directory)
      .map_err(|e| RecorderError::ScanDirectory(settings.directory.clone(), e))?;
    let scan = Self::scan(&settings)?;
    let index = scan.highest.map_or(0, |highest| highest + 1);

    info!(
      "录像目录 {}: 已有 {} 个文件，从编号 {} 开始",
      settings.directory.display(),
      scan.count,
      index
    );

    let mut recorder = Self {
      settings,
      current: None,
      lowest_index: scan.lowest,
      live_files: scan.count,
      enabled: false,
    };
    recorder.open_file(index)?;
    Ok(recorder)
  }

  fn scan(settings: &RecorderSettings) -> Result<RecordingScan, RecorderError> {
    scan_recordings(
      &settings.directory,
      &settings.file_base,
      settings.format.extension(),
    )
    .map_err(|e| RecorderError::ScanDirectory(settings.directory.clone(), e))
  }

  pub fn enable(&mut self) {
    if !self.enabled {
      info!("开始录像");
      self.enabled = true;
    }
  }

  pub fn disable(&mut self) {
    if self.enabled {
      info!("停止录像");
      self.enabled = false;
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn current_index(&self) -> Option<u64> {
    self.current.as_ref().map(|file| file.index)
  }

  pub fn current_frames(&self) -> u64 {
    self.current.as_ref().map_or(0, |file| file.frames)
  }

  pub fn lowest_index(&self) -> Option<u64> {
    self.lowest_index
  }

  pub fn live_files(&self) -> usize {
    self.live_files
  }

  /// 录像开启时写入一帧，关闭时什么都不做
  pub fn write(&mut self, image: &RgbImage) -> Result<(), RecorderError> {
    if !self.enabled {
      return Ok(());
    }

    let (frames, index) = match self.current.as_ref() {
      Some(file) => (file.frames, file.index),
      None => return Err(RecorderError::Closed),
    };
    if self
      .settings
      .rotation
      .should_rotate(frames, self.settings.frame_limit)
    {
      self.close_current();
      self.open_file(index + 1)?;
    }

    let file = self.current.as_mut().ok_or(RecorderError::Closed)?;
    file.writer.write_frame(image).map_err(RecorderError::Write)?;
    file.frames += 1;

    self.evict_excess()
  }

  fn open_file(&mut self, index: u64) -> Result<(), RecorderError> {
    let path = self.settings.file_path(index);
    let writer = self
      .settings
      .format
      .open(&path, self.settings.fps, self.settings.resolution)
      .map_err(|e| RecorderError::OpenFile(path.clone(), e))?;

    info!("打开录像文件 {}", path.display());
    self.live_files += 1;
    if self.lowest_index.is_none() {
      self.lowest_index = Some(index);
    }
    self.current = Some(RecordingFile {
      index,
      path,
      writer,
      frames: 0,
    });
    Ok(())
  }

  fn close_current(&mut self) {
    if let Some(mut file) = self.current.take() {
      info!("关闭录像文件 {} ({} 帧)", file.path.display(), file.frames);
      if let Err(e) = file.writer.finish() {
        error!("关闭录像文件 {} 失败: {}", file.path.display(), e);
      }
    }
  }

  fn evict_excess(&mut self) -> Result<(), RecorderError> {
    while self.live_files > self.settings.file_limit {
      let Some(lowest) = self.lowest_index else {
        break;
      };
      if Some(lowest) == self.current_index() {
        warn!("最旧的录像文件正在写入，跳过删除");
        break;
      }

      let path = self.settings.file_path(lowest);
      match std::fs::remove_file(&path) {
        Ok(()) => info!("删除旧录像文件 {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
          warn!("旧录像文件 {} 已不存在", path.display());
        }
        Err(e) => return Err(RecorderError::Evict(path, e)),
      }

      let scan = Self::scan(&self.settings)?;
      self.lowest_index = scan.lowest;
      self.live_files = scan.count;
    }
    Ok(())
  }

  /// 结束当前文件；可以重复调用
  pub fn close(&mut self) {
    self.enabled = false;
    self.close_current();
  }
}

impl Drop for Recorder {
  fn drop(&mut self) {
    self.close();
  }
}
