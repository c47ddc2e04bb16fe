// 该文件是 Shouwang （守望） 项目的一部分。
// src/output.rs - 输出定义
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

use std::path::Path;
use std::str::FromStr;

use image::RgbImage;
use thiserror::Error;

/// 视频文件写入器
///
/// 写入器在 `finish` 之后不再接受新帧。
pub trait OutputWriter {
  fn write_frame(&mut self, image: &RgbImage) -> Result<(), OutputError>;
  fn finish(&mut self) -> Result<(), OutputError>;
}

impl<W: OutputWriter + ?Sized> OutputWriter for Box<W> {
  fn write_frame(&mut self, image: &RgbImage) -> Result<(), OutputError> {
    (**self).write_frame(image)
  }

  fn finish(&mut self) -> Result<(), OutputError> {
    (**self).finish()
  }
}

pub mod draw;

mod mjpeg_file;
pub use self::mjpeg_file::MjpegFileWriter;

#[cfg(feature = "gstreamer_output")]
mod gstreamer_video_output;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_video_output::{GStreamerVideoWriter, GStreamerVideoWriterError};

mod recorder;
pub use self::recorder::{
  Recorder, RecorderError, RecorderSettings, RecordingScan, Rotation, scan_recordings,
};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("写入器已结束")]
  Finished,
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 视频输出错误: {0}")]
  GStreamerVideoWriterError(#[from] GStreamerVideoWriterError),
  #[error("未知的视频格式: {0}")]
  UnknownFormat(String),
}

/// 录像文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
  /// 逐帧 JPEG 首尾相接
  Mjpeg,
  /// AVI 容器内的 MJPEG
  #[cfg(feature = "gstreamer_output")]
  Avi,
}

impl Default for VideoFormat {
  fn default() -> Self {
    #[cfg(feature = "gstreamer_output")]
    return VideoFormat::Avi;
    #[cfg(not(feature = "gstreamer_output"))]
    return VideoFormat::Mjpeg;
  }
}

impl VideoFormat {
  pub fn extension(&self) -> &'static str {
    match self {
      VideoFormat::Mjpeg => "mjpeg",
      #[cfg(feature = "gstreamer_output")]
      VideoFormat::Avi => "avi",
    }
  }

  /// 在 `path` 创建新的视频文件
  #[cfg_attr(not(feature = "gstreamer_output"), allow(unused_variables))]
  pub fn open(
    &self,
    path: &Path,
    fps: f64,
    resolution: (u32, u32),
  ) -> Result<Box<dyn OutputWriter + Send>, OutputError> {
    match self {
      VideoFormat::Mjpeg => Ok(Box::new(MjpegFileWriter::create(path, resolution)?)),
      #[cfg(feature = "gstreamer_output")]
      VideoFormat::Avi => Ok(Box::new(GStreamerVideoWriter::create(
        path, fps, resolution,
      )?)),
    }
  }
}

impl FromStr for VideoFormat {
  type Err = OutputError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "mjpeg" | "mjpg" => Ok(VideoFormat::Mjpeg),
      #[cfg(feature = "gstreamer_output")]
      "avi" => Ok(VideoFormat::Avi),
      _ => Err(OutputError::UnknownFormat(s.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_format_names() {
    assert_eq!("MJPEG".parse::<VideoFormat>().unwrap(), VideoFormat::Mjpeg);
    assert_eq!(VideoFormat::Mjpeg.extension(), "mjpeg");
    assert!(matches!(
      "mp4".parse::<VideoFormat>(),
      Err(OutputError::UnknownFormat(_))
    ));
  }
}
