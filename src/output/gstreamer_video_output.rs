// 该文件是 Shouwang （守望） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
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

//! # GStreamer 视频文件输出模块
//!
//! 通过 `appsrc ! videoconvert ! jpegenc ! avimux ! filesink` 管道把帧写入
//! AVI 文件。结束时发送 EOS 并等待管道排空，保证文件索引完整。
//!
//! ## 系统依赖
//!
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev gstreamer1.0-plugins-good
//! ```

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use image::RgbImage;
use image::imageops::{self, FilterType};
use thiserror::Error;
use tracing::{info, warn};

use crate::output::{OutputError, OutputWriter};

const EOS_TIMEOUT_SECONDS: u64 = 5;

/// GStreamer 视频输出错误类型
#[derive(Error, Debug)]
pub enum GStreamerVideoWriterError {
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// 无法获取 appsrc 元素
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  /// 无法转换元素为 appsrc
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 缓冲区创建错误
  #[error("Buffer creation error")]
  BufferCreationError,
}

/// AVI（MJPEG）录像文件写入器
pub struct GStreamerVideoWriter {
  pipeline: Option<gst::Pipeline>,
  appsrc: gst_app::AppSrc,
  width: u32,
  height: u32,
  frame_duration: gst::ClockTime,
  frame_count: u64,
}

impl GStreamerVideoWriter {
  pub fn create(
    path: &Path,
    fps: f64,
    resolution: (u32, u32),
  ) -> Result<Self, GStreamerVideoWriterError> {
    gst::init()?;

    let (width, height) = resolution;
    let pipeline_desc = format!(
      "appsrc name=src ! videoconvert ! jpegenc ! avimux ! filesink location=\"{}\"",
      path.display()
    );
    info!("创建录像管道: {}", pipeline_desc);

    let pipeline = gst::parse::launch(&pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| {
        GStreamerVideoWriterError::PipelineError("Failed to create pipeline".to_string())
      })?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerVideoWriterError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerVideoWriterError::AppSrcConversionFailed)?;

    // 帧率以千分之一为单位表示，允许 7.5 这类非整数帧率
    let fps_millis = (fps * 1000.0).round().max(1.0) as i32;
    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", width as i32)
      .field("height", height as i32)
      .field("framerate", gst::Fraction::new(fps_millis, 1000))
      .build();
    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;

    let frame_nanos = (1_000_000_000_000 / fps_millis as u64).max(1);
    Ok(Self {
      pipeline: Some(pipeline),
      appsrc,
      width,
      height,
      frame_duration: gst::ClockTime::from_nseconds(frame_nanos),
      frame_count: 0,
    })
  }

  fn push_frame(&mut self, data: &[u8]) -> Result<(), GStreamerVideoWriterError> {
    let mut buffer = gst::Buffer::from_slice(data.to_vec());
    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerVideoWriterError::BufferCreationError)?;
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(
        self.frame_duration.nseconds() * self.frame_count,
      ));
      buffer_ref.set_duration(self.frame_duration);
    }

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerVideoWriterError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;
    self.frame_count += 1;
    Ok(())
  }
}

impl OutputWriter for GStreamerVideoWriter {
  fn write_frame(&mut self, image: &RgbImage) -> Result<(), OutputError> {
    if self.pipeline.is_none() {
      return Err(OutputError::Finished);
    }

    if image.dimensions() == (self.width, self.height) {
      self.push_frame(image.as_raw())?;
    } else {
      let resized = imageops::resize(image, self.width, self.height, FilterType::Triangle);
      self.push_frame(resized.as_raw())?;
    }
    Ok(())
  }

  fn finish(&mut self) -> Result<(), OutputError> {
    let Some(pipeline) = self.pipeline.take() else {
      return Ok(());
    };

    if let Err(e) = self.appsrc.end_of_stream() {
      warn!("无法发送 EOS: {:?}", e);
    } else if let Some(bus) = pipeline.bus() {
      // 等待 avimux 写完索引
      let message = bus.timed_pop_filtered(
        gst::ClockTime::from_seconds(EOS_TIMEOUT_SECONDS),
        &[gst::MessageType::Eos, gst::MessageType::Error],
      );
      if let Some(message) = message
        && let gst::MessageView::Error(err) = message.view()
      {
        warn!("录像管道结束时出错: {}", err.error());
      }
    }

    pipeline
      .set_state(gst::State::Null)
      .map_err(GStreamerVideoWriterError::from)?;
    info!("录像管道已关闭，共写入 {} 帧", self.frame_count);
    Ok(())
  }
}

impl Drop for GStreamerVideoWriter {
  fn drop(&mut self) {
    if let Err(e) = self.finish() {
      warn!("关闭录像管道失败: {}", e);
    }
  }
}
