// 该文件是 Shouwang （守望） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 摄像头输入
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

//! # GStreamer 摄像头输入模块
//!
//! 通过 GStreamer 管道采集帧，支持 V4L2 摄像头和视频文件回放。
//!
//! ## URL 格式
//!
//! - `gst://camera/dev/video0?width=640&height=480&fps=15&format=YUY2`
//! - `gst://file/path/to/video.mp4?width=640&height=480`
//!
//! 可选参数 `io-mode`、`rotate`（0/90/180/270）。
//!
//! ## 系统依赖
//!
//! 需要安装 GStreamer 开发库：
//!
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```

use std::collections::HashMap;

use chrono::Local;
use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::Capture};

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerCameraError {
  /// URI scheme 不匹配（期望 "gst://"）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 15;
const PULL_TIMEOUT_SECONDS: u64 = 2;

enum PipelineItem {
  FileSource(String),
  CameraSource {
    camera: String,
    io_mode: Option<u32>,
    format: String,
    width: u32,
    height: u32,
    fps: u32,
  },
  VideoFlip {
    method: u32,
  },
  Scale {
    width: u32,
    height: u32,
  },
  TargetFormat {
    format: String,
  },
}

impl PipelineItem {
  fn to_pipeline(&self) -> String {
    match self {
      PipelineItem::FileSource(path) => {
        format!("filesrc location={} ! decodebin", path)
      }
      PipelineItem::CameraSource {
        camera,
        io_mode,
        format,
        width,
        height,
        fps,
      } => {
        let io_mode_str = io_mode
          .map(|mode| format!(" io-mode={}", mode))
          .unwrap_or_default();
        format!(
          "v4l2src device={}{} ! video/x-raw,format={},width={},height={},framerate={}/1",
          camera, io_mode_str, format, width, height, fps
        )
      }
      PipelineItem::VideoFlip { method } => {
        format!("videoflip method={}", method)
      }
      PipelineItem::Scale { width, height } => {
        format!("videoscale ! video/x-raw,width={},height={}", width, height)
      }
      PipelineItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
    }
  }
}

/// GStreamer 输入管道构建器
pub struct GStreamerCameraPipelineBuilder {
  items: Vec<PipelineItem>,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for GStreamerCameraPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerCameraPipelineBuilder {
  type Error = GStreamerCameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerCameraError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let width = parse_query(&query, "width").unwrap_or(DEFAULT_WIDTH);
    let height = parse_query(&query, "height").unwrap_or(DEFAULT_HEIGHT);

    let mut items = Vec::new();
    match url.host_str() {
      Some("camera") => items.push(PipelineItem::CameraSource {
        camera: url.path().to_string(),
        io_mode: parse_query(&query, "io-mode"),
        format: query
          .get("format")
          .cloned()
          .unwrap_or_else(|| String::from("YUY2")),
        width,
        height,
        fps: parse_query(&query, "fps").unwrap_or(DEFAULT_FPS),
      }),
      Some("file") => items.push(PipelineItem::FileSource(url.path().to_string())),
      _ => return Err(GStreamerCameraError::SchemeMismatch),
    }

    if let Some(method) = query.get("rotate").and_then(|r| video_flip_method(r)) {
      items.push(PipelineItem::VideoFlip { method });
    }
    items.push(PipelineItem::TargetFormat {
      format: String::from("RGB"),
    });
    items.push(PipelineItem::Scale { width, height });

    Ok(Self {
      items,
      width,
      height,
    })
  }
}

fn parse_query<T: std::str::FromStr>(query: &HashMap<String, String>, key: &str) -> Option<T> {
  query.get(key).and_then(|v| v.parse().ok())
}

fn video_flip_method(rotate: &str) -> Option<u32> {
  match rotate {
    "90" => Some(1),
    "180" => Some(2),
    "270" => Some(3),
    _ => None,
  }
}

impl GStreamerCameraPipelineBuilder {
  pub fn build(self) -> Result<GStreamerCamera, GStreamerCameraError> {
    gst::init()?;

    let basic_pipeline = self
      .items
      .iter()
      .map(PipelineItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    let full_pipeline = format!(
      "{} ! appsink max-buffers=2 drop=true name=sink",
      basic_pipeline
    );

    info!("GStreamer pipeline description: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerCameraError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerCameraError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerCameraError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerCamera {
      pipeline: Some(pipeline),
      appsink,
      width: self.width,
      height: self.height,
      frame_index: 0,
    })
  }
}

/// GStreamer 摄像头输入
pub struct GStreamerCamera {
  pipeline: Option<gst::Pipeline>,
  appsink: gst_app::AppSink,
  width: u32,
  height: u32,
  frame_index: u64,
}

impl Drop for GStreamerCamera {
  fn drop(&mut self) {
    self.close();
  }
}

impl Capture for GStreamerCamera {
  fn resolution(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn capture_frame(&mut self) -> Option<Frame> {
    self.pipeline.as_ref()?;

    let sample = self
      .appsink
      .try_pull_sample(gst::ClockTime::from_seconds(PULL_TIMEOUT_SECONDS))?;
    let image = convert_sample_to_rgb(sample)
      .map_err(|e| {
        error!("Failed to fetch sample: {}", e);
        e
      })
      .ok()?;

    let frame = Frame::new(image, self.frame_index, Local::now());
    self.frame_index += 1;
    Some(frame)
  }

  fn close(&mut self) {
    if let Some(pipeline) = self.pipeline.take() {
      info!("关闭 GStreamer 输入管道");
      if let Err(e) = pipeline.set_state(gst::State::Null) {
        warn!("Failed to stop GStreamer pipeline: {}", e);
      }
    }
  }
}

fn convert_sample_to_rgb(sample: gst::Sample) -> Result<RgbImage, GStreamerCameraError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerCameraError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerCameraError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerCameraError::VideoInfoError)?;

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerCameraError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected_size = stride * (height - 1) + width * 3;
  if data.len() < expected_size {
    return Err(GStreamerCameraError::BufferSizeMismatch {
      expected: expected_size,
      actual: data.len(),
    });
  }

  // 行尾可能有对齐填充，按 stride 逐行拷贝
  let swap = match video_info.format() {
    gst_video::VideoFormat::Rgb => false,
    gst_video::VideoFormat::Bgr => true,
    _ => return Err(GStreamerCameraError::UnsupportedFormat),
  };
  let mut rgb = Vec::with_capacity(width * height * 3);
  for row in data.chunks(stride).take(height) {
    for pixel in row[..width * 3].chunks_exact(3) {
      if swap {
        rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
      } else {
        rgb.extend_from_slice(pixel);
      }
    }
  }

  RgbImage::from_raw(width as u32, height as u32, rgb)
    .ok_or_else(|| GStreamerCameraError::PipelineError("Invalid frame size".to_string()))
}
