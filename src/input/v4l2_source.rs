// 该文件是 Shouwang （守望） 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
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

use chrono::Local;
use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture as _;
use v4l::{Device, FourCC};

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::Capture, input::query_value};

#[derive(Error, Debug)]
pub enum V4lCameraError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("无法打开设备 {0}: {1}")]
  OpenDevice(String, std::io::Error),
  #[error("无法设置视频格式: {0}")]
  Format(std::io::Error),
  #[error("无法创建捕获流: {0}")]
  Stream(std::io::Error),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
}

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

/// V4L2 摄像头输入源
///
/// URL 格式：`v4l:///dev/video0?width=640&height=480`
pub struct V4lCamera {
  device_path: String,
  stream: Option<Stream<'static>>,
  // stream 持有设备句柄的引用计数，device 只在这里保证其生命周期
  _device: Device,
  frame_index: u64,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for V4lCamera {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lCamera {
  type Error = V4lCameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lCameraError::SchemaMismatch);
    }

    let device_path = if url.path().is_empty() || url.path() == "/" {
      DEFAULT_DEVICE.to_string()
    } else {
      url.path().to_string()
    };
    let width = query_value(url, "width").unwrap_or(DEFAULT_WIDTH);
    let height = query_value(url, "height").unwrap_or(DEFAULT_HEIGHT);

    Self::open(&device_path, width, height)
  }
}

impl V4lCamera {
  pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, V4lCameraError> {
    let device = Device::with_path(device_path)
      .map_err(|e| V4lCameraError::OpenDevice(device_path.to_string(), e))?;

    let mut format = device.format().map_err(V4lCameraError::Format)?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format).map_err(V4lCameraError::Format)?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4lCameraError::UnsupportedPixelFormat(
        format.fourcc.to_string(),
      ));
    }

    let stream = Stream::with_buffers(&device, Type::VideoCapture, STREAM_BUFFERS)
      .map_err(V4lCameraError::Stream)?;

    info!(
      "V4L2 摄像头已打开: {} {}x{}",
      device_path, format.width, format.height
    );

    Ok(Self {
      device_path: device_path.to_string(),
      stream: Some(stream),
      _device: device,
      frame_index: 0,
      width: format.width,
      height: format.height,
    })
  }

  /// 将 YUYV 格式转换为 RGB
  fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);

    for chunk in yuyv.chunks_exact(4) {
      let y0 = chunk[0] as f32;
      let u = chunk[1] as f32 - 128.0;
      let y1 = chunk[2] as f32;
      let v = chunk[3] as f32 - 128.0;

      for y in [y0, y1] {
        let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
        let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
        let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
        rgb.extend_from_slice(&[r, g, b]);
      }
    }

    rgb
  }
}

impl Capture for V4lCamera {
  fn resolution(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn capture_frame(&mut self) -> Option<Frame> {
    let stream = self.stream.as_mut()?;

    let buffer = match stream.next() {
      Ok((buffer, _meta)) => buffer,
      Err(e) => {
        warn!("无法捕获帧: {}", e);
        return None;
      }
    };

    let expected = (self.width * self.height * 2) as usize;
    if buffer.len() < expected {
      warn!("帧数据不完整: 期望 {} 字节, 实际 {} 字节", expected, buffer.len());
      return None;
    }

    let rgb = Self::yuyv_to_rgb(&buffer[..expected], self.width, self.height);
    let image = RgbImage::from_raw(self.width, self.height, rgb)?;

    let frame = Frame::new(image, self.frame_index, Local::now());
    self.frame_index += 1;
    Some(frame)
  }

  fn close(&mut self) {
    if self.stream.take().is_some() {
      info!("关闭视频采集设备: {}", self.device_path);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn converts_gray_yuyv() {
    // Y=128, U=V=128 对应中灰
    let rgb = V4lCamera::yuyv_to_rgb(&[128, 128, 128, 128], 2, 1);
    assert_eq!(rgb, vec![128, 128, 128, 128, 128, 128]);
  }
}
