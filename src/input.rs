// 该文件是 Shouwang （守望） 项目的一部分。
// src/input.rs - 摄像头/图像输入
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

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, scaled_resolution},
};

/// 帧来源
///
/// `capture_frame` 返回 `None` 表示本次采集失败（设备关闭、读取出错等），
/// 调用方应把它当作一个空周期继续运行。
pub trait Capture {
  /// 输出帧的分辨率 (宽, 高)
  fn resolution(&self) -> (u32, u32);
  fn capture_frame(&mut self) -> Option<Frame>;
  /// 释放设备，可重复调用
  fn close(&mut self);
}

impl<C: Capture + ?Sized> Capture for Box<C> {
  fn resolution(&self) -> (u32, u32) {
    (**self).resolution()
  }

  fn capture_frame(&mut self) -> Option<Frame> {
    (**self).capture_frame()
  }

  fn close(&mut self) {
    (**self).close()
  }
}

mod v4l2_source;
pub use self::v4l2_source::{V4lCamera, V4lCameraError};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFolderInput, ImageFolderInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerCamera, GStreamerCameraError, GStreamerCameraPipelineBuilder,
};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("V4L camera error: {0}")]
  V4lCameraError(#[from] V4lCameraError),
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFolderInputError(#[from] ImageFolderInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerCameraError(#[from] GStreamerCameraError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
}

/// 根据 URL 方案选择的具体输入
pub enum CaptureWrapper {
  V4l(V4lCamera),
  #[cfg(feature = "gstreamer_input")]
  GStreamer(GStreamerCamera),
  #[cfg(feature = "read_image_file")]
  ImageFolder(ImageFolderInput),
}

impl FromUrl for CaptureWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() == V4lCamera::SCHEME {
      return Ok(CaptureWrapper::V4l(V4lCamera::from_url(url)?));
    }
    #[cfg(feature = "gstreamer_input")]
    {
      if url.scheme() == GStreamerCameraPipelineBuilder::SCHEME {
        let input = GStreamerCameraPipelineBuilder::from_url(url)?.build()?;
        return Ok(CaptureWrapper::GStreamer(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      if url.scheme() == ImageFolderInput::SCHEME {
        return Ok(CaptureWrapper::ImageFolder(ImageFolderInput::from_url(url)?));
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Capture for CaptureWrapper {
  fn resolution(&self) -> (u32, u32) {
    match self {
      CaptureWrapper::V4l(input) => input.resolution(),
      #[cfg(feature = "gstreamer_input")]
      CaptureWrapper::GStreamer(input) => input.resolution(),
      #[cfg(feature = "read_image_file")]
      CaptureWrapper::ImageFolder(input) => input.resolution(),
    }
  }

  fn capture_frame(&mut self) -> Option<Frame> {
    match self {
      CaptureWrapper::V4l(input) => input.capture_frame(),
      #[cfg(feature = "gstreamer_input")]
      CaptureWrapper::GStreamer(input) => input.capture_frame(),
      #[cfg(feature = "read_image_file")]
      CaptureWrapper::ImageFolder(input) => input.capture_frame(),
    }
  }

  fn close(&mut self) {
    match self {
      CaptureWrapper::V4l(input) => input.close(),
      #[cfg(feature = "gstreamer_input")]
      CaptureWrapper::GStreamer(input) => input.close(),
      #[cfg(feature = "read_image_file")]
      CaptureWrapper::ImageFolder(input) => input.close(),
    }
  }
}

/// 把过宽的帧等比缩小到 `max_width`，减少检测耗时
pub struct Downscale<C> {
  inner: C,
  max_width: u32,
}

impl<C: Capture> Downscale<C> {
  pub fn new(inner: C, max_width: u32) -> Self {
    Self { inner, max_width }
  }
}

impl<C: Capture> Capture for Downscale<C> {
  fn resolution(&self) -> (u32, u32) {
    let (width, height) = self.inner.resolution();
    scaled_resolution(width, height, self.max_width)
  }

  fn capture_frame(&mut self) -> Option<Frame> {
    self
      .inner
      .capture_frame()
      .map(|frame| frame.downscaled(self.max_width))
  }

  fn close(&mut self) {
    self.inner.close()
  }
}

pub(crate) fn query_value<T: std::str::FromStr>(url: &Url, key: &str) -> Option<T> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .and_then(|(_, v)| v.parse().ok())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Local;
  use image::RgbImage;

  struct Fixed {
    closed: bool,
  }

  impl Capture for Fixed {
    fn resolution(&self) -> (u32, u32) {
      (1280, 720)
    }

    fn capture_frame(&mut self) -> Option<Frame> {
      Some(Frame::new(RgbImage::new(1280, 720), 0, Local::now()))
    }

    fn close(&mut self) {
      self.closed = true;
    }
  }

  #[test]
  fn downscale_reports_scaled_resolution() {
    let mut capture = Downscale::new(Fixed { closed: false }, 400);
    assert_eq!(capture.resolution(), (400, 225));
    let frame = capture.capture_frame().unwrap();
    assert_eq!((frame.width(), frame.height()), (400, 225));
    capture.close();
    assert!(capture.inner.closed);
  }

  #[test]
  fn rejects_unknown_scheme() {
    let url = Url::parse("rtsp://camera.local/stream").unwrap();
    assert!(matches!(
      CaptureWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn reads_query_values() {
    let url = Url::parse("v4l:///dev/video0?width=320&height=abc").unwrap();
    assert_eq!(query_value::<u32>(&url, "width"), Some(320));
    assert_eq!(query_value::<u32>(&url, "height"), None);
    assert_eq!(query_value::<u32>(&url, "fps"), None);
  }
}
