// 该文件是 Shouwang （守望） 项目的一部分。
// src/input/read_image_file.rs - 图像文件/目录输入
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

use std::path::{Path, PathBuf};

use chrono::Local;
use image::ImageReader;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::Capture, input::query_value};

#[derive(Error, Debug)]
pub enum ImageFolderInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("No image found in {0}")]
  Empty(PathBuf),
}

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// 按文件名顺序回放一个目录（或单个文件）中的图像
///
/// URL 格式：`image:///path/to/frames?loop=true`。不循环时，图像用尽后
/// 每次采集都返回 `None`。
pub struct ImageFolderInput {
  files: Vec<PathBuf>,
  position: usize,
  looping: bool,
  width: u32,
  height: u32,
  frame_index: u64,
  closed: bool,
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFolderInputError::SchemaMismatch);
    }

    let looping = query_value(url, "loop").unwrap_or(false);
    Self::open(url.path(), looping)
  }
}

fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    .unwrap_or(false)
}

impl ImageFolderInput {
  pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self, ImageFolderInputError> {
    let path = path.as_ref();
    let mut files = if path.is_dir() {
      let mut files = Vec::new();
      for entry in std::fs::read_dir(path)? {
        let entry = entry?.path();
        if entry.is_file() && is_image_file(&entry) {
          files.push(entry);
        }
      }
      files
    } else {
      vec![path.to_path_buf()]
    };
    files.sort();

    let first = files
      .first()
      .ok_or_else(|| ImageFolderInputError::Empty(path.to_path_buf()))?;
    let (width, height) = image::image_dimensions(first)?;

    info!(
      "图像输入已打开: {} ({} 张, {}x{}, 循环: {})",
      path.display(),
      files.len(),
      width,
      height,
      looping
    );

    Ok(Self {
      files,
      position: 0,
      looping,
      width,
      height,
      frame_index: 0,
      closed: false,
    })
  }

  fn next_path(&mut self) -> Option<PathBuf> {
    if self.position >= self.files.len() {
      if !self.looping {
        return None;
      }
      self.position = 0;
    }
    let path = self.files.get(self.position).cloned();
    self.position += 1;
    path
  }
}

impl Capture for ImageFolderInput {
  fn resolution(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn capture_frame(&mut self) -> Option<Frame> {
    if self.closed {
      return None;
    }

    let path = self.next_path()?;
    let image = match ImageReader::open(&path).map(|reader| reader.decode()) {
      Ok(Ok(image)) => image.to_rgb8(),
      Ok(Err(e)) => {
        warn!("无法解码图片文件 {}: {}", path.display(), e);
        return None;
      }
      Err(e) => {
        warn!("无法打开图片文件 {}: {}", path.display(), e);
        return None;
      }
    };

    let frame = Frame::new(image, self.frame_index, Local::now());
    self.frame_index += 1;
    Some(frame)
  }

  fn close(&mut self) {
    self.closed = true;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  fn write_images(dir: &Path, count: usize) {
    for i in 0..count {
      RgbImage::new(8, 6)
        .save(dir.join(format!("frame{:02}.png", i)))
        .unwrap();
    }
    std::fs::write(dir.join("notes.txt"), "not an image").unwrap();
  }

  #[test]
  fn replays_directory_once() {
    let dir = tempfile::tempdir().unwrap();
    write_images(dir.path(), 2);

    let mut input = ImageFolderInput::open(dir.path(), false).unwrap();
    assert_eq!(input.resolution(), (8, 6));
    assert_eq!(input.capture_frame().unwrap().index(), 0);
    assert_eq!(input.capture_frame().unwrap().index(), 1);
    assert!(input.capture_frame().is_none());
  }

  #[test]
  fn loops_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    write_images(dir.path(), 1);

    let url = Url::parse(&format!("image://{}?loop=true", dir.path().display())).unwrap();
    let mut input = ImageFolderInput::from_url(&url).unwrap();
    for _ in 0..3 {
      assert!(input.capture_frame().is_some());
    }
    input.close();
    assert!(input.capture_frame().is_none());
  }

  #[test]
  fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      ImageFolderInput::open(dir.path(), false),
      Err(ImageFolderInputError::Empty(_))
    ));
  }
}
