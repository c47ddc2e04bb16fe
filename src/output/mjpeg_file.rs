// 该文件是 Shouwang （守望） 项目的一部分。
// src/output/mjpeg_file.rs - MJPEG 视频文件输出
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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use tracing::debug;

use crate::output::{OutputError, OutputWriter};

const JPEG_QUALITY: u8 = 85;

/// 将帧逐个编码为 JPEG 并首尾相接写入文件
///
/// 生成的文件可以被 `ffplay -f mjpeg` 等工具直接播放。尺寸与录像分辨率
/// 不一致的帧会先被缩放。
pub struct MjpegFileWriter {
  path: PathBuf,
  writer: Option<BufWriter<File>>,
  width: u32,
  height: u32,
  frames: u64,
}

impl MjpegFileWriter {
  pub fn create(path: &Path, resolution: (u32, u32)) -> Result<Self, OutputError> {
    let file = File::create(path)?;
    Ok(Self {
      path: path.to_path_buf(),
      writer: Some(BufWriter::new(file)),
      width: resolution.0,
      height: resolution.1,
      frames: 0,
    })
  }

  pub fn frames(&self) -> u64 {
    self.frames
  }
}

impl OutputWriter for MjpegFileWriter {
  fn write_frame(&mut self, image: &RgbImage) -> Result<(), OutputError> {
    let writer = self.writer.as_mut().ok_or(OutputError::Finished)?;

    let mut encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
    if image.dimensions() == (self.width, self.height) {
      encoder.encode_image(image)?;
    } else {
      let resized = imageops::resize(image, self.width, self.height, FilterType::Triangle);
      encoder.encode_image(&resized)?;
    }

    self.frames += 1;
    Ok(())
  }

  fn finish(&mut self) -> Result<(), OutputError> {
    if let Some(mut writer) = self.writer.take() {
      writer.flush()?;
      debug!("{} 写入完成，共 {} 帧", self.path.display(), self.frames);
    }
    Ok(())
  }
}

impl Drop for MjpegFileWriter {
  fn drop(&mut self) {
    let _ = self.finish();
  }
}
