// 该文件是 Shouwang （守望） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Shouwang 检测触发的家用摄像头
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// JSON 配置文件路径
  #[arg(long, value_name = "FILE")]
  pub config: PathBuf,

  /// 覆盖配置文件中的摄像头来源
  /// 支持格式:
  /// - V4L2: v4l:///dev/video0?width=640&height=480
  /// - GStreamer: gst://camera/dev/video0?width=640&height=480&fps=15
  /// - 图片目录: image:///path/to/frames?loop=true
  #[arg(long, value_name = "URL")]
  pub camera: Option<Url>,

  /// 运行指定周期数后退出（默认一直运行到收到中断信号）
  #[arg(long, value_name = "COUNT")]
  pub cycles: Option<u64>,
}
