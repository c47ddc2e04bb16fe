// 该文件是 Shouwang （守望） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{thread, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shouwang::{
  config::Config,
  task::{WatchTask, Watcher},
};

const FORCE_EXIT_SECONDS: u64 = 30;

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();
  info!("配置文件: {}", args.config.display());

  let mut settings = Config::from_file(&args.config)
    .and_then(|config| config.validate())
    .with_context(|| format!("无法加载配置文件 {}", args.config.display()))?;
  if let Some(camera) = args.camera {
    settings.camera = camera;
  }
  info!("摄像头来源: {}", settings.camera);
  info!("帧率: {}", settings.fps);

  let task = WatchTask::from_settings(&settings)
    .context("初始化失败")?
    .with_max_cycles(args.cycles);
  let mut watcher = Watcher::new(task);

  let stop = watcher.stop_handle();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    stop.stop();
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(FORCE_EXIT_SECONDS));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .context("无法设置 Ctrl-C 处理函数")?;

  watcher.start()?;
  let cycles = watcher.wait()?;
  info!("退出，共运行 {} 个周期", cycles);

  Ok(())
}
