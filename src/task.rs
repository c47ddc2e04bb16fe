// 该文件是 Shouwang （守望） 项目的一部分。
// src/task.rs - 采集、检测、录像与动作的主循环
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

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  FromUrl,
  action::ActionDispatcher,
  config::Settings,
  detector::{Detect, DetectionResult, Detector, DetectorError, NamedDetector},
  input::{Capture, CaptureWrapper, Downscale, InputError},
  output::{Recorder, RecorderError, draw},
};

const FALLBACK_PERIOD: Duration = Duration::from_secs(1);

/// 两个周期之间的休眠时间 `1 / fps`，帧率无效时返回 `None`
pub fn cycle_period(fps: f64) -> Option<Duration> {
  if fps > 0.0 {
    Duration::try_from_secs_f64(1.0 / fps).ok()
  } else {
    None
  }
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
  #[error("检测器错误: {0}")]
  Detector(#[from] DetectorError),
  #[error("录像错误: {0}")]
  Recorder(#[from] RecorderError),
  #[error("任务已经启动")]
  AlreadyStarted,
  #[error("任务尚未启动")]
  NotStarted,
  #[error("无法创建工作线程: {0}")]
  Spawn(std::io::Error),
  #[error("工作线程异常退出")]
  WorkerPanicked,
}

/// 某个检测器状态的一次变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
  pub detector: String,
  pub detected: bool,
}

/// 单个循环周期的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
  pub captured: bool,
  /// 第一个周期只记录初始状态
  pub seeded: bool,
  pub transitions: Vec<Transition>,
  pub actions_invoked: usize,
  pub recording: bool,
  pub frame_written: bool,
}

/// 主循环：采集一帧，运行全部检测器，比较状态变化，调度动作并录像
pub struct WatchTask<C, D = Detector> {
  capture: C,
  detectors: Vec<NamedDetector<D>>,
  recorder: Option<Recorder>,
  dispatcher: ActionDispatcher,
  fps: f64,
  max_cycles: Option<u64>,
  last_known: Option<Vec<bool>>,
  any_detected: bool,
  cycles: u64,
}

impl WatchTask<Downscale<CaptureWrapper>, Detector> {
  /// 按配置打开摄像头、创建检测器与录像器
  pub fn from_settings(settings: &Settings) -> Result<Self, TaskError> {
    info!("打开摄像头: {}", settings.camera);
    let capture = Downscale::new(CaptureWrapper::from_url(&settings.camera)?, settings.max_width);
    let resolution = capture.resolution();
    info!("采集分辨率: {}x{}", resolution.0, resolution.1);

    let detectors = settings
      .detectors
      .iter()
      .map(|detector| detector.build())
      .collect::<Result<Vec<_>, _>>()?;

    let recorder = match &settings.recording {
      Some(recording) => Some(Recorder::initialize(
        recording.recorder_settings(settings.fps, resolution),
      )?),
      None => {
        info!("录像未开启");
        None
      }
    };

    let dispatcher = ActionDispatcher::new(settings.actions.clone());
    if dispatcher.is_empty() {
      info!("未配置动作");
    } else {
      info!("已配置 {} 个动作", dispatcher.len());
    }

    Ok(Self::new(capture, detectors, recorder, dispatcher, settings.fps))
  }
}

impl<C: Capture, D: Detect> WatchTask<C, D> {
  pub fn new(
    capture: C,
    detectors: Vec<NamedDetector<D>>,
    recorder: Option<Recorder>,
    dispatcher: ActionDispatcher,
    fps: f64,
  ) -> Self {
    Self {
      capture,
      detectors,
      recorder,
      dispatcher,
      fps,
      max_cycles: None,
      last_known: None,
      any_detected: false,
      cycles: 0,
    }
  }

  /// 运行指定周期数后自动退出
  pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
    self.max_cycles = max_cycles;
    self
  }

  pub fn cycles(&self) -> u64 {
    self.cycles
  }

  pub fn recorder(&self) -> Option<&Recorder> {
    self.recorder.as_ref()
  }

  pub fn run_cycle(&mut self) -> CycleReport {
    self.cycles += 1;
    let mut report = CycleReport::default();

    let frame = self.capture.capture_frame();
    let result = match &frame {
      Some(frame) => {
        report.captured = true;
        DetectionResult::run(&mut self.detectors, &frame.to_gray())
      }
      None => {
        debug!("第 {} 个周期没有采集到帧", self.cycles);
        DetectionResult::nothing(&self.detectors)
      }
    };
    let now = frame
      .as_ref()
      .map(|frame| frame.captured_at())
      .unwrap_or_else(Local::now);

    let statuses: Vec<bool> = result.iter().map(|o| o.detection.detected).collect();
    match self.last_known.replace(statuses.clone()) {
      None => {
        report.seeded = true;
        for outcome in result.iter() {
          info!(
            "检测器 {} 初始状态: {}",
            outcome.name,
            if outcome.detection.detected { "检测到目标" } else { "无目标" }
          );
        }
      }
      Some(previous) => {
        for ((outcome, was), is) in result.iter().zip(previous).zip(statuses) {
          if was == is {
            continue;
          }
          if is {
            info!("检测器 {} 检测到目标", outcome.name);
            for rect in &outcome.detection.rects {
              info!("  目标区域: {}", rect);
            }
          } else {
            info!("检测器 {} 不再检测到目标", outcome.name);
          }
          report.actions_invoked += self.dispatcher.invoke(is, &outcome.name, frame.as_ref(), now);
          report.transitions.push(Transition {
            detector: outcome.name.clone(),
            detected: is,
          });
        }
      }
    }

    let any_detected = result.any_detected();
    if let Some(recorder) = self.recorder.as_mut() {
      if any_detected && !self.any_detected {
        recorder.enable();
      } else if !any_detected && self.any_detected {
        recorder.disable();
      }

      if let Some(frame) = &frame
        && recorder.is_enabled()
      {
        let annotated = draw::annotate(frame.image(), &result);
        match recorder.write(&annotated) {
          Ok(()) => report.frame_written = true,
          Err(e) => {
            error!("录像失败，停止录像: {}", e);
            recorder.close();
            self.recorder = None;
          }
        }
      }
    }
    self.any_detected = any_detected;
    report.recording = self.recorder.as_ref().is_some_and(Recorder::is_enabled);

    report
  }

  /// 循环运行直到 `stop` 被置位或达到周期上限，退出前释放摄像头和录像器
  pub fn run(mut self, stop: &AtomicBool) -> u64 {
    info!("开始任务...");
    let period = cycle_period(self.fps).unwrap_or_else(|| {
      warn!("帧率 {} 无效，循环间隔改为 {:?}", self.fps, FALLBACK_PERIOD);
      FALLBACK_PERIOD
    });

    loop {
      if stop.load(Ordering::SeqCst) {
        warn!("收到停止请求，退出任务循环");
        break;
      }
      if let Some(max_cycles) = self.max_cycles
        && self.cycles >= max_cycles
      {
        info!("达到指定周期数 {}, 退出任务循环", max_cycles);
        break;
      }

      self.run_cycle();
      thread::sleep(period);
    }

    self.shutdown();
    info!("任务完成，共运行 {} 个周期", self.cycles);
    self.cycles
  }

  fn shutdown(&mut self) {
    self.capture.close();
    if let Some(mut recorder) = self.recorder.take() {
      recorder.close();
    }
  }
}

/// 可以在其他线程（例如信号处理函数）中请求停止
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
  pub fn stop(&self) {
    self.0.store(true, Ordering::SeqCst);
  }
}

/// 在后台线程中运行 [`WatchTask`]
pub struct Watcher<C, D = Detector> {
  task: Option<WatchTask<C, D>>,
  stop: Arc<AtomicBool>,
  worker: Option<JoinHandle<u64>>,
}

impl<C, D> Watcher<C, D>
where
  C: Capture + Send + 'static,
  D: Detect + Send + 'static,
{
  pub fn new(task: WatchTask<C, D>) -> Self {
    Self {
      task: Some(task),
      stop: Arc::new(AtomicBool::new(false)),
      worker: None,
    }
  }

  pub fn start(&mut self) -> Result<(), TaskError> {
    let task = self.task.take().ok_or(TaskError::AlreadyStarted)?;
    let stop = self.stop.clone();
    let worker = thread::Builder::new()
      .name("shouwang-worker".to_string())
      .spawn(move || task.run(&stop))
      .map_err(TaskError::Spawn)?;
    self.worker = Some(worker);
    Ok(())
  }

  /// 请求停止，在下一个周期开始时生效
  pub fn stop(&self) {
    self.stop.store(true, Ordering::SeqCst);
  }

  pub fn stop_handle(&self) -> StopHandle {
    StopHandle(self.stop.clone())
  }

  /// 等待工作线程退出，返回运行的周期数
  pub fn wait(&mut self) -> Result<u64, TaskError> {
    let worker = self.worker.take().ok_or(TaskError::NotStarted)?;
    worker.join().map_err(|_| TaskError::WorkerPanicked)
  }
}
