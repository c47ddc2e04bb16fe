// 该文件是 Shouwang （守望） 项目的一部分。
// tests/recording.rs - 循环录像与整机配置测试
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

use image::{Rgb, RgbImage};

use shouwang::{
  config::{Config, RecordingSettings},
  output::{Recorder, Rotation, VideoFormat, scan_recordings},
  task::{WatchTask, Watcher},
};

fn live_indices(dir: &Path) -> Vec<u64> {
  let mut indices: Vec<u64> = std::fs::read_dir(dir)
    .unwrap()
    .filter_map(|entry| {
      let name = entry.unwrap().file_name().into_string().ok()?;
      name.strip_prefix("cam")?.strip_suffix(".mjpeg")?.parse().ok()
    })
    .collect();
  indices.sort();
  indices
}

#[test]
fn bounded_retention_over_seven_writes() {
  let dir = tempfile::tempdir().unwrap();
  let recording = RecordingSettings {
    directory: dir.path().to_path_buf(),
    file_base: "cam".to_string(),
    file_limit: 2,
    time_limit: 1.0,
    format: VideoFormat::Mjpeg,
    rotation: Rotation::AtLimit,
  };
  let settings = recording.recorder_settings(2.0, (16, 12));
  assert_eq!(settings.frame_limit, 2);

  let mut recorder = Recorder::initialize(settings).unwrap();
  recorder.enable();

  let mut previous_highest = None;
  for write in 1..=7 {
    recorder.write(&RgbImage::new(16, 12)).unwrap();

    let indices = live_indices(dir.path());
    assert!(indices.len() <= 2, "write {}: {:?}", write, indices);
    if write >= 5 {
      assert_eq!(indices.len(), 2, "write {}: {:?}", write, indices);
    }
    assert!(indices.windows(2).all(|w| w[0] < w[1]));

    let highest = indices.last().copied();
    assert!(highest >= previous_highest);
    previous_highest = highest;
  }

  // 7 帧、每个文件 2 帧：编号 0..=3，保留最新的两个
  assert_eq!(live_indices(dir.path()), [2, 3]);
  recorder.close();
  recorder.close();

  let scan = scan_recordings(dir.path(), "cam", "mjpeg").unwrap();
  assert_eq!((scan.lowest, scan.highest, scan.count), (Some(2), Some(3), 2));
}

fn write_frames(dir: &Path) -> PathBuf {
  let frames = dir.join("frames");
  std::fs::create_dir(&frames).unwrap();

  let blank = RgbImage::new(80, 60);
  let mut square = blank.clone();
  for y in 20..40 {
    for x in 30..50 {
      square.put_pixel(x, y, Rgb([255, 255, 255]));
    }
  }

  for (i, image) in [&blank, &blank, &square, &square].into_iter().enumerate() {
    image.save(frames.join(format!("frame{}.png", i))).unwrap();
  }
  frames
}

#[test]
fn configured_watcher_records_and_acts() {
  let dir = tempfile::tempdir().unwrap();
  let frames = write_frames(dir.path());
  let recordings = dir.path().join("recordings");
  let log = dir.path().join("actions.log");

  let config = serde_json::json!({
    "camera": { "source": format!("image://{}", frames.display()) },
    "fps": 50,
    "recording": {
      "enable": true,
      "directory": recordings.display().to_string(),
      "file_base": "cam",
      "file_limit": 3,
      "time_limit": 10
    },
    "detectors": [{
      "name": "yard",
      "type": "motion",
      "blurring_size": 3,
      "object_min_area": 50
    }],
    "actions": [{
      "command": "sh",
      "args": ["-c", format!("echo \"$TRIGGER $DETECTOR\" >> '{}'", log.display())],
      "triggers": ["detect"]
    }]
  });
  let config_path = dir.path().join("config.json");
  std::fs::write(&config_path, config.to_string()).unwrap();

  let settings = Config::from_file(&config_path).unwrap().validate().unwrap();
  let task = WatchTask::from_settings(&settings)
    .unwrap()
    .with_max_cycles(Some(4));
  let mut watcher = Watcher::new(task);
  watcher.start().unwrap();
  assert_eq!(watcher.wait().unwrap(), 4);

  assert_eq!(std::fs::read_to_string(&log).unwrap(), "detect yard\n");
  assert_eq!(live_indices(&recordings), [0]);
  assert!(std::fs::metadata(recordings.join("cam0.mjpeg")).unwrap().len() > 0);
}
