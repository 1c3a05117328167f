use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;

use super::source::FrameSource;
use crate::core::analysis::{AnalysisMethod, FractalAnalyzer, FrameAnalysis, MethodTag};
use crate::core::error::AnalysisError;
use crate::core::frame::Frame;

/// 分析运行配置
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub method: AnalysisMethod,
    /// Analyze every Nth frame inside the clip window.
    pub sampling_rate: u64,
    /// Clip start in seconds; 0 starts at the first frame.
    pub clip_start_sec: f64,
    /// Clip end in seconds; 0 runs to the end of the stream.
    pub clip_end_sec: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            method: AnalysisMethod::default(),
            sampling_rate: 1,
            clip_start_sec: 0.0,
            clip_end_sec: 0.0,
        }
    }
}

/// 每帧结果记录
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub frame_idx: u64,
    /// Seconds from the start of the stream, 0 when fps is unknown.
    pub timestamp: f64,
    pub dimension: f64,
    pub r_squared: f64,
    pub reliable: bool,
    pub log_scales: Vec<f64>,
    pub log_counts: Vec<f64>,
    pub edge_pixels: u64,
    pub method: MethodTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d_std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padded_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_slopes: Option<Vec<f64>>,
}

impl FrameRecord {
    fn from_analysis(analysis: FrameAnalysis, frame_idx: u64, fps: f64) -> Self {
        let FrameAnalysis {
            estimate,
            edge_pixels,
            moisy,
            ..
        } = analysis;

        let timestamp = if fps > 0.0 {
            frame_idx as f64 / fps
        } else {
            0.0
        };

        let mut record = Self {
            frame_idx,
            timestamp,
            dimension: estimate.dimension,
            r_squared: estimate.r_squared,
            reliable: estimate.reliable,
            log_scales: estimate.log_scales,
            log_counts: estimate.log_counts,
            edge_pixels,
            method: estimate.method,
            d_std: None,
            threshold: None,
            padded_size: None,
            scale_range: None,
            local_slopes: None,
        };

        if let Some(extras) = moisy {
            record.d_std = Some(extras.dimension_std);
            record.threshold = Some(extras.threshold);
            record.padded_size = Some(extras.padded_size);
            record.scale_range = Some(format!(
                "{}-{}",
                extras.scale_range.0, extras.scale_range.1
            ));
            record.local_slopes = Some(extras.local_slopes);
        }

        record
    }
}

/// 顺序分析运行器
///
/// One background worker iterates the source sequentially; the cancel
/// flag is polled once per frame boundary, so the current frame always
/// completes before the run stops.
pub struct AnalysisRunner {
    analyzer: FractalAnalyzer,
    settings: AnalysisSettings,
    cancel: Arc<AtomicBool>,
}

impl AnalysisRunner {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self::with_analyzer(FractalAnalyzer::new(), settings)
    }

    pub fn with_analyzer(analyzer: FractalAnalyzer, settings: AnalysisSettings) -> Self {
        Self {
            analyzer,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cooperative cancellation handle; set it from any thread.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// 运行完整分析循环
    ///
    /// `on_frame` fires once per processed frame, `on_progress` once per
    /// visited frame (processed or sampled out). Per-frame failures are
    /// logged and skipped; the run itself keeps going. Returns the number
    /// of processed frames.
    pub fn run<S, F, P>(
        &self,
        source: &mut S,
        mut on_frame: F,
        mut on_progress: P,
    ) -> Result<u64, AnalysisError>
    where
        S: FrameSource,
        F: FnMut(FrameRecord),
        P: FnMut(u64, u64),
    {
        let total_frames = source.total_frames();
        if total_frames == 0 {
            return Ok(0);
        }
        let fps = source.fps();

        let (start_frame, end_frame) = self.clip_window(total_frames, fps);
        let clip_total = end_frame - start_frame;
        info!(
            "Analysis run: frames {start_frame}..{end_frame}, sampling 1/{}",
            self.settings.sampling_rate.max(1)
        );

        if start_frame > 0 {
            source.seek(start_frame)?;
        }

        let sampling = self.settings.sampling_rate.max(1);
        let mut processed = 0u64;
        let mut frame_idx = start_frame;

        while frame_idx < end_frame {
            if self.cancel.load(Ordering::Relaxed) {
                info!("Analysis cancelled at frame {frame_idx}");
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading frame {frame_idx}: {e}");
                    on_progress(frame_idx - start_frame + 1, clip_total);
                    frame_idx += 1;
                    if source.seek(frame_idx).is_err() {
                        warn!("Cannot resync source after read error, stopping");
                        break;
                    }
                    continue;
                }
            };

            if (frame_idx - start_frame) % sampling == 0 {
                let record = self.process_frame(&frame, frame_idx, fps);
                on_frame(record);
                processed += 1;
            }

            on_progress(frame_idx - start_frame + 1, clip_total);
            frame_idx += 1;
        }

        Ok(processed)
    }

    /// 处理单帧
    pub fn process_frame(&self, frame: &Frame, frame_idx: u64, fps: f64) -> FrameRecord {
        let analysis = self.analyzer.analyze(frame, &self.settings.method);
        FrameRecord::from_analysis(analysis, frame_idx, fps)
    }

    /// 秒 → 帧号的剪辑窗口换算
    fn clip_window(&self, total_frames: u64, fps: f64) -> (u64, u64) {
        let start = if fps > 0.0 {
            (self.settings.clip_start_sec * fps) as u64
        } else {
            0
        };
        let start = start.min(total_frames - 1);

        let end = if self.settings.clip_end_sec > 0.0 && fps > 0.0 {
            let end = (self.settings.clip_end_sec * fps) as u64;
            end.clamp(start + 1, total_frames)
        } else {
            total_frames
        };

        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::generators::generate_square;
    use crate::core::analysis::{MoisyParams, PreprocessConfig, ThresholdMode};
    use crate::video_analyzer::source::VecSource;

    fn square_frames(count: u64) -> Vec<Frame> {
        (0..count)
            .map(|i| Frame::from_gray(&generate_square(128, true), i * 40, i))
            .collect()
    }

    fn box_counting_settings() -> AnalysisSettings {
        AnalysisSettings {
            method: AnalysisMethod::BoxCounting {
                preprocess: PreprocessConfig {
                    threshold_mode: ThresholdMode::Manual,
                    manual_thresholds: (50, 150),
                    blur_kernel_size: 0,
                    ..Default::default()
                },
                r2_threshold: 0.9,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_run_processes_all_frames() {
        let mut source = VecSource::new(square_frames(6), 25.0);
        let runner = AnalysisRunner::new(box_counting_settings());

        let mut records = Vec::new();
        let mut last_progress = (0, 0);
        let processed = runner
            .run(&mut source, |r| records.push(r), |c, t| last_progress = (c, t))
            .unwrap();

        assert_eq!(processed, 6);
        assert_eq!(records.len(), 6);
        assert_eq!(last_progress, (6, 6));
        assert_eq!(records[3].frame_idx, 3);
        assert!((records[3].timestamp - 3.0 / 25.0).abs() < 1e-12);
        assert_eq!(records[0].method, MethodTag::BoxCounting);
    }

    #[test]
    fn test_record_serializes_method_tag() {
        let mut source = VecSource::new(square_frames(1), 25.0);
        let runner = AnalysisRunner::new(box_counting_settings());

        let mut records = Vec::new();
        runner
            .run(&mut source, |r| records.push(r), |_, _| {})
            .unwrap();

        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["method"], "box_counting");
    }

    #[test]
    fn test_sampling_rate_skips_frames() {
        let mut source = VecSource::new(square_frames(10), 25.0);
        let settings = AnalysisSettings {
            sampling_rate: 3,
            ..box_counting_settings()
        };
        let runner = AnalysisRunner::new(settings);

        let mut indices = Vec::new();
        let processed = runner
            .run(&mut source, |r| indices.push(r.frame_idx), |_, _| {})
            .unwrap();

        assert_eq!(processed, 4);
        assert_eq!(indices, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_clip_window_seconds() {
        // 10 frames at 2 fps: clip 1s..3s maps to frames 2..6
        let mut source = VecSource::new(square_frames(10), 2.0);
        let settings = AnalysisSettings {
            clip_start_sec: 1.0,
            clip_end_sec: 3.0,
            ..box_counting_settings()
        };
        let runner = AnalysisRunner::new(settings);

        let mut indices = Vec::new();
        runner
            .run(&mut source, |r| indices.push(r.frame_idx), |_, _| {})
            .unwrap();
        assert_eq!(indices, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_cancellation_stops_before_next_frame() {
        let mut source = VecSource::new(square_frames(100), 25.0);
        let runner = AnalysisRunner::new(box_counting_settings());
        let cancel = runner.cancel_flag();

        let mut count = 0u64;
        runner
            .run(
                &mut source,
                |_| {
                    count += 1;
                    if count == 3 {
                        cancel.store(true, Ordering::Relaxed);
                    }
                },
                |_, _| {},
            )
            .unwrap();

        // the frame in flight completes, nothing after it starts
        assert_eq!(count, 3);
    }

    #[test]
    fn test_zero_fps_timestamps() {
        let mut source = VecSource::new(square_frames(2), 0.0);
        let runner = AnalysisRunner::new(box_counting_settings());

        let mut records = Vec::new();
        runner
            .run(&mut source, |r| records.push(r), |_, _| {})
            .unwrap();
        assert!(records.iter().all(|r| r.timestamp == 0.0));
    }

    #[test]
    fn test_moisy_record_fields() {
        let mut source = VecSource::new(square_frames(1), 25.0);
        let settings = AnalysisSettings {
            method: AnalysisMethod::MoisyBoxCounting(MoisyParams::default()),
            ..Default::default()
        };
        let runner = AnalysisRunner::new(settings);

        let mut records = Vec::new();
        runner
            .run(&mut source, |r| records.push(r), |_, _| {})
            .unwrap();

        let record = &records[0];
        assert_eq!(record.method, MethodTag::MoisyBoxCounting);
        assert_eq!(record.scale_range.as_deref(), Some("4-8"));
        assert_eq!(record.threshold, Some(0.25));
        assert_eq!(record.padded_size, Some(128));
        assert!(record.d_std.is_some());
        assert!(record.local_slopes.is_some());
    }

    /// Source whose frames fail to decode at the given indices.
    struct FlakySource {
        inner: VecSource,
        fail_at: Vec<u64>,
        cursor: u64,
    }

    impl FlakySource {
        fn new(frames: Vec<Frame>, fps: f64, fail_at: Vec<u64>) -> Self {
            Self {
                inner: VecSource::new(frames, fps),
                fail_at,
                cursor: 0,
            }
        }
    }

    impl FrameSource for FlakySource {
        fn total_frames(&self) -> u64 {
            self.inner.total_frames()
        }

        fn fps(&self) -> f64 {
            self.inner.fps()
        }

        fn seek(&mut self, frame_index: u64) -> Result<(), AnalysisError> {
            self.inner.seek(frame_index)?;
            self.cursor = frame_index;
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError> {
            let idx = self.cursor;
            self.cursor += 1;
            if self.fail_at.contains(&idx) {
                // consume the broken frame so the stream position advances
                self.inner.seek(idx + 1)?;
                return Err(AnalysisError::Source(format!(
                    "decode failed at frame {idx}"
                )));
            }
            self.inner.next_frame()
        }
    }

    #[test]
    fn test_decode_error_skips_frame_and_continues() {
        let mut source = FlakySource::new(square_frames(5), 25.0, vec![2]);
        let runner = AnalysisRunner::new(box_counting_settings());

        let mut indices = Vec::new();
        let processed = runner
            .run(&mut source, |r| indices.push(r.frame_idx), |_, _| {})
            .unwrap();

        // frame 2 is lost, the rest of the clip still gets analyzed
        assert_eq!(processed, 4);
        assert_eq!(indices, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_empty_source() {
        let mut source = VecSource::new(Vec::new(), 25.0);
        let runner = AnalysisRunner::new(box_counting_settings());
        let processed = runner.run(&mut source, |_| {}, |_, _| {}).unwrap();
        assert_eq!(processed, 0);
    }
}
