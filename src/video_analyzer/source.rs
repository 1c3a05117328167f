use crate::core::error::AnalysisError;
use crate::core::frame::Frame;

/// 帧源接口 - 视频解码在这条边界之外
///
/// Frame rate is pure metadata here; the runner only uses it for
/// timestamp computation and clip-window mapping.
pub trait FrameSource {
    fn total_frames(&self) -> u64;
    fn fps(&self) -> f64;
    fn seek(&mut self, frame_index: u64) -> Result<(), AnalysisError>;
    /// Next frame in sequence, `None` when the stream ends.
    fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError>;
}

/// 内存帧源（测试与合成序列用）
pub struct VecSource {
    frames: Vec<Frame>,
    fps: f64,
    cursor: usize,
}

impl VecSource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        Self {
            frames,
            fps,
            cursor: 0,
        }
    }
}

impl FrameSource for VecSource {
    fn total_frames(&self) -> u64 {
        self.frames.len() as u64
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek(&mut self, frame_index: u64) -> Result<(), AnalysisError> {
        if frame_index > self.frames.len() as u64 {
            return Err(AnalysisError::SeekOutOfRange(frame_index));
        }
        self.cursor = frame_index as usize;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, AnalysisError> {
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }
}
