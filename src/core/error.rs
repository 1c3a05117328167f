use thiserror::Error;

/// 分析过程中的意外错误（解码失败、IO 等）
///
/// Degenerate inputs (empty frames, all-zero patterns, too few scale
/// points) are not errors: estimators return a zero-valued result with
/// `reliable = false` instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Seek to frame {0} out of range")]
    SeekOutOfRange(u64),
    /// Decode failure inside a `FrameSource`; the runner logs and skips
    /// the frame instead of aborting the run.
    #[error("Frame source error: {0}")]
    Source(String),
}
