pub mod api;
pub mod core;
pub mod video_analyzer;

pub use crate::core::analysis::{
    generate_sierpinski_triangle, generate_square, AnalysisMethod, FractalAnalyzer,
    FractalEstimate, MethodTag, MoisyEstimate, MoisyParams, PreprocessConfig,
};
pub use crate::core::error::AnalysisError;
pub use crate::core::frame::Frame;
pub use crate::video_analyzer::{AnalysisRunner, AnalysisSettings, FrameRecord, FrameSource};

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .try_init();
}
