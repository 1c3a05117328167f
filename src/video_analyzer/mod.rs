//! 逐帧分析编排 - 帧源迭代、取消、进度回调

pub mod pipeline;
pub mod source;

pub use pipeline::{AnalysisRunner, AnalysisSettings, FrameRecord};
pub use source::{FrameSource, VecSource};
