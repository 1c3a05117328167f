//! 分形维数估计引擎
//!
//! One frame in, one estimate out. Every estimator is pure: no state is
//! carried between calls, so the same input always produces bit-identical
//! output.

pub mod box_count;
pub mod dbc;
pub mod fourier;
pub mod generators;
pub mod moisy;
pub mod preprocess;
pub mod regression;

use std::sync::Arc;

use image::GrayImage;
use serde::Serialize;

use crate::core::backend::{self, ComputeBackend};
use crate::core::frame::Frame;

pub use box_count::{box_count, DEFAULT_R2_THRESHOLD};
pub use dbc::differential_box_count;
pub use fourier::fourier_slope;
pub use generators::{generate_sierpinski_triangle, generate_square};
pub use moisy::{moisy_box_count, MoisyEstimate};
pub use preprocess::{preprocess, preprocess_gray, EdgeMethod, PreprocessConfig, ThresholdMode};

/// 方法标签（用于结果记录）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MethodTag {
    #[serde(rename = "box_counting")]
    BoxCounting,
    #[serde(rename = "dbc")]
    DifferentialBoxCounting,
    #[serde(rename = "fourier")]
    FourierSlope,
    #[serde(rename = "moisy_boxcount")]
    MoisyBoxCounting,
}

impl MethodTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodTag::BoxCounting => "box_counting",
            MethodTag::DifferentialBoxCounting => "dbc",
            MethodTag::FourierSlope => "fourier",
            MethodTag::MoisyBoxCounting => "moisy_boxcount",
        }
    }
}

/// 单帧估计结果
#[derive(Debug, Clone)]
pub struct FractalEstimate {
    /// Estimated fractal dimension D.
    pub dimension: f64,
    /// Goodness of fit (R²); 0 for methods without a global fit.
    pub r_squared: f64,
    /// Log-transformed scale series, in insertion order.
    pub log_scales: Vec<f64>,
    /// Log-transformed count/power series, matching `log_scales`.
    pub log_counts: Vec<f64>,
    pub reliable: bool,
    pub method: MethodTag,
}

impl FractalEstimate {
    /// Zero-valued result for degenerate input; never fitted on noise.
    pub fn degenerate(method: MethodTag) -> Self {
        Self {
            dimension: 0.0,
            r_squared: 0.0,
            log_scales: Vec::new(),
            log_counts: Vec::new(),
            reliable: false,
            method,
        }
    }
}

/// Moisy 方法参数
#[derive(Debug, Clone, Copy)]
pub struct MoisyParams {
    /// Binarization threshold on normalized intensity, in (0, 1).
    pub threshold: f64,
    /// 1-based inclusive window over the local-slope indices.
    pub scale_range: (usize, usize),
}

impl Default for MoisyParams {
    fn default() -> Self {
        Self {
            threshold: 0.25,
            scale_range: (4, 8),
        }
    }
}

/// 分析方法 - 每个变体携带自己的参数
#[derive(Debug, Clone)]
pub enum AnalysisMethod {
    BoxCounting {
        preprocess: PreprocessConfig,
        r2_threshold: f64,
    },
    DifferentialBoxCounting,
    FourierSlope,
    MoisyBoxCounting(MoisyParams),
}

impl AnalysisMethod {
    pub fn tag(&self) -> MethodTag {
        match self {
            AnalysisMethod::BoxCounting { .. } => MethodTag::BoxCounting,
            AnalysisMethod::DifferentialBoxCounting => MethodTag::DifferentialBoxCounting,
            AnalysisMethod::FourierSlope => MethodTag::FourierSlope,
            AnalysisMethod::MoisyBoxCounting(_) => MethodTag::MoisyBoxCounting,
        }
    }
}

impl Default for AnalysisMethod {
    fn default() -> Self {
        AnalysisMethod::BoxCounting {
            preprocess: PreprocessConfig::default(),
            r2_threshold: DEFAULT_R2_THRESHOLD,
        }
    }
}

/// Moisy 专属的逐帧附加字段
#[derive(Debug, Clone)]
pub struct MoisyExtras {
    pub dimension_std: f64,
    pub threshold: f64,
    pub padded_size: u32,
    pub scale_range: (usize, usize),
    pub local_slopes: Vec<f64>,
}

/// 单帧完整分析输出（估计 + 预览图 + 方法附加字段）
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub estimate: FractalEstimate,
    /// Edge map (box counting), binarized pattern (Moisy) or the
    /// grayscale surface itself for the surface-based methods.
    pub preview: GrayImage,
    /// Nonzero pixels in the edge map; 0 for non-edge methods.
    pub edge_pixels: u64,
    pub moisy: Option<MoisyExtras>,
}

/// 分形分析器
///
/// Owns the compute backend, selected once at startup and immutable for
/// the lifetime of the analyzer.
pub struct FractalAnalyzer {
    backend: Arc<dyn ComputeBackend>,
}

impl FractalAnalyzer {
    pub fn new() -> Self {
        Self::with_backend(backend::detect())
    }

    pub fn with_backend(backend: Arc<dyn ComputeBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }

    pub fn preprocess(&self, frame: &Frame, config: &PreprocessConfig) -> GrayImage {
        preprocess::preprocess(frame, config)
    }

    pub fn box_count(&self, pattern: &GrayImage, r2_threshold: f64) -> FractalEstimate {
        box_count::box_count(self.backend.as_ref(), pattern, r2_threshold)
    }

    pub fn differential_box_count(&self, surface: &GrayImage) -> FractalEstimate {
        dbc::differential_box_count(self.backend.as_ref(), surface)
    }

    pub fn fourier_slope(&self, surface: &GrayImage) -> FractalEstimate {
        fourier::fourier_slope(self.backend.as_ref(), surface)
    }

    pub fn moisy_box_count(
        &self,
        surface: &GrayImage,
        threshold: f64,
        scale_range: (usize, usize),
    ) -> MoisyEstimate {
        moisy::moisy_box_count(self.backend.as_ref(), surface, threshold, scale_range)
    }

    /// 按配置的方法分析一帧
    pub fn analyze(&self, frame: &Frame, method: &AnalysisMethod) -> FrameAnalysis {
        match method {
            AnalysisMethod::BoxCounting {
                preprocess: config,
                r2_threshold,
            } => {
                let edges = self.preprocess(frame, config);
                let edge_pixels = edges.as_raw().iter().filter(|&&p| p > 0).count() as u64;
                let estimate = self.box_count(&edges, *r2_threshold);
                FrameAnalysis {
                    estimate,
                    preview: edges,
                    edge_pixels,
                    moisy: None,
                }
            }
            AnalysisMethod::DifferentialBoxCounting => {
                let gray = frame.to_gray();
                let estimate = self.differential_box_count(&gray);
                FrameAnalysis {
                    estimate,
                    preview: gray,
                    edge_pixels: 0,
                    moisy: None,
                }
            }
            AnalysisMethod::FourierSlope => {
                let gray = frame.to_gray();
                let estimate = self.fourier_slope(&gray);
                FrameAnalysis {
                    estimate,
                    preview: gray,
                    edge_pixels: 0,
                    moisy: None,
                }
            }
            AnalysisMethod::MoisyBoxCounting(params) => {
                let gray = frame.to_gray();
                let result = self.moisy_box_count(&gray, params.threshold, params.scale_range);
                let (log_scales, log_counts) = result.log_series();
                let estimate = FractalEstimate {
                    dimension: result.dimension,
                    r_squared: 0.0, // not applicable, local-slope method
                    log_scales,
                    log_counts,
                    reliable: true,
                    method: MethodTag::MoisyBoxCounting,
                };
                let extras = MoisyExtras {
                    dimension_std: result.dimension_std,
                    threshold: result.threshold,
                    padded_size: result.padded_size,
                    scale_range: result.scale_range,
                    local_slopes: result.local_slopes,
                };
                FrameAnalysis {
                    estimate,
                    preview: result.pattern,
                    edge_pixels: 0,
                    moisy: Some(extras),
                }
            }
        }
    }
}

impl Default for FractalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
