//! 分析结果汇总与导出
//!
//! The core hands the values over; CSV/JSON formatting lives here so the
//! estimation engine stays presentation-free.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::AnalysisError;
use crate::video_analyzer::pipeline::FrameRecord;

#[cfg(test)]
use crate::core::analysis::MethodTag;

/// D 处于该区间的帧记为“optimal”
pub const OPTIMAL_BAND: (f64, f64) = (1.3, 1.5);

/// 整段视频的汇总统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub source: String,
    pub frame_count: usize,
    pub mean_d: f64,
    pub median_d: f64,
    pub std_d: f64,
    pub min_d: f64,
    pub max_d: f64,
    /// Percentage of frames with D inside [1.3, 1.5].
    pub pct_optimal: f64,
}

/// 从逐帧记录计算汇总
pub fn summarize(records: &[FrameRecord], source: &str) -> AnalysisSummary {
    if records.is_empty() {
        return AnalysisSummary {
            source: source.to_string(),
            frame_count: 0,
            mean_d: 0.0,
            median_d: 0.0,
            std_d: 0.0,
            min_d: 0.0,
            max_d: 0.0,
            pct_optimal: 0.0,
        };
    }

    let dims: Vec<f64> = records.iter().map(|r| r.dimension).collect();
    let n = dims.len() as f64;

    let mean = dims.iter().sum::<f64>() / n;
    let variance = dims.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

    let mut sorted = dims.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let optimal = dims
        .iter()
        .filter(|&&d| d >= OPTIMAL_BAND.0 && d <= OPTIMAL_BAND.1)
        .count();

    AnalysisSummary {
        source: source.to_string(),
        frame_count: records.len(),
        mean_d: mean,
        median_d: median,
        std_d: variance.sqrt(),
        min_d: sorted[0],
        max_d: sorted[sorted.len() - 1],
        pct_optimal: 100.0 * optimal as f64 / n,
    }
}

/// 保存汇总为 JSON
pub fn save_summary_json(summary: &AnalysisSummary, path: &Path) -> Result<(), AnalysisError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    Ok(())
}

/// 逐帧记录保存为 CSV（每帧一行）
pub fn save_records_csv(records: &[FrameRecord], path: &Path) -> Result<(), AnalysisError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "frame_idx,timestamp,dimension,r_squared,reliable,edge_pixels,method,d_std"
    )?;
    for record in records {
        writeln!(
            writer,
            "{},{:.6},{:.6},{:.6},{},{},{},{}",
            record.frame_idx,
            record.timestamp,
            record.dimension,
            record.r_squared,
            record.reliable,
            record.edge_pixels,
            record.method.as_str(),
            record
                .d_std
                .map(|v| format!("{v:.6}"))
                .unwrap_or_default(),
        )?;
    }
    writer.flush()?;
    Ok(())
}
