use std::path::Path;

use crate::runner::{FrameRecord, TimingSeries};

/// Summary of one headless run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RenderReport {
    pub adapter: String,
    pub backend: String,
    pub resolution: [u32; 2],
    pub final_sample_count: u32,
    pub resets: u64,
    pub sphere_count: u32,
    /// Voxel counts per type name, in ordinal order.
    pub voxel_histogram: Vec<(String, usize)>,
    pub timings: TimingSeries,
    pub frames: Vec<FrameRecord>,
}

/// Save a report to a JSON file.
pub fn save_report(path: &Path, report: &RenderReport) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// Format a report as a markdown summary.
pub fn format_markdown(report: &RenderReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Adapter: {} ({}), {}x{}\n\n",
        report.adapter, report.backend, report.resolution[0], report.resolution[1]
    ));

    out.push_str("| Frames | Resets | Samples | Spheres | Mean (ms) | Median (ms) | P95 (ms) | P99 (ms) | Min (ms) | Max (ms) |\n");
    out.push_str("|--------|--------|---------|---------|-----------|-------------|----------|----------|----------|----------|\n");
    let t = &report.timings;
    out.push_str(&format!(
        "| {} | {} | {} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |\n",
        report.frames.len(),
        report.resets,
        report.final_sample_count,
        report.sphere_count,
        t.mean_ms,
        t.median_ms,
        t.p95_ms,
        t.p99_ms,
        t.min_ms,
        t.max_ms,
    ));

    out.push_str("\n| Voxel | Count |\n|-------|-------|\n");
    for (name, count) in &report.voxel_histogram {
        out.push_str(&format!("| {} | {} |\n", name, count));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::compute_timings;

    fn sample_report() -> RenderReport {
        let frames: Vec<FrameRecord> = (0..3)
            .map(|i| FrameRecord {
                frame: i,
                time_ms: 1.0 + i as f64,
                dispatches: 1,
                sample_count: i + 1,
                reset: i == 0,
            })
            .collect();
        let times: Vec<f64> = frames.iter().map(|f| f.time_ms).collect();
        RenderReport {
            adapter: "Test Adapter".into(),
            backend: "Vulkan".into(),
            resolution: [64, 48],
            final_sample_count: 3,
            resets: 1,
            sphere_count: 12,
            voxel_histogram: vec![("Air".into(), 10), ("Stone".into(), 6)],
            timings: compute_timings(&times),
            frames,
        }
    }

    #[test]
    fn test_markdown_contains_summary() {
        let md = format_markdown(&sample_report());
        assert!(md.contains("Test Adapter (Vulkan), 64x48"));
        assert!(md.contains("| 3 | 1 | 3 | 12 | 2.00 | 2.00 |"));
        assert!(md.contains("| Stone | 6 |"));
    }

    #[test]
    fn test_save_report_writes_json() {
        let dir = std::env::temp_dir().join(format!("voxmarch-report-{}", std::process::id()));
        let path = dir.join("nested").join("report.json");
        save_report(&path, &sample_report()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["sphere_count"], 12);
        assert_eq!(json["frames"].as_array().unwrap().len(), 3);
        assert_eq!(json["voxel_histogram"][1][0], "Stone");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
