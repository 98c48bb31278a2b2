//! Plain-text rendering of a finished session.
use crate::constants::REPORT_MAX_ERRORS;
use crate::data::SessionResults;
use std::fmt;

/// Markdown report over a completed session.
///
/// ```ignore
/// println!("{}", Report(&results));
/// ```
pub struct Report<'a>(pub &'a SessionResults);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let SessionResults {
            details,
            summary,
            errors,
        } = self.0;

        writeln!(f, "# Key-Value Store Benchmark Report")?;
        writeln!(f)?;
        writeln!(f, "Window: {} - {}", summary.start_time, summary.end_time)?;
        writeln!(
            f,
            "Duration: {:.1}s",
            summary.test_duration as f64 / 1_000.
        )?;
        writeln!(
            f,
            "Target: {} (key {}, value {})",
            summary.config.address(),
            format_bytes(summary.config.key_size() as u64),
            format_bytes(summary.config.value_size() as u64),
        )?;
        writeln!(f)?;

        writeln!(f, "## Overall")?;
        writeln!(f, "- Operations: {}", summary.total_operations)?;
        writeln!(f, "- Successes: {}", summary.total_successes)?;
        writeln!(f, "- Failures: {}", summary.total_failures)?;
        writeln!(f, "- Success rate: {:.2}%", summary.success_rate)?;
        writeln!(f, "- Throughput: {:.2} ops/s", summary.avg_ops_per_second)?;

        writeln!(f)?;
        writeln!(f, "## Operations")?;
        for result in details {
            writeln!(f)?;
            writeln!(f, "### {}", result.operation)?;
            writeln!(f, "- Iterations: {}", result.iterations)?;
            writeln!(f, "- Success rate: {:.1}%", result.success_rate())?;
            writeln!(f, "- Avg: {}", format_latency(result.avg_time))?;
            writeln!(f, "- Min: {}", format_latency(result.min_time))?;
            writeln!(f, "- Max: {}", format_latency(result.max_time))?;
            writeln!(f, "- p50: {}", format_latency(result.p50))?;
            writeln!(f, "- p95: {}", format_latency(result.p95))?;
            writeln!(f, "- p99: {}", format_latency(result.p99))?;
            writeln!(f, "- Throughput: {:.0} ops/s", result.ops)?;
        }

        if !errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Errors")?;
            for (idx, err) in errors.iter().take(REPORT_MAX_ERRORS).enumerate() {
                writeln!(f, "{}. [{}] {}", idx + 1, err.operation, err.error)?;
            }
            if errors.len() > REPORT_MAX_ERRORS {
                writeln!(f, "... {} more", errors.len() - REPORT_MAX_ERRORS)?;
            }
        }

        Ok(())
    }
}

/// Latency in milliseconds, rendered in µs below 1ms and in seconds from 1000ms.
pub fn format_latency(ms: f64) -> String {
    if ms < 1. {
        format!("{:.2}µs", ms * 1_000.)
    } else if ms < 1_000. {
        format!("{ms:.2}ms")
    } else {
        format!("{:.2}s", ms / 1_000.)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024. && unit < UNITS.len() - 1 {
        value /= 1024.;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
