//! Formatting helpers and run summaries for log output.

use std::time::{Duration, Instant};

use log::{info, warn};

use crate::metrics::Stats;

/// Formats an integer with thousands separators.
///
/// # Examples
///
/// ```
/// use cfdedup_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a fraction as a percentage.
///
/// # Examples
///
/// ```
/// use cfdedup_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0)
}

/// `part / total` as a percentage, `"0.00%"` when `total` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_fraction(part: u64, total: u64) -> String {
    if total == 0 { format_percent(0.0, 2) } else { format_percent(part as f64 / total as f64, 2) }
}

/// Formats a duration as `45s`, `2m 15s` or `1h 30m`.
///
/// # Examples
///
/// ```
/// use cfdedup_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => match secs % 60 {
            0 => format!("{}m", secs / 60),
            rest => format!("{}m {rest}s", secs / 60),
        },
        _ => match (secs % 3600) / 60 {
            0 => format!("{}h", secs / 3600),
            mins => format!("{}h {mins}m", secs / 3600),
        },
    }
}

/// Formats a processing rate in records per second.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} records/s", format_count(count));
    }
    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} records/s", format_count(rate as u64))
    } else {
        format!("{:.1} records/min", count as f64 / (secs / 60.0))
    }
}

/// Logs the outcome of a deduplication run.
pub fn log_dedup_summary(stats: &Stats) {
    info!("Deduplication summary:");
    info!("  Records read:              {}", format_count(stats.records_read));
    info!(
        "  Records filtered:          {} ({})",
        format_count(stats.records_filtered),
        format_fraction(stats.records_filtered, stats.records_read)
    );
    info!("  Read pairs:                {}", format_count(stats.pairs));
    info!("  Families:                  {}", format_count(stats.families));
    info!(
        "  Families emitted:          {} ({})",
        format_count(stats.families_emitted),
        format_fraction(stats.families_emitted, stats.families)
    );
    info!(
        "  Families dropped:          {} ({})",
        format_count(stats.families_dropped()),
        format_fraction(stats.families_dropped(), stats.families)
    );
    info!("  Failed CIGAR agreement:    {}", format_count(stats.families_failed_consistency));
    info!("  Below min family size:     {}", format_count(stats.families_below_min_size));
    if stats.families_discarded_off_target > 0 {
        info!("  Discarded off target:      {}", format_count(stats.families_discarded_off_target));
    }
    info!(
        "  Overlap bases corrected:   {} of {} (masked {})",
        format_count(stats.overlap_bases_corrected),
        format_count(stats.overlap_bases_examined),
        format_count(stats.overlap_bases_masked)
    );
    info!("  Read-through pairs:        {}", format_count(stats.read_through_pairs_trimmed));

    let targeted = stats.ontarget_deduplicated_reads + stats.offtarget_deduplicated_reads;
    if targeted > 0 {
        info!(
            "  On-target reads:           {} ({})",
            format_count(stats.ontarget_deduplicated_reads),
            format_fraction(stats.ontarget_deduplicated_reads, targeted)
        );
        info!("  Off-target reads:          {}", format_count(stats.offtarget_deduplicated_reads));
    }
    if stats.unpaired_reads > 0 {
        warn!("{} reads never found their mate and were not emitted", format_count(stats.unpaired_reads));
    }
}

/// Logs the start and completion of a timed operation.
///
/// # Examples
///
/// ```no_run
/// use cfdedup_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Deduplicating reads");
/// // ... do work ...
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Starts timing and logs `"<operation> ..."`.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Logs the completion with item count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
