//! Split planning.
//!
//! Kept pure and separate from process execution so the arithmetic can be
//! tested without media files.

/// One planned cut: `[start, start + duration)` in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// 1-based part number.
    pub index: usize,
    pub start: f64,
    pub duration: f64,
}

/// Plan `ceil(size_gb / margin_gb)` contiguous, non-overlapping segments
/// covering `[0, total_duration)`.
///
/// The final segment's duration is computed from its start so the last cut
/// ends exactly at the total duration even when `total / parts` does not
/// divide evenly.
pub fn plan_segments(total_duration: f64, size_gb: f64, margin_gb: f64) -> Vec<Segment> {
    let num_parts = (size_gb / margin_gb).ceil().max(1.0) as usize;
    let part_duration = total_duration / num_parts as f64;

    (0..num_parts)
        .map(|i| {
            let start = i as f64 * part_duration;
            let duration = if i == num_parts - 1 {
                total_duration - start
            } else {
                part_duration
            };
            Segment {
                index: i + 1,
                start,
                duration,
            }
        })
        .collect()
}
