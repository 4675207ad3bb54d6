//! Split point search: dynamic threshold plus a backward scan over the
//! trailing margin of a cycle.

use crate::buffering::segment::rms_i16;
use crate::segmenting::SegmenterConfig;

/// Silence threshold for one cycle, in raw i16 RMS units.
///
/// Scales with the cycle's own loudness so a quiet speaker and a loud one
/// both get usable pause detection, but never drops below the absolute
/// energy floor.
pub fn effective_threshold(cycle_rms: f32, config: &SegmenterConfig) -> f32 {
    let ratio = config.split_ratio.clamp(0.0, 1.0);
    config.energy_floor.max(cycle_rms * ratio)
}

/// Find a safe cut offset within `cycle`, or `None` when no window under the
/// threshold exists in the search region.
///
/// Scans backward from the cycle end in `step_samples` windows, looking at
/// most `margin_samples` back. The first window whose RMS falls below
/// `threshold` wins, so the returned offset is the one closest to the cycle
/// end. Only full windows are evaluated; a margin smaller than one window
/// yields `None`.
pub fn find_split_point(
    cycle: &[i16],
    threshold: f32,
    margin_samples: usize,
    step_samples: usize,
) -> Option<usize> {
    let step = step_samples.max(1);
    if cycle.len() < step {
        return None;
    }

    let margin = margin_samples.min(cycle.len());
    let region_start = cycle.len() - margin;
    let mut start = cycle.len() - step;

    loop {
        if start < region_start {
            return None;
        }
        if rms_i16(&cycle[start..start + step]) < threshold {
            return Some(start);
        }
        match start.checked_sub(step) {
            Some(next) => start = next,
            None => return None,
        }
    }
}
