//! Statistics eligibility of frames.
//!
//! Every operation here only touches `FrameRecord::included` and drops any
//! previously computed statistics.

use log::debug;

use crate::model::GuideSession;

const SETTLING_STARTED: &str = "Settling started";
const SETTLING_COMPLETE: &str = "Settling complete";
const SETTLING_FAILED: &str = "Settling failed";
const DITHER: &str = "DITHER";

/// Set every frame's `included` flag to `include`.
pub fn include_all(session: &mut GuideSession, include: bool) {
    for entry in &mut session.entries {
        entry.included = include;
    }
    session.invalidate_stats();
}

/// Re-include every frame whose star was found and exclude the rest, the
/// state the parser leaves a session in.
pub fn reset_inclusion(session: &mut GuideSession) {
    for entry in &mut session.entries {
        entry.included = entry.star_was_found();
    }
    session.invalidate_stats();
}

/// Exclude frames between settling start and settling end annotations.
///
/// A span that is never closed runs to the end of the session. Returns the
/// number of frames newly excluded.
pub fn exclude_settling_by_server(session: &mut GuideSession) -> usize {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;

    for info in &session.infos {
        if info.info.starts_with(SETTLING_STARTED) {
            if open.is_none() {
                open = Some(info.idx);
            }
        } else if info.info.starts_with(SETTLING_COMPLETE) || info.info.starts_with(SETTLING_FAILED)
        {
            if let Some(start) = open.take() {
                spans.push((start, info.idx));
            }
        }
    }
    if let Some(start) = open {
        spans.push((start, session.entries.len()));
    }

    let excluded = exclude_spans(session, &spans);
    debug!(
        "server settling: {} spans, {} frames excluded",
        spans.len(),
        excluded
    );
    excluded
}

/// Exclude the settling period after every dither.
///
/// Starting at each dither annotation, frames are scanned for a streak whose
/// camera-frame distance stays below `settle_pixels`. Once the streak has
/// lasted `settle_seconds`, everything from the dither up to and including
/// the settling frame is excluded. Dithers that never settle are left alone.
/// Returns the number of frames newly excluded.
pub fn exclude_settling_parametric(
    session: &mut GuideSession,
    settle_pixels: f64,
    settle_seconds: f64,
) -> usize {
    let dithers: Vec<usize> = session
        .infos
        .iter()
        .filter(|info| info.info.starts_with(DITHER))
        .map(|info| info.idx)
        .collect();

    let spans: Vec<(usize, usize)> = dithers
        .iter()
        .filter_map(|&start| {
            settled_at(session, start, settle_pixels, settle_seconds).map(|end| (start, end + 1))
        })
        .collect();

    let excluded = exclude_spans(session, &spans);
    debug!(
        "parametric settling: {} of {} dithers settled, {} frames excluded",
        spans.len(),
        dithers.len(),
        excluded
    );
    excluded
}

/// Index of the frame at which the session settled after `start`.
fn settled_at(
    session: &GuideSession,
    start: usize,
    settle_pixels: f64,
    settle_seconds: f64,
) -> Option<usize> {
    let mut streak_start: Option<f64> = None;

    for (i, entry) in session.entries.iter().enumerate().skip(start) {
        if !entry.star_was_found() {
            continue;
        }
        if entry.distance() < settle_pixels {
            let t0 = *streak_start.get_or_insert(entry.time);
            if entry.time - t0 >= settle_seconds {
                return Some(i);
            }
        } else {
            streak_start = None;
        }
    }
    None
}

/// Exclude every `[begin, end)` span, returning how many flags changed.
fn exclude_spans(session: &mut GuideSession, spans: &[(usize, usize)]) -> usize {
    let len = session.entries.len();
    let mut changed = 0;
    for &(begin, end) in spans {
        for entry in &mut session.entries[begin.min(len)..end.min(len)] {
            if entry.included {
                entry.included = false;
                changed += 1;
            }
        }
    }
    session.invalidate_stats();
    changed
}
