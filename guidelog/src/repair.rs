//! Timestamp repair for sessions whose clock stepped backwards.

use log::warn;

use crate::model::{GuideSession, InfoEntry};

/// Annotation recorded at every repaired frame.
pub const TIMESTAMP_JUMPED: &str = "Timestamp jumped backwards";

/// Median of the strictly positive values in `deltas`.
fn positive_median(deltas: &[f64]) -> Option<f64> {
    let mut positive: Vec<f64> = deltas.iter().copied().filter(|&d| d > 0.0).collect();
    if positive.is_empty() {
        return None;
    }
    positive.sort_by(f64::total_cmp);

    let mid = positive.len() / 2;
    if positive.len() % 2 == 0 {
        Some((positive[mid - 1] + positive[mid]) / 2.0)
    } else {
        Some(positive[mid])
    }
}

/// Make frame times strictly increasing.
///
/// Every non-positive interval is replaced by the median positive interval and
/// the accumulated correction is carried into all later frames. Each repair
/// inserts a [`TIMESTAMP_JUMPED`] annotation at the repaired frame. Returns
/// the number of repairs.
pub fn repair_timestamps(session: &mut GuideSession) -> usize {
    let deltas: Vec<f64> = session
        .entries
        .windows(2)
        .map(|w| w[1].time - w[0].time)
        .collect();

    if deltas.iter().all(|&d| d > 0.0) {
        return 0;
    }

    let Some(median) = positive_median(&deltas) else {
        warn!(
            "session {}: no positive frame interval, timestamps left as-is",
            session.date
        );
        return 0;
    };

    let mut correction = 0.0;
    let mut repaired = Vec::new();
    for i in 1..session.entries.len() {
        let prev = session.entries[i - 1].time;
        let delta = session.entries[i].time + correction - prev;
        if delta <= 0.0 {
            correction += median - delta;
            repaired.push(i);
        }
        session.entries[i].time += correction;
    }

    for &idx in &repaired {
        let pos = session.infos.partition_point(|e| e.idx <= idx);
        session.infos.insert(
            pos,
            InfoEntry {
                idx,
                repeats: 1,
                info: TIMESTAMP_JUMPED.to_string(),
            },
        );
    }

    session.invalidate_stats();
    repaired.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FrameRecord;
    use approx::assert_relative_eq;

    fn session_with_times(times: &[f64]) -> GuideSession {
        let mut session = GuideSession::new("2024-03-01 21:00:00");
        session.entries = times
            .iter()
            .enumerate()
            .map(|(i, &time)| FrameRecord {
                frame: i as u32 + 1,
                time,
                included: true,
                ..Default::default()
            })
            .collect();
        session
    }

    fn times(session: &GuideSession) -> Vec<f64> {
        session.entries.iter().map(|e| e.time).collect()
    }

    #[test]
    fn test_monotonic_session_is_untouched() {
        let mut session = session_with_times(&[1.0, 2.0, 3.5, 4.0]);
        assert_eq!(repair_timestamps(&mut session), 0);
        assert_eq!(times(&session), vec![1.0, 2.0, 3.5, 4.0]);
        assert!(session.infos.is_empty());
    }

    #[test]
    fn test_single_backwards_jump() {
        // deltas 2, 2, -5, 2: median of positives is 2
        let mut session = session_with_times(&[0.0, 2.0, 4.0, -1.0, 1.0]);
        assert_eq!(repair_timestamps(&mut session), 1);

        let t = times(&session);
        assert_relative_eq!(t[3], 6.0);
        assert_relative_eq!(t[4], 8.0);
        assert!(t.windows(2).all(|w| w[1] > w[0]));

        assert_eq!(session.infos.len(), 1);
        assert_eq!(session.infos[0].idx, 3);
        assert_eq!(session.infos[0].info, TIMESTAMP_JUMPED);
    }

    #[test]
    fn test_zero_interval_is_repaired() {
        let mut session = session_with_times(&[0.0, 1.0, 1.0, 2.0, 3.0]);
        assert_eq!(repair_timestamps(&mut session), 1);
        assert_eq!(times(&session), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_even_count_median() {
        // positives 1, 3 -> median 2
        let mut session = session_with_times(&[0.0, 1.0, 4.0, 4.0]);
        assert_eq!(repair_timestamps(&mut session), 1);
        assert_relative_eq!(session.entries[3].time, 6.0);
    }

    #[test]
    fn test_annotation_keeps_order() {
        let mut session = session_with_times(&[0.0, 1.0, 2.0, 0.5, 1.5, 2.5]);
        session.infos = vec![
            InfoEntry {
                idx: 1,
                repeats: 1,
                info: "DITHER".to_string(),
            },
            InfoEntry {
                idx: 3,
                repeats: 1,
                info: "Settling started".to_string(),
            },
            InfoEntry {
                idx: 5,
                repeats: 1,
                info: "Settling complete".to_string(),
            },
        ];

        repair_timestamps(&mut session);

        let idx: Vec<usize> = session.infos.iter().map(|e| e.idx).collect();
        assert_eq!(idx, vec![1, 3, 3, 5]);
        assert_eq!(session.infos[2].info, TIMESTAMP_JUMPED);
    }

    #[test]
    fn test_no_positive_interval_skips_repair() {
        let mut session = session_with_times(&[5.0, 4.0, 3.0]);
        assert_eq!(repair_timestamps(&mut session), 0);
        assert_eq!(times(&session), vec![5.0, 4.0, 3.0]);
    }

    #[test]
    fn test_short_sessions() {
        let mut empty = session_with_times(&[]);
        assert_eq!(repair_timestamps(&mut empty), 0);

        let mut single = session_with_times(&[3.0]);
        assert_eq!(repair_timestamps(&mut single), 0);
    }
}
