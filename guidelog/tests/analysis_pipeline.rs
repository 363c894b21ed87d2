use approx::assert_relative_eq;
use guidelog::{
    exclude_settling_by_server, include_all, parse_str, reset_inclusion, AnalysisError,
    ConfigStorage, ExclusionSettings, GuideSession, PeriodicErrorAnalyzer, ViewerSettings,
    MIN_ANALYSIS_FRAMES,
};
use test_helpers::{sinusoid_rows, GuideRow, SyntheticLog};

fn single_session(rows: Vec<GuideRow>) -> GuideSession {
    let text = SyntheticLog::new()
        .guiding_session("2024-03-01 21:00:00", rows)
        .build();
    let mut log = parse_str(&text);
    assert_eq!(log.sessions.len(), 1);
    log.sessions.remove(0)
}

#[test]
fn test_sinusoid_peak_from_parsed_log() {
    let session = single_session(sinusoid_rows(128, 1.0, 16.0, 1.0));
    let result = PeriodicErrorAnalyzer::new()
        .analyze_all(&session, false)
        .unwrap();

    assert_eq!(result.len(), 128);
    assert_eq!(result.periods.len(), 63);
    assert!(result.periods.windows(2).all(|w| w[0] < w[1]));
    assert_relative_eq!(result.periods[62], 128.0, epsilon = 1e-9);

    let (period, amplitude) = result.peak().unwrap();
    assert!((period - 16.0).abs() / 16.0 < 0.1, "peak at {period} s");
    assert_relative_eq!(amplitude, 1.0, max_relative = 0.15);
    assert_relative_eq!(result.amplitude_max, amplitude);

    let strongest = result.peaks(3);
    assert_eq!(strongest[0], (period, amplitude));
}

#[test]
fn test_too_few_frames_after_exclusion() {
    let mut rows = sinusoid_rows(14, 1.0, 8.0, 0.5);
    for row in rows.iter_mut().skip(10) {
        *row = GuideRow::new(row.frame, row.time).lost(2, None);
    }
    let session = single_session(rows);

    assert!(!session.can_analyze_all());
    let err = PeriodicErrorAnalyzer::new()
        .analyze_all(&session, false)
        .unwrap_err();
    assert_eq!(
        err,
        AnalysisError::InsufficientFrames {
            needed: MIN_ANALYSIS_FRAMES,
            available: 10,
        }
    );
}

#[test]
fn test_unguided_run_analysis() {
    let rows: Vec<GuideRow> = sinusoid_rows(40, 1.0, 10.0, 0.8);
    let text = SyntheticLog::new()
        .begin_guiding("2024-03-01 21:00:00")
        .pixel_scale(1.5)
        .guiding_columns()
        .rows(rows[..10].to_vec())
        .info("Guiding parameter change, Guiding enabled = false")
        .rows(rows[10..30].to_vec())
        .info("Guiding parameter change, Guiding enabled = true")
        .rows(rows[30..].to_vec())
        .end_guiding()
        .build();
    let log = parse_str(&text);
    let session = &log.sessions[0];

    assert!(!session.can_analyze_unguided(5));
    assert!(session.can_analyze_unguided(15));

    let analyzer = PeriodicErrorAnalyzer::new();
    let result = analyzer.analyze_unguided(session, 15, false).unwrap();
    assert_eq!((result.begin, result.end), (10, 30));
    assert_eq!(result.len(), 20);
    assert_relative_eq!(result.pixel_scale, 1.5);

    assert_eq!(
        analyzer.analyze_unguided(session, 5, false).unwrap_err(),
        AnalysisError::NotUnguided(5)
    );
}

#[test]
fn test_undo_ra_corrections_changes_series() {
    // corrections that exactly cancel a steady RA drift
    let rows: Vec<GuideRow> = (0..24)
        .map(|i| {
            GuideRow::new(i + 1, i as f64)
                .offset(0.5, 0.0)
                .guide(-0.5, 0.0, 100, 0)
        })
        .collect();
    let session = single_session(rows);
    let analyzer = PeriodicErrorAnalyzer::new();

    let guided = analyzer.analyze_all(&session, false).unwrap();
    let unguided = analyzer.analyze_all(&session, true).unwrap();

    assert_relative_eq!(guided.ra_drift.b, 0.0, epsilon = 1e-9);
    assert_relative_eq!(unguided.ra_drift.b, 0.5, epsilon = 1e-9);
    assert!(unguided.undo_ra_corrections);
}

#[test]
fn test_stats_follow_inclusion() {
    let rows: Vec<GuideRow> = (0..20)
        .map(|i| {
            let ra = if i % 2 == 0 { 0.3 } else { -0.3 };
            GuideRow::new(i + 1, i as f64 * 2.0).offset(ra, 0.1)
        })
        .collect();
    let mut session = single_session(rows);

    let stats = *session.calc_stats();
    assert_eq!(stats.count, 20);
    assert_relative_eq!(stats.rms_ra, 0.3, epsilon = 1e-9);
    assert_relative_eq!(stats.rms_dec, 0.0, epsilon = 1e-9);
    assert_eq!(session.stats(), Some(&stats));

    include_all(&mut session, false);
    assert!(session.stats().is_none());
    assert_eq!(session.calc_stats().count, 0);

    reset_inclusion(&mut session);
    assert_eq!(*session.calc_stats(), stats);
}

#[test]
fn test_exclusion_is_idempotent() {
    let text = SyntheticLog::new()
        .begin_guiding("2024-03-01 21:00:00")
        .guiding_columns()
        .rows((0..6).map(|i| GuideRow::new(i + 1, i as f64)))
        .info("SETTLING STATE CHANGE, Settling started")
        .rows((6..10).map(|i| GuideRow::new(i + 1, i as f64).offset(2.0, 1.0)))
        .info("SETTLING STATE CHANGE, Settling complete")
        .rows((10..16).map(|i| GuideRow::new(i + 1, i as f64)))
        .end_guiding()
        .build();
    let mut log = parse_str(&text);
    let session = &mut log.sessions[0];

    assert_eq!(exclude_settling_by_server(session), 4);
    let first: Vec<bool> = session.entries.iter().map(|e| e.included).collect();
    assert_eq!(exclude_settling_by_server(session), 0);
    let second: Vec<bool> = session.entries.iter().map(|e| e.included).collect();
    assert_eq!(first, second);

    let settings = ExclusionSettings::default();
    assert_eq!(settings.apply(session), 4);
    assert_eq!(settings.apply(session), 4);
    assert_eq!(
        session.entries.iter().filter(|e| !e.included).count(),
        4
    );
}

#[test]
fn test_stored_settings_drive_exclusion() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ConfigStorage::with_path(dir.path().to_path_buf());
    let settings = ViewerSettings {
        exclusion: ExclusionSettings {
            exclude_by_server: false,
            ..ExclusionSettings::default()
        },
        undo_ra_corrections: false,
    };
    storage.save_settings(&settings).unwrap();

    let text = SyntheticLog::new()
        .begin_guiding("2024-03-01 21:00:00")
        .guiding_columns()
        .info("SETTLING STATE CHANGE, Settling started")
        .rows((0..12).map(|i| GuideRow::new(i + 1, i as f64)))
        .end_guiding()
        .build();
    let mut log = parse_str(&text);
    let session = &mut log.sessions[0];

    let loaded = storage.settings_or_default();
    assert_eq!(loaded.exclusion.apply(session), 0);
    assert!(session.can_analyze_all());

    // the unterminated settling span covers the whole session
    assert_eq!(ExclusionSettings::default().apply(session), 12);
    assert!(!session.can_analyze_all());
}

#[test]
fn test_equal_timestamps_keep_stats_finite() {
    let rows: Vec<GuideRow> = (0..5)
        .map(|i| GuideRow::new(i + 1, 0.0).offset(0.1 * i as f64, -0.05 * i as f64))
        .collect();
    let text = SyntheticLog::new()
        .begin_guiding("2024-03-01 21:00:00")
        .declination(30.0)
        .guiding_columns()
        .rows(rows)
        .end_guiding()
        .build();
    let mut log = parse_str(&text);
    let session = &mut log.sessions[0];

    // no positive interval, so the times are left as written
    assert!(session.entries.iter().all(|e| e.time == 0.0));

    let stats = *session.calc_stats();
    assert_eq!(stats.count, 5);
    assert_eq!(stats.drift_ra, 0.0);
    assert_eq!(stats.drift_dec, 0.0);
    assert_eq!(stats.pa_error, 0.0);
    assert!(stats.rms_ra.is_finite() && stats.rms_dec.is_finite());
}
