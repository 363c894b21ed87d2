//! Command line report for guide logs.
//!
//! Lists the sections of a guide log in file order, prints tracking statistics
//! for each guiding session and optionally runs periodic error analysis.

use anyhow::{bail, Context, Result};
use clap::Parser;
use guidelog::{
    model::Section, ConfigStorage, GuideLog, GuideSession, LogParser, PeriodicErrorAnalyzer,
    SessionStats, ViewerSettings,
};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Command line arguments for the guide log report
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Summarize guiding sessions in a guide log",
    long_about = "Parses a guide log and prints, for every guiding session, RMS and peak \
        error, drift rates, scatter elongation and the estimated polar alignment error.\n\n\
        Settling exclusion uses the stored settings unless overridden on the command \
        line. With --analyze the periodic error spectrum of each session is computed \
        and its strongest peaks are listed."
)]
struct Args {
    #[arg(help = "Guide log file to read")]
    log: PathBuf,

    #[arg(
        short,
        long,
        help = "Only report this guiding session (0-based)",
        long_help = "Index of the guiding session to report, counting guiding sessions \
            only (calibrations are not counted). Reports every session if omitted."
    )]
    session: Option<usize>,

    #[arg(
        long,
        help = "Exclude dither settling using distance and time thresholds",
        long_help = "Enable parametric settling exclusion: after every dither, frames are \
            excluded until the star stays within --settle-pixels of the lock position \
            for --settle-seconds."
    )]
    exclude_settling: bool,

    #[arg(long, help = "Settling distance threshold in pixels")]
    settle_pixels: Option<f64>,

    #[arg(long, help = "Settling time threshold in seconds")]
    settle_seconds: Option<f64>,

    #[arg(short, long, help = "Run periodic error analysis over each session")]
    analyze: bool,

    #[arg(
        long,
        help = "Add RA corrections back before analysis",
        long_help = "Reconstruct the unguided RA motion by adding each frame's RA guide \
            correction back before computing the periodic error spectrum."
    )]
    undo_ra: bool,

    #[arg(
        long,
        default_value_t = 5,
        help = "Number of spectral peaks to list per session"
    )]
    peaks: usize,

    #[arg(
        long,
        help = "Write the spectrum of the reported session to this CSV file",
        long_help = "Write period and amplitude columns of the periodic error spectrum \
            to a CSV file. Requires --analyze and --session."
    )]
    spectrum_csv: Option<PathBuf>,

    #[arg(long, help = "Print session statistics as JSON instead of text")]
    json: bool,

    #[arg(long, help = "Directory holding settings.json (default ~/.guidelog)")]
    config_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct SessionReport {
    index: usize,
    date: String,
    frames: usize,
    duration: f64,
    pixel_scale: f64,
    stats: SessionStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisReport>,
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    span_s: f64,
    undo_ra_corrections: bool,
    /// Strongest spectral peaks, strongest first
    peaks: Vec<SpectrumRow>,
}

#[derive(Debug, Serialize)]
struct SpectrumRow {
    period_s: f64,
    amplitude_px: f64,
    amplitude_arcsec: f64,
}

fn effective_settings(args: &Args) -> ViewerSettings {
    let storage = match &args.config_dir {
        Some(dir) => ConfigStorage::with_path(dir.clone()),
        None => ConfigStorage::default(),
    };
    let mut settings = storage.settings_or_default();

    if args.exclude_settling {
        settings.exclusion.exclude_parametric = true;
    }
    if let Some(pixels) = args.settle_pixels {
        settings.exclusion.settle_pixels = pixels;
    }
    if let Some(seconds) = args.settle_seconds {
        settings.exclusion.settle_seconds = seconds;
    }
    if args.undo_ra {
        settings.undo_ra_corrections = true;
    }
    settings
}

fn print_sections(log: &GuideLog) {
    if !log.version.is_empty() {
        println!("Log written by version {}", log.version);
    }
    for section in &log.sections {
        match *section {
            Section::Guiding(i) => {
                let s = &log.sessions[i];
                println!(
                    "  Guiding #{i:<3} {}  {:>6} frames  {:>8.1} s",
                    s.date,
                    s.entries.len(),
                    s.duration
                );
            }
            Section::Calibration(i) => {
                let c = &log.calibrations[i];
                println!(
                    "  Calibration  {}  {} steps  ({})",
                    c.date,
                    c.steps.len(),
                    c.device
                );
            }
        }
    }
}

fn print_stats(index: usize, session: &GuideSession, stats: &SessionStats) {
    let arcsec = |px: f64| session.to_arcsec(px);
    println!("\nSession {index} ({})", session.date);
    println!(
        "  frames used      {} of {}",
        stats.count,
        session.entries.len()
    );
    println!(
        "  RMS   RA {:.3} px ({:.2}\")  Dec {:.3} px ({:.2}\")",
        stats.rms_ra,
        arcsec(stats.rms_ra),
        stats.rms_dec,
        arcsec(stats.rms_dec)
    );
    println!(
        "  Peak  RA {:.3} px  Dec {:.3} px",
        stats.peak_ra, stats.peak_dec
    );
    println!(
        "  Drift RA {:.3} px/min  Dec {:.3} px/min",
        stats.drift_ra, stats.drift_dec
    );
    println!(
        "  Elongation {:.1}%  axis {:.1} deg",
        stats.elongation * 100.0,
        stats.theta.to_degrees()
    );
    println!("  Polar alignment error {:.1} arc-min", stats.pa_error);
}

fn write_spectrum(path: &Path, periods: &[f64], amplitudes: &[f64], scale: f64) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for (&period_s, &amplitude_px) in periods.iter().zip(amplitudes) {
        writer.serialize(SpectrumRow {
            period_s,
            amplitude_px,
            amplitude_arcsec: amplitude_px * scale,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Periodic error analysis of a whole session, writing the spectrum to
/// `spectrum_csv` when given. Returns `None` if the session has too few
/// usable frames, or an error if a spectrum file was requested for it.
fn analyze_session(
    analyzer: &PeriodicErrorAnalyzer,
    session: &GuideSession,
    undo_ra_corrections: bool,
    peaks: usize,
    spectrum_csv: Option<&Path>,
) -> Result<Option<AnalysisReport>> {
    if !session.can_analyze_all() {
        if let Some(path) = spectrum_csv {
            bail!(
                "too few usable frames to write a spectrum to {}",
                path.display()
            );
        }
        return Ok(None);
    }

    let result = analyzer.analyze_all(session, undo_ra_corrections)?;
    if let Some(path) = spectrum_csv {
        write_spectrum(
            path,
            &result.periods,
            &result.amplitudes,
            result.pixel_scale,
        )?;
        info!("spectrum written to {}", path.display());
    }

    let span_s = match (result.t.first(), result.t.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };
    Ok(Some(AnalysisReport {
        span_s,
        undo_ra_corrections: result.undo_ra_corrections,
        peaks: result
            .peaks(peaks)
            .into_iter()
            .map(|(period_s, amplitude_px)| SpectrumRow {
                period_s,
                amplitude_px,
                amplitude_arcsec: amplitude_px * result.pixel_scale,
            })
            .collect(),
    }))
}

fn print_analysis(analysis: Option<&AnalysisReport>) {
    let Some(analysis) = analysis else {
        println!("  Too few usable frames for periodic error analysis");
        return;
    };
    println!(
        "  Periodic error over {:.0} s{}:",
        analysis.span_s,
        if analysis.undo_ra_corrections {
            ", RA corrections undone"
        } else {
            ""
        }
    );
    for peak in &analysis.peaks {
        println!(
            "    {:>8.1} s  {:.3} px  ({:.2}\")",
            peak.period_s, peak.amplitude_px, peak.amplitude_arcsec
        );
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.spectrum_csv.is_some() && (!args.analyze || args.session.is_none()) {
        bail!("--spectrum-csv requires --analyze and --session");
    }

    let settings = effective_settings(&args);

    let file = std::fs::File::open(&args.log)
        .with_context(|| format!("failed to open {}", args.log.display()))?;
    let mut guide_log = LogParser::new()
        .with_progress(|lines| log::debug!("read {lines} lines"))
        .parse(std::io::BufReader::new(file))
        .with_context(|| format!("failed to parse {}", args.log.display()))?;

    if !args.json {
        print_sections(&guide_log);
    }

    let selected: Vec<usize> = match args.session {
        Some(i) if i < guide_log.sessions.len() => vec![i],
        Some(i) => bail!(
            "session {i} does not exist, the log has {} guiding sessions",
            guide_log.sessions.len()
        ),
        None => (0..guide_log.sessions.len()).collect(),
    };

    let analyzer = PeriodicErrorAnalyzer::new();
    let mut reports = Vec::new();

    for &index in &selected {
        let session = &mut guide_log.sessions[index];
        let excluded = settings.exclusion.apply(session);
        info!("session {index}: {excluded} frames excluded as settling");
        let stats = *session.calc_stats();
        let session = &guide_log.sessions[index];

        let analysis = if args.analyze {
            analyze_session(
                &analyzer,
                session,
                settings.undo_ra_corrections,
                args.peaks,
                args.spectrum_csv.as_deref(),
            )?
        } else {
            None
        };

        if args.json {
            reports.push(SessionReport {
                index,
                date: session.date.clone(),
                frames: session.entries.len(),
                duration: session.duration,
                pixel_scale: session.pixel_scale,
                stats,
                analysis,
            });
            continue;
        }

        print_stats(index, session, &stats);
        if args.analyze {
            print_analysis(analysis.as_ref());
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    Ok(())
}
