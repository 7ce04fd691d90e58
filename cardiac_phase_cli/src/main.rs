use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use cardiac_phase::{
    estimate_period, parse_frame_rate_database, BeatBounds, FrameRateDatabase, LandmarkLabel,
    Params, Reconstruction, TrackFile,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cardiac phase reconstruction for heart track files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild automatic landmarks and cardiac phase for one or more track files
    Recompute(RecomputeArgs),
    /// Report landmark counts and reconstruction readiness without writing tracks
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
struct FrameRateArgs {
    /// Frame rate (frames per second) applied to every track
    #[arg(long, conflicts_with = "frame_rate_db")]
    frame_rate: Option<f64>,

    /// Whitespace-separated `video rate` table; tracks are matched by file name or stem
    #[arg(long, value_hint = ValueHint::FilePath)]
    frame_rate_db: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ParamArgs {
    /// JSON file holding reconstruction parameters
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Lowest plausible heart rate (BPM); overrides --config
    #[arg(long)]
    min_hr: Option<f64>,

    /// Highest plausible heart rate (BPM); overrides --config
    #[arg(long)]
    max_hr: Option<f64>,
}

impl ParamArgs {
    fn load(&self) -> Result<Params> {
        load_params(self.config.as_deref(), self.min_hr, self.max_hr)
    }
}

#[derive(Parser, Debug)]
struct RecomputeArgs {
    /// Track (.tk) files to recompute
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    tracks: Vec<PathBuf>,

    #[command(flatten)]
    frame_rate: FrameRateArgs,

    #[command(flatten)]
    params: ParamArgs,

    /// Write updated tracks here instead of rewriting them in place
    #[arg(long, value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// Write a per-track `frame,phase_point,cardiac_phase` CSV into this directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    csv_dir: Option<PathBuf>,

    /// Write every successful reconstruction summary to this JSON file
    #[arg(long, value_hint = ValueHint::FilePath)]
    summary: Option<PathBuf>,

    /// Recompute and report without writing any files
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Track (.tk) files to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    tracks: Vec<PathBuf>,

    #[command(flatten)]
    frame_rate: FrameRateArgs,

    #[command(flatten)]
    params: ParamArgs,

    /// Output report path, or `-` for stdout
    #[arg(short, long, default_value = "phase_report.txt", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Recompute(args) => args.verbose,
        Command::Inspect(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Recompute(args) => handle_recompute(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

/// Where each track's frame rate comes from.
enum FrameRateSource {
    Fixed(f64),
    Database(FrameRateDatabase),
}

impl FrameRateSource {
    fn from_args(args: &FrameRateArgs) -> Result<Option<Self>> {
        if let Some(rate) = args.frame_rate {
            return Ok(Some(FrameRateSource::Fixed(rate)));
        }
        let Some(path) = args.frame_rate_db.as_ref() else {
            return Ok(None);
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read frame-rate database {}", path.display()))?;
        let db = parse_frame_rate_database(&text)
            .with_context(|| format!("failed to parse frame-rate database {}", path.display()))?;
        if db.is_empty() {
            warn!("frame-rate database {} has no entries", path.display());
        }
        debug!("loaded {} frame rates from {}", db.len(), path.display());
        Ok(Some(FrameRateSource::Database(db)))
    }

    fn rate_for(&self, track: &Path) -> Option<f64> {
        match self {
            FrameRateSource::Fixed(rate) => Some(*rate),
            FrameRateSource::Database(db) => db.lookup(&track.to_string_lossy()),
        }
    }
}

fn handle_recompute(args: RecomputeArgs) -> Result<()> {
    let source = FrameRateSource::from_args(&args.frame_rate)?
        .ok_or_else(|| anyhow!("either --frame-rate or --frame-rate-db is required"))?;
    let params = args.params.load()?;
    info!(
        "Heart rate bounds {}-{} BPM (params {})",
        params.min_heart_rate_bpm,
        params.max_heart_rate_bpm,
        params.params_hash_sha256()?
    );

    if !args.dry_run {
        if args.output_dir.is_some() {
            check_output_names(&args.tracks, Path::file_name)?;
        }
        if args.csv_dir.is_some() {
            check_output_names(&args.tracks, Path::file_stem)?;
        }
        for dir in [args.output_dir.as_ref(), args.csv_dir.as_ref()]
            .into_iter()
            .flatten()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
    }

    let t_start = Instant::now();
    let outcomes: Vec<(&PathBuf, Result<Reconstruction>)> = args
        .tracks
        .par_iter()
        .map(|path| (path, recompute_track(path, &source, &params, &args)))
        .collect();

    let mut summaries = BTreeMap::new();
    let mut failed = 0usize;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(summary) => {
                info!(
                    "{}: period {:.2} frames, {} systole / {} diastole landmarks ({} automatic)",
                    path.display(),
                    summary.cardiac_period,
                    summary.systole_frames.len(),
                    summary.diastole_frames.len(),
                    summary.auto_systole + summary.auto_diastole
                );
                summaries.insert(path.display().to_string(), summary);
            }
            Err(err) => {
                warn!("{}: {:#}", path.display(), err);
                failed += 1;
            }
        }
    }
    debug!(
        "Recompute stage: {:.1} ms",
        t_start.elapsed().as_secs_f64() * 1000.0
    );

    if let Some(path) = args.summary.as_ref() {
        if args.dry_run {
            info!("Dry run: summary not written to {}", path.display());
        } else {
            write_summary(&summaries, path)?;
            info!("Summary written: {}", path.display());
        }
    }

    if failed > 0 {
        return Err(anyhow!(
            "{} of {} tracks could not be recomputed",
            failed,
            args.tracks.len()
        ));
    }
    Ok(())
}

fn recompute_track(
    path: &Path,
    source: &FrameRateSource,
    params: &Params,
    args: &RecomputeArgs,
) -> Result<Reconstruction> {
    let frame_rate = source
        .rate_for(path)
        .ok_or_else(|| anyhow!("no frame rate known for {}", path.display()))?;
    let mut track = load_track(path)?;
    let summary = track
        .recompute(frame_rate, params)
        .with_context(|| format!("failed to recompute {}", path.display()))?;

    if args.dry_run {
        return Ok(summary);
    }
    let target = match args.output_dir.as_ref() {
        Some(dir) => dir.join(file_name(path)?),
        None => path.to_path_buf(),
    };
    write_track(&track, &target)?;
    if let Some(dir) = args.csv_dir.as_ref() {
        let csv_path = dir.join(file_name(path)?).with_extension("csv");
        write_phase_csv(&track, &csv_path)?;
    }
    Ok(summary)
}

/// Outputs are named after their input, so inputs sharing that name would overwrite
/// each other.
fn check_output_names(tracks: &[PathBuf], name_of: fn(&Path) -> Option<&OsStr>) -> Result<()> {
    let mut seen: HashMap<&OsStr, &PathBuf> = HashMap::new();
    for path in tracks {
        let name = name_of(path).ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
        if let Some(previous) = seen.insert(name, path) {
            return Err(anyhow!(
                "{} and {} would be written to the same output file",
                previous.display(),
                path.display()
            ));
        }
    }
    Ok(())
}

fn load_params(config: Option<&Path>, min_hr: Option<f64>, max_hr: Option<f64>) -> Result<Params> {
    let mut params = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not a valid parameter file", path.display()))?
        }
        None => Params::default(),
    };
    if let Some(bpm) = min_hr {
        params.min_heart_rate_bpm = bpm;
    }
    if let Some(bpm) = max_hr {
        params.max_heart_rate_bpm = bpm;
    }
    params.validate()?;
    Ok(params)
}

fn load_track(path: &Path) -> Result<TrackFile> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    TrackFile::parse(&text, None).with_context(|| format!("failed to parse {}", path.display()))
}

fn file_name(path: &Path) -> Result<&OsStr> {
    path.file_name()
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))
}

fn write_track(track: &TrackFile, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    track
        .write_to(&mut writer)
        .and_then(|_| writer.flush())
        .with_context(|| format!("failed to write {}", path.display()))
}

fn write_phase_csv(track: &TrackFile, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_phase_rows(track, &mut writer)
}

fn write_phase_rows<W: Write>(track: &TrackFile, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["frame", "phase_point", "cardiac_phase"])?;
    for (f, frame) in track.frames.iter().enumerate() {
        writer.write_record([
            f.to_string(),
            frame.phase_point.code().to_string(),
            format!("{:.6}", frame.cardiac_phase),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary(summaries: &BTreeMap<String, Reconstruction>, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summaries)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

#[derive(Default)]
struct LabelCounts {
    manual_systole: usize,
    manual_diastole: usize,
    auto_systole: usize,
    auto_diastole: usize,
}

fn count_labels(labels: &[LandmarkLabel]) -> LabelCounts {
    let mut counts = LabelCounts::default();
    for label in labels {
        match label {
            LandmarkLabel::ManualSystole => counts.manual_systole += 1,
            LandmarkLabel::ManualDiastole => counts.manual_diastole += 1,
            LandmarkLabel::AutoSystole => counts.auto_systole += 1,
            LandmarkLabel::AutoDiastole => counts.auto_diastole += 1,
            LandmarkLabel::Unlabelled => {}
        }
    }
    counts
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let source = FrameRateSource::from_args(&args.frame_rate)?;
    let params = args.params.load()?;
    let mut report = String::new();

    for path in &args.tracks {
        report.push_str(&format!("TRACK: {}\n", path.display()));
        let track = match load_track(path) {
            Ok(track) => track,
            Err(err) => {
                warn!("{}: {:#}", path.display(), err);
                report.push_str(&format!("  parse failed ({:#})\n\n", err));
                continue;
            }
        };
        let labels = track.labels();
        let counts = count_labels(&labels);

        report.push_str(&format!("  frames: {}\n", track.len()));
        report.push_str(&format!(
            "  manual landmarks: systole={} diastole={}\n",
            counts.manual_systole, counts.manual_diastole
        ));
        report.push_str(&format!(
            "  auto landmarks: systole={} diastole={}\n",
            counts.auto_systole, counts.auto_diastole
        ));
        report.push_str(&format!("  stored phase valid: {}\n", track.phase_valid));

        let Some(frame_rate) = source.as_ref().and_then(|s| s.rate_for(path)) else {
            report.push_str("  frame rate: n/a\n\n");
            continue;
        };
        report.push_str(&format!("  frame rate: {:.3} fps\n", frame_rate));

        match BeatBounds::from_frame_rate(frame_rate, &params) {
            Ok(bounds) => {
                report.push_str(&format!(
                    "  beat bounds: {:.2}-{:.2} frames\n",
                    bounds.min_frames_per_beat, bounds.max_frames_per_beat
                ));
                let mut scratch = labels.clone();
                match estimate_period(&mut scratch, &bounds) {
                    Ok(estimate) => report.push_str(&format!(
                        "  period: {:.2} frames from {} pairs\n",
                        estimate.period, estimate.pairs_used
                    )),
                    Err(err) => report.push_str(&format!("  period: n/a ({})\n", err)),
                }
            }
            Err(err) => report.push_str(&format!("  beat bounds: n/a ({})\n", err)),
        }

        let mut trial = track.clone();
        match trial.recompute(frame_rate, &params) {
            Ok(summary) => report.push_str(&format!(
                "  recompute: ok ({} automatic landmarks)\n",
                summary.auto_systole + summary.auto_diastole
            )),
            Err(err) => report.push_str(&format!("  recompute: failed ({})\n", err)),
        }
        report.push('\n');
    }

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(report.as_bytes())?;
        return Ok(());
    }
    fs::write(&args.output, report)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Inspection report written: {}", args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardiac_phase::LandmarkKind;
    use tempfile::tempdir;

    fn write_sample_track(dir: &Path, name: &str, systole: &[usize]) -> PathBuf {
        let mut track = TrackFile::new(200, 64, 64);
        for &f in &[0, 50, 100] {
            track.toggle_landmark(f, LandmarkKind::Diastole).unwrap();
        }
        for &f in systole {
            track.toggle_landmark(f, LandmarkKind::Systole).unwrap();
        }
        let path = dir.join(name);
        fs::write(&path, track.to_text()).unwrap();
        path
    }

    fn recompute_args(argv: &[&str]) -> RecomputeArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Recompute(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_file_is_overridden_by_flags() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("params.json");
        fs::write(&config, r#"{"min_heart_rate_bpm": 100.0, "max_heart_rate_bpm": 150.0}"#)
            .unwrap();

        let params = load_params(Some(&config), None, Some(170.0)).unwrap();
        assert_eq!(params.min_heart_rate_bpm, 100.0);
        assert_eq!(params.max_heart_rate_bpm, 170.0);

        assert!(load_params(None, Some(180.0), None).is_err());
        fs::write(&config, "not json").unwrap();
        assert!(load_params(Some(&config), None, None).is_err());
    }

    #[test]
    fn frame_rate_options_conflict() {
        let parsed = Cli::try_parse_from([
            "cardiac-phase",
            "recompute",
            "a.tk",
            "--frame-rate",
            "25",
            "--frame-rate-db",
            "frameratedatabase",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn recompute_writes_tracks_csv_and_summary() {
        let dir = tempdir().unwrap();
        let track_path = write_sample_track(dir.path(), "clip01.tk", &[25, 75]);
        let db = dir.path().join("frameratedatabase");
        fs::write(&db, "clip01.avi 100\n").unwrap();
        let out_dir = dir.path().join("out");
        let csv_dir = dir.path().join("csv");
        let summary = dir.path().join("summary.json");

        let args = recompute_args(&[
            "cardiac-phase",
            "recompute",
            track_path.to_str().unwrap(),
            "--frame-rate-db",
            db.to_str().unwrap(),
            "--output-dir",
            out_dir.to_str().unwrap(),
            "--csv-dir",
            csv_dir.to_str().unwrap(),
            "--summary",
            summary.to_str().unwrap(),
        ]);
        handle_recompute(args).unwrap();

        let updated = load_track(&out_dir.join("clip01.tk")).unwrap();
        assert!(updated.phase_valid);
        assert_eq!(updated.frames[125].phase_point, LandmarkLabel::AutoSystole);
        // The input is left alone when an output directory is given.
        assert!(!load_track(&track_path).unwrap().phase_valid);

        let csv_text = fs::read_to_string(csv_dir.join("clip01.csv")).unwrap();
        let mut lines = csv_text.lines();
        assert_eq!(lines.next(), Some("frame,phase_point,cardiac_phase"));
        assert_eq!(lines.next(), Some("0,4,0.000000"));
        assert_eq!(csv_text.lines().count(), 201);

        let json: BTreeMap<String, Reconstruction> =
            serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
        let entry = json.get(&track_path.display().to_string()).unwrap();
        assert_eq!(entry.cardiac_period, 50.0);
    }

    #[test]
    fn inputs_sharing_an_output_name_are_rejected() {
        let dir = tempdir().unwrap();
        let first_dir = dir.path().join("a");
        let second_dir = dir.path().join("b");
        fs::create_dir_all(&first_dir).unwrap();
        fs::create_dir_all(&second_dir).unwrap();
        let first = write_sample_track(&first_dir, "clip.tk", &[25, 75]);
        let second = write_sample_track(&second_dir, "clip.tk", &[25, 75]);
        let out_dir = dir.path().join("out");

        let args = recompute_args(&[
            "cardiac-phase",
            "recompute",
            first.to_str().unwrap(),
            second.to_str().unwrap(),
            "--frame-rate",
            "100",
            "--output-dir",
            out_dir.to_str().unwrap(),
        ]);
        let err = handle_recompute(args).unwrap_err();
        assert!(err.to_string().contains("same output file"));
        assert!(!out_dir.exists());
        assert!(!load_track(&first).unwrap().phase_valid);

        // CSV names drop the extension, so `clip.tk` and `clip.trk` clash there too.
        let args = recompute_args(&[
            "cardiac-phase",
            "recompute",
            "x/clip.tk",
            "y/clip.trk",
            "--frame-rate",
            "100",
            "--csv-dir",
            dir.path().join("csv").to_str().unwrap(),
        ]);
        assert!(handle_recompute(args).is_err());

        // Dry runs write nothing, so shared names are fine.
        let args = recompute_args(&[
            "cardiac-phase",
            "recompute",
            first.to_str().unwrap(),
            second.to_str().unwrap(),
            "--frame-rate",
            "100",
            "--output-dir",
            out_dir.to_str().unwrap(),
            "--dry-run",
        ]);
        handle_recompute(args).unwrap();
    }

    #[test]
    fn failed_track_is_reported_and_left_unwritten() {
        let dir = tempdir().unwrap();
        let good = write_sample_track(dir.path(), "good.tk", &[25, 75]);
        // A second systole between 25 and 50 breaks alternation.
        let bad = write_sample_track(dir.path(), "bad.tk", &[25, 40, 75]);
        let bad_before = fs::read_to_string(&bad).unwrap();

        let args = recompute_args(&[
            "cardiac-phase",
            "recompute",
            good.to_str().unwrap(),
            bad.to_str().unwrap(),
            "--frame-rate",
            "100",
        ]);
        let err = handle_recompute(args).unwrap_err();
        assert!(err.to_string().contains("1 of 2"));

        assert!(load_track(&good).unwrap().phase_valid);
        assert_eq!(fs::read_to_string(&bad).unwrap(), bad_before);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let track_path = write_sample_track(dir.path(), "clip.tk", &[25, 75]);
        let before = fs::read_to_string(&track_path).unwrap();
        let summary = dir.path().join("summary.json");

        let args = recompute_args(&[
            "cardiac-phase",
            "recompute",
            track_path.to_str().unwrap(),
            "--frame-rate",
            "100",
            "--summary",
            summary.to_str().unwrap(),
            "--dry-run",
        ]);
        handle_recompute(args).unwrap();
        assert_eq!(fs::read_to_string(&track_path).unwrap(), before);
        assert!(!summary.exists());
    }

    #[test]
    fn recompute_requires_a_frame_rate() {
        let args = recompute_args(&["cardiac-phase", "recompute", "missing.tk"]);
        assert!(handle_recompute(args).is_err());
    }

    fn inspect_report(dir: &Path, extra: &[&str]) -> String {
        let report_path = dir.join("report.txt");
        let mut argv = vec!["cardiac-phase", "inspect"];
        argv.extend_from_slice(extra);
        argv.extend(["--output", report_path.to_str().unwrap()]);
        let cli = Cli::try_parse_from(argv).unwrap();
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        handle_inspect(args).unwrap();
        fs::read_to_string(&report_path).unwrap()
    }

    #[test]
    fn inspect_reports_readiness() {
        let dir = tempdir().unwrap();
        let good = write_sample_track(dir.path(), "good.tk", &[25, 75]);
        let bad = write_sample_track(dir.path(), "bad.tk", &[25, 40, 75]);

        let report = inspect_report(
            dir.path(),
            &[
                good.to_str().unwrap(),
                bad.to_str().unwrap(),
                "--frame-rate",
                "100",
            ],
        );
        assert!(report.contains("manual landmarks: systole=2 diastole=3"));
        assert!(report.contains("beat bounds: 37.50-54.55 frames"));
        assert!(report.contains("recompute: ok (3 automatic landmarks)"));
        assert!(report.contains("recompute: failed (end-systole and end-diastole"));
        // Inspection never touches the tracks.
        assert!(!load_track(&good).unwrap().phase_valid);
    }

    #[test]
    fn inspect_continues_past_unparsable_tracks() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.tk");
        fs::write(&broken, "# header only\n").unwrap();
        let good = write_sample_track(dir.path(), "good.tk", &[25, 75]);

        let report = inspect_report(
            dir.path(),
            &[
                broken.to_str().unwrap(),
                good.to_str().unwrap(),
                "--frame-rate",
                "100",
            ],
        );
        assert!(report.contains(&format!("TRACK: {}\n  parse failed (", broken.display())));
        assert!(report.contains(&format!("TRACK: {}", good.display())));
        assert!(report.contains("recompute: ok (3 automatic landmarks)"));
    }

    #[test]
    fn inspect_applies_heart_rate_overrides() {
        let dir = tempdir().unwrap();
        let good = write_sample_track(dir.path(), "good.tk", &[25, 75]);

        // 50-frame beats at 100 fps are 120 BPM, below a 130 BPM floor.
        let report = inspect_report(
            dir.path(),
            &[good.to_str().unwrap(), "--frame-rate", "100", "--min-hr", "130"],
        );
        assert!(report.contains("beat bounds: 37.50-46.15 frames"));
        assert!(report.contains("recompute: failed (insufficient landmarks"));
    }

    #[test]
    fn phase_rows_follow_frame_order() {
        let mut track = TrackFile::new(3, 8, 8);
        track.frames[1].phase_point = LandmarkLabel::ManualSystole;
        track.frames[1].cardiac_phase = std::f64::consts::PI;
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_phase_rows(&track, &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "frame,phase_point,cardiac_phase\n0,0,-1.000000\n1,2,3.141593\n2,0,-1.000000\n"
        );
    }
}
