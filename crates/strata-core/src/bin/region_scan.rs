//! region-scan - Offline peak and silence analysis for audio files
//!
//! Loads a WAV file, wraps it in a region, and prints the peak amplitude,
//! the gain a normalize pass would apply, and the silent stretches a
//! strip-silence edit would remove.
//!
//! ## Usage
//!
//! ```text
//! region-scan <file.wav> [--threshold <linear>] [--min-ms <ms>]
//! ```
//!
//! `--threshold` is a linear amplitude (default 0.0001, i.e. -80 dBFS);
//! `--min-ms` is the shortest silence worth reporting (default 1000 ms).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use strata_core::analysis::TaskProgress;
use strata_core::config::{load_config, EngineConfig};
use strata_core::region::AudioRegion;
use strata_core::source::{MemorySource, Source};
use strata_core::{linear_to_db, Sample};

const USAGE: &str = "usage: region-scan <file.wav> [--threshold <linear>] [--min-ms <ms>]";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut path: Option<PathBuf> = None;
    let mut threshold: Sample = 0.0001;
    let mut min_ms: f32 = 1000.0;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--threshold" => {
                i += 1;
                threshold = args
                    .get(i)
                    .with_context(|| format!("--threshold needs a value\n{USAGE}"))?
                    .parse()
                    .context("--threshold must be a linear amplitude")?;
            }
            "--min-ms" => {
                i += 1;
                min_ms = args
                    .get(i)
                    .with_context(|| format!("--min-ms needs a value\n{USAGE}"))?
                    .parse()
                    .context("--min-ms must be a duration in milliseconds")?;
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(());
            }
            other if path.is_none() && !other.starts_with('-') => {
                path = Some(PathBuf::from(other));
            }
            other => bail!("unexpected argument: {other}\n{USAGE}"),
        }
        i += 1;
    }
    let path = path.with_context(|| USAGE.to_string())?;

    let config: EngineConfig = load_config(&EngineConfig::default_path());

    let source: Arc<dyn Source> = Arc::new(
        MemorySource::from_wav(&path).with_context(|| format!("loading {}", path.display()))?,
    );
    let rate = source.sample_rate();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "region".to_string());
    let region = AudioRegion::from_source(name, Arc::clone(&source), 0, &config);

    println!(
        "{}: {} channels, {} frames at {} Hz ({:.2} s)",
        path.display(),
        source.n_channels(),
        source.length(),
        rate,
        source.length() as f64 / rate as f64
    );

    let progress = TaskProgress::new();
    match region.maximum_amplitude(&progress) {
        Some(peak) if peak > 0.0 => {
            println!("peak: {:.6} ({:.1} dBFS)", peak, linear_to_db(peak));
            println!(
                "normalize to 0 dBFS would apply {:+.1} dB",
                -linear_to_db(peak)
            );
        }
        Some(_) => println!("peak: silent file"),
        None => bail!("peak scan cancelled"),
    }

    let min_length = (min_ms * rate as f32 / 1000.0).floor() as u64;
    let intervals = region.find_silence(threshold, min_length, &progress);
    if intervals.is_empty() {
        println!(
            "no silence below {:.1} dBFS longer than {:.0} ms",
            linear_to_db(threshold),
            min_ms
        );
    } else {
        println!(
            "{} silent stretch(es) below {:.1} dBFS:",
            intervals.len(),
            linear_to_db(threshold)
        );
        for range in &intervals {
            println!(
                "  {:>10} .. {:>10}  ({:8.2} s .. {:8.2} s, {:.2} s long)",
                range.start,
                range.end,
                range.start as f64 / rate as f64,
                range.end as f64 / rate as f64,
                (range.end - range.start) as f64 / rate as f64
            );
        }
    }

    Ok(())
}
