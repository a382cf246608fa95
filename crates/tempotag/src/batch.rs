//! Batch tempo tagging
//!
//! Scans a directory for untagged audio files and runs one pipeline per
//! file on a bounded worker pool: read → decode → downmix → decimate →
//! estimate → rename. Each file can fail independently; only a failure to
//! enumerate the directory aborts the run.
//!
//! # Usage
//!
//! ```ignore
//! let (progress_tx, progress_rx) = std::sync::mpsc::channel();
//! let cancel_flag = Arc::new(AtomicBool::new(false));
//!
//! std::thread::spawn(move || {
//!     batch::run_batch(&dir, &config, progress_tx, cancel_flag)
//! });
//!
//! // Poll progress_rx for updates
//! ```

use crate::analysis::{self, AnalysisResult, TARGET_SAMPLE_RATE};
use crate::config::{AnalysisConfig, Config};
use crate::decode;
use crate::error::{Result, TagError};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

/// Extensions handed to the decoder; everything else is never opened
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "opus", "qoa"];

/// Filename prefix that both persists the result and marks a file as done
pub const TAG_PREFIX: &str = "bpm_";

/// RAII guard for temp file cleanup - deletes the file on drop.
///
/// Ensures the sample handoff file is removed on every exit path, including
/// early returns and panics in the spawning thread.
struct TempFileGuard {
    path: PathBuf,
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            // It's OK if the file was never created
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to clean up temp file {:?}: {}", self.path, e);
            }
        }
    }
}

/// Planned rename for a successfully analyzed file
///
/// Created only after analysis succeeds; consumed exactly once by
/// [`RenamePlan::apply`]. On failure the source file stays at its
/// original path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl RenamePlan {
    /// Build the plan for embedding a rounded BPM into the filename
    pub fn new(source: &Path, bpm: u32) -> Self {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = source.with_file_name(format!("{}{}_{}", TAG_PREFIX, bpm, name));
        Self {
            source: source.to_path_buf(),
            target,
        }
    }

    /// Perform the filesystem rename, returning the new path
    pub fn apply(self) -> Result<PathBuf> {
        fs::rename(&self.source, &self.target).map_err(|source| TagError::Rename {
            path: self.source.clone(),
            source,
        })?;
        Ok(self.target)
    }
}

/// Terminal report for a single file
#[derive(Debug, Clone)]
pub struct TagOutcome {
    /// Original file name
    pub file_name: String,
    /// Whether the file was analyzed and renamed
    pub success: bool,
    /// Unrounded estimator output
    pub bpm: Option<f32>,
    /// Danceability score rounded to one decimal, when enabled
    pub danceability: Option<f32>,
    /// New file name after the rename
    pub new_name: Option<String>,
    /// Stage and reason when the pipeline failed
    pub error: Option<String>,
}

impl TagOutcome {
    fn failed(file_name: String, message: String) -> Self {
        Self {
            file_name,
            success: false,
            bpm: None,
            danceability: None,
            new_name: None,
            error: Some(message),
        }
    }
}

/// Progress updates sent from the batch to its caller
#[derive(Debug, Clone)]
pub enum TagProgress {
    /// Scan finished, candidates counted
    Started { total: usize },
    /// Starting to process a file
    FileStarted {
        file_name: String,
        index: usize,
        total: usize,
    },
    /// A file reached a terminal state
    FileCompleted(TagOutcome),
    /// All pipelines have terminated
    AllComplete { results: Vec<TagOutcome> },
}

/// List the directory's untagged audio files
///
/// Keeps regular files whose extension is in [`SUPPORTED_EXTENSIONS`]
/// (case-insensitive) and whose name does not already start with
/// [`TAG_PREFIX`] - the idempotence guard for repeated runs. Results are
/// sorted for a deterministic scheduling order.
pub fn scan_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| TagError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if name.starts_with(TAG_PREFIX) {
            log::debug!("scan_audio_files: skipping already tagged {}", name);
            continue;
        }

        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |ext| {
                SUPPORTED_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s))
            });
        if supported {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Run estimation in an isolated subprocess.
///
/// Essentia's C++ library is NOT thread-safe - it has global state for
/// logging, FFT plan caches, and algorithm registries. Spawning each
/// estimation in a separate process gives every concurrent pipeline its
/// own copy of those globals.
///
/// Samples are handed over through a temp file of raw little-endian f32
/// rather than serialized over IPC; the file is cleaned up by an RAII
/// guard on every exit path.
/// Path for a sample handoff file, unique across processes and across
/// concurrent pipelines within one process
fn scratch_sample_path() -> PathBuf {
    use std::sync::atomic::AtomicU64;

    static SEQUENCE: AtomicU64 = AtomicU64::new(0);

    std::env::temp_dir().join(format!(
        "tempotag_{}_{}.bin",
        std::process::id(),
        SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ))
}

fn analyze_in_subprocess(samples: Vec<f32>, config: AnalysisConfig) -> Result<AnalysisResult> {
    use std::io::Write;

    let temp_path = scratch_sample_path();

    let _temp_guard = TempFileGuard {
        path: temp_path.clone(),
    };

    // Write samples as raw little-endian f32
    {
        let mut file = fs::File::create(&temp_path)
            .map_err(|e| TagError::Estimation(format!("failed to create temp file: {}", e)))?;
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for &sample in &samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        file.write_all(&bytes)
            .map_err(|e| TagError::Estimation(format!("failed to write temp file: {}", e)))?;
    }
    let sample_count = samples.len();
    drop(samples); // Free memory before spawning the subprocess

    let temp_path_str = temp_path.to_string_lossy().to_string();
    let handle = procspawn::spawn(
        (temp_path_str, sample_count, config),
        |(path, count, config)| {
            use std::io::Read;

            let samples = (|| -> std::result::Result<Vec<f32>, String> {
                let mut file = std::fs::File::open(&path).map_err(|e| e.to_string())?;
                let mut bytes = vec![0u8; count * std::mem::size_of::<f32>()];
                file.read_exact(&mut bytes).map_err(|e| e.to_string())?;

                Ok(bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect())
            })()?;

            // Run estimation with this process's own Essentia instance
            analysis::analyze_samples(&samples, &config).map_err(|e| e.to_string())
        },
    );

    handle
        .join()
        .map_err(|e| TagError::Estimation(format!("estimation subprocess failed: {:?}", e)))?
        .map_err(TagError::Estimation)
}

/// Successful pipeline output, before it becomes a [`TagOutcome`]
struct TagSuccess {
    bpm: f32,
    danceability: Option<f32>,
    new_name: String,
}

/// Run the whole per-file pipeline and apply the rename
///
/// Stages run strictly in order; the first failing stage terminates this
/// file with its typed error and no filesystem effect.
fn process_file(path: &Path, config: &Config) -> Result<TagSuccess> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Reading
    let bytes = fs::read(path).map_err(|source| TagError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    // Decoding
    let ext = path.extension().and_then(|e| e.to_str());
    let decoded = decode::decode_bytes(bytes, ext)?;
    let sample_rate = decoded.sample_rate;
    log::info!(
        "{}: {} Hz, {} channel(s), {} samples ({:.1}s)",
        file_name,
        sample_rate,
        decoded.channel_count(),
        decoded.frames(),
        decoded.duration_seconds()
    );

    // Downmixing
    let mono = analysis::downmix_to_mono(&decoded.channels)?;
    drop(decoded);

    // Downsampling
    let decimated = analysis::downsample(&mono, sample_rate, TARGET_SAMPLE_RATE);
    log::debug!(
        "{}: decimated {} Hz -> {} Hz ({} -> {} samples)",
        file_name,
        sample_rate,
        TARGET_SAMPLE_RATE,
        mono.len(),
        decimated.len()
    );

    // Estimating
    let result = analyze_in_subprocess(decimated.into_owned(), config.analysis.clone())?;
    let bpm_int = result.bpm.round() as u32;
    let danceability = result.danceability.map(|d| (d * 10.0).round() / 10.0);

    // Renaming
    let target = RenamePlan::new(path, bpm_int).apply()?;
    let new_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match danceability {
        Some(d) => log::info!(
            "{}: {:.2} BPM, danceability {:.1} -> renamed to {}",
            file_name,
            result.bpm,
            d,
            new_name
        ),
        None => log::info!(
            "{}: {:.2} BPM -> renamed to {}",
            file_name,
            result.bpm,
            new_name
        ),
    }

    Ok(TagSuccess {
        bpm: result.bpm,
        danceability,
        new_name,
    })
}

/// Run the batch tagging process
///
/// Scans `dir`, then processes every candidate on a rayon pool sized from
/// `config.batch.parallel_processes` (clamped 1-16). All pipelines are
/// joined before this returns; the aggregated outcomes are both streamed
/// over `progress_tx` and returned.
///
/// The only error is a failed directory scan. Per-file failures are
/// reported as unsuccessful [`TagOutcome`]s and never abort siblings.
pub fn run_batch(
    dir: &Path,
    config: &Config,
    progress_tx: Sender<TagProgress>,
    cancel_flag: Arc<AtomicBool>,
) -> Result<Vec<TagOutcome>> {
    let start_time = Instant::now();

    let files = scan_audio_files(dir)?;
    let total = files.len();
    log::info!("run_batch: {} untagged audio file(s) in {:?}", total, dir);

    let _ = progress_tx.send(TagProgress::Started { total });

    if files.is_empty() {
        log::info!("run_batch: nothing to do");
        let _ = progress_tx.send(TagProgress::AllComplete {
            results: Vec::new(),
        });
        return Ok(Vec::new());
    }

    let num_workers = config.batch.parallel_processes.clamp(1, 16) as usize;
    log::info!("run_batch: using {} parallel worker(s)", num_workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .build()
        .expect("Failed to create thread pool");

    let results: Vec<TagOutcome> = pool.install(|| {
        files
            .par_iter()
            .enumerate()
            .map(|(index, path)| {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                // Cancelled files terminate without side effects
                if cancel_flag.load(Ordering::Relaxed) {
                    return TagOutcome::failed(file_name, "cancelled".to_string());
                }

                let _ = progress_tx.send(TagProgress::FileStarted {
                    file_name: file_name.clone(),
                    index,
                    total,
                });

                let outcome = match process_file(path, config) {
                    Ok(s) => TagOutcome {
                        file_name: file_name.clone(),
                        success: true,
                        bpm: Some(s.bpm),
                        danceability: s.danceability,
                        new_name: Some(s.new_name),
                        error: None,
                    },
                    Err(e) => {
                        log::error!("{}: failed while {}: {}", file_name, e.stage(), e);
                        TagOutcome::failed(file_name, format!("{} failed: {}", e.stage(), e))
                    }
                };

                let _ = progress_tx.send(TagProgress::FileCompleted(outcome.clone()));

                outcome
            })
            .collect()
    });

    let duration = start_time.elapsed();
    let success_count = results.iter().filter(|r| r.success).count();
    log::info!(
        "run_batch: complete in {:.1}s - {} tagged, {} failed",
        duration.as_secs_f64(),
        success_count,
        results.len() - success_count
    );

    let _ = progress_tx.send(TagProgress::AllComplete {
        results: results.clone(),
    });

    Ok(results)
}
