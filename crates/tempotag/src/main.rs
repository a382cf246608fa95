use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};

use tempotag::batch::{self, TagProgress};
use tempotag::config;

fn main() {
    // Must run before anything else so spawned estimation subprocesses
    // re-enter here instead of running the CLI
    procspawn::init();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let dir = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => {
            eprintln!("Usage: tempotag <directory>");
            eprintln!();
            eprintln!("Estimates the tempo of every untagged audio file in <directory>");
            eprintln!("and renames it to bpm_<bpm>_<original name>.");
            std::process::exit(1);
        }
    };

    // Write the default config on first run so users have a file to edit
    let config_path = config::default_config_path();
    if !config_path.exists() {
        if let Err(e) = config::save_config(&config::Config::default(), &config_path) {
            log::warn!("failed to write default config to {:?}: {:#}", config_path, e);
        }
    }
    let config = config::load_config(&config_path);

    let (progress_tx, progress_rx) = mpsc::channel();
    let cancel_flag = Arc::new(AtomicBool::new(false));

    let worker = {
        let dir = dir.clone();
        let cancel_flag = cancel_flag.clone();
        std::thread::spawn(move || batch::run_batch(&dir, &config, progress_tx, cancel_flag))
    };

    for event in progress_rx {
        match event {
            TagProgress::Started { total } => {
                println!("Found {} untagged audio file(s)", total);
            }
            TagProgress::FileStarted {
                file_name,
                index,
                total,
            } => {
                println!("[{}/{}] {}", index + 1, total, file_name);
            }
            TagProgress::FileCompleted(outcome) => {
                if outcome.success {
                    match (outcome.bpm, outcome.danceability, outcome.new_name) {
                        (Some(bpm), Some(d), Some(new_name)) => {
                            println!("  {:.1} BPM, danceability {:.1} -> {}", bpm, d, new_name)
                        }
                        (Some(bpm), None, Some(new_name)) => {
                            println!("  {:.1} BPM -> {}", bpm, new_name)
                        }
                        _ => {}
                    }
                } else if let Some(error) = outcome.error {
                    println!("  {}: {}", outcome.file_name, error);
                }
            }
            TagProgress::AllComplete { results } => {
                let tagged = results.iter().filter(|r| r.success).count();
                println!("Done: {} tagged, {} failed", tagged, results.len() - tagged);
            }
        }
    }

    match worker.join() {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            log::error!("batch failed: {}", e);
            std::process::exit(1);
        }
        Err(_) => {
            log::error!("batch worker panicked");
            std::process::exit(1);
        }
    }
}
