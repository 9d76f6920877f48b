use std::path::PathBuf;
use std::process;

use voxmarch_runner::config::{self, RunnerConfig};
use voxmarch_runner::report;
use voxmarch_runner::runner;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut kernel_path: Option<PathBuf> = None;
    let mut frames: Option<u32> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                config_path = Some(PathBuf::from(flag_value(&args, i)));
                i += 1;
            }
            "--output" => {
                output_path = Some(PathBuf::from(flag_value(&args, i)));
                i += 1;
            }
            "--kernel" => {
                kernel_path = Some(PathBuf::from(flag_value(&args, i)));
                i += 1;
            }
            "--frames" => {
                let value = flag_value(&args, i);
                frames = match value.parse() {
                    Ok(n) => Some(n),
                    Err(_) => {
                        eprintln!("Invalid --frames value: {}", value);
                        process::exit(1);
                    }
                };
                i += 1;
            }
            "--help" | "-h" => {
                eprintln!("Usage: voxmarch-runner [OPTIONS]");
                eprintln!("  --config <path>    Load run settings from a RON file");
                eprintln!("  --frames <n>       Frames to render (overrides config)");
                eprintln!("  --output <path>    Save the run report as JSON");
                eprintln!("  --kernel <path>    Use a WGSL ray march kernel from disk");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(ref path) => match config::load_config(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{e}");
                process::exit(1);
            }
        },
        None => RunnerConfig::default(),
    };
    if let Some(n) = frames {
        config.frames = n;
    }
    if kernel_path.is_some() {
        config.kernel_path = kernel_path;
    }
    if let Err(e) = config.validate() {
        log::error!("{e}");
        process::exit(1);
    }

    let report = match runner::run(&config) {
        Ok(report) => report,
        Err(e) => {
            log::error!("Render failed: {e}");
            process::exit(1);
        }
    };

    println!("\n## Render Results\n");
    println!("{}", report::format_markdown(&report));

    if let Some(ref path) = output_path {
        if let Err(e) = report::save_report(path, &report) {
            log::error!("Failed to save report to {}: {e}", path.display());
            process::exit(1);
        }
        log::info!("Saved report to {}", path.display());
    }

    log::info!("Run complete.");
}

/// Value following the flag at `args[i]`; exits when it is missing.
fn flag_value(args: &[String], i: usize) -> &str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Missing value for {}", args[i]);
            process::exit(1);
        }
    }
}
