//! # Meld Test
//!
//! Main entry point for the meld test host.

use meldtest::{MeldTest, MeldTestConfig, StderrLogger};
use std::env;
use std::path::PathBuf;
use std::process;

/// Command-line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    config: Option<PathBuf>,
    source1: Option<String>,
    source2: Option<String>,
    merged: Option<String>,
    verbose: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let options = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(&args[0]);
        process::exit(1);
    });

    if let Err(e) = StderrLogger::init(options.verbose) {
        eprintln!("Failed to install logger: {}", e);
    }

    let config = build_config(options).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    let mut test = MeldTest::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to create kernel: {}", e);
        process::exit(1);
    });

    match test.run() {
        Ok(report) => {
            print!("{}", report.render());
            if !report.passed() {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Meld test failed: {}", e);
            process::exit(1);
        }
    }
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --config".to_string());
                }
                options.config = Some(PathBuf::from(&args[i]));
            }
            "--source1" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --source1".to_string());
                }
                options.source1 = Some(args[i].clone());
            }
            "--source2" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --source2".to_string());
                }
                options.source2 = Some(args[i].clone());
            }
            "--merged" | "-o" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --merged".to_string());
                }
                options.merged = Some(args[i].clone());
            }
            "--verbose" | "-v" => {
                options.verbose = true;
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Command-line values override the configuration file
fn build_config(options: Options) -> Result<MeldTestConfig, meldtest::MeldTestError> {
    let mut config = match &options.config {
        Some(path) => MeldTestConfig::load(path)?,
        None => MeldTestConfig::default(),
    };
    if let Some(source1) = options.source1 {
        config.source1 = source1;
    }
    if let Some(source2) = options.source2 {
        config.source2 = source2;
    }
    if let Some(merged) = options.merged {
        config.merged_path = merged;
    }
    Ok(config)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>      JSON file with kernel limits and sources");
    eprintln!("  --source1 <TEXT>         Contents of the first source (default 01238901)");
    eprintln!("  --source2 <TEXT>         Contents of the second source (default 45672345)");
    eprintln!("  -o, --merged <PATH>      Path of the merged file (default merged)");
    eprintln!("  -v, --verbose            Log kernel activity to stderr");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --source1 abcdef --source2 0123456789", program);
    eprintln!("  {} --config meld.json --verbose", program);
}
