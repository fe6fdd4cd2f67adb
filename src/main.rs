use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use nucleiseg::{run_analysis, BatchOptions, SegmentationParams};

#[derive(Parser)]
#[command(name = "nucleiseg")]
#[command(about = "Segment nuclei in fluorescence images into labeled masks")]
struct Cli {
    /// Input folder containing nuclear stain images
    #[arg(value_name = "IN_DIR")]
    in_path: PathBuf,

    /// Output folder for the resulting label masks
    #[arg(value_name = "OUT_DIR")]
    out_path: PathBuf,

    /// Gaussian blur sigma
    #[arg(long, default_value_t = 2.0)]
    sigma: f32,

    /// Remove objects with an area of at most this many pixels
    #[arg(long, default_value_t = 200)]
    max_size: u32,

    /// Morphological closing radius (0 disables closing)
    #[arg(long, default_value_t = 3)]
    closing_radius: u32,

    /// Process images concurrently
    #[arg(long)]
    parallel: bool,

    /// Save per-step debug images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Write a JSON report of the run to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    setup_logging(args.verbose);

    let params = SegmentationParams::new(args.sigma, args.max_size, args.closing_radius);
    let options = BatchOptions {
        parallel: args.parallel,
        debug_out: args.debug_out,
    };

    let report = run_analysis(&args.in_path, &args.out_path, &params, &options)?;

    if let Some(report_path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(report_path, json)?;
        tracing::info!("Report written to {}", report_path.display());
    }

    println!("\n=== Nuclei Segmentation Results ===");
    println!("Images processed: {}", report.processed.len());
    println!("Images skipped: {}", report.skipped.len());
    println!("Total nuclei detected: {}", report.total_nuclei());

    if !report.processed.is_empty() {
        println!("\nPer image:");
        for item in &report.processed {
            match item.mean_diameter {
                Some(d) => println!(
                    "  {} -> {} nuclei, mean diameter {:.1} px ({})",
                    item.filename,
                    item.nuclei,
                    d,
                    item.output.display()
                ),
                None => println!("  {} -> no nuclei ({})", item.filename, item.output.display()),
            }
        }
    }
    for item in &report.skipped {
        println!("  skipped {}: {}", item.filename, item.reason);
    }

    if report.processed.is_empty() {
        anyhow::bail!("No images were successfully processed");
    }

    Ok(())
}
