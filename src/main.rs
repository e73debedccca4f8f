use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use dir2iso::{FormatVariant, ImageOptions, create_image};

/// Build a disc image from a directory tree.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory whose contents become the image root
    input_dir: PathBuf,

    /// Image file to create
    output_file: PathBuf,

    /// Image format: udf, joliet or iso9660
    #[arg(short, long, default_value = "udf")]
    format: FormatVariant,

    /// Volume label; defaults to the input directory name
    #[arg(long)]
    volume_id: Option<String>,

    /// Recording time in Unix seconds; timestamps are left unset otherwise
    #[arg(long)]
    timestamp: Option<i64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let options = ImageOptions {
        format: args.format,
        volume_id: args.volume_id,
        recording_time: args.timestamp,
    };

    let file = File::create(&args.output_file)
        .with_context(|| format!("cannot create {}", args.output_file.display()))?;
    let mut sink = BufWriter::new(file);

    match create_image(&args.input_dir, &mut sink, &options) {
        Ok(report) => {
            for warning in &report.warnings {
                info!("{}", warning);
            }
            println!(
                "Finished. Read: {} bytes. Written: {} bytes.",
                report.counters.bytes_read, report.counters.bytes_written
            );
            Ok(())
        }
        Err(err) => {
            drop(sink);
            // A partial image is useless.
            let _ = fs::remove_file(&args.output_file);
            Err(err).with_context(|| {
                format!(
                    "failed to build {} from {}",
                    args.output_file.display(),
                    args.input_dir.display()
                )
            })
        }
    }
}
