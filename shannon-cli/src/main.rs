use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use serde::{Deserialize, Serialize};

use shannon_core::codec;
use shannon_core::image::MemoryImage;
use shannon_core::load_firmware;
use shannon_core::report::LoadReport;

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentReport {
    name: String,
    file_offset: u32,
    load_address: u32,
    size: u32,
    class: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryPointReport {
    address: u32,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MapReport {
    segments: Vec<SegmentReport>,
    entry_points: Vec<EntryPointReport>,
    labels: Vec<EntryPointReport>,
    warnings: Vec<String>,
}

impl MapReport {
    fn from_load(report: &LoadReport, image: &MemoryImage) -> Self {
        Self {
            segments: report
                .segments
                .iter()
                .map(|desc| SegmentReport {
                    name: desc.name.clone(),
                    file_offset: desc.file_offset,
                    load_address: desc.start,
                    size: desc.size(),
                    class: desc.class.to_string(),
                })
                .collect(),
            entry_points: image
                .entry_points()
                .iter()
                .map(|(address, name)| EntryPointReport {
                    address: *address,
                    name: name.clone(),
                })
                .collect(),
            labels: image
                .labels()
                .iter()
                .map(|(address, name)| EntryPointReport {
                    address: *address,
                    name: name.clone(),
                })
                .collect(),
            warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }
}

/// Map a Shannon modem firmware image and report its layout.
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse the TOC container and write a layout report
    Map {
        #[arg(short, long, required = true)]
        input: PathBuf,

        #[arg(short, long, required = true)]
        output: PathBuf,

        /// Also dump each mapped segment as a raw .bin file
        #[arg(short, long)]
        extract: bool,
    },
    /// Decompress a raw blob with the modem's scatter codec
    Decompress {
        #[arg(short, long, required = true)]
        input: PathBuf,

        #[arg(short, long, required = true)]
        output: PathBuf,

        /// Offset of the compressed stream inside the input file
        #[arg(long, default_value = "0", value_parser = parse_number)]
        offset: u32,

        /// Decompressed size recorded in the scatter table entry
        #[arg(long, required = true, value_parser = parse_number)]
        count: u32,
    },
}

/// Accepts both decimal and `0x` hex, since scatter entries are usually
/// quoted in hex.
fn parse_number(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|err| format!("invalid number {:?}: {}", text, err))
}

fn run_map(input: &Path, output: &Path, extract: bool) -> Result<()> {
    let file = std::fs::read(input).with_context(|| format!("read {}", input.display()))?;

    let mut image = MemoryImage::new();
    let report = load_firmware(&file, &mut image)?;
    for warning in &report.warnings {
        log::warn!("{}", warning);
    }

    if !output.exists() {
        std::fs::create_dir_all(output)?;
    }

    let map_report = MapReport::from_load(&report, &image);
    let report_path = output.join("layout.yaml");
    let mut writer = std::fs::File::create(&report_path)?;
    serde_yaml::to_writer(&mut writer, &map_report)?;
    log::info!("layout written to {}", report_path.display());

    if extract {
        for region in image.regions() {
            let bin_path = output.join(format!("{}.bin", region.name));
            std::fs::write(&bin_path, region.bytes())
                .with_context(|| format!("write {}", bin_path.display()))?;
        }
    }

    Ok(())
}

fn run_decompress(input: &Path, output: &Path, offset: u32, count: u32) -> Result<()> {
    let file = std::fs::read(input).with_context(|| format!("read {}", input.display()))?;
    let offset = offset as usize;
    if offset >= file.len() {
        bail!("offset 0x{:X} is past the end of the input", offset);
    }

    let decoded = codec::decompress(&file[offset..], count as usize);
    if decoded.len() < count as usize {
        log::warn!(
            "stream ended early, got {} of {} bytes",
            decoded.len(),
            count
        );
    }
    std::fs::write(output, &decoded).with_context(|| format!("write {}", output.display()))?;
    log::info!("{} bytes written to {}", decoded.len(), output.display());

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Map { input, output, extract } => run_map(&input, &output, extract),
        Command::Decompress { input, output, offset, count } => {
            run_decompress(&input, &output, offset, count)
        }
    }
}
