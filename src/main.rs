//! Structured Light Codec Tool
//!
//! Entry point for the slcodec command line tool.

use anyhow::{anyhow, bail, Context};
use std::path::Path;
use structured_light::config::ScanConfig;
use structured_light::export::{load_captures, ScanExporter};
use structured_light::CodecKind;

const USAGE: &str = "usage:
  slcodec generate <config> <out_dir>
  slcodec decode <config> <captures_dir> <out_file>
  slcodec defaults <codec> <columns> <rows> <config>";

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let command = args.first().map(String::as_str);
    match (command, &args[args.len().min(1)..]) {
        (Some("generate"), [config, out_dir]) => generate(Path::new(config), Path::new(out_dir)),
        (Some("decode"), [config, captures, out_file]) => {
            decode(Path::new(config), Path::new(captures), Path::new(out_file))
        }
        (Some("defaults"), [codec, columns, rows, config]) => {
            let kind: CodecKind = codec.parse().map_err(|e: String| anyhow!(e))?;
            let columns = columns.parse().context("columns must be a number")?;
            let rows = rows.parse().context("rows must be a number")?;
            ScanConfig::defaults(kind, columns, rows)?.save(Path::new(config))
        }
        _ => bail!("{}", USAGE),
    }
}

fn generate(config: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let config = ScanConfig::load(config)?;
    let codec = config.codec()?;
    let sequence = codec.generate_pattern_sequence()?;
    ScanExporter::export_patterns(&sequence, out_dir)
        .with_context(|| format!("Failed to export patterns to {}", out_dir.display()))?;
    Ok(())
}

fn decode(config: &Path, captures_dir: &Path, out_file: &Path) -> anyhow::Result<()> {
    let config = ScanConfig::load(config)?;
    let codec = config.codec()?;
    let captures = load_captures(captures_dir)?;
    let map = codec.decode_capture_sequence(&captures)?;
    map.save(out_file)?;

    let preview = out_file.with_extension("png");
    ScanExporter::export_disparity_preview(&map, &preview)
        .with_context(|| format!("Failed to write preview {}", preview.display()))?;
    log::info!(
        "{} of {} pixels decoded, preview at {}",
        map.valid_count(),
        map.pixels().len(),
        preview.display()
    );
    Ok(())
}
