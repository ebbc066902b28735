// Copyright 2020 TwoCookingMice

use meringue::core::error::Result;
use meringue::core::slice::{sample_slice, SliceAxis, SliceRequest};
use meringue::core::volume_loader::load_volume_description;
use meringue::io::exr_utils;
use meringue::io::ingest::ingest_sources;

use std::env;

struct Options {
    input_path: String,
    output_path: String,
    axis: SliceAxis,
    position: f32,
    resolution: usize,
    threads: usize,
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut options = Options {
        input_path: args[1].clone(),
        output_path: args[2].clone(),
        axis: SliceAxis::Z,
        position: 0.5,
        resolution: 512,
        threads: 0,
    };

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--axis" => {
                i += 1;
                options.axis = SliceAxis::from_name(args.get(i).map(|s| s.as_str()).unwrap_or(""))?;
            }
            "--slice" => {
                i += 1;
                options.position = args.get(i).and_then(|v| v.parse::<f32>().ok()).unwrap_or(0.5);
            }
            "--res" => {
                i += 1;
                options.resolution = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(512);
            }
            "--threads" => {
                i += 1;
                options.threads = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);
            }
            other => log::warn!("Ignoring unknown argument: {}.", other),
        }
        i += 1;
    }
    Ok(options)
}

fn run(options: &Options) -> Result<()> {
    let description = load_volume_description(&options.input_path)?;
    let mut volume = description.volume;

    let report = ingest_sources(volume.as_mut(), &description.sources, true)?;
    log::info!("Ingested {} region(s), {} failed.", report.regions, report.failed);
    volume.commit()?;

    let request = SliceRequest { axis: options.axis, position: options.position, resolution: options.resolution };
    let slice = sample_slice(volume.as_ref(), &request, options.threads, true)?;
    if let Some((lo, hi)) = slice.value_range() {
        log::info!("Slice values range from {} to {}.", lo, hi);
    } else {
        log::warn!("Slice does not intersect the volume.");
    }
    exr_utils::write_slice_exr(&slice, &options.output_path)
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <volume.xml> <output.exr> [--axis x|y|z] [--slice t] [--res N] [--threads N]", args[0]);
        std::process::exit(1);
    }

    let result = parse_options(&args).and_then(|options| run(&options));
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
