// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Compute the flux and power reaching the sample from a pair of ray files.

extern crate clap;
extern crate synchroflux;
extern crate synchroflux_test_support;

use clap::{Arg, ArgAction, Command};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use synchroflux::{FluxConfig, FluxEngine, RaySample};


fn read_rays(path: &PathBuf) -> synchroflux::Result<RaySample> {
    RaySample::from_reader(BufReader::new(File::open(path)?))
}

fn main() {
    let matches = Command::new("flux-run")
        .version(clap::crate_version!())
        .about("Compute the photon flux and power delivered to the sample")
        .arg(Arg::new("SOURCE")
             .help("Rays as they leave the source (columns: E weight x' z' [flag])")
             .value_parser(clap::value_parser!(PathBuf))
             .required(true)
             .index(1))
        .arg(Arg::new("SAMPLE")
             .help("Rays at the sample position")
             .value_parser(clap::value_parser!(PathBuf))
             .required(true)
             .index(2))
        .arg(Arg::new("config")
             .long("config")
             .short('c')
             .help("JSON run configuration; defaults are used if omitted")
             .value_parser(clap::value_parser!(PathBuf)))
        .arg(Arg::new("more")
             .long("more")
             .help("Sample rays from further traces, accumulated with SAMPLE")
             .value_parser(clap::value_parser!(PathBuf))
             .action(ArgAction::Append))
        .get_matches();

    let log = synchroflux_test_support::default_log();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(p) => FluxConfig::from_json(BufReader::new(File::open(p).unwrap())).unwrap(),
        None => FluxConfig::default(),
    };

    let source = read_rays(matches.get_one::<PathBuf>("SOURCE").unwrap()).unwrap();
    let mut sample = read_rays(matches.get_one::<PathBuf>("SAMPLE").unwrap()).unwrap();

    if let Some(paths) = matches.get_many::<PathBuf>("more") {
        for p in paths {
            sample = sample.merge(&read_rays(p).unwrap());
        }
    }

    let engine = FluxEngine::new(log);

    let run = match engine.run(&config, &source, &sample) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    println!("source rays: {} ({} lost)", run.source_counts.total, run.source_counts.lost);
    println!("sample rays: {} ({} lost)", run.sample_counts.total, run.sample_counts.lost);
    println!("   x' limits: {:.3e} {:.3e} rad", run.horizontal_window.lower(), run.horizontal_window.upper());
    println!("   z' limits: {:.3e} {:.3e} rad", run.vertical_window.lower(), run.vertical_window.upper());

    for w in run.warnings() {
        println!("     warning: {}", w);
    }

    println!("        flux: {:.3e} ph/s/100mA", run.total_flux());
    println!("       power: {:.3} W/100mA", run.total_power());
}
