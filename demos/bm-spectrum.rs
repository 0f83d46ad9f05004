// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Tabulate the spectrum of a bending magnet or wiggler.

extern crate clap;
extern crate synchroflux;
extern crate synchroflux_test_support;

use clap::{Arg, Command};
use synchroflux::{BendingMagnetSpectrumModel, EnergyGrid, SpectrumModel};

fn main() {
    let matches = Command::new("bm-spectrum")
        .version(clap::crate_version!())
        .about("Print the flux of a bending magnet or wiggler (ph/s/0.1%bw)")
        .arg(Arg::new("E_MIN")
             .help("The lowest photon energy (eV)")
             .value_parser(clap::value_parser!(f64))
             .required(true)
             .index(1))
        .arg(Arg::new("E_MAX")
             .help("The highest photon energy (eV)")
             .value_parser(clap::value_parser!(f64))
             .required(true)
             .index(2))
        .arg(Arg::new("points")
             .long("points")
             .short('n')
             .help("Number of energies to tabulate")
             .value_parser(clap::value_parser!(usize))
             .default_value("101"))
        .arg(Arg::new("ring-energy")
             .long("ring-energy")
             .help("Storage ring energy (GeV)")
             .value_parser(clap::value_parser!(f64))
             .default_value("3.0"))
        .arg(Arg::new("current")
             .long("current")
             .help("Beam current (A)")
             .value_parser(clap::value_parser!(f64))
             .default_value("0.1"))
        .arg(Arg::new("field")
             .long("field")
             .help("Magnetic field (T)")
             .value_parser(clap::value_parser!(f64))
             .default_value("3.2"))
        .arg(Arg::new("acceptance")
             .long("acceptance")
             .help("Horizontal acceptance (mrad)")
             .value_parser(clap::value_parser!(f64))
             .default_value("1.0"))
        .arg(Arg::new("wiggler-periods")
             .long("wiggler-periods")
             .help("Treat the source as a wiggler with this many periods")
             .value_parser(clap::value_parser!(u32)))
        .get_matches();

    let log = synchroflux_test_support::default_log();

    let grid = EnergyGrid::linspace(
        *matches.get_one::<f64>("E_MIN").unwrap(),
        *matches.get_one::<f64>("E_MAX").unwrap(),
        *matches.get_one::<usize>("points").unwrap(),
    ).unwrap();

    let magnet = BendingMagnetSpectrumModel::new(
        *matches.get_one::<f64>("ring-energy").unwrap(),
        *matches.get_one::<f64>("current").unwrap(),
        *matches.get_one::<f64>("field").unwrap(),
    ).horizontal_acceptance(*matches.get_one::<f64>("acceptance").unwrap());

    eprintln!("critical energy: {:.1} eV", magnet.critical_energy());

    let spectrum = match matches.get_one::<u32>("wiggler-periods") {
        Some(&n) => magnet.wiggler(n).spectrum(&grid, &log),
        None => magnet.spectrum(&grid, &log),
    }.unwrap();

    for (e, f) in grid.energies().iter().zip(spectrum.flux()) {
        println!("{:.3}\t{:.6e}", e, f);
    }
}
