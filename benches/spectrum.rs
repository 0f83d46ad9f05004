// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/// Time the expensive parts of a flux run: the bending magnet spectrum and
/// the vertical acceptance factors.

#[macro_use] extern crate bencher;
#[macro_use] extern crate slog;
extern crate synchroflux;

use bencher::Bencher;
use synchroflux::{AcceptanceWindow, BendingMagnetSpectrumModel, EnergyGrid, SpectrumModel,
                  VerticalAcceptanceModel};


fn log() -> slog::Logger {
    slog::Logger::root(slog::Discard, o!())
}

fn bm_spectrum_101(b: &mut Bencher) {
    let logger = log();
    let grid = EnergyGrid::linspace(100., 10000., 101).unwrap();
    let model = BendingMagnetSpectrumModel::new(3., 0.1, 3.2);

    b.iter(|| model.spectrum(&grid, &logger).unwrap());
}

fn vertical_natural_5(b: &mut Bencher) {
    let logger = log();
    let grid = EnergyGrid::linspace(500., 10000., 5).unwrap();
    let window = AcceptanceWindow::symmetric(1e-4).unwrap();
    let model = VerticalAcceptanceModel::new(3., 3.2);

    b.iter(|| model.compute(&grid, &window, &logger).unwrap());
}

fn vertical_convolved_5(b: &mut Bencher) {
    let logger = log();
    let grid = EnergyGrid::linspace(500., 10000., 5).unwrap();
    let window = AcceptanceWindow::symmetric(1e-4).unwrap();
    let model = VerticalAcceptanceModel::new(3., 3.2).beam_divergence(2e-5);

    b.iter(|| model.compute(&grid, &window, &logger).unwrap());
}


benchmark_group!(spectrum, bm_spectrum_101);
benchmark_group!(vertical, vertical_natural_5, vertical_convolved_5);
benchmark_main!(spectrum, vertical);
