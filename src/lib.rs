// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Compute the photon flux and power that a beamline delivers from a
synchrotron source.

A ray tracer gives us two populations of rays: one sampled as the rays leave
the source, and one at the sample position after the beamline optics. From
them we derive the beamline transmittance as a function of photon energy
and, optionally, the angular acceptance of the beamline. We then compute the
spectrum emitted by the source into that acceptance, fold everything
together, and integrate over energy to get the total flux and power that
reach the sample.

Three kinds of sources are supported:

- Bending magnets and wigglers, whose spectra follow from the universal
  synchrotron function `G1`. For these we can also compute the fraction of
  the vertical angular distribution that the beamline accepts.
- Undulators, whose spectra come from an external radiation solver plugged
  in through the `RadiationSolver` trait.

Results are always normalized to a ring current of 100 mA. Most users will
want a `FluxEngine`:

```no_run
# #[macro_use] extern crate slog;
# extern crate synchroflux;
# use synchroflux::{FluxConfig, FluxEngine, RaySample};
# fn main() -> synchroflux::Result<()> {
# let logger = slog::Logger::root(slog::Discard, o!());
let source = RaySample::from_reader(std::io::BufReader::new(std::fs::File::open("begin.txt")?))?;
let sample = RaySample::from_reader(std::io::BufReader::new(std::fs::File::open("sample.txt")?))?;
let engine = FluxEngine::new(logger);
let run = engine.run(&FluxConfig::default(), &source, &sample)?;
println!("{:.3e} ph/s/100mA, {:.3} W", run.total_flux(), run.total_power());
# Ok(())
# }
```

*/

#![deny(missing_docs)]

#[macro_use] extern crate slog;
#[cfg(test)] #[macro_use] extern crate assert_approx_eq;

use serde::{Deserialize, Serialize};

pub mod acceptance;
pub mod bessel;
pub mod config;
pub mod error;
pub mod flux;
pub mod histogram;
pub mod integrate;
pub mod pipeline;
pub mod rays;
pub mod spectrum;
pub mod undulator;
pub mod vertical;

pub use crate::acceptance::{AcceptanceEstimate, AcceptanceWindow, DivergenceAcceptanceEstimator};
pub use crate::config::FluxConfig;
pub use crate::error::{ConsistencyWarning, FluxError, Result};
pub use crate::flux::{FluxAggregator, FluxResult, Transmittance};
pub use crate::histogram::{EnergyGrid, IntensityHistogram, RayHistogramReducer};
pub use crate::pipeline::{FluxEngine, FluxRun};
pub use crate::rays::{AngularAxis, Population, Ray, RayCounts, RaySample};
pub use crate::spectrum::{BendingMagnetSpectrumModel, SourceSpectrum, SpectrumModel, WigglerSpectrumModel};
pub use crate::undulator::{RadiationSolver, SolverError, UndulatorRequest, UndulatorSpectrumAdapter};
pub use crate::vertical::{VerticalAcceptanceModel, VerticalAcceptanceResult};


/// The electron rest energy, in GeV.
pub const ELECTRON_REST_ENERGY_GEV: f64 = 0.51099890221e-3;

/// The elementary charge, in C.
pub const ELEMENTARY_CHARGE: f64 = 1.60217662e-19;

/// The mass of the electron, in kg.
pub const ELECTRON_MASS: f64 = 9.10938356e-31;

/// The speed of light, in m/s.
pub const SPEED_OF_LIGHT: f64 = 299792458.;

/// The ring current that all totals are normalized to, in A.
pub const REFERENCE_CURRENT: f64 = 0.1;


/// Which kind of magnet produces the radiation.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A bending magnet.
    BendingMagnet,

    /// A multipole wiggler.
    Wiggler,

    /// A planar undulator. Needs an external radiation solver.
    Undulator,
}
