// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Emitted spectra of bending magnets and wigglers.

Both sources radiate the classic synchrotron continuum. With the critical
energy `e_c = 665 E² B` eV (ring energy `E` in GeV, field `B` in T) and the
relative photon energy `y = e / e_c`, the flux into a horizontal fan of
`θ` mrad is

```text
F(e) = 2.457e13 · E · I · G1(y) · θ    [ph/s/0.1%bw]
```

where `G1(y) = y ∫_y^∞ K_5/3` is the universal synchrotron function. A
wiggler of `N` periods is treated as `2N` bending magnets whose fans
overlap. The spectrum peaks near `y ≈ 0.29`, not at the critical energy.

*/

use slog::Logger;

use crate::bessel::synchrotron_g1;
use crate::error::{FluxError, Result};
use crate::histogram::EnergyGrid;
use crate::integrate::IntegrationWorkspace;


/// Flux prefactor of the bending-magnet formula, in ph/s/0.1%bw per GeV,
/// per A, per mrad.
const BM_FLUX_COEFFICIENT: f64 = 2.457e13;

/// Critical-energy prefactor, in eV per GeV² per T.
const CRITICAL_ENERGY_COEFFICIENT: f64 = 665.;

/// `K = WIGGLER_K_COEFFICIENT · λ_w [m] · B [T]`.
const WIGGLER_K_COEFFICIENT: f64 = 93.364;


/// The critical photon energy, in eV, of a source with ring energy
/// `ring_energy` (GeV) in a field of `field` (T).
pub fn critical_energy(ring_energy: f64, field: f64) -> f64 {
    CRITICAL_ENERGY_COEFFICIENT * ring_energy * ring_energy * field
}


/// The wiggler peak field (T) for a deflection parameter `k` and period
/// `period` (m), rounded to 6 decimals.
pub fn wiggler_field_from_k(k: f64, period: f64) -> f64 {
    round6(k / (WIGGLER_K_COEFFICIENT * period))
}


/// The wiggler deflection parameter for a peak field `field` (T) and period
/// `period` (m), rounded to 6 decimals.
pub fn wiggler_k_from_field(field: f64, period: f64) -> f64 {
    round6(WIGGLER_K_COEFFICIENT * period * field)
}


pub(crate) fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}


/// Source flux sampled on an energy grid, in ph/s/0.1%bw.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceSpectrum {
    flux: Vec<f64>,
}

impl SourceSpectrum {
    /// Wrap up flux values computed elsewhere.
    pub fn new(flux: Vec<f64>) -> Self {
        SourceSpectrum { flux }
    }

    /// The flux values, one per grid energy.
    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    /// The number of points.
    pub fn len(&self) -> usize {
        self.flux.len()
    }

    /// Whether there are no points.
    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }
}


/// Something that can compute the spectrum emitted by a source.
pub trait SpectrumModel {
    /// Compute the emitted flux at every energy of `grid`.
    fn spectrum(&self, grid: &EnergyGrid, logger: &Logger) -> Result<SourceSpectrum>;
}


fn require_positive(field: &'static str, value: f64) -> Result<()> {
    if value > 0. && value.is_finite() {
        Ok(())
    } else {
        Err(FluxError::InvalidParameter { field, requirement: "finite and positive", value })
    }
}


/// The spectrum of a bending magnet.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BendingMagnetSpectrumModel {
    ring_energy: f64,
    current: f64,
    field: f64,
    horizontal_acceptance_mrad: f64,
}

impl BendingMagnetSpectrumModel {
    /// Describe a bending magnet with storage ring energy `ring_energy`
    /// (GeV), beam current `current` (A), and field `field` (T).
    ///
    /// The horizontal acceptance defaults to 1 mrad.
    pub fn new(ring_energy: f64, current: f64, field: f64) -> Self {
        BendingMagnetSpectrumModel {
            ring_energy,
            current,
            field,
            horizontal_acceptance_mrad: 1.,
        }
    }

    /// Set the horizontal fan collected by the beamline, in mrad.
    pub fn horizontal_acceptance(mut self, mrad: f64) -> Self {
        self.horizontal_acceptance_mrad = mrad;
        self
    }

    /// The critical energy of this magnet, in eV.
    pub fn critical_energy(&self) -> f64 {
        critical_energy(self.ring_energy, self.field)
    }

    /// Turn this magnet into a wiggler with `periods` periods.
    pub fn wiggler(self, periods: u32) -> WigglerSpectrumModel {
        WigglerSpectrumModel { magnet: self, periods }
    }

    fn validate(&self) -> Result<()> {
        require_positive("ring energy", self.ring_energy)?;
        require_positive("current", self.current)?;
        require_positive("magnetic field", self.field)?;
        require_positive("horizontal acceptance", self.horizontal_acceptance_mrad)
    }

    /// The flux at a single photon energy (eV).
    pub fn flux_at(&self, energy: f64, ws: &mut IntegrationWorkspace) -> Result<f64> {
        let y = energy / self.critical_energy();
        let g1 = synchrotron_g1(y, ws)?;
        Ok(BM_FLUX_COEFFICIENT * self.ring_energy * self.current * g1 * self.horizontal_acceptance_mrad)
    }
}

impl SpectrumModel for BendingMagnetSpectrumModel {
    fn spectrum(&self, grid: &EnergyGrid, logger: &Logger) -> Result<SourceSpectrum> {
        self.validate()?;

        let mut ws = IntegrationWorkspace::new(1000);
        let mut flux = Vec::with_capacity(grid.len());

        for &e in grid.energies() {
            let f = self.flux_at(e, &mut ws)?;
            trace!(logger, "bending magnet flux"; "energy" => e, "flux" => f);
            flux.push(f);
        }

        debug!(logger, "computed bending magnet spectrum";
               "ring_energy" => self.ring_energy,
               "current" => self.current,
               "field" => self.field,
               "e_c" => self.critical_energy(),
               "hor_acc_mrad" => self.horizontal_acceptance_mrad,
               "points" => flux.len(),
        );

        Ok(SourceSpectrum { flux })
    }
}


/// The spectrum of a wiggler: `2N` times that of the equivalent bending
/// magnet.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WigglerSpectrumModel {
    magnet: BendingMagnetSpectrumModel,
    periods: u32,
}

impl WigglerSpectrumModel {
    /// Describe a wiggler with `periods` periods and the given ring energy
    /// (GeV), current (A), and peak field (T).
    pub fn new(ring_energy: f64, current: f64, field: f64, periods: u32) -> Self {
        BendingMagnetSpectrumModel::new(ring_energy, current, field).wiggler(periods)
    }

    /// Set the horizontal fan collected by the beamline, in mrad.
    pub fn horizontal_acceptance(mut self, mrad: f64) -> Self {
        self.magnet = self.magnet.horizontal_acceptance(mrad);
        self
    }

    /// The number of poles contributing, `2N`.
    pub fn poles(&self) -> f64 {
        2. * self.periods as f64
    }
}

impl SpectrumModel for WigglerSpectrumModel {
    fn spectrum(&self, grid: &EnergyGrid, logger: &Logger) -> Result<SourceSpectrum> {
        if self.periods == 0 {
            return Err(FluxError::InvalidParameter {
                field: "wiggler periods",
                requirement: "at least one",
                value: 0.,
            });
        }

        let poles = self.poles();
        let bm = self.magnet.spectrum(grid, logger)?;

        debug!(logger, "scaling to wiggler"; "periods" => self.periods);

        Ok(SourceSpectrum { flux: bm.flux.iter().map(|f| f * poles).collect() })
    }
}
