// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Combining spectrum, transmittance and acceptance into flux and power.

The source spectrum is in ph/s/0.1%bw. Dividing by the bandwidth `E/1000`
turns it into ph/s/eV, which we weight by the beamline transmittance and the
vertical acceptance factor and integrate over energy. Totals are always
reported per 100 mA of ring current.

*/

use slog::Logger;

use crate::{ELEMENTARY_CHARGE, REFERENCE_CURRENT};
use crate::error::{ConsistencyWarning, FluxError, Result};
use crate::histogram::{EnergyGrid, IntensityHistogram};
use crate::integrate::simpson;
use crate::spectrum::SourceSpectrum;


fn check_length(what: &'static str, grid: &EnergyGrid, actual: usize) -> Result<()> {
    if actual == grid.len() {
        Ok(())
    } else {
        Err(FluxError::LengthMismatch { what, expected: grid.len(), actual })
    }
}


fn round1(x: f64) -> f64 {
    (x * 10.).round() / 10.
}


/// Flag a sample population that reaches outside the source's energy range.
///
/// Ranges are compared after rounding to 0.1 eV.
pub fn check_energy_ranges(sample: (f64, f64), source: (f64, f64)) -> Option<ConsistencyWarning> {
    if round1(sample.0) < round1(source.0) || round1(sample.1) > round1(source.1) {
        Some(ConsistencyWarning::EnergyRangeMismatch { sample, source })
    } else {
        None
    }
}


/// The ratio of the sample histogram to the source histogram.
#[derive(Clone, Debug, PartialEq)]
pub struct Transmittance {
    values: Vec<f64>,
    warnings: Vec<ConsistencyWarning>,
}

impl Transmittance {
    /// Divide `sample` by `source` bin by bin.
    ///
    /// A bin that is empty in both gets zero. A bin that is empty only in
    /// the source also gets zero, with a warning. Values above one are kept,
    /// and the worst of them is reported.
    pub fn compute(grid: &EnergyGrid, sample: &IntensityHistogram, source: &IntensityHistogram) -> Result<Self> {
        check_length("sample histogram", grid, sample.len())?;
        check_length("source histogram", grid, source.len())?;

        let mut values = Vec::with_capacity(grid.len());
        let mut warnings = Vec::new();
        let mut worst: Option<(f64, f64)> = None;

        for ((&e, &after), &before) in grid.energies().iter().zip(sample.values()).zip(source.values()) {
            let t = if before > 0. {
                after / before
            } else {
                if after > 0. {
                    warnings.push(ConsistencyWarning::EmptySourceBin { energy: e });
                }
                0.
            };

            if t > worst.map(|w| w.1).unwrap_or(f64::NEG_INFINITY) {
                worst = Some((e, t));
            }

            values.push(t);
        }

        if let Some((energy, value)) = worst {
            if value > 1. {
                warnings.push(ConsistencyWarning::TransmittanceAboveOne { energy, value });
            }
        }

        Ok(Transmittance { values, warnings })
    }

    /// Use known transmittance values directly.
    pub fn from_values(values: Vec<f64>) -> Self {
        Transmittance { values, warnings: Vec::new() }
    }

    /// The transmittance at each grid energy.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The problems noticed while dividing the histograms.
    pub fn warnings(&self) -> &[ConsistencyWarning] {
        &self.warnings
    }
}


/// The flux and power delivered to the sample.
#[derive(Clone, Debug, PartialEq)]
pub struct FluxResult {
    /// Total flux, in ph/s per 100 mA.
    pub total_flux: f64,

    /// Total power, in W per 100 mA.
    pub total_power: f64,

    /// Flux density at each grid energy, in ph/s/eV at the configured
    /// current.
    pub flux_per_energy: Vec<f64>,

    /// Power density at each grid energy, in W/eV at the configured
    /// current.
    pub power_per_energy: Vec<f64>,

    /// Data consistency problems found along the way.
    pub warnings: Vec<ConsistencyWarning>,
}


/// Integrates the beamline flux and power.
pub struct FluxAggregator<'a> {
    logger: &'a Logger,
}

impl<'a> FluxAggregator<'a> {
    /// Create an aggregator that logs to `logger`.
    pub fn new(logger: &'a Logger) -> Self {
        FluxAggregator { logger }
    }

    /// Combine everything. Without `vertical_acceptance`, every energy is
    /// fully accepted. `current` is the beam current, in A, that the
    /// spectrum was computed for.
    pub fn aggregate(&self, grid: &EnergyGrid, spectrum: &SourceSpectrum, transmittance: &Transmittance,
                     vertical_acceptance: Option<&[f64]>, current: f64) -> Result<FluxResult> {
        if !(current > 0.) || !current.is_finite() {
            return Err(FluxError::InvalidParameter {
                field: "current",
                requirement: "finite and positive",
                value: current,
            });
        }

        check_length("source spectrum", grid, spectrum.len())?;
        check_length("transmittance", grid, transmittance.values().len())?;

        if let Some(acc) = vertical_acceptance {
            check_length("vertical acceptance", grid, acc.len())?;
        }

        let energies = grid.energies();
        let mut flux_per_energy = Vec::with_capacity(grid.len());
        let mut power_per_energy = Vec::with_capacity(grid.len());

        for i in 0..grid.len() {
            let e = energies[i];
            let acc = vertical_acceptance.map(|a| a[i]).unwrap_or(1.);
            let f = spectrum.flux()[i] * (1000. / e) * transmittance.values()[i] * acc;
            flux_per_energy.push(f);
            power_per_energy.push(f * e * ELEMENTARY_CHARGE);
        }

        let scale = REFERENCE_CURRENT / current;
        let total_flux = simpson(&flux_per_energy, energies) * scale;
        let total_power = simpson(&power_per_energy, energies) * scale;

        for w in transmittance.warnings() {
            warn!(self.logger, "{}", w);
        }

        info!(self.logger, "integrated beamline flux";
              "flux_ph_s_100mA" => format!("{:.3e}", total_flux),
              "power_W_100mA" => format!("{:.3}", total_power),
        );

        Ok(FluxResult {
            total_flux,
            total_power,
            flux_per_energy,
            power_per_energy,
            warnings: transmittance.warnings().to_vec(),
        })
    }
}


#[cfg(test)]
mod tests {
    use crate::histogram::RayHistogramReducer;
    use crate::rays::{Population, Ray, RaySample};
    use super::*;

    fn log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    fn grid() -> EnergyGrid {
        EnergyGrid::linspace(1000., 2000., 11).unwrap()
    }

    #[test]
    fn flat_spectrum_totals() {
        let logger = log();
        let g = grid();
        let spec = SourceSpectrum::new(vec![1e12; 11]);
        let t = Transmittance::from_values(vec![1.; 11]);
        let r = FluxAggregator::new(&logger).aggregate(&g, &spec, &t, None, 0.1).unwrap();

        // ∫ 1e15 / E dE over [1000, 2000]
        assert_approx_eq!(r.total_flux / (1e15 * 2f64.ln()), 1., 1e-4);
        // Power density is flat: 1e15 e per eV.
        assert_approx_eq!(r.total_power / (1e15 * ELEMENTARY_CHARGE * 1000.), 1., 1e-12);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn current_normalization_is_exact() {
        let logger = log();
        let g = grid();
        let spec = SourceSpectrum::new((0..11).map(|i| 1e12 * (1. + i as f64)).collect());
        let t = Transmittance::from_values(vec![0.5; 11]);
        let acc = vec![0.25; 11];
        let agg = FluxAggregator::new(&logger);
        let at_100 = agg.aggregate(&g, &spec, &t, Some(&acc), 0.1).unwrap();
        let at_400 = agg.aggregate(&g, &spec, &t, Some(&acc), 0.4).unwrap();
        let raw = simpson(&at_100.flux_per_energy, g.energies());

        assert_eq!(at_100.total_flux, raw);
        assert_approx_eq!(at_400.total_flux, raw * 0.25, 1e-12 * raw);
        assert_approx_eq!(at_400.total_power * 4., at_100.total_power, 1e-12 * at_100.total_power);
        assert_approx_eq!(at_100.flux_per_energy[0], 1e12 * 0.125, 1.);
    }

    #[test]
    fn length_mismatch_rejected() {
        let logger = log();
        let g = grid();
        let spec = SourceSpectrum::new(vec![1.; 10]);
        let t = Transmittance::from_values(vec![1.; 11]);
        let e = FluxAggregator::new(&logger).aggregate(&g, &spec, &t, None, 0.1).unwrap_err();
        assert!(matches!(e, FluxError::LengthMismatch { expected: 11, actual: 10, .. }));
        assert!(FluxAggregator::new(&logger).aggregate(&g, &SourceSpectrum::new(vec![1.; 11]), &t, None, 0.).is_err());
    }

    #[test]
    fn transmittance_warnings() {
        let logger = log();
        let g = EnergyGrid::linspace(1000., 2000., 3).unwrap();
        let reducer = RayHistogramReducer::new(&logger);
        let sample = RaySample::new(vec![
            Ray::new(1000., 1., 0., 0.),
            Ray::new(1500., 2., 0., 0.),
            Ray::new(2000., 1., 0., 0.),
        ]);
        let source = RaySample::new(vec![
            Ray::new(1000., 4., 0., 0.),
            Ray::new(1500., 1., 0., 0.),
        ]);
        let hs = reducer.reduce(&sample, &g, Population::Sample).unwrap();
        let h0 = reducer.reduce(&source, &g, Population::Source).unwrap();
        let t = Transmittance::compute(&g, &hs, &h0).unwrap();

        assert_eq!(t.values(), &[0.25, 2., 0.]);
        assert_eq!(t.warnings(), &[
            ConsistencyWarning::EmptySourceBin { energy: 2000. },
            ConsistencyWarning::TransmittanceAboveOne { energy: 1500., value: 2. },
        ]);

        let spec = SourceSpectrum::new(vec![1.; 3]);
        let r = FluxAggregator::new(&logger).aggregate(&g, &spec, &t, None, 0.1).unwrap();
        assert_eq!(r.warnings.len(), 2);
    }

    #[test]
    fn range_check_rounds_to_tenths() {
        assert_eq!(check_energy_ranges((1000.02, 2000.), (1000., 2000.)), None);
        assert!(check_energy_ranges((999.9, 2000.), (1000., 2000.)).is_some());
        assert!(check_energy_ranges((1000., 2000.2), (1000., 2000.)).is_some());
        assert_eq!(check_energy_ranges((1100., 1900.), (1000., 2000.)), None);
    }
}
