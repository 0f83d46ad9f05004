// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Undulator sources.

We don't compute undulator spectra ourselves: that takes a full
electromagnetic radiation solver. This module defines the parameter shapes
such a solver expects, the `RadiationSolver` trait through which it is
called, and the adapter that turns run configuration into a solver request
and the solver's answer into a `SourceSpectrum`.

*/

use slog::Logger;
use std::f64::consts::PI;
use thiserror::Error;

use crate::{ELECTRON_MASS, ELECTRON_REST_ENERGY_GEV, ELEMENTARY_CHARGE, SPEED_OF_LIGHT};
use crate::acceptance::{round8, AcceptanceWindow};
use crate::error::{FluxError, Result};
use crate::histogram::EnergyGrid;
use crate::spectrum::{round6, SourceSpectrum};


/// `E_n [eV] = UNDULATOR_ENERGY_COEFFICIENT · n · E² / ((1 + K²/2) · λ_u)`.
const UNDULATOR_ENERGY_COEFFICIENT: f64 = 9.4963425587;

/// Distance of the observation plane from the source, in m.
pub const OBSERVATION_DISTANCE: f64 = 10.;


/// Ways an external radiation solver can fail.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolverError {
    /// The solver's integrals did not converge.
    #[error("solver did not converge: {0}")]
    NonConvergence(String),

    /// The solver rejected the geometry it was given.
    #[error("solver rejected the geometry: {0}")]
    InvalidGeometry(String),

    /// The solver returned fewer points than were requested.
    #[error("solver returned {actual} points, but {expected} were requested")]
    ShortOutput {
        /// The requested number of points.
        expected: usize,
        /// The number received.
        actual: usize,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}


/// Which transverse direction a field harmonic acts along.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldPlane {
    /// A horizontal field.
    Horizontal,

    /// A vertical field.
    Vertical,
}


/// One harmonic of a periodic magnetic field.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FieldHarmonic {
    /// Harmonic number.
    pub number: u32,

    /// The plane of the field.
    pub plane: FieldPlane,

    /// Peak field, in T.
    pub peak_field: f64,

    /// Initial phase, in radians.
    pub phase: f64,

    /// Symmetry with respect to the longitudinal center: +1 or -1.
    pub symmetry: i8,

    /// Coefficient of the transverse field dependence.
    pub transverse_coefficient: f64,
}


/// The periodic magnetic structure of an undulator.
#[derive(Clone, Debug, PartialEq)]
pub struct MagneticStructure {
    /// The field harmonics.
    pub harmonics: Vec<FieldHarmonic>,

    /// Period length, in m.
    pub period: f64,

    /// Number of periods.
    pub periods: u32,
}


/// Electron-beam statistics in the form radiation solvers consume.
#[derive(Clone, Debug, PartialEq)]
pub struct ElectronBeam {
    /// Average current, in A.
    pub current: f64,

    /// Lorentz factor.
    pub gamma: f64,

    /// Initial longitudinal position, in m.
    pub initial_z: f64,

    /// Second-order moments: `[0]` ⟨x²⟩, `[2]` ⟨x'²⟩, `[3]` ⟨z²⟩, `[5]` ⟨z'²⟩,
    /// `[10]` relative energy spread squared. Cross terms are zero.
    pub second_moments: [f64; 21],
}


/// The photon energies to compute.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnergyRange {
    /// First energy, in eV.
    pub start: f64,

    /// Last energy, in eV.
    pub end: f64,

    /// Number of points.
    pub points: usize,
}


/// The rectangular aperture over which flux is collected.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ObservationMesh {
    /// Longitudinal position of the aperture, in m.
    pub distance: f64,

    /// Horizontal start, in m.
    pub x_start: f64,

    /// Horizontal end, in m.
    pub x_end: f64,

    /// Vertical start, in m.
    pub z_start: f64,

    /// Vertical end, in m.
    pub z_end: f64,
}


/// Solver precision settings.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolverPrecision {
    /// First harmonic taken into account.
    pub initial_harmonic: u32,

    /// Last harmonic taken into account.
    pub final_harmonic: u32,

    /// Longitudinal integration precision factor (1 is standard).
    pub longitudinal: f64,

    /// Azimuthal integration precision factor (1 is standard).
    pub azimuthal: f64,
}


/// Everything a solver needs to compute a spectral flux.
#[derive(Clone, Debug, PartialEq)]
pub struct UndulatorRequest {
    /// The magnet.
    pub structure: MagneticStructure,

    /// The electron beam.
    pub beam: ElectronBeam,

    /// The photon energies.
    pub energies: EnergyRange,

    /// The collecting aperture.
    pub mesh: ObservationMesh,

    /// Precision settings.
    pub precision: SolverPrecision,
}


/// An external electromagnetic radiation solver.
///
/// Calls are synchronous and may take a long time.
pub trait RadiationSolver {
    /// Compute the spectral flux through the aperture, in ph/s/0.1%bw, at
    /// each of the requested energies.
    fn spectral_flux(&self, request: &UndulatorRequest) -> std::result::Result<Vec<f64>, SolverError>;
}


/// The peak field (T) of an undulator with deflection parameter `k` and
/// period `period` (m).
pub fn peak_field_from_k(k: f64, period: f64) -> f64 {
    2. * PI * ELECTRON_MASS * SPEED_OF_LIGHT * k / (ELEMENTARY_CHARGE * period)
}


/// The deflection parameter that puts harmonic `harmonic` at
/// `target_energy` (eV), for ring energy `ring_energy` (GeV) and period
/// `period` (m). Rounded to 6 decimals.
///
/// Returns NaN if the target is above what `K = 0` reaches.
pub fn k_from_target_energy(target_energy: f64, harmonic: u32, ring_energy: f64, period: f64) -> f64 {
    let e1 = target_energy / harmonic as f64;
    round6((2. * UNDULATOR_ENERGY_COEFFICIENT * ring_energy * ring_energy / (period * e1) - 2.).sqrt())
}


/// The energy (eV) of harmonic `harmonic` for deflection parameter `k`,
/// ring energy `ring_energy` (GeV) and period `period` (m). Rounded to 6
/// decimals.
pub fn target_energy_from_k(k: f64, harmonic: u32, ring_energy: f64, period: f64) -> f64 {
    round6(UNDULATOR_ENERGY_COEFFICIENT * harmonic as f64 * ring_energy * ring_energy /
           ((1. + 0.5 * k * k) * period))
}


/// Physical description of a planar undulator and its beam, from which an
/// `UndulatorRequest` is built.
#[derive(Clone, Debug, PartialEq)]
pub struct UndulatorSource {
    /// Ring energy, in GeV.
    pub ring_energy: f64,

    /// Beam current, in A.
    pub current: f64,

    /// Period length, in m.
    pub period: f64,

    /// Magnet length, in m.
    pub length: f64,

    /// Deflection parameter.
    pub k: f64,

    /// Relative RMS energy spread.
    pub energy_spread: f64,

    /// Horizontal and vertical RMS beam sizes, in m.
    pub size: (f64, f64),

    /// Horizontal and vertical RMS beam divergences, in rad.
    pub divergence: (f64, f64),

    /// Highest harmonic to compute.
    pub max_harmonic: u32,

    /// Longitudinal and azimuthal precision factor.
    pub precision: f64,
}

impl UndulatorSource {
    /// Build the solver request for the energies of `grid`, collecting
    /// through the given acceptance windows.
    pub fn request(&self, grid: &EnergyGrid, horizontal: &AcceptanceWindow,
                   vertical: &AcceptanceWindow) -> Result<UndulatorRequest> {
        for &(field, v) in &[("ring energy", self.ring_energy),
                             ("current", self.current),
                             ("undulator period", self.period),
                             ("undulator length", self.length),
                             ("undulator K", self.k)] {
            if !(v > 0.) || !v.is_finite() {
                return Err(FluxError::InvalidParameter { field, requirement: "finite and positive", value: v });
            }
        }

        let periods = (self.length / self.period).round();

        if periods < 1. {
            return Err(FluxError::InvalidParameter {
                field: "undulator length",
                requirement: "at least one period",
                value: self.length,
            });
        }

        let harmonic = |plane, peak_field| FieldHarmonic {
            number: 1,
            plane,
            peak_field,
            phase: 0.,
            symmetry: 1,
            transverse_coefficient: 1.,
        };

        let structure = MagneticStructure {
            harmonics: vec![
                harmonic(FieldPlane::Vertical, peak_field_from_k(self.k, self.period)),
                harmonic(FieldPlane::Horizontal, 0.),
            ],
            period: self.period,
            periods: periods as u32,
        };

        let mut second_moments = [0.; 21];
        second_moments[0] = self.size.0 * self.size.0;
        second_moments[2] = self.divergence.0 * self.divergence.0;
        second_moments[3] = self.size.1 * self.size.1;
        second_moments[5] = self.divergence.1 * self.divergence.1;
        second_moments[10] = self.energy_spread * self.energy_spread;

        let beam = ElectronBeam {
            current: self.current,
            gamma: self.ring_energy / ELECTRON_REST_ENERGY_GEV,
            initial_z: -(0.5 * self.length + 2. * self.period),
            second_moments,
        };

        let mesh = ObservationMesh {
            distance: OBSERVATION_DISTANCE,
            x_start: round8(-horizontal.minus * OBSERVATION_DISTANCE),
            x_end: round8(horizontal.plus * OBSERVATION_DISTANCE),
            z_start: round8(-vertical.minus * OBSERVATION_DISTANCE),
            z_end: round8(vertical.plus * OBSERVATION_DISTANCE),
        };

        Ok(UndulatorRequest {
            structure,
            beam,
            energies: EnergyRange { start: grid.min(), end: grid.max(), points: grid.len() },
            mesh,
            precision: SolverPrecision {
                initial_harmonic: 1,
                final_harmonic: self.max_harmonic,
                longitudinal: self.precision,
                azimuthal: self.precision,
            },
        })
    }
}


/// Calls a `RadiationSolver` and shapes its answer into a `SourceSpectrum`.
pub struct UndulatorSpectrumAdapter<'a, S: ?Sized + 'a> {
    solver: &'a S,
}

impl<'a, S: RadiationSolver + ?Sized + 'a> UndulatorSpectrumAdapter<'a, S> {
    /// Wrap a solver.
    pub fn new(solver: &'a S) -> Self {
        UndulatorSpectrumAdapter { solver }
    }

    /// Run the solver. Extra trailing points are dropped; missing ones are
    /// an error.
    pub fn spectrum(&self, request: &UndulatorRequest, logger: &Logger) -> Result<SourceSpectrum> {
        let expected = request.energies.points;

        info!(logger, "running undulator radiation solver";
              "period" => request.structure.period,
              "periods" => request.structure.periods,
              "gamma" => request.beam.gamma,
              "e_start" => request.energies.start,
              "e_end" => request.energies.end,
              "points" => expected,
              "max_harmonic" => request.precision.final_harmonic,
        );

        let mut flux = self.solver.spectral_flux(request)?;

        if flux.len() < expected {
            return Err(SolverError::ShortOutput { expected, actual: flux.len() }.into());
        }

        if flux.len() > expected {
            debug!(logger, "truncating solver output"; "received" => flux.len(), "kept" => expected);
            flux.truncate(expected);
        }

        Ok(SourceSpectrum::new(flux))
    }
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use super::*;

    fn log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    /// Returns a canned answer and remembers what it was asked.
    struct MockSolver {
        answer: std::result::Result<Vec<f64>, SolverError>,
        seen: RefCell<Option<UndulatorRequest>>,
    }

    impl RadiationSolver for MockSolver {
        fn spectral_flux(&self, request: &UndulatorRequest) -> std::result::Result<Vec<f64>, SolverError> {
            *self.seen.borrow_mut() = Some(request.clone());
            self.answer.clone()
        }
    }

    fn source() -> UndulatorSource {
        UndulatorSource {
            ring_energy: 3.,
            current: 0.1,
            period: 0.021,
            length: 2.4,
            k: 1.922968,
            energy_spread: 0.085e-2,
            size: (19.1e-6, 2.0e-6),
            divergence: (13e-6, 1.3e-6),
            max_harmonic: 9,
            precision: 1.,
        }
    }

    fn request() -> UndulatorRequest {
        let grid = EnergyGrid::linspace(9000., 11000., 5).unwrap();
        let h = AcceptanceWindow::new(2e-4, 3e-4).unwrap();
        let v = AcceptanceWindow::symmetric(5e-5).unwrap();
        source().request(&grid, &h, &v).unwrap()
    }

    #[test]
    fn conversions_round_trip() {
        let k = k_from_target_energy(10000., 7, 3., 0.021);
        assert_approx_eq!(k, 1.922968, 2e-6);
        assert_approx_eq!(target_energy_from_k(1.922968, 7, 3., 0.021), 10000., 1e-2);
        assert!(k_from_target_energy(1e9, 1, 3., 0.021).is_nan());
    }

    #[test]
    fn peak_field() {
        // B [T] ≈ K / (93.36 λ [m])
        assert_approx_eq!(peak_field_from_k(1., 0.02), 1. / (93.3729 * 0.02), 1e-4);
    }

    #[test]
    fn request_shape() {
        let r = request();
        assert_eq!(r.structure.periods, 114);
        assert_eq!(r.structure.harmonics.len(), 2);
        assert_eq!(r.structure.harmonics[0].plane, FieldPlane::Vertical);
        assert_eq!(r.structure.harmonics[1].peak_field, 0.);
        assert_approx_eq!(r.beam.initial_z, -1.242, 1e-12);
        assert_approx_eq!(r.beam.second_moments[0], 19.1e-6 * 19.1e-6, 1e-20);
        assert_approx_eq!(r.beam.second_moments[10], 0.085e-2 * 0.085e-2, 1e-20);
        assert_eq!(r.beam.second_moments[1], 0.);
        assert_eq!(r.mesh.x_start, -0.002);
        assert_eq!(r.mesh.x_end, 0.003);
        assert_eq!(r.mesh.z_start, -0.0005);
        assert_eq!(r.energies, EnergyRange { start: 9000., end: 11000., points: 5 });
        assert_eq!(r.precision.final_harmonic, 9);
    }

    #[test]
    fn bad_geometry_rejected() {
        let grid = EnergyGrid::linspace(9000., 11000., 5).unwrap();
        let w = AcceptanceWindow::symmetric(1e-4).unwrap();
        let mut s = source();
        s.length = 0.001;
        assert!(s.request(&grid, &w, &w).is_err());
    }

    #[test]
    fn output_is_normalized_to_request() {
        let logger = log();
        let r = request();

        let solver = MockSolver { answer: Ok(vec![1., 2., 3., 4., 5., 6., 7.]), seen: RefCell::new(None) };
        let s = UndulatorSpectrumAdapter::new(&solver).spectrum(&r, &logger).unwrap();
        assert_eq!(s.flux(), &[1., 2., 3., 4., 5.]);
        assert_eq!(solver.seen.borrow().as_ref(), Some(&r));

        let solver = MockSolver { answer: Ok(vec![1., 2.]), seen: RefCell::new(None) };
        let e = UndulatorSpectrumAdapter::new(&solver).spectrum(&r, &logger).unwrap_err();
        assert!(matches!(e, FluxError::Solver(SolverError::ShortOutput { expected: 5, actual: 2 })));
    }

    #[test]
    fn solver_failure_surfaces() {
        let logger = log();
        let solver = MockSolver {
            answer: Err(SolverError::NonConvergence("harmonic 9".to_owned())),
            seen: RefCell::new(None),
        };
        let e = UndulatorSpectrumAdapter::new(&solver).spectrum(&request(), &logger).unwrap_err();
        assert!(matches!(e, FluxError::Solver(SolverError::NonConvergence(_))));
    }
}
