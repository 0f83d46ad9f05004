// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! Run configuration.
//!
//! A `FluxConfig` holds every knob of a flux run. It is read from JSON;
//! missing fields take their defaults, so `{}` is a valid configuration
//! describing a 3 GeV, 3.2 T bending magnet.

use std::io::Read;
use serde::{Deserialize, Serialize};

use crate::SourceKind;
use crate::acceptance::AcceptanceWindow;
use crate::error::{FluxError, Result};
use crate::spectrum::{wiggler_field_from_k, wiggler_k_from_field};
use crate::undulator::{k_from_target_energy, target_energy_from_k, UndulatorSource};


/// Parameters of a flux run.
#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FluxConfig {
    /// The kind of source.
    pub source: SourceKind,

    /// Storage ring energy, in GeV.
    pub ring_energy: f64,

    /// Beam current, in A.
    pub current: f64,

    /// Bending magnet field, or wiggler peak field, in T.
    pub field: f64,

    /// Wiggler deflection parameter.
    pub wiggler_k: f64,

    /// Wiggler period, in m.
    pub wiggler_period: f64,

    /// Number of wiggler periods.
    pub wiggler_periods: u32,

    /// Undulator period, in m.
    pub undulator_period: f64,

    /// Undulator length, in m.
    pub undulator_length: f64,

    /// Undulator deflection parameter.
    pub undulator_k: f64,

    /// Photon energy the undulator is tuned to, in eV.
    pub target_energy: f64,

    /// The harmonic that is tuned to `target_energy`.
    pub target_harmonic: u32,

    /// Relative RMS energy spread of the electron beam.
    pub energy_spread: f64,

    /// Highest undulator harmonic to compute.
    pub max_harmonic: u32,

    /// Longitudinal and azimuthal precision factor of the radiation solver.
    pub solver_precision: f64,

    /// Horizontal RMS electron beam size, in mm.
    pub beam_size_x: f64,

    /// Vertical RMS electron beam size, in mm.
    pub beam_size_z: f64,

    /// Horizontal RMS electron beam divergence, in rad.
    pub beam_divergence_x: f64,

    /// Vertical RMS electron beam divergence, in rad.
    pub beam_divergence_z: f64,

    /// Whether to derive the acceptance windows from the source rays.
    pub auto_acceptance: bool,

    /// Threshold policy for automatic acceptance.
    pub acceptance_threshold: f64,

    /// Horizontal acceptance, used unless it is derived automatically.
    pub horizontal_window: AcceptanceWindow,

    /// Vertical acceptance, used unless it is derived automatically.
    pub vertical_window: AcceptanceWindow,

    /// Number of energy bins, and of divergence histogram bins.
    pub bins: usize,

    /// Whether to apply the vertical acceptance factor (bending magnets and
    /// wigglers only).
    pub vertical_acceptance: bool,

    /// RMS vertical divergence of the electron beam convolved into the
    /// vertical distribution, in rad. Zero disables the convolution.
    pub ebeam_vertical_sigma: f64,
}

impl Default for FluxConfig {
    fn default() -> Self {
        FluxConfig {
            source: SourceKind::BendingMagnet,
            ring_energy: 3.0,
            current: 0.1,
            field: 3.2,
            wiggler_k: 12.0,
            wiggler_period: 0.04,
            wiggler_periods: 20,
            undulator_period: 0.021,
            undulator_length: 2.4,
            undulator_k: 1.922968,
            target_energy: 10000.,
            target_harmonic: 7,
            energy_spread: 0.085e-2,
            max_harmonic: 9,
            solver_precision: 1.0,
            beam_size_x: 19.1e-3,
            beam_size_z: 2.0e-3,
            beam_divergence_x: 13.0e-6,
            beam_divergence_z: 1.3e-6,
            auto_acceptance: true,
            acceptance_threshold: 1.0,
            horizontal_window: AcceptanceWindow { minus: 5e-4, plus: 5e-4 },
            vertical_window: AcceptanceWindow { minus: 5e-4, plus: 5e-4 },
            bins: 101,
            vertical_acceptance: false,
            ebeam_vertical_sigma: 0.,
        }
    }
}


fn positive(field: &'static str, value: f64) -> Result<()> {
    if value > 0. && value.is_finite() {
        Ok(())
    } else {
        Err(FluxError::InvalidParameter { field, requirement: "finite and positive", value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<()> {
    if value >= 0. && value.is_finite() {
        Ok(())
    } else {
        Err(FluxError::InvalidParameter { field, requirement: "finite and non-negative", value })
    }
}

fn at_least_one(field: &'static str, value: u64) -> Result<()> {
    if value >= 1 {
        Ok(())
    } else {
        Err(FluxError::InvalidParameter { field, requirement: "a strictly positive integer", value: value as f64 })
    }
}


impl FluxConfig {
    /// Read a configuration from JSON and validate it.
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        let config: FluxConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every parameter the configured source needs is in its
    /// physical range.
    pub fn validate(&self) -> Result<()> {
        positive("ring_energy", self.ring_energy)?;
        positive("current", self.current)?;
        at_least_one("bins", self.bins as u64)?;
        positive("acceptance_threshold", self.acceptance_threshold)?;
        non_negative("horizontal_window.minus", self.horizontal_window.minus)?;
        non_negative("horizontal_window.plus", self.horizontal_window.plus)?;
        non_negative("vertical_window.minus", self.vertical_window.minus)?;
        non_negative("vertical_window.plus", self.vertical_window.plus)?;
        non_negative("ebeam_vertical_sigma", self.ebeam_vertical_sigma)?;

        match self.source {
            SourceKind::BendingMagnet => {
                positive("field", self.field)?;
            },
            SourceKind::Wiggler => {
                positive("field", self.field)?;
                at_least_one("wiggler_periods", self.wiggler_periods as u64)?;
            },
            SourceKind::Undulator => {
                positive("undulator_period", self.undulator_period)?;
                positive("undulator_length", self.undulator_length)?;
                positive("undulator_k", self.undulator_k)?;
                at_least_one("max_harmonic", self.max_harmonic as u64)?;
                positive("solver_precision", self.solver_precision)?;
                non_negative("energy_spread", self.energy_spread)?;
                non_negative("beam_size_x", self.beam_size_x)?;
                non_negative("beam_size_z", self.beam_size_z)?;
                non_negative("beam_divergence_x", self.beam_divergence_x)?;
                non_negative("beam_divergence_z", self.beam_divergence_z)?;
            },
        }

        Ok(())
    }

    /// Set the wiggler K and update the field to match.
    pub fn with_wiggler_k(mut self, k: f64) -> Self {
        self.wiggler_k = k;
        self.field = wiggler_field_from_k(k, self.wiggler_period);
        self
    }

    /// Set the wiggler field and update K to match.
    pub fn with_wiggler_field(mut self, field: f64) -> Self {
        self.field = field;
        self.wiggler_k = wiggler_k_from_field(field, self.wiggler_period);
        self
    }

    /// Tune the undulator: put `harmonic` at `energy` (eV) and update K to
    /// match.
    pub fn with_target_energy(mut self, energy: f64, harmonic: u32) -> Self {
        self.target_energy = energy;
        self.target_harmonic = harmonic;
        self.undulator_k = k_from_target_energy(energy, harmonic, self.ring_energy, self.undulator_period);
        self
    }

    /// Set the undulator K and update the target energy to match.
    pub fn with_undulator_k(mut self, k: f64) -> Self {
        self.undulator_k = k;
        self.target_energy = target_energy_from_k(k, self.target_harmonic, self.ring_energy, self.undulator_period);
        self
    }

    /// Describe the undulator and its beam in SI units.
    pub fn undulator_source(&self) -> UndulatorSource {
        UndulatorSource {
            ring_energy: self.ring_energy,
            current: self.current,
            period: self.undulator_period,
            length: self.undulator_length,
            k: self.undulator_k,
            energy_spread: self.energy_spread,
            size: (self.beam_size_x * 1e-3, self.beam_size_z * 1e-3),
            divergence: (self.beam_divergence_x, self.beam_divergence_z),
            max_harmonic: self.max_harmonic,
            precision: self.solver_precision,
        }
    }
}
