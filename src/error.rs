// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! Errors and warnings.
//!
//! Input errors and numeric errors abort a run and surface as `FluxError`.
//! Consistency problems in the ray data don't: the run finishes and its
//! result carries a list of `ConsistencyWarning`s for the caller to judge.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::integrate::IntegrationError;
use crate::undulator::SolverError;


/// Everything that can go wrong while computing a flux.
#[derive(Debug, Error)]
pub enum FluxError {
    /// No good ray survived filtering.
    #[error("the {population} ray population has no usable rays")]
    EmptyInput {
        /// Which population was empty.
        population: &'static str,
    },

    /// A configuration or call parameter is out of its physical range.
    #[error("parameter '{field}' must be {requirement}, got {value}")]
    InvalidParameter {
        /// The name of the parameter.
        field: &'static str,
        /// What it should have been.
        requirement: &'static str,
        /// What it was.
        value: f64,
    },

    /// An energy grid with several points was requested over an empty range.
    #[error("cannot build a {bins}-point energy grid over [{min}, {max}] eV")]
    DegenerateEnergyRange {
        /// Lower end of the range.
        min: f64,
        /// Upper end of the range.
        max: f64,
        /// Requested number of points.
        bins: usize,
    },

    /// Two arrays that must be aligned are not.
    #[error("{what} has {actual} points but the energy grid has {expected}")]
    LengthMismatch {
        /// Which array.
        what: &'static str,
        /// The grid length.
        expected: usize,
        /// The array length.
        actual: usize,
    },

    /// The iterative trimming of a divergence histogram never got below the
    /// requested intensity fraction.
    #[error("divergence acceptance did not converge for threshold {threshold} with {bins} bins")]
    AcceptanceNotConverged {
        /// The requested threshold.
        threshold: f64,
        /// The histogram bin count.
        bins: usize,
    },

    /// A normalized angular density could not be formed at some energy.
    #[error("vertical angular density at {energy} eV cannot be normalized")]
    DegenerateDensity {
        /// The photon energy, in eV.
        energy: f64,
    },

    /// A special-function integral failed.
    #[error("numerical integration failed: {0}")]
    Integration(#[from] IntegrationError),

    /// The external radiation solver failed.
    #[error("radiation solver failed: {0}")]
    Solver(#[from] SolverError),

    /// An undulator spectrum was requested but no solver is available.
    #[error("undulator sources need an external radiation solver, and none was provided")]
    NoSolver,

    /// A line of ray data could not be parsed.
    #[error("ray data line {line}: {message}")]
    RayParse {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// A configuration document could not be decoded.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// I/O failure while reading inputs.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}


/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, FluxError>;


/// A problem with the input data that doesn't stop a run.
///
/// All of these point at an upstream data-collection issue, typically a
/// source ray dump that is out of date with respect to the sample rays.
#[derive(Clone, Debug, PartialEq)]
pub enum ConsistencyWarning {
    /// The sample histogram exceeds the source histogram at some energy.
    TransmittanceAboveOne {
        /// The energy of the worst bin, in eV.
        energy: f64,
        /// The largest transmittance found.
        value: f64,
    },

    /// A source histogram bin is empty where the sample one is not, so the
    /// transmittance there is unbounded. The bin contributes zero.
    EmptySourceBin {
        /// The energy of the bin, in eV.
        energy: f64,
    },

    /// The sample population reaches outside the energy range of the source
    /// population (compared at 0.1 eV resolution).
    EnergyRangeMismatch {
        /// Sample energy range, in eV.
        sample: (f64, f64),
        /// Source energy range, in eV.
        source: (f64, f64),
    },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConsistencyWarning::TransmittanceAboveOne { energy, value } => {
                write!(f, "beamline transmittance is greater than one ({:.4} at {:.3} eV); \
                           the source rays may be stale", value, energy)
            },
            ConsistencyWarning::EmptySourceBin { energy } => {
                write!(f, "no source intensity at {:.3} eV although sample rays arrive there", energy)
            },
            ConsistencyWarning::EnergyRangeMismatch { sample, source } => {
                write!(f, "sample energy range [{:.1}, {:.1}] eV exceeds source range [{:.1}, {:.1}] eV",
                       sample.0, sample.1, source.0, source.1)
            },
        }
    }
}
