// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Angular acceptance windows.

An acceptance window is the range of divergence angles, on each side of the
optical axis, that the beamline collects. It can be given by hand or
estimated from the divergence distribution of the source rays.

The estimator's `threshold` selects a policy:

- `threshold == 1`: the window is exactly the range of the divergence column.
- `threshold > 1`: that range is scaled outward by `threshold`. All of the
  intensity is still reported as included.
- `threshold < 1`: the divergences are histogrammed (ray counts, not
  weights), and bins are trimmed symmetrically from both ends until the
  Simpson integral of the remaining counts drops to `threshold` times the
  total ray intensity. The first trim depth that satisfies this bound wins,
  so the window is the widest one that does.

*/

use slog::Logger;
use serde::{Deserialize, Serialize};

use crate::error::{FluxError, Result};
use crate::histogram::bin_values;
use crate::integrate::simpson_dx;
use crate::rays::{min_max, AngularAxis, Population, RaySample};


/// Round to the 8-decimal precision used to report acceptance limits.
pub(crate) fn round8(x: f64) -> f64 {
    (x * 1e8).round() / 1e8
}


/// The angular half-widths collected on each side of the optical axis.
///
/// Both values are magnitudes, in radians.
#[derive(Copy, Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AcceptanceWindow {
    /// The half-width on the negative side.
    pub minus: f64,

    /// The half-width on the positive side.
    pub plus: f64,
}

impl AcceptanceWindow {
    /// Create a window from two non-negative half-widths.
    pub fn new(minus: f64, plus: f64) -> Result<Self> {
        for &(field, v) in &[("window minus", minus), ("window plus", plus)] {
            if !(v >= 0.) || !v.is_finite() {
                return Err(FluxError::InvalidParameter {
                    field,
                    requirement: "a finite, non-negative angle",
                    value: v,
                });
            }
        }

        Ok(AcceptanceWindow { minus, plus })
    }

    /// A window that extends `half_width` to either side.
    pub fn symmetric(half_width: f64) -> Result<Self> {
        AcceptanceWindow::new(half_width, half_width)
    }

    /// Make a window from signed angular limits, such as an
    /// `AcceptanceEstimate` reports, by taking their magnitudes.
    pub fn from_limits(lower: f64, upper: f64) -> Self {
        AcceptanceWindow { minus: lower.abs(), plus: upper.abs() }
    }

    /// The signed lower limit, `-minus`.
    pub fn lower(&self) -> f64 {
        -self.minus
    }

    /// The signed upper limit, `plus`.
    pub fn upper(&self) -> f64 {
        self.plus
    }

    /// The full angular width, in milliradians.
    pub fn width_mrad(&self) -> f64 {
        (self.minus + self.plus) * 1e3
    }
}


/// The outcome of estimating an acceptance window from a ray population.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AcceptanceEstimate {
    /// The signed lower angular limit, in radians, rounded to 8 decimals.
    pub limit_minus: f64,

    /// The signed upper angular limit, in radians, rounded to 8 decimals.
    pub limit_plus: f64,

    /// The intensity counted as falling within the limits.
    pub included_intensity: f64,

    /// The total weighted intensity of the population.
    pub total_intensity: f64,

    /// `included_intensity / total_intensity`.
    pub fraction: f64,
}

impl AcceptanceEstimate {
    /// Convert the signed limits into a window of magnitudes.
    pub fn window(&self) -> AcceptanceWindow {
        AcceptanceWindow::from_limits(self.limit_minus, self.limit_plus)
    }
}


/// Derives acceptance windows from the divergence distribution of rays.
pub struct DivergenceAcceptanceEstimator<'a> {
    logger: &'a Logger,
    bins: usize,
}

impl<'a> DivergenceAcceptanceEstimator<'a> {
    /// Create an estimator that histograms divergences into `bins` bins.
    pub fn new(logger: &'a Logger, bins: usize) -> Self {
        DivergenceAcceptanceEstimator { logger, bins }
    }

    /// Estimate the acceptance along `axis` from the good rays of `rays`.
    pub fn estimate(&self, rays: &RaySample, axis: AngularAxis, threshold: f64) -> Result<AcceptanceEstimate> {
        if self.bins == 0 {
            return Err(FluxError::InvalidParameter {
                field: "bins",
                requirement: "a strictly positive integer",
                value: 0.,
            });
        }

        if !(threshold > 0.) || !threshold.is_finite() {
            return Err(FluxError::InvalidParameter {
                field: "acceptance threshold",
                requirement: "finite and positive",
                value: threshold,
            });
        }

        let (lo, hi) = min_max(rays.good_rays().map(|r| r.divergence(axis)))
            .ok_or(FluxError::EmptyInput { population: Population::Source.as_str() })?;
        let intensity: f64 = rays.good_rays().map(|r| r.weight).sum();

        let (limit_minus, limit_plus, included) = if threshold == 1. {
            (lo, hi, intensity)
        } else if threshold > 1. {
            (lo * threshold, hi * threshold, intensity)
        } else {
            self.trim(rays, axis, lo, hi, threshold, intensity)?
        };

        let est = AcceptanceEstimate {
            limit_minus: round8(limit_minus),
            limit_plus: round8(limit_plus),
            included_intensity: included,
            total_intensity: intensity,
            fraction: included / intensity,
        };

        debug!(self.logger, "estimated divergence acceptance";
               "axis" => ?axis,
               "threshold" => threshold,
               "limit_minus" => est.limit_minus,
               "limit_plus" => est.limit_plus,
               "fraction" => est.fraction,
        );

        Ok(est)
    }

    /// The `threshold < 1` policy: trim histogram bins symmetrically until
    /// the remaining integral is small enough.
    fn trim(&self, rays: &RaySample, axis: AngularAxis, lo: f64, hi: f64,
            threshold: f64, intensity: f64) -> Result<(f64, f64, f64)> {
        let n = self.bins;
        let counts = bin_values(rays.good_rays().map(|r| (r.divergence(axis), 1.)), lo, hi, n);
        let angle = |i: usize| if n == 1 { lo } else { lo + (hi - lo) * i as f64 / (n - 1) as f64 };
        let target = threshold * intensity;

        for i in 0..(n / 2).max(1) {
            let integral = simpson_dx(&counts[i..n - i], 1.);

            trace!(self.logger, "trimming divergence histogram";
                   "i" => i, "integral" => integral, "target" => target);

            if integral <= target {
                return Ok((angle(i), angle(n - 1 - i), integral));
            }
        }

        Err(FluxError::AcceptanceNotConverged { threshold, bins: n })
    }
}
