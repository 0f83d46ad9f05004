// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Energy grids and intensity histograms.

The energy grid of a run is `linspace(min, max, N)` over the good sample
rays. Both ray populations are then binned into `N` uniform bins spanning
that same range so the two histograms can be divided point by point. Note
that the grid points are *not* the bin centers: grid point `i` and bin `i`
are simply paired up.

*/

use slog::Logger;

use crate::error::{FluxError, Result};
use crate::rays::{Population, RaySample};


/// An ordered grid of strictly increasing photon energies, in eV.
#[derive(Clone, Debug, PartialEq)]
pub struct EnergyGrid {
    energies: Vec<f64>,
}

impl EnergyGrid {
    /// Create `n` evenly spaced energies from `min` to `max` inclusive.
    ///
    /// A single-point grid may have `min == max`; any larger grid needs a
    /// non-empty range. Energies must be positive.
    pub fn linspace(min: f64, max: f64, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(FluxError::InvalidParameter {
                field: "bins",
                requirement: "a strictly positive integer",
                value: 0.,
            });
        }

        if !(min > 0.) || !min.is_finite() {
            return Err(FluxError::InvalidParameter {
                field: "minimum photon energy",
                requirement: "finite and positive",
                value: min,
            });
        }

        if !max.is_finite() || max < min || (n > 1 && max == min) {
            return Err(FluxError::DegenerateEnergyRange { min, max, bins: n });
        }

        let energies = if n == 1 {
            vec![min]
        } else {
            let step = (max - min) / (n - 1) as f64;
            let mut e: Vec<f64> = (0..n).map(|i| min + i as f64 * step).collect();
            e[n - 1] = max;
            e
        };

        Ok(EnergyGrid { energies })
    }

    /// Build the `n`-point grid spanning the energies of the good rays of a
    /// population.
    pub fn from_rays(rays: &RaySample, n: usize, population: Population) -> Result<Self> {
        let (min, max) = rays.energy_range()
            .ok_or(FluxError::EmptyInput { population: population.as_str() })?;
        EnergyGrid::linspace(min, max, n)
    }

    /// The energies, in eV.
    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    /// The number of grid points.
    pub fn len(&self) -> usize {
        self.energies.len()
    }

    /// Always false; grids have at least one point.
    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    /// The lowest energy.
    pub fn min(&self) -> f64 {
        self.energies[0]
    }

    /// The highest energy.
    pub fn max(&self) -> f64 {
        self.energies[self.energies.len() - 1]
    }
}


/// Sort weighted values into `n` uniform bins spanning `[lo, hi]`.
///
/// Every bin is half-open except the last, which includes `hi`. Values
/// outside the range are dropped. A zero-width range is widened to
/// `[lo - 0.5, hi + 0.5]`.
pub(crate) fn bin_values<I>(values: I, lo: f64, hi: f64, n: usize) -> Vec<f64>
    where I: IntoIterator<Item = (f64, f64)>
{
    let mut counts = vec![0_f64; n];

    if n == 0 {
        return counts;
    }

    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let norm = n as f64 / (hi - lo);
    let edge = |i: usize| lo + (hi - lo) * i as f64 / n as f64;

    for (v, w) in values {
        if !(v >= lo && v <= hi) {
            continue;
        }

        let mut idx = (((v - lo) * norm) as usize).min(n - 1);

        // The scaled index can be off by one right at a bin edge.
        if idx > 0 && v < edge(idx) {
            idx -= 1;
        } else if idx < n - 1 && v >= edge(idx + 1) {
            idx += 1;
        }

        counts[idx] += w;
    }

    counts
}


/// Summed ray intensity per energy bin, aligned with an `EnergyGrid`.
#[derive(Clone, Debug, PartialEq)]
pub struct IntensityHistogram {
    values: Vec<f64>,
}

impl IntensityHistogram {
    /// The per-bin intensities.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The number of bins.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no bins.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The intensity summed over all bins.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}


/// Reduces a ray population to an `IntensityHistogram`.
pub struct RayHistogramReducer<'a> {
    logger: &'a Logger,
}

impl<'a> RayHistogramReducer<'a> {
    /// Create a reducer that logs to `logger`.
    pub fn new(logger: &'a Logger) -> Self {
        RayHistogramReducer { logger }
    }

    /// Bin the good rays of `rays` that fall within the grid's energy
    /// range. Rays outside the range are discarded, not clipped; if no ray
    /// is left, that's an error.
    pub fn reduce(&self, rays: &RaySample, grid: &EnergyGrid, population: Population) -> Result<IntensityHistogram> {
        let (lo, hi) = (grid.min(), grid.max());

        let in_range: Vec<(f64, f64)> = rays.good_rays()
            .filter(|r| r.energy >= lo && r.energy <= hi)
            .map(|r| (r.energy, r.weight))
            .collect();
        let kept = in_range.len();

        if kept == 0 {
            return Err(FluxError::EmptyInput { population: population.as_str() });
        }

        let values = bin_values(in_range, lo, hi, grid.len());

        debug!(self.logger, "reduced ray population";
               "population" => population.as_str(),
               "rays" => rays.len(),
               "binned" => kept,
               "bins" => grid.len(),
               "e_min" => lo,
               "e_max" => hi,
        );

        Ok(IntensityHistogram { values })
    }
}


#[cfg(test)]
mod tests {
    use crate::rays::Ray;
    use super::*;

    fn log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    #[test]
    fn linspace_ends_exact() {
        let g = EnergyGrid::linspace(100., 10000., 101).unwrap();
        assert_eq!(g.len(), 101);
        assert_eq!(g.min(), 100.);
        assert_eq!(g.max(), 10000.);
        assert_approx_eq!(g.energies()[1], 199.);
    }

    #[test]
    fn linspace_validation() {
        assert!(EnergyGrid::linspace(100., 200., 0).is_err());
        assert!(EnergyGrid::linspace(0., 200., 10).is_err());
        assert!(matches!(EnergyGrid::linspace(150., 150., 10),
                         Err(FluxError::DegenerateEnergyRange { .. })));
        assert_eq!(EnergyGrid::linspace(150., 150., 1).unwrap().energies(), &[150.]);
    }

    #[test]
    fn binning_edges() {
        // Four bins over [0, 4]: edges at 0, 1, 2, 3, 4. The top edge
        // belongs to the last bin.
        let v = vec![(0., 1.), (1., 1.), (0.999, 1.), (4., 1.), (3.5, 2.), (4.5, 7.), (-0.1, 7.)];
        assert_eq!(bin_values(v, 0., 4., 4), vec![2., 1., 0., 3.]);
    }

    #[test]
    fn binning_zero_width() {
        assert_eq!(bin_values(vec![(2., 1.), (2., 2.)], 2., 2., 3), vec![0., 3., 0.]);
    }

    #[test]
    fn reduce_conserves_in_range_intensity() {
        let logger = log();
        let rays = RaySample::new(vec![
            Ray::new(1000., 0.5, 0., 0.),
            Ray::new(1200., 1.0, 0., 0.),
            Ray::new(1700., 2.0, 0., 0.),
            Ray::new(2000., 0.25, 0., 0.),
            Ray::new(1500., 9.0, 0., 0.).lost(),
            Ray::new(2500., 4.0, 0., 0.),
        ]);
        let grid = EnergyGrid::linspace(1000., 2000., 5).unwrap();
        let h = RayHistogramReducer::new(&logger).reduce(&rays, &grid, Population::Source).unwrap();
        assert_eq!(h.len(), 5);
        assert_approx_eq!(h.total(), 3.75);
        // 1200 eV sits on the lower edge of the second bin.
        assert_eq!(h.values(), &[0.5, 1.0, 0., 2.0, 0.25]);
    }

    #[test]
    fn reduce_empty_is_error() {
        let logger = log();
        let rays = RaySample::new(vec![Ray::new(5000., 1., 0., 0.)]);
        let grid = EnergyGrid::linspace(1000., 2000., 5).unwrap();
        let e = RayHistogramReducer::new(&logger).reduce(&rays, &grid, Population::Source).unwrap_err();
        assert!(matches!(e, FluxError::EmptyInput { population: "source" }));
    }
}
