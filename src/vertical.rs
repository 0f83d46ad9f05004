// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! The vertical angular distribution of bending-magnet radiation.

At a given photon energy the flux per unit vertical angle `ψ` is

```text
dN/dψ ∝ y² (1 + γ²ψ²)² [K_2/3(G)² + γ²ψ² / (1 + γ²ψ²) · K_1/3(G)²]
G = (y / 2) (1 + γ²ψ²)^1.5
```

with `y = e / e_c`. We tabulate it on a fixed grid of `ψ`, normalize it to a
probability density, optionally convolve it with the Gaussian divergence of
the electron beam, and integrate it over the vertical acceptance window to
get the fraction of the flux the beamline collects.

The `ψ` grid spans ±2σ, where σ is a Gaussian-equivalent width estimated
at the *lowest* energy of the grid (the widest distribution), widened in
quadrature by the electron-beam divergence. All lookups on the grid are to
the nearest point; nothing is interpolated.

*/

use slog::Logger;
use std::f64::consts::PI;

use crate::{ELECTRON_REST_ENERGY_GEV, REFERENCE_CURRENT};
use crate::acceptance::AcceptanceWindow;
use crate::bessel::{bessel_k, bessel_k_integral};
use crate::error::{FluxError, Result};
use crate::histogram::EnergyGrid;
use crate::integrate::{simpson, IntegrationWorkspace};
use crate::spectrum::critical_energy;


/// The number of points in the vertical angle grid.
pub const VERTICAL_ANGLE_POINTS: usize = 1000;

/// Prefactor of the angular flux density, in ph/s/mrad²/0.1%bw per GeV²
/// per A.
const ANGULAR_FLUX_COEFFICIENT: f64 = 1.33e13;


/// Index of the first smallest element of `values`, or None if empty.
fn argmin<I: IntoIterator<Item = f64>>(values: I) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, b)) if !(v < b) => {},
            _ => best = Some((i, v)),
        }
    }

    best.map(|(i, _)| i)
}


/// Index of the grid point nearest to `target`.
fn nearest(grid: &[f64], target: f64) -> usize {
    argmin(grid.iter().map(|p| (p - target).abs())).unwrap_or(0)
}


/// Discrete convolution of two equal-length arrays, keeping the central
/// `a.len()` samples of the full result.
fn convolve_same(a: &[f64], v: &[f64]) -> Vec<f64> {
    let m = a.len();
    let n = v.len();

    if m == 0 || n == 0 {
        return Vec::new();
    }

    let offset = (n - 1) - n / 2;

    (0..m).map(|k| {
        let j = k + offset;
        let i_lo = j.saturating_sub(n - 1);
        let i_hi = j.min(m - 1);
        (i_lo..=i_hi).map(|i| a[i] * v[j - i]).sum()
    }).collect()
}


fn gaussian_pdf(x: f64, sigma: f64) -> f64 {
    (-x * x / (2. * sigma * sigma)).exp() / (2. * PI * sigma * sigma).sqrt()
}


/// The vertical angular densities over an energy grid and everything
/// derived from them.
#[derive(Clone, Debug, PartialEq)]
pub struct VerticalAcceptanceResult {
    psi: Vec<f64>,
    density: Vec<Vec<f64>>,
    acceptance: Vec<f64>,
    left_hwhm: Vec<f64>,
    right_hwhm: Vec<f64>,
}

impl VerticalAcceptanceResult {
    /// The vertical angle grid, in radians.
    pub fn psi(&self) -> &[f64] {
        &self.psi
    }

    /// The normalized density at each energy, sampled on `psi`.
    pub fn density(&self) -> &[Vec<f64>] {
        &self.density
    }

    /// The fraction of the flux inside the acceptance window, per energy.
    pub fn acceptance(&self) -> &[f64] {
        &self.acceptance
    }

    /// The angle left of the peak where the density is nearest half its
    /// maximum, per energy.
    pub fn left_hwhm(&self) -> &[f64] {
        &self.left_hwhm
    }

    /// The same, right of the peak.
    pub fn right_hwhm(&self) -> &[f64] {
        &self.right_hwhm
    }

    /// The full width at half maximum, per energy.
    pub fn fwhm(&self) -> Vec<f64> {
        self.right_hwhm.iter().zip(&self.left_hwhm).map(|(r, l)| r - l).collect()
    }
}


/// Computes vertical acceptance factors for a bending magnet or wiggler.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VerticalAcceptanceModel {
    ring_energy: f64,
    field: f64,
    beam_divergence: f64,
}

impl VerticalAcceptanceModel {
    /// Set up for a ring energy `ring_energy` (GeV) and a field `field`
    /// (T), with no electron-beam divergence.
    pub fn new(ring_energy: f64, field: f64) -> Self {
        VerticalAcceptanceModel { ring_energy, field, beam_divergence: 0. }
    }

    /// Set the RMS vertical divergence of the electron beam, in radians.
    /// Zero disables the convolution.
    pub fn beam_divergence(mut self, sigma: f64) -> Self {
        self.beam_divergence = sigma;
        self
    }

    fn gamma(&self) -> f64 {
        self.ring_energy / ELECTRON_REST_ENERGY_GEV
    }

    fn validate(&self) -> Result<()> {
        if !(self.ring_energy > 0.) || !self.ring_energy.is_finite() {
            return Err(FluxError::InvalidParameter {
                field: "ring energy",
                requirement: "finite and positive",
                value: self.ring_energy,
            });
        }

        if !(self.field > 0.) || !self.field.is_finite() {
            return Err(FluxError::InvalidParameter {
                field: "magnetic field",
                requirement: "finite and positive",
                value: self.field,
            });
        }

        if !(self.beam_divergence >= 0.) || !self.beam_divergence.is_finite() {
            return Err(FluxError::InvalidParameter {
                field: "electron beam vertical divergence",
                requirement: "finite and non-negative",
                value: self.beam_divergence,
            });
        }

        Ok(())
    }

    /// Estimate the Gaussian-equivalent natural opening angle at relative
    /// energy `y`.
    fn natural_sigma(&self, y: f64, ws: &mut IntegrationWorkspace) -> Result<f64> {
        let int_k53 = bessel_k_integral(5. / 3., y, ws)?;
        let k23 = bessel_k(2. / 3., 0.5 * y, ws)?;
        Ok((2. * PI / 3.).sqrt() / (self.gamma() * y) * int_k53 / (k23 * k23))
    }

    /// Tabulate the (unnormalized) natural density at relative energy `y`.
    fn natural_density(&self, y: f64, psi: &[f64], ws: &mut IntegrationWorkspace) -> Result<Vec<f64>> {
        let gamma = self.gamma();
        let prefactor = ANGULAR_FLUX_COEFFICIENT * self.ring_energy * self.ring_energy * REFERENCE_CURRENT * y * y;
        let mut density = Vec::with_capacity(psi.len());

        for &p in psi {
            let gp2 = gamma * gamma * p * p;
            let gamma_psi = 1. + gp2;
            let g = 0.5 * y * gamma_psi.powf(1.5);
            let k13 = bessel_k(1. / 3., g, ws)?;
            let k23 = bessel_k(2. / 3., g, ws)?;
            density.push(prefactor * gamma_psi * gamma_psi * (k23 * k23 + gp2 / gamma_psi * k13 * k13));
        }

        Ok(density)
    }

    /// Compute the angular densities and the acceptance factors over `grid`
    /// for the vertical `window`.
    pub fn compute(&self, grid: &EnergyGrid, window: &AcceptanceWindow, logger: &Logger) -> Result<VerticalAcceptanceResult> {
        self.validate()?;

        let e_c = critical_energy(self.ring_energy, self.field);
        let mut ws = IntegrationWorkspace::new(1000);

        let mut sigma = self.natural_sigma(grid.min() / e_c, &mut ws)?;

        if self.beam_divergence > 0. {
            sigma = (sigma * sigma + self.beam_divergence * self.beam_divergence).sqrt();
        }

        let n = VERTICAL_ANGLE_POINTS;
        let psi: Vec<f64> = (0..n).map(|i| -2. * sigma + 4. * sigma * i as f64 / (n - 1) as f64).collect();
        let i_minus = nearest(&psi, window.lower());
        let i_plus = nearest(&psi, window.upper());

        debug!(logger, "vertical angle grid";
               "sigma" => sigma,
               "beam_divergence" => self.beam_divergence,
               "i_minus" => i_minus,
               "i_plus" => i_plus,
        );

        let beam_kernel: Option<Vec<f64>> = if self.beam_divergence > 0. {
            Some(psi.iter().map(|&p| gaussian_pdf(p, self.beam_divergence)).collect())
        } else {
            None
        };

        let mut result = VerticalAcceptanceResult {
            psi: Vec::new(),
            density: Vec::with_capacity(grid.len()),
            acceptance: Vec::with_capacity(grid.len()),
            left_hwhm: Vec::with_capacity(grid.len()),
            right_hwhm: Vec::with_capacity(grid.len()),
        };

        for &energy in grid.energies() {
            let mut pdf = self.natural_density(energy / e_c, &psi, &mut ws)?;
            normalize(&mut pdf, &psi, energy)?;

            if let Some(ref kernel) = beam_kernel {
                pdf = convolve_same(&pdf, kernel);
                normalize(&mut pdf, &psi, energy)?;
            }

            let acceptance = simpson(&pdf[i_minus..=i_plus], &psi[i_minus..=i_plus]);

            let (peak_idx, peak) = pdf.iter()
                .cloned()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });
            let half = 0.5 * peak;
            let left = argmin(pdf[..peak_idx].iter().map(|v| (v - half).abs())).unwrap_or(0);
            let right = peak_idx + argmin(pdf[peak_idx..].iter().map(|v| (v - half).abs())).unwrap_or(0);

            trace!(logger, "vertical acceptance";
                   "energy" => energy,
                   "acceptance" => acceptance,
                   "lwhm" => psi[left],
                   "rwhm" => psi[right],
            );

            result.density.push(pdf);
            result.acceptance.push(acceptance);
            result.left_hwhm.push(psi[left]);
            result.right_hwhm.push(psi[right]);
        }

        result.psi = psi;
        Ok(result)
    }
}


/// Scale `pdf` to unit integral over `psi`.
fn normalize(pdf: &mut [f64], psi: &[f64], energy: f64) -> Result<()> {
    let norm = simpson(pdf, psi);

    if !(norm > 0.) || !norm.is_finite() {
        return Err(FluxError::DegenerateDensity { energy });
    }

    for v in pdf.iter_mut() {
        *v /= norm;
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    fn energies() -> EnergyGrid {
        EnergyGrid::linspace(1915.2, 5745.6, 2).unwrap()
    }

    #[test]
    fn convolution_matches_direct_definition() {
        let a = [1., 2., 3.];
        let v = [0., 1., 0.5];
        assert_eq!(convolve_same(&a, &v), vec![1., 2.5, 4.]);

        let a = [1., 2., 3., 4.];
        let v = [1., 0., 0., 0.];
        assert_eq!(convolve_same(&a, &v), vec![2., 3., 4., 0.]);
    }

    #[test]
    fn argmin_takes_first() {
        assert_eq!(argmin(vec![3., 1., 1., 2.]), Some(1));
        assert_eq!(argmin(Vec::new()), None);
    }

    #[test]
    fn acceptance_grows_with_window() {
        let logger = log();
        let model = VerticalAcceptanceModel::new(3., 3.2);
        let g = energies();
        let mut last = vec![0.; g.len()];

        for &half in &[2e-5, 5e-5, 1e-4, 2e-4, 4e-4] {
            let w = AcceptanceWindow::symmetric(half).unwrap();
            let r = model.compute(&g, &w, &logger).unwrap();

            for (a, prev) in r.acceptance().iter().zip(last.iter_mut()) {
                assert!(*a >= *prev);
                assert!(*a <= 1. + 1e-9);
                *prev = *a;
            }
        }
    }

    #[test]
    fn full_window_accepts_everything() {
        let logger = log();
        let w = AcceptanceWindow::symmetric(1.).unwrap();

        for &div in &[0., 2e-4] {
            let r = VerticalAcceptanceModel::new(3., 3.2)
                .beam_divergence(div)
                .compute(&energies(), &w, &logger)
                .unwrap();
            assert_eq!(r.psi().len(), VERTICAL_ANGLE_POINTS);
            assert_eq!(r.density().len(), 2);

            for a in r.acceptance() {
                assert_approx_eq!(*a, 1., 1e-12);
            }
        }
    }

    #[test]
    fn zero_divergence_is_unconvolved() {
        let logger = log();
        let model = VerticalAcceptanceModel::new(3., 3.2);
        let g = EnergyGrid::linspace(1915.2, 1915.2, 1).unwrap();
        let w = AcceptanceWindow::symmetric(1e-4).unwrap();
        let r = model.compute(&g, &w, &logger).unwrap();

        let mut ws = IntegrationWorkspace::new(1000);
        let psi = r.psi();
        let mut pdf = model.natural_density(1915.2 / critical_energy(3., 3.2), psi, &mut ws).unwrap();
        let norm = simpson(&pdf, psi);

        for v in pdf.iter_mut() {
            *v /= norm;
        }

        let im = nearest(psi, -1e-4);
        let ip = nearest(psi, 1e-4);
        assert_approx_eq!(r.acceptance()[0], simpson(&pdf[im..=ip], &psi[im..=ip]), 1e-12);
        assert_approx_eq!(r.density()[0][500], pdf[500], 1e-9 * pdf[500]);
    }

    #[test]
    fn natural_profile_is_symmetric() {
        let logger = log();
        let w = AcceptanceWindow::symmetric(1e-4).unwrap();
        let r = VerticalAcceptanceModel::new(3., 3.2).compute(&energies(), &w, &logger).unwrap();
        let step = r.psi()[1] - r.psi()[0];

        for (i, fwhm) in r.fwhm().iter().enumerate() {
            assert!(*fwhm > 0.);
            assert_approx_eq!(r.left_hwhm()[i], -r.right_hwhm()[i], 2. * step);
        }

        // Higher energies are more collimated.
        assert!(r.fwhm()[1] < r.fwhm()[0]);
    }

    #[test]
    fn beam_divergence_broadens() {
        let logger = log();
        let w = AcceptanceWindow::symmetric(1e-4).unwrap();
        let g = energies();
        let natural = VerticalAcceptanceModel::new(3., 3.2).compute(&g, &w, &logger).unwrap();
        let blurred = VerticalAcceptanceModel::new(3., 3.2)
            .beam_divergence(3e-4)
            .compute(&g, &w, &logger)
            .unwrap();

        for i in 0..g.len() {
            assert!(blurred.fwhm()[i] > natural.fwhm()[i]);
            assert!(blurred.acceptance()[i] < natural.acceptance()[i]);
        }
    }

    #[test]
    fn invalid_divergence() {
        let logger = log();
        let w = AcceptanceWindow::symmetric(1e-4).unwrap();
        let r = VerticalAcceptanceModel::new(3., 3.2)
            .beam_divergence(-1e-6)
            .compute(&energies(), &w, &logger);
        assert!(matches!(r, Err(FluxError::InvalidParameter { .. })));
    }
}
