// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Ray populations handed to us by a ray tracer.

A ray tracer produces a population of rays in front of the beamline (the
"source" population) and another at the observation point (the "sample"
population). We only need a handful of columns from each: photon energy,
intensity weight, the two divergence angles, and whether the ray survived.

*/

use std::io::BufRead;

use crate::error::{FluxError, Result};


/// One ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// Photon energy, in eV.
    pub energy: f64,

    /// Intensity weight.
    pub weight: f64,

    /// Horizontal divergence, in radians.
    pub x_divergence: f64,

    /// Vertical divergence, in radians.
    pub z_divergence: f64,

    /// Whether the ray was transmitted (false for lost rays).
    pub good: bool,
}

impl Ray {
    /// Create a good ray.
    pub fn new(energy: f64, weight: f64, x_divergence: f64, z_divergence: f64) -> Self {
        Ray { energy, weight, x_divergence, z_divergence, good: true }
    }

    /// Mark this ray as lost.
    pub fn lost(mut self) -> Self {
        self.good = false;
        self
    }

    /// Get the divergence along an axis.
    pub fn divergence(&self, axis: AngularAxis) -> f64 {
        match axis {
            AngularAxis::Horizontal => self.x_divergence,
            AngularAxis::Vertical => self.z_divergence,
        }
    }
}


/// Which divergence column to look at.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum AngularAxis {
    /// The horizontal divergence, x'.
    Horizontal,

    /// The vertical divergence, z'.
    Vertical,
}


/// Which of the two ray populations we're talking about.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Population {
    /// Rays as they leave the source, before the beamline.
    Source,

    /// Rays at the observation point, after the beamline.
    Sample,
}

impl Population {
    /// A lowercase name for messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Population::Source => "source",
            Population::Sample => "sample",
        }
    }
}


/// Ray bookkeeping reported alongside every result.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RayCounts {
    /// Number of rays, good or lost.
    pub total: usize,

    /// Number of good rays.
    pub good: usize,

    /// Number of lost rays.
    pub lost: usize,

    /// Summed weight of the good rays.
    pub intensity: f64,
}


/// An immutable population of rays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RaySample {
    rays: Vec<Ray>,
}

impl RaySample {
    /// Wrap up a list of rays.
    pub fn new(rays: Vec<Ray>) -> Self {
        RaySample { rays }
    }

    /// Read rays from whitespace-separated text columns.
    ///
    /// Each line holds `energy weight x' z'` and optionally a flag; a flag
    /// greater than zero marks a good ray and anything else a lost one.
    /// Without a flag, the ray is good. Blank lines and lines starting with
    /// `#` are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut rays = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut cols = Vec::with_capacity(5);

            for item in line.split_whitespace() {
                let v = item.parse::<f64>().map_err(|e| FluxError::RayParse {
                    line: i + 1,
                    message: format!("cannot parse \"{}\": {}", item, e),
                })?;
                cols.push(v);
            }

            if cols.len() != 4 && cols.len() != 5 {
                return Err(FluxError::RayParse {
                    line: i + 1,
                    message: format!("expected 4 or 5 columns, found {}", cols.len()),
                });
            }

            let mut ray = Ray::new(cols[0], cols[1], cols[2], cols[3]);

            if cols.len() == 5 && cols[4] <= 0. {
                ray = ray.lost();
            }

            rays.push(ray);
        }

        Ok(RaySample { rays })
    }

    /// All of the rays, good or lost.
    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    /// The number of rays, good or lost.
    pub fn len(&self) -> usize {
        self.rays.len()
    }

    /// Whether there are no rays at all.
    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }

    /// Iterate over the rays that were not lost.
    pub fn good_rays<'a>(&'a self) -> impl Iterator<Item = &'a Ray> + 'a {
        self.rays.iter().filter(|r| r.good)
    }

    /// Count the good and lost rays.
    pub fn counts(&self) -> RayCounts {
        let mut c = RayCounts { total: self.rays.len(), ..RayCounts::default() };

        for r in self.good_rays() {
            c.good += 1;
            c.intensity += r.weight;
        }

        c.lost = c.total - c.good;
        c
    }

    /// The smallest and largest photon energy among the good rays.
    pub fn energy_range(&self) -> Option<(f64, f64)> {
        min_max(self.good_rays().map(|r| r.energy))
    }

    /// Concatenate another population onto this one, as when results from
    /// successive traces are accumulated.
    pub fn merge(&self, other: &RaySample) -> RaySample {
        let mut rays = Vec::with_capacity(self.rays.len() + other.rays.len());
        rays.extend_from_slice(&self.rays);
        rays.extend_from_slice(&other.rays);
        RaySample { rays }
    }
}


/// Find the extremes of a sequence of numbers, or None if it is empty.
pub(crate) fn min_max<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
