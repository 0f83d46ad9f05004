// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

//! A tiny helper for testing convenience.

#[macro_use] extern crate slog;

use slog::Drain;
use std::f64::consts::PI;

/// Create a simple `slog` logger for use in test programs.
///
/// It logs to the terminal using default parameters, as per the `slog` basic
/// example. This just saves us ~8 lines of boilerplate in all of our
/// test/demo programs.
pub fn default_log() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain)
        .overflow_strategy(slog_async::OverflowStrategy::Block)
        .build().fuse();
    slog::Logger::root(drain, o!())
}


/// A logger that throws everything away, for tests that don't care.
pub fn quiet_log() -> slog::Logger {
    slog::Logger::root(slog::Discard, o!())
}


/// A simple utility for sampling random numbers.
///
/// The distribution can be uniform or log-uniform.
pub struct Sampler {
    is_log: bool,
    low: f64,
    range: f64
}

impl Sampler {
    /// Create a new Sampler.
    pub fn new(is_log: bool, mut low: f64, mut high: f64) -> Self {
        if low > high {
            std::mem::swap(&mut low, &mut high);
        }

        if is_log {
            low = low.ln();
            high = high.ln();
        }

        Sampler { is_log, low, range: high - low }
    }

    /// Sample a number from the distribution.
    pub fn get(&self) -> f64 {
        let n = self.low + rand::random::<f64>() * self.range;

        if self.is_log {
            n.exp()
        } else {
            n
        }
    }
}


/// Sample numbers from a normal distribution with the Box-Muller transform.
///
/// Ray-tracing sources emit Gaussian angular distributions, so this is what
/// we use to fake up divergence columns.
pub struct GaussianSampler {
    mean: f64,
    sigma: f64,
}

impl GaussianSampler {
    /// Create a new sampler with the given mean and standard deviation.
    pub fn new(mean: f64, sigma: f64) -> Self {
        GaussianSampler { mean, sigma: sigma.abs() }
    }

    /// Sample a number from the distribution.
    pub fn get(&self) -> f64 {
        // `1 - random()` lies in (0, 1], so the log is finite.
        let u1 = 1. - rand::random::<f64>();
        let u2 = rand::random::<f64>();
        let z = (-2. * u1.ln()).sqrt() * (2. * PI * u2).cos();
        self.mean + self.sigma * z
    }
}
