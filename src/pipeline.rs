// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the GPL version 3.

/*! Running the whole computation.

A run goes: bin both ray populations on the sample's energy grid, divide
them into a transmittance, settle the acceptance windows, compute the
source spectrum, optionally compute the vertical acceptance, and integrate.
Everything a run produces is collected into one immutable `FluxRun`.

`FluxEngine` keeps the most recent successful run. A new run is computed
from scratch and only replaces the stored one once it has fully succeeded,
so readers never see a half-updated result and a failed run leaves the
previous one in place.

*/

use slog::Logger;
use std::sync::{Arc, RwLock};

use crate::SourceKind;
use crate::acceptance::{AcceptanceEstimate, AcceptanceWindow, DivergenceAcceptanceEstimator};
use crate::config::FluxConfig;
use crate::error::{ConsistencyWarning, FluxError, Result};
use crate::flux::{check_energy_ranges, FluxAggregator, FluxResult, Transmittance};
use crate::histogram::{EnergyGrid, IntensityHistogram, RayHistogramReducer};
use crate::rays::{AngularAxis, Population, RayCounts, RaySample};
use crate::spectrum::{BendingMagnetSpectrumModel, SourceSpectrum, SpectrumModel};
use crate::undulator::{RadiationSolver, UndulatorSpectrumAdapter};
use crate::vertical::{VerticalAcceptanceModel, VerticalAcceptanceResult};


/// Everything computed in one run.
#[derive(Clone, Debug)]
pub struct FluxRun {
    /// The configuration the run used.
    pub config: FluxConfig,

    /// The energy grid.
    pub grid: EnergyGrid,

    /// Intensity histogram of the sample population.
    pub sample_histogram: IntensityHistogram,

    /// Intensity histogram of the source population, over the same bins.
    pub source_histogram: IntensityHistogram,

    /// The beamline transmittance.
    pub transmittance: Transmittance,

    /// The horizontal acceptance used.
    pub horizontal_window: AcceptanceWindow,

    /// The vertical acceptance used.
    pub vertical_window: AcceptanceWindow,

    /// The horizontal estimate, if the window was derived from the rays.
    pub horizontal_estimate: Option<AcceptanceEstimate>,

    /// The vertical estimate, if the window was derived from the rays.
    pub vertical_estimate: Option<AcceptanceEstimate>,

    /// The source spectrum.
    pub spectrum: SourceSpectrum,

    /// The vertical angular distributions, if they were requested.
    pub vertical: Option<VerticalAcceptanceResult>,

    /// Flux and power at the sample.
    pub flux: FluxResult,

    /// Ray bookkeeping for the source population.
    pub source_counts: RayCounts,

    /// Ray bookkeeping for the sample population.
    pub sample_counts: RayCounts,
}

impl FluxRun {
    /// Total flux, in ph/s per 100 mA.
    pub fn total_flux(&self) -> f64 {
        self.flux.total_flux
    }

    /// Total power, in W per 100 mA.
    pub fn total_power(&self) -> f64 {
        self.flux.total_power
    }

    /// Everything suspicious about the inputs.
    pub fn warnings(&self) -> &[ConsistencyWarning] {
        &self.flux.warnings
    }
}


/// Runs flux computations and keeps the latest successful result.
pub struct FluxEngine {
    logger: Logger,
    solver: Option<Box<dyn RadiationSolver + Send + Sync>>,
    latest: RwLock<Option<Arc<FluxRun>>>,
}

impl FluxEngine {
    /// Create an engine without an undulator solver.
    pub fn new(logger: Logger) -> Self {
        FluxEngine {
            logger,
            solver: None,
            latest: RwLock::new(None),
        }
    }

    /// Provide the radiation solver used for undulator sources.
    pub fn with_solver<S: RadiationSolver + Send + Sync + 'static>(mut self, solver: S) -> Self {
        self.solver = Some(Box::new(solver));
        self
    }

    /// The result of the most recent successful run.
    pub fn latest(&self) -> Option<Arc<FluxRun>> {
        match self.latest.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Compute a run and make it the latest one.
    pub fn run(&self, config: &FluxConfig, source: &RaySample, sample: &RaySample) -> Result<Arc<FluxRun>> {
        let run = Arc::new(self.compute(config, source, sample)?);

        match self.latest.write() {
            Ok(mut guard) => *guard = Some(run.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(run.clone()),
        }

        Ok(run)
    }

    /// Compute a run without touching the stored result.
    pub fn compute(&self, config: &FluxConfig, source: &RaySample, sample: &RaySample) -> Result<FluxRun> {
        config.validate()?;

        let logger = &self.logger;
        let grid = EnergyGrid::from_rays(sample, config.bins, Population::Sample)?;

        let reducer = RayHistogramReducer::new(logger);
        let sample_histogram = reducer.reduce(sample, &grid, Population::Sample)?;
        let source_histogram = reducer.reduce(source, &grid, Population::Source)?;
        let transmittance = Transmittance::compute(&grid, &sample_histogram, &source_histogram)?;

        let range_warning = match (sample.energy_range(), source.energy_range()) {
            (Some(s), Some(s0)) => check_energy_ranges(s, s0),
            _ => None,
        };

        let (horizontal_estimate, vertical_estimate) = if config.auto_acceptance {
            let estimator = DivergenceAcceptanceEstimator::new(logger, config.bins);
            let h = estimator.estimate(source, AngularAxis::Horizontal, config.acceptance_threshold)?;
            let v = estimator.estimate(source, AngularAxis::Vertical, config.acceptance_threshold)?;
            (Some(h), Some(v))
        } else {
            (None, None)
        };

        let horizontal_window = horizontal_estimate.map(|e| e.window()).unwrap_or(config.horizontal_window);
        let vertical_window = vertical_estimate.map(|e| e.window()).unwrap_or(config.vertical_window);

        info!(logger, "source acceptance limits";
              "-x" => -horizontal_window.minus,
              "+x" => horizontal_window.plus,
              "-z" => -vertical_window.minus,
              "+z" => vertical_window.plus,
              "auto" => config.auto_acceptance,
        );

        let spectrum = self.spectrum(config, &grid, &horizontal_window, &vertical_window)?;

        let vertical = if config.vertical_acceptance && config.source != SourceKind::Undulator {
            let model = VerticalAcceptanceModel::new(config.ring_energy, config.field)
                .beam_divergence(config.ebeam_vertical_sigma);
            Some(model.compute(&grid, &vertical_window, logger)?)
        } else {
            None
        };

        let mut flux = FluxAggregator::new(logger).aggregate(
            &grid,
            &spectrum,
            &transmittance,
            vertical.as_ref().map(|v| v.acceptance()),
            config.current,
        )?;

        if let Some(w) = range_warning {
            warn!(logger, "{}", w);
            flux.warnings.push(w);
        }

        Ok(FluxRun {
            config: config.clone(),
            grid,
            sample_histogram,
            source_histogram,
            transmittance,
            horizontal_window,
            vertical_window,
            horizontal_estimate,
            vertical_estimate,
            spectrum,
            vertical,
            flux,
            source_counts: source.counts(),
            sample_counts: sample.counts(),
        })
    }

    fn spectrum(&self, config: &FluxConfig, grid: &EnergyGrid, horizontal: &AcceptanceWindow,
                vertical: &AcceptanceWindow) -> Result<SourceSpectrum> {
        let logger = &self.logger;
        let magnet = BendingMagnetSpectrumModel::new(config.ring_energy, config.current, config.field)
            .horizontal_acceptance(horizontal.width_mrad());

        match config.source {
            SourceKind::BendingMagnet => {
                info!(logger, "bending magnet source";
                      "E_GeV" => config.ring_energy, "I_A" => config.current, "B_T" => config.field);
                magnet.spectrum(grid, logger)
            },
            SourceKind::Wiggler => {
                info!(logger, "wiggler source";
                      "E_GeV" => config.ring_energy, "I_A" => config.current, "B_T" => config.field,
                      "periods" => config.wiggler_periods);
                magnet.wiggler(config.wiggler_periods).spectrum(grid, logger)
            },
            SourceKind::Undulator => {
                let solver = self.solver.as_ref().ok_or(FluxError::NoSolver)?;
                let request = config.undulator_source().request(grid, horizontal, vertical)?;
                UndulatorSpectrumAdapter::new(&**solver).spectrum(&request, logger)
            },
        }
    }
}
