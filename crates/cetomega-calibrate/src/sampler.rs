//! Random-walk Metropolis sampler.
//!
//! Each step perturbs every free parameter with independent zero-mean Gaussian
//! noise, evaluates the log-posterior at the proposal and accepts it with
//! probability $\min(1, p(\theta') / p(\theta))$. The state after every step
//! is recorded, whether or not the proposal was accepted.
//!
//! A run is driven by a single seeded [`ChaCha8Rng`]. Per step the generator
//! is consumed in a fixed order (one standard normal per parameter in chain
//! order, then one uniform), so the same seed and data reproduce the chain
//! exactly. Independent chains can be run in parallel with
//! [`MetropolisSampler::run_chains`], each with its own generator.

use crate::chain::Chain;
use crate::posterior::LogPosterior;
use crate::priors::{FreeParameter, FreeParameters, PriorBounds, ProposalScale, N_FREE};
use crate::{Error, Result};
use cetomega_core::FloatValue;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Information about sampling progress.
///
/// Passed to progress callbacks after every step.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Number of completed steps
    pub step: usize,

    /// Total number of requested steps
    pub total: usize,

    /// Fraction of accepted proposals so far
    pub acceptance_rate: f64,

    /// Log-posterior of the current state
    pub current_log_posterior: FloatValue,
}

/// Sampler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of steps in the chain.
    ///
    /// Default: 20000
    pub n_steps: usize,

    /// Number of leading steps that consumers discard.
    ///
    /// The sampler still records them. Default: 5000
    pub burn_in: usize,

    /// Default: 42
    pub seed: u64,

    /// Log progress every this many steps. Zero disables progress logging.
    ///
    /// Default: 1000
    pub progress_every: usize,

    /// Initial state of the chain.
    ///
    /// Default: `{Omega_m = 0.3, alpha0 = 3.0, alpha1 = 0.5}`
    pub start: FreeParameters,

    /// Flat prior bounds
    pub priors: PriorBounds,

    /// Gaussian proposal widths
    pub proposal_scale: ProposalScale,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_steps: 20000,
            burn_in: 5000,
            seed: 42,
            progress_every: 1000,
            start: FreeParameters::default(),
            priors: PriorBounds::default(),
            proposal_scale: ProposalScale::default(),
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_steps == 0 {
            return Err(Error::InvalidConfiguration(
                "n_steps must be at least 1".to_string(),
            ));
        }
        if self.burn_in >= self.n_steps {
            return Err(Error::InvalidConfiguration(format!(
                "burn_in ({}) must be smaller than n_steps ({})",
                self.burn_in, self.n_steps
            )));
        }
        if !self.start.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "start point must be finite, got {:?}",
                self.start
            )));
        }
        self.priors.validate()?;
        self.proposal_scale.validate()?;
        Ok(())
    }
}

/// Metropolis acceptance rule.
///
/// Accepts iff $\ln u < \ln p' - \ln p$, with the following special cases:
///
/// * a NaN or $-\infty$ proposal is never accepted
/// * a $+\infty$ proposal is always accepted
/// * from a $-\infty$ (or NaN) current state any other proposal is accepted
///
/// # Arguments
///
/// * `current` - Log-posterior of the current state
/// * `proposed` - Log-posterior of the proposal
/// * `u` - Uniform draw on $[0, 1)$
pub fn metropolis_accept(current: FloatValue, proposed: FloatValue, u: f64) -> bool {
    if proposed.is_nan() || proposed == FloatValue::NEG_INFINITY {
        return false;
    }
    if proposed == FloatValue::INFINITY || current.is_nan() || current == FloatValue::NEG_INFINITY
    {
        return true;
    }
    u.ln() < proposed - current
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Zero-based index of the step (and of its row in the chain)
    pub step: usize,
    pub proposal: FreeParameters,
    pub accepted: bool,
    /// State after the step
    pub state: FreeParameters,
    pub log_posterior: FloatValue,
}

/// Highest-posterior point of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestFit {
    /// Row of the chain the point was taken from
    pub step: usize,
    pub parameters: FreeParameters,
    pub log_posterior: FloatValue,
}

/// Output of a finished (or cancelled) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingResult {
    pub chain: Chain,
    pub n_accepted: usize,
    /// Steps actually taken
    pub n_steps: usize,
    pub requested_steps: usize,
    pub burn_in: usize,
    pub seed: u64,
    /// Whether the run stopped before `requested_steps`
    pub cancelled: bool,
}

impl SamplingResult {
    pub fn acceptance_rate(&self) -> f64 {
        if self.n_steps == 0 {
            0.0
        } else {
            self.n_accepted as f64 / self.n_steps as f64
        }
    }

    /// Arg-max of the log-posterior over the post-burn-in part of the chain.
    pub fn best_fit(&self) -> Option<BestFit> {
        let (step, values, log_posterior) = self.chain.best(self.burn_in)?;
        Some(BestFit {
            step,
            parameters: FreeParameters::from_slice(values)?,
            log_posterior,
        })
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn into_chain(self) -> Chain {
        self.chain
    }
}

/// Random-walk Metropolis sampler over $(\Omega_m, \alpha_0, \alpha_1)$.
#[derive(Debug, Clone)]
pub struct MetropolisSampler<P: LogPosterior> {
    posterior: P,
    config: SamplerConfig,
    scales: [FloatValue; N_FREE],
    cancel: Option<Arc<AtomicBool>>,
}

impl<P: LogPosterior> MetropolisSampler<P> {
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] if the configuration fails validation.
    pub fn new(posterior: P, config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        let scales = config.proposal_scale.to_array()?;
        Ok(Self {
            posterior,
            config,
            scales,
            cancel: None,
        })
    }

    /// Stop the run between steps once `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn posterior(&self) -> &P {
        &self.posterior
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// Begin a run seeded from the configuration.
    pub fn start(&self) -> SamplerRun<'_, P> {
        self.start_with_seed(self.config.seed)
    }

    /// Begin a run with an explicit seed.
    pub fn start_with_seed(&self, seed: u64) -> SamplerRun<'_, P> {
        let start = self.config.start;
        if !self.config.priors.within_bounds(&start) {
            warn!(?start, "Start point lies outside the prior bounds");
        }

        let log_posterior = self.posterior.log_posterior(&start);
        if !log_posterior.is_finite() {
            warn!(
                ?start,
                log_posterior, "Start point has a non-finite log-posterior"
            );
        }

        SamplerRun {
            sampler: self,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            current: start,
            current_log_posterior: log_posterior,
            chain: Chain::with_capacity(FreeParameter::names(), self.config.n_steps),
            n_accepted: 0,
            n_steps: 0,
        }
    }

    /// Run the chain to completion (or cancellation).
    pub fn run(&self) -> SamplingResult {
        self.run_with_progress(|_| {})
    }

    /// Run the chain, calling `progress_callback` after every step.
    pub fn run_with_progress<F>(&self, progress_callback: F) -> SamplingResult
    where
        F: FnMut(&ProgressInfo),
    {
        self.drive(self.start(), progress_callback)
    }

    fn drive<F>(&self, mut run: SamplerRun<'_, P>, mut progress_callback: F) -> SamplingResult
    where
        F: FnMut(&ProgressInfo),
    {
        info!(
            seed = run.seed,
            n_steps = self.config.n_steps,
            burn_in = self.config.burn_in,
            "Starting Metropolis run"
        );
        while !run.is_finished() {
            if self.is_cancelled() {
                info!(step = run.n_steps, "Run cancelled");
                break;
            }
            run.step();
            progress_callback(&run.progress());
        }
        run.finish()
    }
}

impl<P: LogPosterior + Sync> MetropolisSampler<P> {
    /// Run one independent chain per seed in parallel.
    ///
    /// Results are returned in the order of `seeds`. Each chain is identical
    /// to a sequential run with the same seed.
    pub fn run_chains(&self, seeds: &[u64]) -> Vec<SamplingResult> {
        seeds
            .par_iter()
            .map(|&seed| self.drive(self.start_with_seed(seed), |_| {}))
            .collect()
    }
}

/// A run in progress.
///
/// Created by [`MetropolisSampler::start`]; advance it with
/// [`SamplerRun::step`] and collect the output with [`SamplerRun::finish`].
pub struct SamplerRun<'a, P: LogPosterior> {
    sampler: &'a MetropolisSampler<P>,
    rng: ChaCha8Rng,
    seed: u64,
    current: FreeParameters,
    current_log_posterior: FloatValue,
    chain: Chain,
    n_accepted: usize,
    n_steps: usize,
}

impl<'a, P: LogPosterior> SamplerRun<'a, P> {
    pub fn is_finished(&self) -> bool {
        self.n_steps >= self.sampler.config.n_steps
    }

    pub fn current(&self) -> &FreeParameters {
        &self.current
    }

    pub fn current_log_posterior(&self) -> FloatValue {
        self.current_log_posterior
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.n_steps == 0 {
            0.0
        } else {
            self.n_accepted as f64 / self.n_steps as f64
        }
    }

    pub fn progress(&self) -> ProgressInfo {
        ProgressInfo {
            step: self.n_steps,
            total: self.sampler.config.n_steps,
            acceptance_rate: self.acceptance_rate(),
            current_log_posterior: self.current_log_posterior,
        }
    }

    fn propose(&mut self) -> FreeParameters {
        let mut values = self.current.to_array();
        for (value, sigma) in values.iter_mut().zip(self.sampler.scales) {
            let noise: f64 = self.rng.sample(StandardNormal);
            *value += sigma * noise;
        }
        FreeParameters::from_array(values)
    }

    /// Take one step.
    ///
    /// Returns `None` once the requested number of steps has been taken.
    pub fn step(&mut self) -> Option<StepOutcome> {
        if self.is_finished() {
            return None;
        }

        let proposal = self.propose();
        let proposed_log_posterior = self.sampler.posterior.log_posterior(&proposal);
        let u: f64 = self.rng.gen();

        let accepted = metropolis_accept(self.current_log_posterior, proposed_log_posterior, u);
        if accepted {
            self.current = proposal;
            self.current_log_posterior = proposed_log_posterior;
            self.n_accepted += 1;
        } else if proposed_log_posterior == FloatValue::NEG_INFINITY {
            debug!(?proposal, "Rejected proposal with zero posterior");
        }

        let step = self.n_steps;
        self.chain.record(&self.current, self.current_log_posterior);
        self.n_steps += 1;

        let progress_every = self.sampler.config.progress_every;
        if progress_every > 0 && self.n_steps % progress_every == 0 {
            info!(
                step = self.n_steps,
                total = self.sampler.config.n_steps,
                acceptance_rate = self.acceptance_rate(),
                log_posterior = self.current_log_posterior,
                "Sampling progress"
            );
        }

        Some(StepOutcome {
            step,
            proposal,
            accepted,
            state: self.current,
            log_posterior: self.current_log_posterior,
        })
    }

    /// Finalize the run.
    pub fn finish(self) -> SamplingResult {
        let result = SamplingResult {
            chain: self.chain,
            n_accepted: self.n_accepted,
            n_steps: self.n_steps,
            requested_steps: self.sampler.config.n_steps,
            burn_in: self.sampler.config.burn_in,
            seed: self.seed,
            cancelled: self.n_steps < self.sampler.config.n_steps,
        };

        if result.n_steps > 0 && result.n_accepted == 0 {
            warn!(
                n_steps = result.n_steps,
                "No proposals were accepted; check the start point and proposal scales"
            );
        }
        info!(
            n_steps = result.n_steps,
            acceptance_rate = result.acceptance_rate(),
            cancelled = result.cancelled,
            "Finished Metropolis run"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Independent Gaussian in each free parameter, truncated to the default
    /// prior bounds.
    struct Gaussian {
        mean: [f64; N_FREE],
        sigma: [f64; N_FREE],
        bounds: PriorBounds,
    }

    impl Gaussian {
        fn new() -> Self {
            Self {
                mean: [0.3, 3.0, 0.5],
                sigma: [0.03, 0.3, 0.15],
                bounds: PriorBounds::default(),
            }
        }
    }

    impl LogPosterior for Gaussian {
        fn log_posterior(&self, free: &FreeParameters) -> FloatValue {
            if !self.bounds.within_bounds(free) {
                return f64::NEG_INFINITY;
            }
            free.to_array()
                .iter()
                .zip(self.mean.iter().zip(&self.sigma))
                .map(|(x, (m, s))| -0.5 * ((x - m) / s).powi(2))
                .sum()
        }
    }

    fn config(n_steps: usize, burn_in: usize, seed: u64) -> SamplerConfig {
        SamplerConfig {
            n_steps,
            burn_in,
            seed,
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn test_metropolis_accept() {
        // Uphill always accepted
        assert!(metropolis_accept(-10.0, -5.0, 0.999));
        // Downhill accepted iff ln(u) < delta
        assert!(metropolis_accept(-5.0, -6.0, 0.3));
        assert!(!metropolis_accept(-5.0, -6.0, 0.4));
        // Equal posteriors: ln(u) < 0 for u < 1
        assert!(metropolis_accept(-5.0, -5.0, 0.5));

        assert!(!metropolis_accept(-5.0, f64::NEG_INFINITY, 0.0));
        assert!(!metropolis_accept(-5.0, f64::NAN, 0.0));
        assert!(!metropolis_accept(f64::NEG_INFINITY, f64::NEG_INFINITY, 0.0));
        assert!(metropolis_accept(f64::NEG_INFINITY, -1e6, 0.99));
        assert!(metropolis_accept(f64::NAN, -1e6, 0.99));
        assert!(metropolis_accept(-5.0, f64::INFINITY, 0.99));
    }

    #[test]
    fn test_config_validation() {
        assert!(SamplerConfig::default().validate().is_ok());
        assert!(config(0, 0, 1).validate().is_err());
        assert!(config(100, 100, 1).validate().is_err());
        assert!(config(100, 99, 1).validate().is_ok());

        let mut bad_start = SamplerConfig::default();
        bad_start.start.alpha0 = f64::NAN;
        assert!(bad_start.validate().is_err());

        let mut no_priors = SamplerConfig::default();
        no_priors.priors = PriorBounds::empty();
        assert!(MetropolisSampler::new(Gaussian::new(), no_priors).is_err());
    }

    #[test]
    fn test_chain_length_and_determinism() {
        let sampler = MetropolisSampler::new(Gaussian::new(), config(500, 100, 7)).unwrap();

        let first = sampler.run();
        let second = sampler.run();

        assert_eq!(first.chain.len(), 500);
        assert_eq!(first.n_steps, 500);
        assert!(!first.cancelled);
        assert_eq!(first.chain, second.chain);
        assert_eq!(first.n_accepted, second.n_accepted);
        assert_eq!(first.acceptance_rate(), second.acceptance_rate());

        let other_seed = sampler.start_with_seed(8);
        let other = sampler.drive(other_seed, |_| {});
        assert_ne!(first.chain, other.chain);
    }

    #[test]
    fn test_rejected_step_repeats_previous_state() {
        let sampler = MetropolisSampler::new(Gaussian::new(), config(300, 0, 3)).unwrap();
        let mut run = sampler.start();
        let mut previous = *run.current();
        let mut n_rejected = 0;

        while let Some(outcome) = run.step() {
            if outcome.accepted {
                assert_eq!(outcome.state, outcome.proposal);
            } else {
                assert_eq!(outcome.state, previous);
                n_rejected += 1;
            }
            let row = run.chain().sample(outcome.step).unwrap();
            assert_eq!(row, &outcome.state.to_array());
            previous = outcome.state;
        }
        assert!(n_rejected > 0);
        assert!(run.step().is_none());
    }

    #[test]
    fn test_prior_rejection_never_accepted() {
        // Narrow bounds force frequent out-of-prior proposals
        let mut target = Gaussian::new();
        target
            .bounds
            .insert("Omega_m", 0.29, 0.31)
            .insert("alpha1", 0.45, 0.55);
        let sampler = MetropolisSampler::new(target, config(2000, 0, 11)).unwrap();

        let result = sampler.run();
        let bounds = &sampler.posterior().bounds;
        for i in 0..result.chain.len() {
            let state = FreeParameters::from_slice(result.chain.sample(i).unwrap()).unwrap();
            assert!(bounds.within_bounds(&state), "row {} left the prior", i);
            assert!(result.chain.log_posterior(i).unwrap().is_finite());
        }
        assert!(result.acceptance_rate() < 0.9);
    }

    #[test]
    fn test_recovers_gaussian_mean() {
        let target = Gaussian::new();
        let mean = target.mean;
        let sigma = target.sigma;
        let sampler = MetropolisSampler::new(target, config(20000, 2000, 42)).unwrap();

        let result = sampler.run();
        let samples = result.chain.flat_samples(result.burn_in);
        assert_eq!(samples.nrows(), 18000);

        for p in FreeParameter::ALL {
            let i = p.index();
            let sample_mean = samples.column(i).mean().unwrap();
            assert!(
                (sample_mean - mean[i]).abs() < 0.25 * sigma[i],
                "{}: mean {} vs {}",
                p,
                sample_mean,
                mean[i]
            );
        }

        let rate = result.acceptance_rate();
        assert!(rate > 0.2 && rate < 0.9, "acceptance rate {}", rate);

        let best = result.best_fit().unwrap();
        assert!(best.step >= result.burn_in);
        assert!(best.log_posterior <= 0.0);
        assert!(best.log_posterior > -1.0);
    }

    #[test]
    fn test_progress_callback() {
        let sampler = MetropolisSampler::new(Gaussian::new(), config(50, 10, 5)).unwrap();
        let mut updates = Vec::new();

        let result = sampler.run_with_progress(|info| updates.push(info.clone()));

        assert_eq!(updates.len(), 50);
        assert_eq!(updates[0].step, 1);
        assert_eq!(updates[49].step, 50);
        assert!(updates.iter().all(|u| u.total == 50));
        assert_eq!(updates[49].acceptance_rate, result.acceptance_rate());
        assert_eq!(
            updates[49].current_log_posterior,
            result.chain.log_posterior(49).unwrap()
        );
    }

    #[test]
    fn test_cancellation() {
        let flag = Arc::new(AtomicBool::new(false));
        let sampler = MetropolisSampler::new(Gaussian::new(), config(1000, 10, 5))
            .unwrap()
            .with_cancellation(Arc::clone(&flag));

        let callback_flag = Arc::clone(&flag);
        let result = sampler.run_with_progress(|info| {
            if info.step == 25 {
                callback_flag.store(true, Ordering::Relaxed);
            }
        });

        assert!(result.cancelled);
        assert_eq!(result.n_steps, 25);
        assert_eq!(result.chain.len(), 25);
        assert_eq!(result.requested_steps, 1000);

        let uncancelled = MetropolisSampler::new(Gaussian::new(), config(1000, 10, 5))
            .unwrap()
            .run();
        assert_eq!(
            result.chain.flat_samples(0),
            uncancelled.chain.flat_samples(0).slice(ndarray::s![..25, ..])
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let flag = Arc::new(AtomicBool::new(true));
        let sampler = MetropolisSampler::new(Gaussian::new(), config(100, 10, 5))
            .unwrap()
            .with_cancellation(flag);

        let result = sampler.run();
        assert!(result.cancelled);
        assert!(result.chain.is_empty());
        assert_eq!(result.acceptance_rate(), 0.0);
        assert!(result.best_fit().is_none());
    }

    #[test]
    fn test_parallel_chains_match_sequential() {
        let sampler = MetropolisSampler::new(Gaussian::new(), config(300, 50, 1)).unwrap();
        let seeds = [1, 2, 3, 4];

        let results = sampler.run_chains(&seeds);

        assert_eq!(results.len(), 4);
        for (result, &seed) in results.iter().zip(&seeds) {
            assert_eq!(result.seed, seed);
            let sequential = sampler.drive(sampler.start_with_seed(seed), |_| {});
            assert_eq!(result.chain, sequential.chain);
        }
        assert_eq!(results[0].chain, sampler.run().chain);
        assert_ne!(results[0].chain, results[1].chain);
    }
}
