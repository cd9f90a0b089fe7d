//! Per-phase timing of cost evaluations.
//!
//! Timing is collected only when the `profiling` feature is enabled. Without
//! the feature the collector and the `time_phase!` macro compile to no-ops.

use serde::{Deserialize, Serialize};
#[cfg(feature = "profiling")]
use std::time::Instant;

/// Timing breakdown of one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTiming {
    /// Total evaluation time
    pub total_ms: f64,
    /// Both predictor queries
    pub query_ms: f64,
    /// Mask combination
    pub combine_ms: f64,
    /// Link reduction back to (batch, horizon)
    pub reduce_ms: f64,
    /// Shaping and weighting
    pub shape_ms: f64,
}

/// Collector for timing data during an evaluation.
#[cfg(feature = "profiling")]
#[derive(Debug, Default)]
pub struct TimingCollector {
    start: Option<Instant>,
    timing: EvaluationTiming,
}

#[cfg(feature = "profiling")]
impl TimingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start = Some(Instant::now());
        self.timing = EvaluationTiming::default();
    }

    pub fn record_phase(&mut self, phase: &str, duration_ms: f64) {
        match phase {
            "query" => self.timing.query_ms += duration_ms,
            "combine" => self.timing.combine_ms += duration_ms,
            "reduce" => self.timing.reduce_ms += duration_ms,
            "shape" => self.timing.shape_ms += duration_ms,
            _ => {}
        }
    }

    pub fn finish(&mut self) -> EvaluationTiming {
        self.timing.total_ms = self
            .start
            .map(|s| s.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        std::mem::take(&mut self.timing)
    }
}

/// No-op collector when profiling is disabled.
#[cfg(not(feature = "profiling"))]
#[derive(Debug, Default)]
pub struct TimingCollector;

#[cfg(not(feature = "profiling"))]
impl TimingCollector {
    #[inline(always)]
    pub fn new() -> Self {
        Self
    }

    #[inline(always)]
    pub fn start(&mut self) {}

    #[inline(always)]
    pub fn record_phase(&mut self, _phase: &str, _duration_ms: f64) {}

    #[inline(always)]
    pub fn finish(&mut self) -> EvaluationTiming {
        EvaluationTiming::default()
    }
}

/// Time a block of code as one evaluation phase.
///
/// ```ignore
/// let mask = time_phase!(collector, "combine", { a.combine(&b) });
/// ```
#[macro_export]
macro_rules! time_phase {
    ($collector:expr, $phase:expr, $block:expr) => {{
        #[cfg(feature = "profiling")]
        let _start = std::time::Instant::now();

        let result = $block;

        #[cfg(feature = "profiling")]
        $collector.record_phase($phase, _start.elapsed().as_secs_f64() * 1000.0);

        result
    }};
}
