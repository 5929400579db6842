//! Prometheus metrics for agent runs, tools and sessions
//!
//! All collectors register into [`REGISTRY`], which the server exposes at
//! `/metrics` in the text exposition format.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Completed agent runs by agent label and outcome
    /// (success, turn_limit, cancelled, model_error)
    pub static ref AGENT_RUNS: IntCounterVec = register(IntCounterVec::new(
        Opts::new("agentbox_agent_runs_total", "Agent runs by outcome"),
        &["agent", "outcome"],
    ));

    /// Model invocations per run
    pub static ref AGENT_TURNS: Histogram = register(Histogram::with_opts(
        HistogramOpts::new("agentbox_agent_turns", "Model invocations per agent run")
            .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0, 55.0]),
    ));

    /// Tool calls by tool name and outcome (ok or an error kind)
    pub static ref TOOL_CALLS: IntCounterVec = register(IntCounterVec::new(
        Opts::new("agentbox_tool_calls_total", "Tool calls by tool and outcome"),
        &["tool", "outcome"],
    ));

    /// Latency of model invocations in seconds
    pub static ref MODEL_CALL_DURATION: HistogramVec = register(HistogramVec::new(
        HistogramOpts::new("agentbox_model_call_seconds", "Model call latency")
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["model"],
    ));

    /// Wall-clock duration of shell commands in seconds
    pub static ref COMMAND_DURATION: Histogram = register(Histogram::with_opts(
        HistogramOpts::new("agentbox_command_seconds", "Shell command duration")
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0]),
    ));

    /// Sessions currently held in memory
    pub static ref ACTIVE_SESSIONS: Gauge = register(Gauge::new(
        "agentbox_active_sessions",
        "Sessions currently held in memory",
    ));

    /// fs_update notifications pushed to clients
    pub static ref FS_UPDATES: IntCounter = register(IntCounter::new(
        "agentbox_fs_updates_total",
        "Filesystem change notifications sent to clients",
    ));
}

fn register<C>(collector: Result<C, prometheus::Error>) -> C
where
    C: prometheus::core::Collector + Clone + 'static,
{
    // Metric definitions are static, so a failure here is a programming error
    #[allow(clippy::expect_used)]
    let collector = collector.expect("invalid metric definition");
    if let Err(e) = REGISTRY.register(Box::new(collector.clone())) {
        tracing::warn!(error = %e, "metric registration failed");
    }
    collector
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!(error = %e, "metric encoding failed");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
