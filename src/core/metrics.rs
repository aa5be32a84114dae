use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;
use crate::db::types::AttemptStatus;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn attempt_started() {
    metrics::counter!("assessment_attempts_started_total").increment(1);
}

pub(crate) fn attempt_resumed() {
    metrics::counter!("assessment_attempts_resumed_total").increment(1);
}

pub(crate) fn attempts_timed_out(count: u64) {
    if count > 0 {
        metrics::counter!("assessment_attempts_timed_out_total").increment(count);
    }
}

pub(crate) fn attempt_submitted(status: AttemptStatus) {
    metrics::counter!("assessment_attempts_submitted_total", "status" => status.as_str())
        .increment(1);
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum GradeMode {
    Auto,
    Manual,
}

pub(crate) fn attempt_graded(mode: GradeMode) {
    let mode = match mode {
        GradeMode::Auto => "auto",
        GradeMode::Manual => "manual",
    };
    metrics::counter!("assessment_attempts_graded_total", "mode" => mode).increment(1);
}
