//! Per-kind detector rules: lazily create the `TimeSeries` a kind needs,
//! feed them, and decide whether the instance is currently abnormal.

use std::time::Instant;

use protocol::{AlertKind, InstanceKind, InstanceRecord, Payload};
use stats::{TimeSeries, TimeSeriesParams};

use crate::config::DetectorConfig;
use crate::state::{InstanceState, METRIC_CPU_UTILIZATION, METRIC_DNS_RATIO, METRIC_MEMORY_UTILIZATION, METRIC_SYN_RATIO};

/// Feeds `record` into `state`, applying the rule for its instance kind, and
/// returns the alert to emit right now, if any (i.e. the instance is
/// currently abnormal/failed *and* the relevant cooldown has elapsed).
///
/// `now` is the monotonic clock used for cooldown bookkeeping; it is an
/// explicit parameter (rather than read internally) so callers — including
/// tests — can drive cooldown behavior deterministically.
pub fn observe(state: &mut InstanceState, record: &InstanceRecord, cfg: &DetectorConfig, now: Instant) -> Option<AlertKind> {
    state.push_history(record.observed_at, record.payload.clone(), cfg.history_len_limit);

    if record.key.kind == InstanceKind::Sfci {
        // SFCI records are passed through whole and logged; no rule.
        return None;
    }

    if !record.active {
        state.failure_state = true;
        return emit_failure(state, record.key.kind, cfg, now);
    }

    state.failure_state = false;

    let abnormal = match &record.payload {
        Payload::Server(payload) => server_abnormal(state, payload, cfg),
        Payload::Link(payload) => link_abnormal(state, payload, cfg),
        Payload::Switch(_) | Payload::Vnfi(_) => false,
        Payload::Sfci(_) => unreachable!("SFCI records return before reaching the active branch"),
    };

    if abnormal {
        state.abnormal_state = Some(now);
        emit_abnormal(state, record.key.kind, cfg, now)
    } else {
        None
    }
}

/// SERVER rule: lazily creates `cpu_utilization`/`memory_utilization`
/// series with their configured jitter floors, feeds the mean CPU sample
/// (NaNs ignored) and the DRAM percentage, and flags abnormal if either
/// series does.
fn server_abnormal(state: &mut InstanceState, payload: &protocol::ServerPayload, cfg: &DetectorConfig) -> bool {
    let cpu = state.metrics.entry(METRIC_CPU_UTILIZATION).or_insert_with(|| {
        TimeSeries::new(TimeSeriesParams {
            k: cfg.k,
            normal_window_length: cfg.normal_window_length,
            abnormal_window_length: cfg.abnormal_window_length,
            minimum_sigma: cfg.minimum_sigma(cfg.cpu_jitter_sigma),
        })
    });
    let cpu_value = mean_ignoring_nan(&payload.cpu_util);
    cpu.add(cpu_value);
    let cpu_abnormal = cpu.is_abnormal();

    let mem = state.metrics.entry(METRIC_MEMORY_UTILIZATION).or_insert_with(|| {
        TimeSeries::new(TimeSeriesParams {
            k: cfg.k,
            normal_window_length: cfg.normal_window_length,
            abnormal_window_length: cfg.abnormal_window_length,
            minimum_sigma: cfg.minimum_sigma(cfg.mem_jitter_sigma),
        })
    });
    mem.add(payload.dram_usage_pct);
    let mem_abnormal = mem.is_abnormal();

    cpu_abnormal || mem_abnormal
}

/// LINK rule: lazily creates `syn_ratio`/`dns_ratio` series (no jitter
/// floor), feeds the packet ratios (defaulting to 0 when no packets were
/// observed), and flags abnormal only when the link is busy enough
/// (utilization and packet-count thresholds) *and* either ratio is
/// statistically deviant or pinned above 0.95.
fn link_abnormal(state: &mut InstanceState, payload: &protocol::LinkPayload, cfg: &DetectorConfig) -> bool {
    let total = payload.nsh_num + payload.syn_num + payload.dns_num;
    let syn_ratio = if total > 0 {
        payload.syn_num as f64 / total as f64
    } else {
        0.0
    };
    let dns_ratio = if total > 0 {
        payload.dns_num as f64 / total as f64
    } else {
        0.0
    };

    let syn = state.metrics.entry(METRIC_SYN_RATIO).or_insert_with(|| {
        TimeSeries::new(TimeSeriesParams {
            k: cfg.k,
            normal_window_length: cfg.normal_window_length,
            abnormal_window_length: cfg.abnormal_window_length,
            minimum_sigma: 0.0,
        })
    });
    syn.add(syn_ratio);
    let syn_abnormal = syn.is_abnormal();

    let dns = state.metrics.entry(METRIC_DNS_RATIO).or_insert_with(|| {
        TimeSeries::new(TimeSeriesParams {
            k: cfg.k,
            normal_window_length: cfg.normal_window_length,
            abnormal_window_length: cfg.abnormal_window_length,
            minimum_sigma: 0.0,
        })
    });
    dns.add(dns_ratio);
    let dns_abnormal = dns.is_abnormal();

    payload.utilization > cfg.link_util_thres
        && (syn_abnormal || dns_abnormal || syn_ratio > 0.95 || dns_ratio > 0.95)
        && (payload.syn_num > cfg.link_packet_num_thres || payload.dns_num > cfg.link_packet_num_thres)
}

fn mean_ignoring_nan(samples: &[f64]) -> f64 {
    let (sum, count) = samples
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn emit_failure(state: &mut InstanceState, kind: InstanceKind, cfg: &DetectorConfig, now: Instant) -> Option<AlertKind> {
    // Only switch/server/link instances have an id slot in the alert
    // record's wire shape; VNFI and SFCI failures are still tracked in
    // `failure_state` for query purposes but never alert.
    if !matches!(kind, InstanceKind::Switch | InstanceKind::Server | InstanceKind::Link) {
        return None;
    }
    if InstanceState::cooldown_elapsed(state.last_failure, now, cfg.cooldown) {
        state.last_failure = Some(now);
        Some(AlertKind::Failure)
    } else {
        None
    }
}

fn emit_abnormal(state: &mut InstanceState, kind: InstanceKind, cfg: &DetectorConfig, now: Instant) -> Option<AlertKind> {
    if !matches!(kind, InstanceKind::Switch | InstanceKind::Server | InstanceKind::Link) {
        return None;
    }
    if InstanceState::cooldown_elapsed(state.last_abnormal, now, cfg.cooldown) {
        state.last_abnormal = Some(now);
        Some(AlertKind::Abnormal)
    } else {
        None
    }
}
