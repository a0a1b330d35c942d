use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, OnceLock},
};

use crate::domain::chain_config::Chain;

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

#[derive(Default)]
struct MetricsState {
    prepared_total: BTreeMap<&'static str, u64>,
    broadcast_ok: BTreeMap<&'static str, u64>,
    broadcast_fail: BTreeMap<&'static str, u64>,
    // 余额缓存：命中 / 实时查询 / 回退旧值
    balance_cache_hit: u64,
    balance_cache_miss: u64,
    balance_stale: u64,
}

fn state() -> MutexGuard<'static, MetricsState> {
    match METRICS.get_or_init(Default::default).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

pub fn inc_prepared(chain: Chain) {
    *state().prepared_total.entry(chain.as_str()).or_insert(0) += 1;
}

pub fn inc_broadcast_success(chain: Chain) {
    *state().broadcast_ok.entry(chain.as_str()).or_insert(0) += 1;
}

pub fn inc_broadcast_fail(chain: Chain) {
    *state().broadcast_fail.entry(chain.as_str()).or_insert(0) += 1;
}

pub fn inc_balance_cache_hit() {
    state().balance_cache_hit += 1;
}

pub fn inc_balance_cache_miss() {
    state().balance_cache_miss += 1;
}

pub fn inc_balance_stale() {
    state().balance_stale += 1;
}

fn render_per_chain(out: &mut String, name: &str, help: &str, values: &BTreeMap<&'static str, u64>) {
    out.push_str(&format!("# HELP {} {}\n", name, help));
    out.push_str(&format!("# TYPE {} counter\n", name));
    for (chain, value) in values {
        out.push_str(&format!("{}{{chain=\"{}\"}} {}\n", name, chain, value));
    }
}

pub fn render_prometheus() -> String {
    let s = state();
    let mut out = String::new();

    render_per_chain(
        &mut out,
        "ironvault_prepared_transactions_total",
        "Prepared transactions per chain",
        &s.prepared_total,
    );
    render_per_chain(
        &mut out,
        "ironvault_broadcast_success_total",
        "Successful broadcasts per chain",
        &s.broadcast_ok,
    );
    render_per_chain(
        &mut out,
        "ironvault_broadcast_fail_total",
        "Failed broadcasts per chain",
        &s.broadcast_fail,
    );

    out.push_str("# HELP ironvault_balance_requests_total Balance reads by cache result\n");
    out.push_str("# TYPE ironvault_balance_requests_total counter\n");
    out.push_str(&format!(
        "ironvault_balance_requests_total{{result=\"hit\"}} {}\n",
        s.balance_cache_hit
    ));
    out.push_str(&format!(
        "ironvault_balance_requests_total{{result=\"miss\"}} {}\n",
        s.balance_cache_miss
    ));
    out.push_str(&format!(
        "ironvault_balance_requests_total{{result=\"stale\"}} {}\n",
        s.balance_stale
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        inc_broadcast_success(Chain::Btc);
        inc_balance_cache_hit();
        let text = render_prometheus();
        assert!(text.contains("ironvault_broadcast_success_total{chain=\"BTC\"}"));
        assert!(text.contains("ironvault_balance_requests_total{result=\"hit\"}"));
    }
}
