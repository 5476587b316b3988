// ===============================
// src/config.rs
// ===============================
//
// Env-driven configuration with defaults. This only shapes the initial
// wiring; per-symbol parameters and limits stay programmatic via
// MarketMaker::configure_symbol and RiskEngine::set_risk_limits.

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::domain::{MakerParams, RiskLimits};

#[derive(Clone, Debug)]
pub struct Args {
    /// Symbols quoted at startup: SYMBOLS=AAPL,GOOGL
    pub symbols: Vec<String>,
    /// Scrape port for the metrics responder; 0 disables it.
    pub metrics_port: u16,
    /// Capacity of the quote and order rings (rounded up to a power of two).
    pub queue_capacity: usize,
    /// Rolling window for the volatility estimators.
    pub vol_window: usize,
    /// Mock feed pacing and seed price.
    pub feed_interval_ms: u64,
    pub feed_start_px: f64,
    /// Probability that the mock gateway fills a forwarded order.
    pub fill_ratio: f64,
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

pub fn load() -> (Args, MakerParams, RiskLimits) {
    let _ = dotenv();

    // ===== Symbols =====
    let symbols: Vec<String> = env::var("SYMBOLS")
        .ok()
        .map(|s| {
            s.split(',')
                .map(|x| x.trim())
                .filter(|x| !x.is_empty())
                .map(|x| x.to_ascii_uppercase())
                .collect()
        })
        .filter(|v: &Vec<String>| !v.is_empty())
        .unwrap_or_else(|| vec!["AAPL".to_string(), "GOOGL".to_string()]);

    let args = Args {
        symbols,
        metrics_port: parse_env("METRICS_PORT", 9898),
        queue_capacity: parse_env("QUEUE_CAPACITY", 1024),
        vol_window: parse_env("VOL_WINDOW", 64),
        feed_interval_ms: parse_env("FEED_INTERVAL_MS", 5),
        feed_start_px: parse_env("FEED_START_PX", 100.0),
        fill_ratio: parse_env("FILL_RATIO", 0.1),
    };

    // ===== Quoting defaults (per symbol, installed by add_strategy) =====
    let maker = MakerParams {
        spread_pct: parse_env("MM_SPREAD_PCT", 0.001),
        base_size: parse_env("MM_BASE_SIZE", 100.0),
        skew_factor: parse_env("MM_SKEW_FACTOR", 0.2),
        tick_size: parse_env("MM_TICK_SIZE", 0.01),
        levels: parse_env("MM_LEVELS", 3),
        level_spacing: parse_env("MM_LEVEL_SPACING", 0.5),
    };

    // ===== Risk ceilings =====
    let limits = RiskLimits {
        max_gross_position: parse_env("MAX_GROSS_POSITION", 1_000.0),
        max_net_position: parse_env("MAX_NET_POSITION", 500.0),
        max_dollar_exposure: parse_env("MAX_DOLLAR_EXPOSURE", 1_000_000.0),
        var_limit: parse_env("VAR_LIMIT", 50_000.0),
        es_limit: parse_env("ES_LIMIT", 60_000.0),
        max_drawdown_limit: parse_env("MAX_DRAWDOWN", 10_000.0),
        max_position_duration_ns: parse_env("MAX_POSITION_DURATION_SECS", 3_600i64)
            .saturating_mul(1_000_000_000),
        max_order_size: parse_env("MAX_ORDER_SIZE", 200.0),
        max_daily_loss: parse_env("MAX_DAILY_LOSS", 50_000.0),
        max_daily_trades: parse_env("MAX_DAILY_TRADES", 100_000u64),
    };

    (args, maker, limits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_falls_back_on_missing() {
        assert_eq!(parse_env("MM_ENGINE_TEST_UNSET_KEY", 42u32), 42);
    }

    #[test]
    fn parse_env_reads_value() {
        env::set_var("MM_ENGINE_TEST_SET_KEY", "7");
        assert_eq!(parse_env("MM_ENGINE_TEST_SET_KEY", 1u32), 7);
        env::remove_var("MM_ENGINE_TEST_SET_KEY");
    }

    #[test]
    fn parse_env_falls_back_on_garbage() {
        env::set_var("MM_ENGINE_TEST_BAD_KEY", "not-a-number");
        assert_eq!(parse_env("MM_ENGINE_TEST_BAD_KEY", 3.5f64), 3.5);
        env::remove_var("MM_ENGINE_TEST_BAD_KEY");
    }
}
