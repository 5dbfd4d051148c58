use anyhow::{bail, Context, Result};
use chrono::Duration;
use config::{Config, Environment};
use serde::Deserialize;
use std::str::FromStr;

use crate::api::{timeframe_seconds, MAX_FETCH_LIMIT};
use crate::execution::EngineConfig;
use crate::risk::{ExitRules, PositionSizer};
use crate::strategy::signals::SignalConfig;
use crate::strategy::vwap_rsi::WARMUP_MARGIN;

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Exchange {
    Mexc,
    Bitget,
}

impl FromStr for Exchange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mexc" => Ok(Exchange::Mexc),
            "bitget" => Ok(Exchange::Bitget),
            other => bail!("EXCHANGE must be 'mexc' or 'bitget', got '{}'", other),
        }
    }
}

impl TryFrom<String> for Exchange {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exchange::Mexc => write!(f, "mexc"),
            Exchange::Bitget => write!(f, "bitget"),
        }
    }
}

/// Runtime configuration, read from environment variables
///
/// Field names are the lowercase form of the variable names
/// (`FEE_RT` -> `fee_rt`).
#[derive(Clone, Deserialize)]
pub struct ScalperConfig {
    pub exchange: Exchange,
    pub symbol: String,
    #[serde(rename = "tf")]
    pub timeframe: String,
    pub lookback: usize,

    pub paper_mode: bool,
    pub api_key: String,
    pub api_secret: String,

    // Fees & risk
    pub fee_rt: f64,
    pub slippage_rt: f64,
    pub guard_buffer: f64,
    pub risk_per_trade: f64,
    pub tp_offset: f64,
    pub sl_offset: f64,
    pub min_qty: f64,

    // Indicators
    pub vwap_win: usize,
    pub rsi_len: usize,
    pub dd_min: f64,

    // Timing
    pub cooldown_sec: u64,
    pub max_hold_sec: u64,
    pub poll_interval_sec: u64,
    pub error_backoff_sec: u64,

    pub start_equity: f64,
}

impl ScalperConfig {
    /// Load from the process environment (call `dotenvy::dotenv()` first)
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::default().try_parsing(true))
    }

    /// Load from a given environment source, applying defaults
    pub fn load(environment: Environment) -> Result<Self> {
        let config: ScalperConfig = Config::builder()
            .set_default("exchange", "mexc")?
            .set_default("symbol", "BTC/USDT")?
            .set_default("tf", "1m")?
            .set_default("lookback", 200)?
            .set_default("paper_mode", true)?
            .set_default("api_key", "")?
            .set_default("api_secret", "")?
            .set_default("fee_rt", 0.0010)?
            .set_default("slippage_rt", 0.0006)?
            .set_default("guard_buffer", 0.0004)?
            .set_default("risk_per_trade", 0.02)?
            .set_default("tp_offset", 0.0040)?
            .set_default("sl_offset", 0.0060)?
            .set_default("min_qty", 0.0001)?
            .set_default("vwap_win", 60)?
            .set_default("rsi_len", 7)?
            .set_default("dd_min", 0.0025)?
            .set_default("cooldown_sec", 60)?
            .set_default("max_hold_sec", 1500)?
            .set_default("poll_interval_sec", 2)?
            .set_default("error_backoff_sec", 3)?
            .set_default("start_equity", 300.0)?
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration value")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            bail!("SYMBOL must not be empty");
        }
        if timeframe_seconds(&self.timeframe).is_none() {
            bail!("TF '{}' is not a valid timeframe", self.timeframe);
        }
        if self.vwap_win == 0 {
            bail!("VWAP_WIN must be at least 1");
        }
        if self.rsi_len == 0 {
            bail!("RSI_LEN must be at least 1");
        }
        if self.lookback < self.vwap_win + WARMUP_MARGIN {
            bail!(
                "LOOKBACK ({}) must be at least VWAP_WIN + {} ({})",
                self.lookback,
                WARMUP_MARGIN,
                self.vwap_win + WARMUP_MARGIN
            );
        }
        if self.lookback > MAX_FETCH_LIMIT {
            bail!(
                "LOOKBACK ({}) exceeds the {} candles an exchange returns per request",
                self.lookback,
                MAX_FETCH_LIMIT
            );
        }
        if self.start_equity <= 0.0 {
            bail!("START_EQUITY must be positive");
        }
        if self.fee_rt < 0.0 || self.slippage_rt < 0.0 || self.guard_buffer < 0.0 {
            bail!("FEE_RT, SLIPPAGE_RT and GUARD_BUFFER must not be negative");
        }
        if !(self.risk_per_trade > 0.0 && self.risk_per_trade <= 1.0) {
            bail!("RISK_PER_TRADE must be in (0, 1], got {}", self.risk_per_trade);
        }
        if self.tp_offset < 0.0 || self.sl_offset < 0.0 {
            bail!("TP_OFFSET and SL_OFFSET must not be negative");
        }
        if !self.paper_mode {
            if self.api_key.is_empty() || self.api_secret.is_empty() {
                bail!("Live mode (PAPER_MODE=false) requires API_KEY and API_SECRET");
            }
            if self.exchange != Exchange::Mexc {
                bail!("Live order placement is only supported on mexc");
            }
        }
        Ok(())
    }

    /// Validate for the chosen candle source
    ///
    /// Synthetic prices must never drive real orders.
    pub fn validate_for(&self, synthetic: bool) -> Result<()> {
        self.validate()?;
        if synthetic && !self.paper_mode {
            bail!(
                "The synthetic feed only runs in paper mode \
                 (unset PAPER_MODE=false or drop --synthetic)"
            );
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            rsi_length: self.rsi_len,
            vwap_window: self.vwap_win,
            signals: SignalConfig::new(self.dd_min),
            sizer: PositionSizer {
                risk_fraction: self.risk_per_trade,
                stop_offset: self.sl_offset,
                min_quantity: self.min_qty,
            },
            exits: ExitRules {
                fee_rt: self.fee_rt,
                slippage_rt: self.slippage_rt,
                guard_buffer: self.guard_buffer,
                tp_offset: self.tp_offset,
                sl_offset: self.sl_offset,
                max_hold: Duration::seconds(self.max_hold_sec as i64),
            },
            cooldown: Duration::seconds(self.cooldown_sec as i64),
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_sec)
    }

    pub fn error_backoff(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.error_backoff_sec)
    }
}

impl std::fmt::Debug for ScalperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };

        f.debug_struct("ScalperConfig")
            .field("exchange", &self.exchange)
            .field("symbol", &self.symbol)
            .field("timeframe", &self.timeframe)
            .field("lookback", &self.lookback)
            .field("paper_mode", &self.paper_mode)
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("fee_rt", &self.fee_rt)
            .field("slippage_rt", &self.slippage_rt)
            .field("guard_buffer", &self.guard_buffer)
            .field("risk_per_trade", &self.risk_per_trade)
            .field("tp_offset", &self.tp_offset)
            .field("sl_offset", &self.sl_offset)
            .field("min_qty", &self.min_qty)
            .field("vwap_win", &self.vwap_win)
            .field("rsi_len", &self.rsi_len)
            .field("dd_min", &self.dd_min)
            .field("cooldown_sec", &self.cooldown_sec)
            .field("max_hold_sec", &self.max_hold_sec)
            .field("poll_interval_sec", &self.poll_interval_sec)
            .field("error_backoff_sec", &self.error_backoff_sec)
            .field("start_equity", &self.start_equity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<ScalperConfig> {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ScalperConfig::load(Environment::default().source(Some(source)).try_parsing(true))
    }

    #[test]
    fn test_defaults() {
        let config = load_with(&[]).unwrap();

        assert_eq!(config.exchange, Exchange::Mexc);
        assert_eq!(config.symbol, "BTC/USDT");
        assert_eq!(config.timeframe, "1m");
        assert_eq!(config.lookback, 200);
        assert!(config.paper_mode);
        assert_eq!(config.fee_rt, 0.001);
        assert_eq!(config.vwap_win, 60);
        assert_eq!(config.rsi_len, 7);
        assert_eq!(config.cooldown_sec, 60);
        assert_eq!(config.max_hold_sec, 1500);
        assert_eq!(config.start_equity, 300.0);
    }

    #[test]
    fn test_env_overrides() {
        let config = load_with(&[
            ("EXCHANGE", "bitget"),
            ("SYMBOL", "ETH/USDT"),
            ("TF", "5m"),
            ("DD_MIN", "0.004"),
            ("START_EQUITY", "1000"),
            ("COOLDOWN_SEC", "120"),
        ])
        .unwrap();

        assert_eq!(config.exchange, Exchange::Bitget);
        assert_eq!(config.symbol, "ETH/USDT");
        assert_eq!(config.timeframe, "5m");
        assert_eq!(config.dd_min, 0.004);
        assert_eq!(config.start_equity, 1000.0);
        assert_eq!(config.cooldown_sec, 120);
    }

    #[test]
    fn test_unknown_exchange() {
        let err = load_with(&[("EXCHANGE", "binance")]).unwrap_err();
        assert!(format!("{:#}", err).contains("EXCHANGE must be"));
    }

    #[test]
    fn test_lookback_must_cover_warmup() {
        let err = load_with(&[("LOOKBACK", "50"), ("VWAP_WIN", "60")]).unwrap_err();
        assert!(err.to_string().contains("LOOKBACK"));
    }

    #[test]
    fn test_live_mode_requires_credentials() {
        let err = load_with(&[("PAPER_MODE", "false")]).unwrap_err();
        assert!(err.to_string().contains("API_KEY"));

        let config = load_with(&[
            ("PAPER_MODE", "false"),
            ("API_KEY", "abc"),
            ("API_SECRET", "def"),
        ])
        .unwrap();
        assert!(!config.paper_mode);
    }

    #[test]
    fn test_live_mode_not_on_bitget() {
        let err = load_with(&[
            ("EXCHANGE", "bitget"),
            ("PAPER_MODE", "false"),
            ("API_KEY", "abc"),
            ("API_SECRET", "def"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("only supported on mexc"));
    }

    #[test]
    fn test_lookback_capped_by_exchange_limit() {
        let err = load_with(&[("LOOKBACK", "1200"), ("VWAP_WIN", "1000")]).unwrap_err();
        assert!(err.to_string().contains("exceeds"));

        let config = load_with(&[("LOOKBACK", "1000"), ("VWAP_WIN", "995")]).unwrap();
        assert_eq!(config.lookback, 1000);

        // Warm-up can never fit in one request
        assert!(load_with(&[("LOOKBACK", "1000"), ("VWAP_WIN", "996")]).is_err());
    }

    #[test]
    fn test_synthetic_feed_requires_paper_mode() {
        let live = load_with(&[
            ("PAPER_MODE", "false"),
            ("API_KEY", "abc"),
            ("API_SECRET", "def"),
        ])
        .unwrap();

        assert!(live.validate_for(false).is_ok());
        let err = live.validate_for(true).unwrap_err();
        assert!(err.to_string().contains("paper mode"));

        let paper = load_with(&[]).unwrap();
        assert!(paper.validate_for(true).is_ok());
    }

    #[test]
    fn test_engine_config_mapping() {
        let engine = load_with(&[]).unwrap().engine_config();

        assert_eq!(engine.vwap_window, 60);
        assert_eq!(engine.min_candles(), 65);
        assert_eq!(engine.sizer.risk_fraction, 0.02);
        assert_eq!(engine.sizer.stop_offset, 0.006);
        assert_eq!(engine.exits.max_hold, Duration::seconds(1500));
        assert_eq!(engine.cooldown, Duration::seconds(60));
        assert!((engine.exits.guard() - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load_with(&[("API_KEY", "super-secret-key")]).unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("<redacted>"));
    }
}
