use dotenv::dotenv;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

use crate::domain::services::price_evolver::EvolverConfig;
use crate::domain::services::trading_session::SessionConfig;

const EXCHANGE_ADDR: &str = "EXCHANGE_ADDR";
const EXCHANGE_LOG_LEVEL: &str = "EXCHANGE_LOG_LEVEL";
const EVOLVER_MIN_SECS: &str = "EVOLVER_MIN_SECS";
const EVOLVER_MAX_SECS: &str = "EVOLVER_MAX_SECS";
const EVOLVER_REPORT_PRICES: &str = "EVOLVER_REPORT_PRICES";
const FEED_POLL_MILLIS: &str = "FEED_POLL_MILLIS";
const PASS_INTERVAL_MILLIS: &str = "PASS_INTERVAL_MILLIS";
const SEED_STOCKS: &str = "SEED_STOCKS";

/// Errors raised while reading the configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to parse environment variable {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("EVOLVER_MIN_SECS must not exceed EVOLVER_MAX_SECS")]
    InvertedTickRange,

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub log_level: Level,
    pub evolver_min_tick: Duration,
    pub evolver_max_tick: Duration,
    pub report_prices: bool,
    pub feed_poll_interval: Duration,
    pub pass_interval: Duration,
    pub seed_stocks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: Level::INFO,
            evolver_min_tick: Duration::from_secs(3),
            evolver_max_tick: Duration::from_secs(7),
            report_prices: false,
            feed_poll_interval: Duration::from_millis(1000),
            pass_interval: Duration::from_millis(250),
            seed_stocks: true,
        }
    }
}

impl Config {
    pub fn try_from_env() -> Result<Config, ConfigError> {
        // Load .env file
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Missing variables take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let addr = parse_or(&lookup, EXCHANGE_ADDR, defaults.addr)?;
        let log_level = parse_or(&lookup, EXCHANGE_LOG_LEVEL, defaults.log_level)?;
        let min_secs = parse_or(&lookup, EVOLVER_MIN_SECS, defaults.evolver_min_tick.as_secs())?;
        let max_secs = parse_or(&lookup, EVOLVER_MAX_SECS, defaults.evolver_max_tick.as_secs())?;
        let report_prices = parse_or(&lookup, EVOLVER_REPORT_PRICES, defaults.report_prices)?;
        let poll_millis = parse_or(
            &lookup,
            FEED_POLL_MILLIS,
            defaults.feed_poll_interval.as_millis() as u64,
        )?;
        let pass_millis = parse_or(
            &lookup,
            PASS_INTERVAL_MILLIS,
            defaults.pass_interval.as_millis() as u64,
        )?;
        let seed_stocks = parse_or(&lookup, SEED_STOCKS, defaults.seed_stocks)?;

        if min_secs > max_secs {
            return Err(ConfigError::InvertedTickRange);
        }
        if poll_millis == 0 {
            return Err(ConfigError::Zero {
                name: FEED_POLL_MILLIS,
            });
        }
        if pass_millis == 0 {
            return Err(ConfigError::Zero {
                name: PASS_INTERVAL_MILLIS,
            });
        }

        Ok(Config {
            addr,
            log_level,
            evolver_min_tick: Duration::from_secs(min_secs),
            evolver_max_tick: Duration::from_secs(max_secs),
            report_prices,
            feed_poll_interval: Duration::from_millis(poll_millis),
            pass_interval: Duration::from_millis(pass_millis),
            seed_stocks,
        })
    }

    pub fn evolver(&self) -> EvolverConfig {
        EvolverConfig {
            min_tick: self.evolver_min_tick,
            max_tick: self.evolver_max_tick,
            report_prices: self.report_prices,
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            pass_interval: self.pass_interval,
            ..SessionConfig::default()
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
