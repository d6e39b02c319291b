//! Synthetic tick generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::limits::{
    DEFAULT_PRICE_MAX, DEFAULT_PRICE_MIN, DEFAULT_SYMBOLS, DEFAULT_VOLUME_MAX, DEFAULT_VOLUME_MIN,
};
use crate::tick::Tick;

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Symbols drawn uniformly
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_price_min")]
    pub price_min: f64,
    #[serde(default = "default_price_max")]
    pub price_max: f64,
    #[serde(default = "default_volume_min")]
    pub volume_min: u64,
    #[serde(default = "default_volume_max")]
    pub volume_max: u64,
    /// Fixed seed for reproducible streams (entropy when unset)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_symbols() -> Vec<String> {
    DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

fn default_price_min() -> f64 {
    DEFAULT_PRICE_MIN
}

fn default_price_max() -> f64 {
    DEFAULT_PRICE_MAX
}

fn default_volume_min() -> u64 {
    DEFAULT_VOLUME_MIN
}

fn default_volume_max() -> u64 {
    DEFAULT_VOLUME_MAX
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            price_min: default_price_min(),
            price_max: default_price_max(),
            volume_min: default_volume_min(),
            volume_max: default_volume_max(),
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Checks that every generated tick would pass ingestion validation.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(Error::config("generator.symbols must not be empty"));
        }
        for symbol in &self.symbols {
            Tick::new(symbol.clone(), self.price_min.max(0.01), 0)
                .to_json()
                .and_then(|json| Tick::parse(json.as_bytes()))
                .map_err(|e| Error::config(format!("generator symbol {:?}: {}", symbol, e)))?;
        }
        if !(self.price_min.is_finite() && self.price_max.is_finite()) {
            return Err(Error::config("generator price range must be finite"));
        }
        if self.price_min < 0.01 || self.price_min > self.price_max {
            return Err(Error::config(format!(
                "generator price range [{}, {}] is invalid",
                self.price_min, self.price_max
            )));
        }
        if self.volume_min > self.volume_max {
            return Err(Error::config(format!(
                "generator volume range [{}, {}] is invalid",
                self.volume_min, self.volume_max
            )));
        }
        Ok(())
    }
}

/// Draws ticks uniformly from the configured symbol set and ranges.
pub struct TickGenerator {
    config: GeneratorConfig,
    rng: StdRng,
}

impl TickGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { config, rng })
    }

    /// Generates the next tick. Price is rounded to cents.
    pub fn generate(&mut self) -> Tick {
        let index = self.rng.gen_range(0..self.config.symbols.len());
        let symbol = self.config.symbols[index].clone();

        let raw = self
            .rng
            .gen_range(self.config.price_min..=self.config.price_max);
        let price = round_cents(raw);

        let volume = self
            .rng
            .gen_range(self.config.volume_min..=self.config.volume_max);

        Tick::new(symbol, price, volume)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
