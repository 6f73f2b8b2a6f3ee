//! Engine configuration.

use crate::compute::grid::{MAX_PRECISION, MIN_PRECISION};
use crate::index::DEFAULT_KEY_PRECISION;
use serde::de::Error;

/// Engine configuration.
///
/// ```
/// use meetspot::Config;
///
/// let config = Config::from_json(r#"{"grid_precision": 6}"#).unwrap();
/// assert_eq!(config.grid_precision, 6);
/// assert_eq!(config.max_distance_cap_meters, 50_000.0);
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Geohash precision of stored keys.
    #[serde(default = "Config::default_key_precision")]
    pub key_precision: usize,

    /// Geohash precision of the cells the query planner expands rings over.
    /// Must not be finer than `key_precision`.
    #[serde(default = "Config::default_grid_precision")]
    pub grid_precision: usize,

    /// Hard upper bound on any search radius, whatever the caller asks for.
    #[serde(default = "Config::default_max_distance_cap")]
    pub max_distance_cap_meters: f64,

    /// Result limit used when a query does not specify one.
    #[serde(default = "Config::default_limit")]
    pub default_limit: usize,
}

impl Config {
    const fn default_key_precision() -> usize {
        DEFAULT_KEY_PRECISION
    }

    const fn default_grid_precision() -> usize {
        5
    }

    const fn default_max_distance_cap() -> f64 {
        50_000.0
    }

    const fn default_limit() -> usize {
        150
    }

    pub fn with_key_precision(mut self, precision: usize) -> Self {
        self.key_precision = precision;
        self
    }

    pub fn with_grid_precision(mut self, precision: usize) -> Self {
        self.grid_precision = precision;
        self
    }

    pub fn with_max_distance_cap(mut self, meters: f64) -> Self {
        if meters > 1_000_000.0 {
            log::warn!(
                "Distance cap of {} m is very large; ring expansion cost grows with the square of the radius",
                meters
            );
        }
        self.max_distance_cap_meters = meters;
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&self.key_precision) {
            return Err(format!(
                "Key precision must be between {} and {}",
                MIN_PRECISION, MAX_PRECISION
            ));
        }

        if !(MIN_PRECISION..=self.key_precision).contains(&self.grid_precision) {
            return Err(format!(
                "Grid precision must be between {} and the key precision ({})",
                MIN_PRECISION, self.key_precision
            ));
        }

        if !self.max_distance_cap_meters.is_finite() || self.max_distance_cap_meters < 0.0 {
            return Err("Distance cap must be a finite, non-negative number".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_precision: Self::default_key_precision(),
            grid_precision: Self::default_grid_precision(),
            max_distance_cap_meters: Self::default_max_distance_cap(),
            default_limit: Self::default_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.key_precision, 9);
        assert_eq!(config.grid_precision, 5);
        assert_eq!(config.default_limit, 150);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = Config::default().with_grid_precision(6).with_default_limit(20);
        let json = config.to_json().unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(Config::from_json(r#"{"grid_precison": 6}"#).is_err());
    }

    #[test]
    fn test_rejects_grid_finer_than_keys() {
        assert!(Config::from_json(r#"{"key_precision": 6, "grid_precision": 7}"#).is_err());
        assert!(Config::default().with_grid_precision(0).validate().is_err());
    }

    #[test]
    fn test_rejects_negative_cap() {
        assert!(Config::default().with_max_distance_cap(-1.0).validate().is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default().with_key_precision(10);
        let toml_str = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&toml_str).unwrap(), config);
    }
}
