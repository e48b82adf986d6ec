use std::path::PathBuf;
use std::str::FromStr;

/// How availability queries enumerate candidate days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityMode {
    Materialized,
    Computed,
}

impl FromStr for AvailabilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "materialized" => Ok(AvailabilityMode::Materialized),
            "computed" => Ok(AvailabilityMode::Computed),
            other => Err(format!("unknown availability mode: {other}")),
        }
    }
}

/// Process configuration, read once from `CAMPSITE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub calendar_years: u32,
    pub availability: AvailabilityMode,
    pub enforce_policy: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 7878,
            data_dir: PathBuf::from("./data"),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            calendar_years: 5,
            availability: AvailabilityMode::Materialized,
            enforce_policy: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind: lookup("CAMPSITE_BIND").unwrap_or(defaults.bind),
            port: parse_var(&lookup, "CAMPSITE_PORT").unwrap_or(defaults.port),
            data_dir: lookup("CAMPSITE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_connections: parse_var(&lookup, "CAMPSITE_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections),
            compact_threshold: parse_var(&lookup, "CAMPSITE_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            metrics_port: parse_var(&lookup, "CAMPSITE_METRICS_PORT"),
            calendar_years: parse_var(&lookup, "CAMPSITE_CALENDAR_YEARS")
                .unwrap_or(defaults.calendar_years),
            availability: parse_var(&lookup, "CAMPSITE_AVAILABILITY")
                .unwrap_or(defaults.availability),
            enforce_policy: parse_var(&lookup, "CAMPSITE_ENFORCE_POLICY")
                .unwrap_or(defaults.enforce_policy),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), Config::default());
        assert_eq!(Config::default().addr(), "0.0.0.0:7878");
    }

    #[test]
    fn reads_overrides() {
        let c = config(&[
            ("CAMPSITE_PORT", "9000"),
            ("CAMPSITE_DATA_DIR", "/var/lib/campsite"),
            ("CAMPSITE_METRICS_PORT", "9100"),
            ("CAMPSITE_AVAILABILITY", "Computed"),
            ("CAMPSITE_ENFORCE_POLICY", "false"),
        ]);
        assert_eq!(c.port, 9000);
        assert_eq!(c.wal_path(), PathBuf::from("/var/lib/campsite/bookings.wal"));
        assert_eq!(c.metrics_port, Some(9100));
        assert_eq!(c.availability, AvailabilityMode::Computed);
        assert!(!c.enforce_policy);
    }

    #[test]
    fn garbage_falls_back() {
        let c = config(&[("CAMPSITE_PORT", "seventy"), ("CAMPSITE_AVAILABILITY", "psychic")]);
        assert_eq!(c.port, 7878);
        assert_eq!(c.availability, AvailabilityMode::Materialized);
    }
}
