use std::{env, path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// When unset the server runs against the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// Directory of `.sql` files applied at startup.
    pub migrations_dir: PathBuf,
    pub engine: EngineConfig,
}

/// Knobs of the order engine itself, independent of transport and storage.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Grace period after delivery before escrow is auto-released.
    pub auto_release_days: i32,
    /// Tax on the subtotal, in basis points (1500 = 15%).
    pub tax_rate_bps: i64,
    /// How many times a mutation is re-evaluated after losing a commit race.
    pub commit_attempts: u32,
    pub sweep_interval: Duration,
    pub currency: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_release_days: 7,
            tax_rate_bps: 1500,
            commit_attempts: 3,
            sweep_interval: Duration::from_secs(3600),
            currency: "ZAR".to_string(),
        }
    }
}

/// Reads `key` and parses it. Unset or empty values yield `None`; a value
/// that is present but malformed is an error rather than a silent default.
fn parsed<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, env::var(key).ok())
}

fn parse_value<T>(key: &str, raw: Option<String>) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("{key}={value:?} is invalid: {err}")),
    }
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            auto_release_days: parsed("AUTO_RELEASE_DAYS")?.unwrap_or(defaults.auto_release_days),
            tax_rate_bps: parsed("TAX_RATE_BPS")?.unwrap_or(defaults.tax_rate_bps),
            commit_attempts: parsed("COMMIT_ATTEMPTS")?.unwrap_or(defaults.commit_attempts),
            sweep_interval: parsed("SWEEP_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            currency: env::var("CURRENCY").unwrap_or(defaults.currency),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0..=365).contains(&self.auto_release_days) {
            anyhow::bail!("AUTO_RELEASE_DAYS must be between 0 and 365");
        }
        if !(0..=10_000).contains(&self.tax_rate_bps) {
            anyhow::bail!("TAX_RATE_BPS must be between 0 and 10000");
        }
        if self.commit_attempts == 0 {
            anyhow::bail!("COMMIT_ATTEMPTS must be at least 1");
        }
        if self.sweep_interval.is_zero() {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be greater than zero");
        }
        if self.currency.trim().is_empty() {
            anyhow::bail!("CURRENCY must not be empty");
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parsed("APP_PORT")?.unwrap_or(3000);
        let migrations_dir = env::var("MIGRATIONS_DIR")
            .ok()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("migrations"));
        let engine = EngineConfig::from_env()?;
        Ok(Self {
            port,
            database_url,
            host,
            migrations_dir,
            engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_values_are_rejected() {
        let err = parse_value::<i64>("TAX_RATE_BPS", Some("15%".into())).unwrap_err();
        assert!(err.to_string().contains("TAX_RATE_BPS"));
        assert_eq!(parse_value::<i64>("TAX_RATE_BPS", Some(" 1400 ".into())).unwrap(), Some(1400));
        assert_eq!(parse_value::<i64>("TAX_RATE_BPS", Some(String::new())).unwrap(), None);
        assert_eq!(parse_value::<i64>("TAX_RATE_BPS", None).unwrap(), None);
    }

    #[test]
    fn out_of_range_engine_settings_fail_validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let negative_tax = EngineConfig {
            tax_rate_bps: -1,
            ..EngineConfig::default()
        };
        assert!(negative_tax.validate().is_err());

        let no_interval = EngineConfig {
            sweep_interval: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert!(no_interval.validate().is_err());

        let long_grace = EngineConfig {
            auto_release_days: 366,
            ..EngineConfig::default()
        };
        assert!(long_grace.validate().is_err());
    }
}
