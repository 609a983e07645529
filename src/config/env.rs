//! Environment overrides.
//!
//! | Variable             | Aliases        | Setting             |
//! |----------------------|----------------|---------------------|
//! | `SOURCE_LOCATION`    | `GITHUB_URL`   | `[source] location` |
//! | `REFRESH_INTERVAL`   | `REFRESH_TIME` | `[sync] interval`   |
//! | `DEPLOYMENT_PROFILE` |                | `[sync] profile`    |
//! | `LISTEN_PORT`        | `PORT`         | `[serve] port`      |
//!
//! The primary name wins when both it and an alias are set. Empty values
//! count as unset.

use super::{ConfigError, Profile, SiteConfig};

const SOURCE_VARS: &[&str] = &["SOURCE_LOCATION", "GITHUB_URL"];
const INTERVAL_VARS: &[&str] = &["REFRESH_INTERVAL", "REFRESH_TIME"];
const PROFILE_VARS: &[&str] = &["DEPLOYMENT_PROFILE"];
const PORT_VARS: &[&str] = &["LISTEN_PORT", "PORT"];

impl SiteConfig {
    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some((_, value)) = first_set(&lookup, SOURCE_VARS) {
            self.source.location = value;
        }
        if let Some((name, value)) = first_set(&lookup, INTERVAL_VARS) {
            self.sync.interval = Some(parse_interval(name, &value)?);
        }
        if let Some((name, value)) = first_set(&lookup, PROFILE_VARS) {
            let profile = Profile::parse(&value).ok_or_else(|| {
                ConfigError::invalid(name, format!("unknown profile `{value}`"))
            })?;
            self.sync.profile = Some(profile);
        }
        if let Some((name, value)) = first_set(&lookup, PORT_VARS) {
            self.serve.port = parse_port(name, &value)?;
        }
        Ok(())
    }
}

/// First variable in `names` with a non-empty value.
fn first_set<F>(lookup: &F, names: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|&name| {
        lookup(name)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .map(|v| (name, v))
    })
}

/// Seconds, strictly positive.
fn parse_interval(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(0) => Err(ConfigError::invalid(name, "must be a positive number of seconds")),
        Ok(secs) => Ok(secs),
        Err(_) => Err(ConfigError::invalid(name, format!("`{value}` is not a whole number of seconds"))),
    }
}

/// Port number, optionally written as `:8080`.
fn parse_port(name: &'static str, value: &str) -> Result<u16, ConfigError> {
    let digits = value.strip_prefix(':').unwrap_or(value);
    digits
        .parse::<u16>()
        .map_err(|_| ConfigError::invalid(name, format!("`{value}` is not a port number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_apply_env_primary_names() {
        let mut config = SiteConfig::default();
        config
            .apply_env(env(&[
                ("SOURCE_LOCATION", "https://github.com/acme/handbook"),
                ("REFRESH_INTERVAL", "15"),
                ("DEPLOYMENT_PROFILE", "production"),
                ("LISTEN_PORT", "9090"),
            ]))
            .unwrap();

        assert_eq!(config.source.location, "https://github.com/acme/handbook");
        assert_eq!(config.sync.interval, Some(15));
        assert_eq!(config.sync.profile, Some(Profile::Production));
        assert_eq!(config.serve.port, 9090);
    }

    #[test]
    fn test_apply_env_legacy_aliases() {
        let mut config = SiteConfig::default();
        config
            .apply_env(env(&[
                ("GITHUB_URL", "https://github.com/acme/old"),
                ("REFRESH_TIME", "60"),
                ("PORT", ":8081"),
            ]))
            .unwrap();

        assert_eq!(config.source.location, "https://github.com/acme/old");
        assert_eq!(config.sync.interval, Some(60));
        assert_eq!(config.serve.port, 8081);
    }

    #[test]
    fn test_primary_name_wins_over_alias() {
        let mut config = SiteConfig::default();
        config
            .apply_env(env(&[
                ("SOURCE_LOCATION", "https://new"),
                ("GITHUB_URL", "https://old"),
            ]))
            .unwrap();
        assert_eq!(config.source.location, "https://new");
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let mut config = SiteConfig::default();
        config.serve.port = 7000;
        config.apply_env(env(&[("LISTEN_PORT", "  ")])).unwrap();
        assert_eq!(config.serve.port, 7000);
    }

    #[test]
    fn test_invalid_interval() {
        let mut config = SiteConfig::default();
        let err = config.apply_env(env(&[("REFRESH_INTERVAL", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "REFRESH_INTERVAL", .. }));

        let err = config.apply_env(env(&[("REFRESH_TIME", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "REFRESH_TIME", .. }));
    }

    #[test]
    fn test_invalid_profile_and_port() {
        let mut config = SiteConfig::default();
        assert!(config.apply_env(env(&[("DEPLOYMENT_PROFILE", "staging")])).is_err());
        assert!(config.apply_env(env(&[("LISTEN_PORT", "99999")])).is_err());
    }
}
