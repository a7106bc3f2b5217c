use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use log::warn;

use crate::optimizer::SearchConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub catalog: CatalogConfig,
    pub search: SearchConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            catalog: CatalogConfig::from_env(),
            search: search_config_from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "SPACE_SEARCH_API_HOST";
    const PORT_VAR: &'static str = "SPACE_SEARCH_API_PORT";

    fn from_env() -> Self {
        let host_value =
            env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "⚠️ {} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Location of the listings file.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    listings_path: PathBuf,
}

impl CatalogConfig {
    const DEFAULT_LISTINGS_PATH: &'static str = "listings.json";
    const LISTINGS_PATH_VAR: &'static str = "SPACE_SEARCH_LISTINGS_PATH";

    fn from_env() -> Self {
        Self {
            listings_path: env_string(Self::LISTINGS_PATH_VAR)
                .unwrap_or_else(|| Self::DEFAULT_LISTINGS_PATH.to_string())
                .into(),
        }
    }

    /// Path of the JSON file holding all listings.
    pub fn listings_path(&self) -> &Path {
        &self.listings_path
    }
}

const CELL_SIZE_VAR: &str = "SPACE_SEARCH_CELL_SIZE";
const ALLOW_ROTATION_VAR: &str = "SPACE_SEARCH_ALLOW_ROTATION";
const MAX_PARALLEL_VAR: &str = "SPACE_SEARCH_MAX_PARALLEL_LOCATIONS";

fn search_config_from_env() -> SearchConfig {
    let cell_size = load_u32_with_warning(
        CELL_SIZE_VAR,
        SearchConfig::DEFAULT_CELL_SIZE.get(),
        |value| value > 0,
        "must be greater than 0",
        "Warning: Adjusted cell size changes how listings and vehicles are rounded",
    );
    let cell_size = NonZeroU32::new(cell_size).unwrap_or(SearchConfig::DEFAULT_CELL_SIZE);

    let allow_rotation = env_string(ALLOW_ROTATION_VAR)
        .and_then(|raw| parse_bool(&raw, ALLOW_ROTATION_VAR))
        .unwrap_or(SearchConfig::DEFAULT_ALLOW_ROTATION);

    let max_parallel_locations = load_u32_with_warning(
        MAX_PARALLEL_VAR,
        u32::try_from(SearchConfig::default_parallelism()).unwrap_or(u32::MAX),
        |value| value > 0,
        "must be greater than 0",
        "Warning: Adjusted parallelism may slow down searches over many locations",
    );

    SearchConfig::builder()
        .cell_size(cell_size)
        .allow_rotation(allow_rotation)
        .max_parallel_locations(max_parallel_locations as usize)
        .build()
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name, err
            );
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn parse_u32_with_warning(
    var_name: &str,
    raw: &str,
    default: u32,
    validator: impl Fn(u32) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> u32 {
    match raw.parse::<u32>() {
        Ok(value) if !validator(value) => {
            warn!(
                "⚠️ {} contains invalid value '{}': {}. Using {}.",
                var_name, raw, invalid_hint, default
            );
            default
        }
        Ok(value) => {
            if value != default {
                warn!("⚠️ {} ({} = {}).", warning, var_name, value);
            }
            value
        }
        Err(err) => {
            warn!(
                "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}

fn load_u32_with_warning(
    var_name: &str,
    default: u32,
    validator: impl Fn(u32) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> u32 {
    match env_string(var_name) {
        Some(raw) => parse_u32_with_warning(var_name, &raw, default, validator, invalid_hint, warning),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Test case insensitivity
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("Yes", "TEST_VAR"), Some(true));

        // Test with whitespace
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("n", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("OFF", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("  0  ", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn test_parse_u32_accepts_valid_values() {
        assert_eq!(
            parse_u32_with_warning("TEST_VAR", "25", 10, |v| v > 0, "hint", "warning"),
            25
        );
        assert_eq!(
            parse_u32_with_warning("TEST_VAR", "10", 10, |v| v > 0, "hint", "warning"),
            10
        );
    }

    #[test]
    fn test_parse_u32_falls_back_on_invalid_values() {
        assert_eq!(
            parse_u32_with_warning("TEST_VAR", "0", 10, |v| v > 0, "hint", "warning"),
            10
        );
        assert_eq!(
            parse_u32_with_warning("TEST_VAR", "-3", 10, |v| v > 0, "hint", "warning"),
            10
        );
        assert_eq!(
            parse_u32_with_warning("TEST_VAR", "ten", 10, |v| v > 0, "hint", "warning"),
            10
        );
    }

    #[test]
    fn test_unset_variables_use_defaults() {
        assert_eq!(
            load_u32_with_warning(
                "SPACE_SEARCH_TEST_SURELY_UNSET",
                7,
                |v| v > 0,
                "hint",
                "warning"
            ),
            7
        );
        assert_eq!(env_string("SPACE_SEARCH_TEST_SURELY_UNSET"), None);
    }
}
