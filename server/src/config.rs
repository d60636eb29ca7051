//! Server configuration parsed from environment variables.

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("DEFAULT_PAGE_SIZE ({default}) must be between 1 and MAX_PAGE_SIZE ({max})")]
    PageLimits { default: u32, max: u32 },
}

/// Page size bounds applied to paged listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self { default_limit: DEFAULT_PAGE_SIZE, max_limit: DEFAULT_MAX_PAGE_SIZE }
    }
}

impl PageLimits {
    /// Clamp a requested limit into `[1, max_limit]`, defaulting when absent.
    #[must_use]
    pub fn clamp(self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.default_limit).clamp(1, self.max_limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Postgres URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub page_limits: PageLimits,
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: in-memory store when absent or empty
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `DEFAULT_PAGE_SIZE`: default 20
    /// - `MAX_PAGE_SIZE`: default 100
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse or the page
    /// limits are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        let page_limits = PageLimits {
            default_limit: parse_or(&lookup, "DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            max_limit: parse_or(&lookup, "MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?,
        };
        if page_limits.default_limit == 0 || page_limits.default_limit > page_limits.max_limit {
            return Err(ConfigError::PageLimits { default: page_limits.default_limit, max: page_limits.max_limit });
        }

        Ok(Self { port, database_url, db_max_connections, page_limits })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
