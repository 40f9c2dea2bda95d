use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a number, got '{value}'")]
    NotNumeric { name: &'static str, value: String },

    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub omdb_url: String,
    pub pool_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_owned());
        let pool_size = number("DB_POOL_SIZE", get("DB_POOL_SIZE"), 4)?;
        if pool_size == 0 {
            return Err(ConfigError::Zero("DB_POOL_SIZE"));
        }
        Ok(Config {
            host: string("HOST", "127.0.0.1"),
            port: number("PORT", get("PORT"), 8080)?,
            database_path: string("DATABASE_PATH", "instance/movieweb.db"),
            omdb_url: string("OMDB_API_URL", "https://www.omdbapi.com/"),
            pool_size,
        })
    }
}

fn number<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::NotNumeric { name, value }),
    }
}
