//! Connection configuration.
//!
//! A [`Config`] is built explicitly, from a `fauna://` URL, or from the
//! `[connection]` table of a TOML file. The library never reads the
//! environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{FaunaError, FaunaResult};
use crate::transpiler::DEFAULT_PAGE_SIZE;

pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_DOMAIN: &str = "db.fauna.com";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings.
#[derive(Clone, PartialEq)]
pub struct Config {
    /// Access key sent as a bearer token
    pub secret: String,
    /// `http` or `https`
    pub scheme: String,
    pub domain: String,
    pub port: u16,
    /// Per-request network timeout
    pub timeout: Duration,
    /// Documents fetched per `Paginate`
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret: String::new(),
            scheme: DEFAULT_SCHEME.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// The secret never reaches logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("secret", &"<redacted>")
            .field("scheme", &self.scheme)
            .field("domain", &self.domain)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    connection: ConnectionSection,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectionSection {
    secret: Option<String>,
    scheme: Option<String>,
    domain: Option<String>,
    port: Option<u16>,
    /// Seconds
    timeout: Option<u64>,
    page_size: Option<usize>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Base URL of the query endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}/", self.scheme, self.domain, self.port)
    }

    /// Parse `fauna://SECRET@host[:port][/?scheme=http&timeout=5&page_size=500]`.
    pub fn from_url(raw: &str) -> FaunaResult<Self> {
        let url = Url::parse(raw).map_err(|e| FaunaError::Config(format!("invalid URL: {}", e)))?;
        if !matches!(url.scheme(), "fauna" | "faunadb") {
            return Err(FaunaError::Config(format!(
                "unsupported URL scheme '{}' (expected fauna://)",
                url.scheme()
            )));
        }

        let mut builder = Config::builder();
        let secret = match url.password() {
            Some(password) => format!("{}:{}", url.username(), password),
            None => url.username().to_string(),
        };
        builder = builder.secret(secret);
        if let Some(host) = url.host_str().filter(|h| !h.is_empty()) {
            builder = builder.domain(host);
        }
        if let Some(port) = url.port() {
            builder = builder.port(port);
        }
        for (key, value) in url.query_pairs() {
            builder = match key.as_ref() {
                "scheme" => builder.scheme(value.as_ref()),
                "timeout" => builder.timeout(Duration::from_secs(parse_number(&key, &value)?)),
                "page_size" => builder.page_size(parse_number(&key, &value)?),
                other => {
                    return Err(FaunaError::Config(format!("unknown URL option '{}'", other)));
                }
            };
        }
        builder.build()
    }

    /// Parse the `[connection]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> FaunaResult<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| FaunaError::Config(format!("invalid config file: {}", e)))?;
        let section = file.connection;

        let mut builder = Config::builder();
        if let Some(secret) = section.secret {
            builder = builder.secret(secret);
        }
        if let Some(scheme) = section.scheme {
            builder = builder.scheme(scheme);
        }
        if let Some(domain) = section.domain {
            builder = builder.domain(domain);
        }
        if let Some(port) = section.port {
            builder = builder.port(port);
        }
        if let Some(timeout) = section.timeout {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        if let Some(page_size) = section.page_size {
            builder = builder.page_size(page_size);
        }
        builder.build()
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> FaunaResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// `<config dir>/sqlfauna/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sqlfauna").join("config.toml"))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> FaunaResult<T> {
    value
        .parse()
        .map_err(|_| FaunaError::Config(format!("option '{}' expects a number, got '{}'", key, value)))
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the access secret
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = secret.into();
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.config.domain = domain.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> FaunaResult<Config> {
        let config = self.config;
        if config.secret.is_empty() {
            return Err(FaunaError::Config("secret is required".to_string()));
        }
        if !matches!(config.scheme.as_str(), "http" | "https") {
            return Err(FaunaError::Config(format!(
                "scheme must be http or https, got '{}'",
                config.scheme
            )));
        }
        if config.port == 0 {
            return Err(FaunaError::Config("port must be non-zero".to_string()));
        }
        if config.timeout.is_zero() {
            return Err(FaunaError::Config("timeout must be positive".to_string()));
        }
        if config.page_size == 0 || config.page_size > DEFAULT_PAGE_SIZE {
            return Err(FaunaError::Config(format!(
                "page_size must be between 1 and {}",
                DEFAULT_PAGE_SIZE
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::builder().secret("s3cr3t").build().unwrap();
        assert_eq!(config.endpoint(), "https://db.fauna.com:443/");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.page_size, 100_000);
    }

    #[test]
    fn test_secret_required() {
        assert!(matches!(Config::builder().build(), Err(FaunaError::Config(_))));
    }

    #[test]
    fn test_from_url() {
        let config =
            Config::from_url("fauna://abc123@localhost:8443/?scheme=http&timeout=5&page_size=500")
                .unwrap();
        assert_eq!(config.secret, "abc123");
        assert_eq!(config.endpoint(), "http://localhost:8443/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.page_size, 500);
    }

    #[test]
    fn test_from_url_rejects_other_schemes() {
        assert!(Config::from_url("postgres://u@localhost/db").is_err());
        assert!(Config::from_url("fauna://abc@host/?colour=red").is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml_str(
            r#"
[connection]
secret = "xyz"
domain = "db.us.fauna.com"
timeout = 10
"#,
        )
        .unwrap();
        assert_eq!(config.domain, "db.us.fauna.com");
        assert_eq!(config.port, 443);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = Config::builder().secret("very-secret").build().unwrap();
        assert!(!format!("{:?}", config).contains("very-secret"));
    }
}
