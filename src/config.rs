use std::time::Duration;

/// Service identity constants advertised to the registry. Fixed for
/// the process lifetime.
pub const SERVICE_NAME: &str = "student-info-service";
pub const SERVICE_KIND: &str = "HTTP";

/// Process configuration, resolved once at startup.
///
/// Only the environment-tunable knobs come from the environment:
/// `PORT` (listening port), `SERVICE_HOST` (the reachable host put in
/// the registration record), `REGISTRY_ADDR` (registry endpoint), and
/// `REDIS_URL` (record store; the literal value `mem` selects the
/// volatile in-memory store). Everything else is a fixed default.
#[derive(Clone, Debug)]
pub struct Config {
    pub listen_port: u16,
    pub advertised_host: String,
    pub store_url: String,
    pub registry_endpoint: String,
    pub registry_retry_interval: Duration,
    pub telemetry_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            advertised_host: "127.0.0.1".to_string(),
            store_url: "redis://127.0.0.1:6379/".to_string(),
            registry_endpoint: "127.0.0.1:9090".to_string(),
            registry_retry_interval: Duration::from_secs(10),
            telemetry_queue: 1024,
        }
    }
}

impl Config {
    /// Resolve the configuration from the environment, falling back to
    /// defaults for anything unset. An unparseable `PORT` is a startup
    /// error — the caller treats it as fatal.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();

        config.listen_port = parse_port(std::env::var("PORT").ok())?;
        if let Ok(host) = std::env::var("SERVICE_HOST") {
            config.advertised_host = host;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            config.store_url = url;
        }
        if let Ok(addr) = std::env::var("REGISTRY_ADDR") {
            config.registry_endpoint = addr;
        }

        Ok(config)
    }
}

fn parse_port(raw: Option<String>) -> Result<u16, String> {
    match raw {
        None => Ok(Config::default().listen_port),
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| format!("PORT must be a port number, got \"{raw}\"")),
    }
}
