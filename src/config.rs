use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub model_path: String,
    pub model_sha256: Option<String>,
    pub oracle_url: Option<String>, // Remote model server; local artifact when unset
    pub oracle_timeout_secs: u64,
    pub session_ttl_secs: u64,
    pub max_sessions: u64,
    pub default_threshold: f64,
    pub max_upload_bytes: usize,
    pub strict_batch_validation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            model_path: "assets/churn_logistic.json".to_string(),
            model_sha256: None,
            oracle_url: None,
            oracle_timeout_secs: 30,
            session_ttl_secs: 1800,
            max_sessions: 10_000,
            default_threshold: 0.5,
            max_upload_bytes: 5 * 1024 * 1024,
            strict_batch_validation: true,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let config = Self {
            port: var("PORT")
                .map(|v| v.trim().parse::<u16>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?
                .unwrap_or(defaults.port),
            model_path: var("MODEL_PATH").unwrap_or(defaults.model_path),
            model_sha256: var("MODEL_SHA256")
                .map(|digest| {
                    let digest = digest.trim().to_string();
                    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                        anyhow::bail!("MODEL_SHA256 must be a 64-character hex digest");
                    }
                    Ok(digest)
                })
                .transpose()?,
            oracle_url: var("ORACLE_URL")
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("ORACLE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?,
            oracle_timeout_secs: var("ORACLE_TIMEOUT_SECS")
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("ORACLE_TIMEOUT_SECS must be a whole number"))?
                .unwrap_or(defaults.oracle_timeout_secs),
            session_ttl_secs: var("SESSION_TTL_SECS")
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("SESSION_TTL_SECS must be a whole number"))?
                .unwrap_or(defaults.session_ttl_secs),
            max_sessions: var("MAX_SESSIONS")
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("MAX_SESSIONS must be a whole number"))?
                .unwrap_or(defaults.max_sessions),
            default_threshold: var("DEFAULT_THRESHOLD")
                .map(|v| v.trim().parse::<f64>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("DEFAULT_THRESHOLD must be a number"))?
                .unwrap_or(defaults.default_threshold),
            max_upload_bytes: var("MAX_UPLOAD_BYTES")
                .map(|v| v.trim().parse::<usize>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("MAX_UPLOAD_BYTES must be a whole number"))?
                .unwrap_or(defaults.max_upload_bytes),
            strict_batch_validation: match var("STRICT_BATCH_VALIDATION") {
                None => defaults.strict_batch_validation,
                Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => true,
                    "0" | "false" | "no" | "off" => false,
                    _ => anyhow::bail!("STRICT_BATCH_VALIDATION must be true or false"),
                },
            },
        };

        if !(0.0..=1.0).contains(&config.default_threshold) {
            anyhow::bail!("DEFAULT_THRESHOLD must be between 0 and 1");
        }
        if config.session_ttl_secs == 0 || config.max_sessions == 0 {
            anyhow::bail!("SESSION_TTL_SECS and MAX_SESSIONS must be greater than 0");
        }

        tracing::debug!("Server Port: {}", config.port);
        match config.oracle_url {
            Some(ref url) => tracing::info!("Remote model server configured: {}", url),
            None => tracing::debug!("Model artifact: {}", config.model_path),
        }
        tracing::debug!(
            "Sessions: ttl {}s, max {}; default threshold {}; strict batch validation {}",
            config.session_ttl_secs,
            config.max_sessions,
            config.default_threshold,
            config.strict_batch_validation
        );

        Ok(config)
    }
}
