use clap::Parser;
use std::time::Duration;
use crate::identity::Environment;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "crate-digger")]
#[command(about = "Personal vinyl record catalog service")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Deployment environment, controls proxy trust and error detail
    #[arg(short, long, env = "APP_ENV", value_enum, default_value = "development")]
    pub environment: Environment,

    // Let unauthenticated callers act as the guest user (development only)
    #[arg(long, env = "ALLOW_GUEST_ACCESS", default_value_t = false)]
    pub allow_guest_access: bool,

    // Discogs API base url
    #[arg(long, default_value = "https://api.discogs.com")]
    pub discogs_url: String,

    // Personal access token, Discogs only serves search to authenticated clients
    #[arg(long, env = "DISCOGS_TOKEN", hide_env_values = true)]
    pub discogs_token: Option<String>,

    // Discogs lookup cache TTL in seconds
    #[arg(long, default_value_t = 300)]
    pub discogs_cache_ttl: u64,

    // OpenAI-compatible vision API base url
    #[arg(long, default_value = "https://api.x.ai/v1")]
    pub vision_url: String,

    #[arg(long, default_value = "grok-2-vision-1212")]
    pub vision_model: String,

    #[arg(long, env = "XAI_API_KEY", hide_env_values = true)]
    pub vision_api_key: Option<String>,

    // Give up on the vision model after this many seconds
    #[arg(long, default_value_t = 30)]
    pub extraction_timeout: u64,

    // How often stale rate limit windows are swept, in seconds
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,
}

impl Args {
    pub fn settings(&self) -> Settings {
        Settings {
            environment: self.environment,
            allow_guest_access: self.allow_guest_access,
            discogs_url: self.discogs_url.trim_end_matches('/').to_string(),
            discogs_token: self.discogs_token.clone().filter(|t| !t.is_empty()),
            discogs_cache_ttl: Duration::from_secs(self.discogs_cache_ttl),
            vision_url: self.vision_url.trim_end_matches('/').to_string(),
            vision_model: self.vision_model.clone(),
            vision_api_key: self.vision_api_key.clone().filter(|k| !k.is_empty()),
            extraction_timeout: Duration::from_secs(self.extraction_timeout),
        }
    }
}

// Runtime settings shared with handlers
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub allow_guest_access: bool,
    pub discogs_url: String,
    pub discogs_token: Option<String>,
    pub discogs_cache_ttl: Duration,
    pub vision_url: String,
    pub vision_model: String,
    pub vision_api_key: Option<String>,
    pub extraction_timeout: Duration,
}

impl Settings {
    // Guest access was asked for but only a development deployment honors it
    pub fn guest_access_ignored(&self) -> bool {
        self.allow_guest_access && self.environment != Environment::Development
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            allow_guest_access: false,
            discogs_url: "https://api.discogs.com".to_string(),
            discogs_token: None,
            discogs_cache_ttl: Duration::from_secs(300),
            vision_url: "https://api.x.ai/v1".to_string(),
            vision_model: "grok-2-vision-1212".to_string(),
            vision_api_key: None,
            extraction_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_into_settings() {
        let args = Args::parse_from([
            "crate-digger",
            "--environment",
            "production",
            "--discogs-url",
            "http://localhost:9000/",
            "--extraction-timeout",
            "5",
            "--vision-api-key",
            "",
        ]);
        let settings = args.settings();
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.discogs_url, "http://localhost:9000");
        assert_eq!(settings.extraction_timeout, Duration::from_secs(5));
        assert!(settings.vision_api_key.is_none());
        assert!(!settings.allow_guest_access);
    }

    #[test]
    fn guest_opt_in_only_counts_in_development() {
        let mut settings = Settings {
            allow_guest_access: true,
            ..Settings::default()
        };
        assert!(!settings.guest_access_ignored());

        settings.environment = Environment::Test;
        assert!(settings.guest_access_ignored());
        settings.environment = Environment::Production;
        assert!(settings.guest_access_ignored());

        settings.allow_guest_access = false;
        assert!(!settings.guest_access_ignored());
    }
}
