use std::sync::atomic::{AtomicU64, Ordering};

use validator::Validate;

#[derive(Deserialize, Debug, Validate)]
pub struct Config {
    database_url: String,
    api_host: Option<String>,
    api_port: Option<usize>,
    #[validate(length(min = 32))]
    session_private_key: String,
    /// how long a slot hold stays valid, in seconds
    #[serde(default = "default_hold_duration")]
    hold_duration_seconds: AtomicU64,
}

fn default_hold_duration() -> AtomicU64 {
    AtomicU64::new(300)
}

lazy_static! {
    static ref CONFIG: Config = match envy::from_env::<Config>() {
        Ok(config) => {
            match config.validate() {
                Ok(()) => config,
                Err(e) => panic!("invalid environment variable: {}", e),
            }
        }
        Err(error) => panic!("Missing or incorrect environment variable: {}", error),
    };
}

impl Config {
    pub fn database_url() -> &'static str {
        CONFIG.database_url.as_ref()
    }

    pub fn api_host() -> &'static str {
        match &CONFIG.api_host {
            Some(host) => host.as_ref(),
            None => "localhost",
        }
    }

    pub fn api_port() -> usize {
        CONFIG.api_port.unwrap_or(8080)
    }

    pub fn session_private_key() -> &'static str {
        CONFIG.session_private_key.as_ref()
    }

    pub fn hold_duration_seconds() -> u64 {
        CONFIG.hold_duration_seconds.load(Ordering::SeqCst)
    }

    pub fn set_hold_duration_seconds(seconds: u64) {
        CONFIG.hold_duration_seconds.store(seconds, Ordering::SeqCst)
    }
}
