use std::env;

/// Console configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fleet server `host:port`.
    pub server_address: String,
    /// Client id announced at session establishment.
    pub console_id: String,
}

const DEFAULT_SERVER: &str = "127.0.0.1:9001";
const DEFAULT_CONSOLE_ID: &str = "console0";

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let server_address =
            env::var("WHISKER_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string());
        let console_id =
            env::var("WHISKER_CONSOLE_ID").unwrap_or_else(|_| DEFAULT_CONSOLE_ID.to_string());
        Self {
            server_address,
            console_id,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER.to_string(),
            console_id: DEFAULT_CONSOLE_ID.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    // Environment variable tests must not run in parallel.
    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.server_address, "127.0.0.1:9001");
        assert_eq!(config.console_id, "console0");
    }

    #[test]
    fn from_env_falls_back_to_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::remove_var("WHISKER_SERVER");
            env::remove_var("WHISKER_CONSOLE_ID");
        }
        let config = Config::from_env();
        assert_eq!(config.server_address, "127.0.0.1:9001");
        assert_eq!(config.console_id, "console0");
    }

    #[test]
    fn from_env_reads_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let original = env::var("WHISKER_SERVER").ok();

        unsafe {
            env::set_var("WHISKER_SERVER", "fleet.example.com:9100");
        }
        let config = Config::from_env();
        assert_eq!(config.server_address, "fleet.example.com:9100");

        unsafe {
            match original {
                Some(value) => env::set_var("WHISKER_SERVER", value),
                None => env::remove_var("WHISKER_SERVER"),
            }
        }
    }
}
