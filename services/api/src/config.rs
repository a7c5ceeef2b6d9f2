use loanline_core::finalize::IncompletePolicy;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Public base URL the telephony gateway posts callbacks to, without a
    /// trailing slash.
    pub base_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub openai_api_key: String,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub results_path: PathBuf,
    pub incomplete_path: PathBuf,
    /// A session younger than this is considered live; older ones are
    /// silently replaced on the next initiation.
    pub session_cooldown_secs: i64,
    /// Sessions with fewer recorded answers than this are never evaluated.
    pub min_answered_questions: usize,
    pub incomplete_policy: IncompletePolicy,
    pub sms_notifications: bool,
    /// Positions in the full credit-card script to disable.
    pub cc_disabled_questions: Vec<usize>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let base_url = std::env::var("BASE_URL")
            .map_err(|_| ConfigError::MissingVar("BASE_URL".to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidValue("BASE_URL".to_string(), e.to_string()))?;

        let twilio_account_sid = require_var("TWILIO_ACCOUNT_SID")?;
        let twilio_auth_token = require_var("TWILIO_AUTH_TOKEN")?;
        let twilio_phone_number = require_var("TWILIO_PHONE_NUMBER")?;
        let openai_api_key = require_var("OPENAI_API_KEY")?;

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));
        let results_path = std::env::var("RESULTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./records/results.jsonl"));
        let incomplete_path = std::env::var("INCOMPLETE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./records/incomplete.jsonl"));

        let session_cooldown_secs = parse_var("SESSION_COOLDOWN_SECS", 120i64)?;
        if session_cooldown_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_COOLDOWN_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }
        let min_answered_questions = parse_var("MIN_ANSWERED_QUESTIONS", 5usize)?;

        let incomplete_policy_str =
            std::env::var("INCOMPLETE_POLICY").unwrap_or_else(|_| "discard".to_string());
        let incomplete_policy = match incomplete_policy_str.to_lowercase().as_str() {
            "discard" => IncompletePolicy::Discard,
            "archive" => IncompletePolicy::Archive,
            other => {
                return Err(ConfigError::InvalidValue(
                    "INCOMPLETE_POLICY".to_string(),
                    format!("'{}' is not 'discard' or 'archive'", other),
                ));
            }
        };

        let sms_notifications = match std::env::var("SMS_NOTIFICATIONS") {
            Err(_) => false,
            Ok(raw) => match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => {
                    return Err(ConfigError::InvalidValue(
                        "SMS_NOTIFICATIONS".to_string(),
                        format!("'{}' is not a boolean", other),
                    ));
                }
            },
        };

        let cc_disabled_questions = match std::env::var("CC_DISABLED_QUESTIONS") {
            Err(_) => Vec::new(),
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<usize>().map_err(|_| {
                        ConfigError::InvalidValue(
                            "CC_DISABLED_QUESTIONS".to_string(),
                            format!("'{}' is not a question index", part),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(Self {
            bind_address,
            base_url,
            twilio_account_sid,
            twilio_auth_token,
            twilio_phone_number,
            openai_api_key,
            chat_model,
            log_level,
            prompts_path,
            results_path,
            incomplete_path,
            session_cooldown_secs,
            min_answered_questions,
            incomplete_policy,
            sms_notifications,
            cc_disabled_questions,
        })
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("'{}' could not be parsed", raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("BASE_URL");
            env::remove_var("TWILIO_ACCOUNT_SID");
            env::remove_var("TWILIO_AUTH_TOKEN");
            env::remove_var("TWILIO_PHONE_NUMBER");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("CHAT_MODEL");
            env::remove_var("RUST_LOG");
            env::remove_var("PROMPTS_PATH");
            env::remove_var("RESULTS_PATH");
            env::remove_var("INCOMPLETE_PATH");
            env::remove_var("SESSION_COOLDOWN_SECS");
            env::remove_var("MIN_ANSWERED_QUESTIONS");
            env::remove_var("INCOMPLETE_POLICY");
            env::remove_var("SMS_NOTIFICATIONS");
            env::remove_var("CC_DISABLED_QUESTIONS");
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("BASE_URL", "https://loanline.example.com");
            env::set_var("TWILIO_ACCOUNT_SID", "ACtest");
            env::set_var("TWILIO_AUTH_TOKEN", "test-token");
            env::set_var("TWILIO_PHONE_NUMBER", "+15550100000");
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.base_url, "https://loanline.example.com");
        assert_eq!(config.twilio_account_sid, "ACtest");
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
        assert_eq!(config.results_path, PathBuf::from("./records/results.jsonl"));
        assert_eq!(config.session_cooldown_secs, 120);
        assert_eq!(config.min_answered_questions, 5);
        assert_eq!(config.incomplete_policy, IncompletePolicy::Discard);
        assert!(!config.sms_notifications);
        assert!(config.cc_disabled_questions.is_empty());
    }

    #[test]
    #[serial]
    fn test_config_trims_trailing_slash_from_base_url() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BASE_URL", "https://loanline.example.com/");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.base_url, "https://loanline.example.com");
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("RUST_LOG", "debug");
            env::set_var("SESSION_COOLDOWN_SECS", "60");
            env::set_var("MIN_ANSWERED_QUESTIONS", "3");
            env::set_var("INCOMPLETE_POLICY", "archive");
            env::set_var("SMS_NOTIFICATIONS", "true");
            env::set_var("CC_DISABLED_QUESTIONS", "4, 9");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.session_cooldown_secs, 60);
        assert_eq!(config.min_answered_questions, 3);
        assert_eq!(config.incomplete_policy, IncompletePolicy::Archive);
        assert!(config.sms_notifications);
        assert_eq!(config.cc_disabled_questions, vec![4, 9]);
    }

    #[test]
    #[serial]
    fn test_config_missing_base_url() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::remove_var("BASE_URL");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "BASE_URL"),
            _ => panic!("Expected MissingVar for BASE_URL"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_twilio_credentials() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::remove_var("TWILIO_AUTH_TOKEN");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "TWILIO_AUTH_TOKEN"),
            _ => panic!("Expected MissingVar for TWILIO_AUTH_TOKEN"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_incomplete_policy() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("INCOMPLETE_POLICY", "shred");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "INCOMPLETE_POLICY"),
            _ => panic!("Expected InvalidValue for INCOMPLETE_POLICY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_disabled_question_index() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("CC_DISABLED_QUESTIONS", "2,banana");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "CC_DISABLED_QUESTIONS"),
            _ => panic!("Expected InvalidValue for CC_DISABLED_QUESTIONS"),
        }
    }
}
