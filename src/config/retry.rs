//! Retry configuration for network operations.
//!
//! Provides configurable retry limits for different operation types,
//! allowing users to tune retry behavior based on network conditions.

use super::EnvConfig;

/// Configuration for retry behavior across different operation types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Max retries for GitHub API calls (lookup, create release)
    pub github_api: u32,

    /// Max retries for asset upload operations
    pub file_uploads: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            github_api: 5,
            file_uploads: 5,
        }
    }
}

impl RetryConfig {
    /// Parse retry count from an environment variable, clamped to `max`
    fn parse_retry_env(env: &EnvConfig, var_name: &str, default: u32, max: u32) -> u32 {
        env.get(var_name)
            .and_then(|s| s.parse::<u32>().ok())
            .map(|v| v.min(max))
            .unwrap_or(default)
    }

    /// Create config from environment variables with fallback to defaults
    pub fn from_env(env: &EnvConfig) -> Self {
        Self {
            github_api: Self::parse_retry_env(env, "PIPELINE_RETRY_GITHUB", 5, 20),
            file_uploads: Self::parse_retry_env(env, "PIPELINE_RETRY_UPLOADS", 5, 20),
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self {
            github_api: 0,
            file_uploads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_values_are_clamped() {
        let env = EnvConfig::from_pairs([
            ("PIPELINE_RETRY_GITHUB", "100"),
            ("PIPELINE_RETRY_UPLOADS", "nope"),
        ]);
        let config = RetryConfig::from_env(&env);
        assert_eq!(config.github_api, 20);
        assert_eq!(config.file_uploads, 5);
    }
}
