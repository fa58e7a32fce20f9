//! Environment-variable helpers used by every configuration loader

use std::str::FromStr;

/// Read and parse `key`, falling back to `default` when unset or unparseable
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read `key` as a string, falling back to `default` when unset
pub fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read `key` as a string, treating unset and blank values as absent
pub fn env_optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("READMIT_TEST_ENV_OR", "not-a-number");
        assert_eq!(env_or("READMIT_TEST_ENV_OR", 7u32), 7);

        std::env::set_var("READMIT_TEST_ENV_OR", " 42 ");
        assert_eq!(env_or("READMIT_TEST_ENV_OR", 7u32), 42);

        std::env::remove_var("READMIT_TEST_ENV_OR");
        assert_eq!(env_or("READMIT_TEST_ENV_OR", 7u32), 7);
    }

    #[test]
    fn test_env_optional_ignores_blank() {
        std::env::set_var("READMIT_TEST_ENV_OPTIONAL", "   ");
        assert_eq!(env_optional("READMIT_TEST_ENV_OPTIONAL"), None);
        std::env::remove_var("READMIT_TEST_ENV_OPTIONAL");
    }
}
