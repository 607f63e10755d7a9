//! Environment variable parsing with type safety.
//!
//! Typed getters over the IPB_ variable namespace. Parse errors are
//! collected instead of failing fast, so every misconfiguration is
//! reported in one pass.

use std::env;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable {var}")]
    MissingRequired { var: String },

    /// Invalid value for a variable.
    #[error("invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Value out of valid range.
    #[error("value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },
}

/// Type-safe environment variable parser with the IPB_ prefix.
///
/// An unset variable and an empty one are treated the same way.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self {
            prefix: "IPB_",
            errors: Vec::new(),
        }
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take ownership of errors.
    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// Record an invalid value discovered by the caller's own validation.
    pub fn invalid_value(&mut self, name: &str, expected: &str, value: &str) {
        let var = self.var_name(name);
        self.errors.push(EnvError::InvalidValue {
            var,
            expected: expected.to_string(),
            value: value.to_string(),
        });
    }

    /// Record a missing variable discovered by the caller's own validation.
    pub fn missing(&mut self, name: &str) {
        let var = self.var_name(name);
        self.errors.push(EnvError::MissingRequired { var });
    }

    /// Get the full variable name with prefix.
    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn raw(&self, name: &str) -> Option<String> {
        env::var(self.var_name(name))
            .ok()
            .filter(|value| !value.is_empty())
    }

    /// Get a string value with default.
    pub fn get_string(&mut self, name: &str, default: &str) -> String {
        self.raw(name).unwrap_or_else(|| default.to_string())
    }

    /// Get an optional string value.
    pub fn get_string_opt(&mut self, name: &str) -> Option<String> {
        self.raw(name)
    }

    /// Get a required string value, recording an error when unset.
    pub fn require_string(&mut self, name: &str) -> Option<String> {
        match self.raw(name) {
            Some(value) => Some(value),
            None => {
                self.missing(name);
                None
            }
        }
    }

    /// Get a required port number, recording an error when unset or invalid.
    pub fn require_u16(&mut self, name: &str) -> Option<u16> {
        let var_name = self.var_name(name);
        match self.raw(name) {
            Some(value) => match value.parse::<u16>() {
                Ok(n) => Some(n),
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name,
                        expected: "port number (0-65535)".to_string(),
                        value,
                    });
                    None
                }
            },
            None => {
                self.missing(name);
                None
            }
        }
    }

    /// Get a port number with default.
    pub fn get_u16(&mut self, name: &str, default: u16) -> u16 {
        let var_name = self.var_name(name);
        match self.raw(name) {
            Some(value) => match value.parse::<u16>() {
                Ok(n) => n,
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name,
                        expected: "port number (0-65535)".to_string(),
                        value,
                    });
                    default
                }
            },
            None => default,
        }
    }

    /// Get a boolean value with default.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off (for false)
    pub fn get_bool(&mut self, name: &str, default: bool) -> bool {
        let var_name = self.var_name(name);
        match self.raw(name) {
            Some(value) => match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name,
                        expected: "boolean (true/false/1/0/yes/no)".to_string(),
                        value,
                    });
                    default
                }
            },
            None => default,
        }
    }

    /// Get a u32 value with default and range validation.
    pub fn get_u32_range(&mut self, name: &str, default: u32, min: u32, max: u32) -> u32 {
        let var_name = self.var_name(name);
        match self.raw(name) {
            Some(value) => match value.parse::<u32>() {
                Ok(n) if n >= min && n <= max => n,
                Ok(n) => {
                    self.errors.push(EnvError::OutOfRange {
                        var: var_name,
                        value: n.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                    default
                }
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name,
                        expected: "unsigned 32-bit integer".to_string(),
                        value,
                    });
                    default
                }
            },
            None => default,
        }
    }

    /// Get a u64 value with default and range validation.
    pub fn get_u64_range(&mut self, name: &str, default: u64, min: u64, max: u64) -> u64 {
        let var_name = self.var_name(name);
        match self.raw(name) {
            Some(value) => match value.parse::<u64>() {
                Ok(n) if n >= min && n <= max => n,
                Ok(n) => {
                    self.errors.push(EnvError::OutOfRange {
                        var: var_name,
                        value: n.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                    default
                }
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name,
                        expected: "unsigned 64-bit integer".to_string(),
                        value,
                    });
                    default
                }
            },
            None => default,
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes tests that mutate the process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    fn lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn empty_variables_count_as_unset() {
        let _guard = lock();
        env::set_var("IPB_EMPTY_TEST", "");

        let mut parser = EnvParser::new();
        assert_eq!(parser.get_string("EMPTY_TEST", "fallback"), "fallback");
        assert!(parser.require_string("EMPTY_TEST").is_none());
        assert!(parser.has_errors());

        env::remove_var("IPB_EMPTY_TEST");
    }

    #[test]
    fn require_u16_collects_missing_and_invalid() {
        let _guard = lock();
        env::remove_var("IPB_PORT_A_TEST");
        env::set_var("IPB_PORT_B_TEST", "70000");

        let mut parser = EnvParser::new();
        assert!(parser.require_u16("PORT_A_TEST").is_none());
        assert!(parser.require_u16("PORT_B_TEST").is_none());

        let errors = parser.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], EnvError::MissingRequired { .. }));
        assert!(matches!(errors[1], EnvError::InvalidValue { .. }));

        env::remove_var("IPB_PORT_B_TEST");
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let _guard = lock();
        for (raw, expected) in [("1", true), ("YES", true), ("off", false), ("0", false)] {
            env::set_var("IPB_BOOL_TEST", raw);
            let mut parser = EnvParser::new();
            assert_eq!(parser.get_bool("BOOL_TEST", !expected), expected);
            assert!(!parser.has_errors());
        }

        env::set_var("IPB_BOOL_TEST", "maybe");
        let mut parser = EnvParser::new();
        assert!(parser.get_bool("BOOL_TEST", true));
        assert!(parser.has_errors());

        env::remove_var("IPB_BOOL_TEST");
    }

    #[test]
    fn range_getters_reject_out_of_range_values() {
        let _guard = lock();
        env::set_var("IPB_RANGE_TEST", "500");

        let mut parser = EnvParser::new();
        assert_eq!(parser.get_u32_range("RANGE_TEST", 1, 1, 128), 1);
        let errors = parser.take_errors();
        assert!(matches!(errors[0], EnvError::OutOfRange { .. }));

        env::remove_var("IPB_RANGE_TEST");
    }

    #[test]
    fn defaults_apply_without_errors() {
        let _guard = lock();
        env::remove_var("IPB_UNSET_TEST");

        let mut parser = EnvParser::new();
        assert_eq!(parser.get_u16("UNSET_TEST", 5201), 5201);
        assert_eq!(parser.get_u64_range("UNSET_TEST", 10, 1, 3600), 10);
        assert!(!parser.get_bool("UNSET_TEST", false));
        assert!(!parser.has_errors());
    }
}
