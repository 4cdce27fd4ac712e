//! User Code Value Object
//!
//! Human-readable account code: role prefix, sequence number, country.
//! `BLK001RW` is the first blocker registered in Rwanda. Numbers are padded
//! to three digits below 1000 and printed as-is above.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::role::Role;

/// Prefix for principals without a known role
pub const FALLBACK_PREFIX: &str = "USR";

/// Country used when none was recorded
pub const DEFAULT_COUNTRY: &str = "RW";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserCode(String);

impl UserCode {
    pub fn new(prefix: &str, number: u32, country: &str) -> Self {
        let code = if number < 1000 {
            format!("{prefix}{number:03}{country}")
        } else {
            format!("{prefix}{number}{country}")
        };
        Self(code)
    }

    pub fn prefix_for(role: Option<Role>) -> &'static str {
        role.map_or(FALLBACK_PREFIX, |r| r.code_prefix())
    }

    /// First two characters of `country`, or [`DEFAULT_COUNTRY`] when blank.
    pub fn country_code(country: &str) -> String {
        let country = country.trim();
        if country.is_empty() {
            DEFAULT_COUNTRY.to_string()
        } else {
            country.chars().take(2).collect()
        }
    }

    pub fn from_db(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding() {
        assert_eq!(UserCode::new("BLK", 1, "RW").as_str(), "BLK001RW");
        assert_eq!(UserCode::new("AGT", 42, "KE").as_str(), "AGT042KE");
        assert_eq!(UserCode::new("BUY", 999, "RW").as_str(), "BUY999RW");
        assert_eq!(UserCode::new("BUY", 1000, "RW").as_str(), "BUY1000RW");
        assert_eq!(UserCode::new("BUY", 12345, "RW").as_str(), "BUY12345RW");
    }

    #[test]
    fn test_prefix_for() {
        assert_eq!(UserCode::prefix_for(Some(Role::SuperAdmin)), "SPA");
        assert_eq!(UserCode::prefix_for(Some(Role::Notary)), "NOT");
        assert_eq!(UserCode::prefix_for(None), "USR");
    }

    #[test]
    fn test_country_code() {
        assert_eq!(UserCode::country_code(""), "RW");
        assert_eq!(UserCode::country_code("  "), "RW");
        assert_eq!(UserCode::country_code("UG"), "UG");
        assert_eq!(UserCode::country_code("KEN"), "KE");
    }
}
