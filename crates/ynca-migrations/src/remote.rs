//! IR remote codes
//!
//! The receiver can transmit NEC infrared codes on behalf of its own remote.
//! The transmit command takes 32 bits written as 8 hex digits: address byte(s)
//! followed by command byte(s). NEC frames follow a one-byte address or
//! command with its bitwise complement, so users (and the preset tables)
//! usually write the short form and leave the complement implied:
//!
//! | input       | output     |
//! |-------------|------------|
//! | `7A-1D`     | `7A851DE2` |
//! | `7A-1D20`   | `7A851D20` |
//! | `7A85-1DE2` | `7A851DE2` |

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteCodeError {
    #[error("invalid remote code format: {0:?}")]
    InvalidFormat(String),
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^([0-9a-f]{2}|[0-9a-f]{4})[^0-9a-f]?([0-9a-f]{2}|[0-9a-f]{4})$")
            .expect("remote code pattern compiles")
    })
}

/// Expand a half that is a single byte with its complement.
fn expand_half(half: &str) -> Result<String, RemoteCodeError> {
    let upper = half.to_ascii_uppercase();
    if upper.len() == 4 {
        return Ok(upper);
    }
    let byte =
        u8::from_str_radix(&upper, 16).map_err(|_| RemoteCodeError::InvalidFormat(half.into()))?;
    Ok(format!("{upper}{:02X}", byte ^ 0xFF))
}

/// Format a shorthand code into the 8 hex digit form.
pub fn format_remote_code(code: &str) -> Result<String, RemoteCodeError> {
    let captures = code_pattern()
        .captures(code)
        .ok_or_else(|| RemoteCodeError::InvalidFormat(code.to_string()))?;

    let left = expand_half(&captures[1])?;
    let right = expand_half(&captures[2])?;
    Ok(format!("{left}{right}"))
}

/// A validated 32-bit remote code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteCode(String);

impl RemoteCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// YNCA command line that makes the receiver transmit this code
    pub fn to_command(&self) -> String {
        format!("@SYS:REMOTECODE={}", self.0)
    }
}

impl FromStr for RemoteCode {
    type Err = RemoteCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        format_remote_code(s).map(RemoteCode)
    }
}

impl fmt::Display for RemoteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_halves_get_complement() {
        assert_eq!(format_remote_code("12-AB").unwrap(), "12EDAB54");
        assert_eq!(format_remote_code("7A-1D").unwrap(), "7A851DE2");
    }

    #[test]
    fn test_long_halves_pass_through() {
        assert_eq!(format_remote_code("1234-ABCD").unwrap(), "1234ABCD");
        assert_eq!(format_remote_code("7A-1D20").unwrap(), "7A851D20");
        assert_eq!(format_remote_code("7A85-1D").unwrap(), "7A851DE2");
    }

    #[test]
    fn test_separator_optional_and_case_insensitive() {
        assert_eq!(format_remote_code("12ab").unwrap(), "12EDAB54");
        assert_eq!(format_remote_code("12_ab").unwrap(), "12EDAB54");
        assert_eq!(format_remote_code("1234abcd").unwrap(), "1234ABCD");
        assert_eq!(format_remote_code("12 abcd").unwrap(), "12EDABCD");
    }

    #[test]
    fn test_invalid_codes() {
        for code in [
            "not a valid code",
            "",
            "1-AB",
            "123-AB",
            "12-ABC",
            "12--AB",
            "12345-AB",
            "GG-AB",
            "12-AB-",
        ] {
            assert_eq!(
                format_remote_code(code),
                Err(RemoteCodeError::InvalidFormat(code.to_string())),
                "code {code:?}"
            );
        }
    }

    #[test]
    fn test_remote_code_command() {
        let code: RemoteCode = "7a-1d".parse().unwrap();
        assert_eq!(code.as_str(), "7A851DE2");
        assert_eq!(code.to_command(), "@SYS:REMOTECODE=7A851DE2");
    }
}
