//! Utility functions for Orderly
//!
//! Small helpers shared by the configuration layer and the command runner.

use serde::de::{self, Deserializer, Visitor};
use std::fmt;
use std::process::ExitStatus;

/// Parse a permissive boolean.
///
/// Accepts `1`, `true`, `t`, `yes`, `y`, `on` and `0`, `false`, `f`, `no`,
/// `n`, `off`, ignoring ASCII case. Anything else is `None`.
pub fn parse_bool(value: &str) -> Option<bool> {
    const TRUE: [&str; 6] = ["1", "true", "t", "yes", "y", "on"];
    const FALSE: [&str; 6] = ["0", "false", "f", "no", "n", "off"];

    let value = value.trim();
    if TRUE.iter().any(|t| value.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSE.iter().any(|f| value.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

/// Serde helper accepting real booleans, `0`/`1` and the strings understood
/// by [`parse_bool`]. Environment overrides arrive as strings or integers.
pub fn deserialize_flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleBool;

    impl Visitor<'_> for FlexibleBool {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean such as true/false, yes/no, on/off or 1/0")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
            }
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            parse_bool(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(FlexibleBool)
}

/// Describe how a child process finished, e.g. `"sh exited with error status 2"`.
pub fn exit_status_to_string(status: ExitStatus, command_name: &str) -> String {
    if let Some(code) = status.code() {
        return if code == 0 {
            format!("{command_name} exited successfully")
        } else {
            format!("{command_name} exited with error status {code}")
        };
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return format!("{command_name} killed by signal {signal}");
        }
        if let Some(signal) = status.stopped_signal() {
            return format!("{command_name} stopped by signal {signal}");
        }
    }

    format!("{command_name} exited for an unknown reason ({status})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_parse_bool() {
        for yes in ["1", "true", "TRUE", "t", "Yes", "y", "on", " on "] {
            assert_eq!(parse_bool(yes), Some(true), "{yes}");
        }
        for no in ["0", "false", "F", "no", "N", "OFF"] {
            assert_eq!(parse_bool(no), Some(false), "{no}");
        }
        for junk in ["", "2", "maybe", "yess"] {
            assert_eq!(parse_bool(junk), None, "{junk}");
        }
    }

    #[derive(Deserialize)]
    struct Flag {
        #[serde(deserialize_with = "deserialize_flexible_bool")]
        enabled: bool,
    }

    #[test]
    fn test_flexible_bool_deserialize() {
        let parse = |s: &str| serde_json::from_str::<Flag>(s).map(|f| f.enabled);

        assert!(parse(r#"{"enabled": true}"#).unwrap());
        assert!(parse(r#"{"enabled": "yes"}"#).unwrap());
        assert!(!parse(r#"{"enabled": "off"}"#).unwrap());
        assert!(parse(r#"{"enabled": 1}"#).unwrap());
        assert!(!parse(r#"{"enabled": 0}"#).unwrap());
        assert!(parse(r#"{"enabled": 7}"#).is_err());
        assert!(parse(r#"{"enabled": "sometimes"}"#).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_to_string() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(
            exit_status_to_string(ExitStatus::from_raw(0), "sh"),
            "sh exited successfully"
        );
        assert_eq!(
            exit_status_to_string(ExitStatus::from_raw(3 << 8), "sh"),
            "sh exited with error status 3"
        );
        assert_eq!(
            exit_status_to_string(ExitStatus::from_raw(9), "sh"),
            "sh killed by signal 9"
        );
    }
}
