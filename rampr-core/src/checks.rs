use std::sync::Arc;
use std::time::Duration;

use crate::config::CheckOptions;
use crate::error::ConfigError;
use crate::record::{CheckResult, RequestRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckRule {
    Status(u16),
    StatusIn(Vec<u16>),
    BodyContains(String),
    MaxDuration(Duration),
}

/// A named per-response assertion feeding the `checks` rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: Arc<str>,
    pub rule: CheckRule,
}

impl Check {
    pub fn from_options(opts: &CheckOptions) -> Result<Self, ConfigError> {
        let name = opts.name.trim();
        if name.is_empty() {
            return Err(ConfigError::UnnamedCheck);
        }

        let mut rules = Vec::with_capacity(1);
        if let Some(status) = opts.status {
            rules.push(CheckRule::Status(status));
        }
        if !opts.status_in.is_empty() {
            rules.push(CheckRule::StatusIn(opts.status_in.clone()));
        }
        if let Some(needle) = &opts.body_contains {
            rules.push(CheckRule::BodyContains(needle.clone()));
        }
        if let Some(max) = opts.max_duration {
            rules.push(CheckRule::MaxDuration(max));
        }

        let rule = match rules.pop() {
            Some(rule) if rules.is_empty() => rule,
            _ => return Err(ConfigError::InvalidCheck(name.to_string())),
        };

        Ok(Self {
            name: Arc::from(name),
            rule,
        })
    }

    /// A request without a response fails every check.
    pub fn evaluate(&self, record: &RequestRecord, body: &[u8]) -> CheckResult {
        let passed = record.error.is_none()
            && match &self.rule {
                CheckRule::Status(expected) => record.status == *expected,
                CheckRule::StatusIn(allowed) => allowed.contains(&record.status),
                CheckRule::BodyContains(needle) => contains(body, needle.as_bytes()),
                CheckRule::MaxDuration(max) => record.latency <= *max,
            };

        CheckResult {
            name: self.name.clone(),
            passed,
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampr_http::HttpTransportErrorKind;

    fn status_check(code: u16) -> Check {
        Check::from_options(&CheckOptions {
            name: "status was 200".to_string(),
            status: Some(code),
            ..CheckOptions::default()
        })
        .unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn status_check_passes_on_match_only() {
        let check = status_check(200);
        let ms = Duration::from_millis(3);
        assert!(check.evaluate(&RequestRecord::completed(200, ms), b"").passed);
        assert!(!check.evaluate(&RequestRecord::completed(500, ms), b"").passed);
    }

    #[test]
    fn transport_failure_fails_checks() {
        let check = status_check(0);
        let rec = RequestRecord::transport_failure(HttpTransportErrorKind::Timeout, Duration::ZERO);
        assert!(!check.evaluate(&rec, b"").passed);
    }

    #[test]
    fn body_contains_matches_substring() {
        let check = Check::from_options(&CheckOptions {
            name: "has messages".to_string(),
            body_contains: Some("\"messages\"".to_string()),
            ..CheckOptions::default()
        })
        .unwrap_or_else(|e| panic!("{e}"));

        let rec = RequestRecord::completed(200, Duration::ZERO);
        assert!(check.evaluate(&rec, br#"{"code":0,"messages":[]}"#).passed);
        assert!(!check.evaluate(&rec, br#"{"code":0}"#).passed);
    }

    #[test]
    fn exactly_one_rule_is_required() {
        let none = CheckOptions {
            name: "empty".to_string(),
            ..CheckOptions::default()
        };
        assert!(matches!(
            Check::from_options(&none),
            Err(ConfigError::InvalidCheck(_))
        ));

        let two = CheckOptions {
            name: "two".to_string(),
            status: Some(200),
            max_duration: Some(Duration::from_millis(10)),
            ..CheckOptions::default()
        };
        assert!(matches!(
            Check::from_options(&two),
            Err(ConfigError::InvalidCheck(_))
        ));

        let unnamed = CheckOptions {
            status: Some(200),
            ..CheckOptions::default()
        };
        assert!(matches!(
            Check::from_options(&unnamed),
            Err(ConfigError::UnnamedCheck)
        ));
    }
}
