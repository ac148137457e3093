//! User-declared HTTP endpoints probed on a schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ClientId, HttpTargetId};

/// HTTP methods the prober is permitted to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET.
    Get,
    /// HEAD.
    Head,
    /// POST.
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            _ => Err(()),
        }
    }
}

/// A URL an operator has asked the prober to periodically check.
///
/// Uniqueness: (client_id, url). Opening an incident is tied to
/// (client_id, http_target_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpTarget {
    /// Unique identifier.
    pub id: HttpTargetId,
    /// Owning tenant.
    pub client_id: ClientId,
    /// Operator-facing label.
    pub name: String,
    /// The URL to probe. Must be http or https.
    pub url: String,
    /// The HTTP method to issue.
    pub method: HttpMethod,
    /// Status codes considered healthy. Empty defaults to {200}.
    pub accepted_status_codes: Vec<u16>,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Minimum seconds between checks.
    pub check_interval_s: u64,
    /// Whether the prober currently selects this target.
    pub is_active: bool,
    /// Time of the most recent check.
    pub last_check_at: Option<DateTime<Utc>>,
    /// Status code (or 0 for transport failure) observed on the most recent check.
    pub last_status: Option<u16>,
    /// Latency observed on the most recent check.
    pub last_latency_ms: Option<u64>,
}

impl HttpTarget {
    /// The effective accepted status codes, defaulting to {200} when unset.
    pub fn effective_accepted_status_codes(&self) -> Vec<u16> {
        if self.accepted_status_codes.is_empty() {
            vec![200]
        } else {
            self.accepted_status_codes.clone()
        }
    }

    /// Whether the given status counts as healthy for this target.
    pub fn is_accepted(&self, status: u16) -> bool {
        self.effective_accepted_status_codes().contains(&status)
    }

    /// Whether this target is due for a check at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.last_check_at {
            None => true,
            Some(last) => (now - last).num_seconds() as u64 >= self.check_interval_s,
        }
    }

    /// Validate the URL scheme is http(s). Returns true if acceptable.
    pub fn has_valid_scheme(url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_target() -> HttpTarget {
        HttpTarget {
            id: HttpTargetId::new(),
            client_id: ClientId::new(),
            name: "T".into(),
            url: "https://example.com".into(),
            method: HttpMethod::Get,
            accepted_status_codes: vec![],
            timeout_ms: 10_000,
            check_interval_s: 60,
            is_active: true,
            last_check_at: None,
            last_status: None,
            last_latency_ms: None,
        }
    }

    #[test]
    fn empty_accepted_codes_default_to_200() {
        let target = make_target();
        assert_eq!(target.effective_accepted_status_codes(), vec![200]);
        assert!(target.is_accepted(200));
        assert!(!target.is_accepted(500));
    }

    #[test]
    fn never_checked_target_is_due() {
        let target = make_target();
        assert!(target.is_due(Utc::now()));
    }

    #[test]
    fn recently_checked_target_is_not_due() {
        let mut target = make_target();
        target.last_check_at = Some(Utc::now());
        assert!(!target.is_due(Utc::now()));
    }

    #[test]
    fn scheme_validation_rejects_non_http() {
        assert!(HttpTarget::has_valid_scheme("https://example.com"));
        assert!(HttpTarget::has_valid_scheme("http://example.com"));
        assert!(!HttpTarget::has_valid_scheme("ftp://example.com"));
        assert!(!HttpTarget::has_valid_scheme("javascript:alert(1)"));
    }
}
