//! Log Redaction Layer
//!
//! Provider error bodies often echo request headers or URLs; scrub API keys and
//! bearer tokens before they are logged or stored in history.

use regex::Regex;
use std::sync::LazyLock;

static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());
static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(sk|key|rk|r8)[-_][a-zA-Z0-9\-_]{16,}").unwrap());
static KEY_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)((?:api[_-]?key|access[_-]?token|token|key)["']?\s*[=:]\s*["']?)[^\s&"',}]+"#)
        .unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "Bearer [REDACTED_TOKEN]");
    let redacted = API_KEY_RE.replace_all(&redacted, "[REDACTED_KEY]");
    KEY_PARAM_RE
        .replace_all(&redacted, "${1}[REDACTED]")
        .into_owned()
}
