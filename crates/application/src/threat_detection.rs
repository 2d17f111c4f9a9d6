//! Signature-based threat annotation for audit events.
//!
//! Detection only: findings are attached to the audit record and raise its
//! severity, the request itself is never blocked here.

use bastion_domain::{Severity, ThreatIndicator, ThreatKind};
use serde_json::Value;

const SQL_INJECTION_SIGNATURES: &[&str] = &[
    "' or '",
    "' or 1",
    "1=1",
    "union select",
    "union all select",
    "drop table",
    "drop database",
    "insert into",
    "delete from",
    "xp_cmdshell",
    "waitfor delay",
    "pg_sleep(",
    "benchmark(",
    "';--",
    "'; --",
    "/**/",
];

const XSS_SIGNATURES: &[&str] = &[
    "<script",
    "</script>",
    "javascript:",
    "vbscript:",
    "onerror=",
    "onload=",
    "document.cookie",
    "<iframe",
    "<svg",
    "%3cscript",
];

const PATH_TRAVERSAL_SIGNATURES: &[&str] = &[
    "../",
    "..\\",
    "%2e%2e%2f",
    "%2e%2e/",
    "..%2f",
    "..%5c",
    "/etc/passwd",
    "/etc/shadow",
    "/proc/self",
    "c:\\windows",
];

const COMMAND_INJECTION_SIGNATURES: &[&str] = &[
    "$(",
    "${ifs}",
    "`",
    "; rm ",
    "; cat ",
    "| sh",
    "| bash",
    "&& wget ",
    "&& curl ",
    "; wget ",
    "; curl ",
    "| nc ",
    "/bin/sh",
];

const MALICIOUS_AGENT_SIGNATURES: &[&str] = &[
    "sqlmap", "nikto", "nmap", "masscan", "acunetix", "havij", "dirbuster", "wpscan",
];

/// Maximum nesting inspected inside a body before giving up.
const MAX_BODY_DEPTH: usize = 16;

/// Request material to scan.
#[derive(Debug, Clone, Copy)]
pub struct ThreatScanInput<'a> {
    /// Request path.
    pub path: Option<&'a str>,
    /// Decoded query parameters.
    pub query: &'a [(String, String)],
    /// Request or event body.
    pub body: &'a Value,
    /// Raw user agent.
    pub user_agent: Option<&'a str>,
}

/// Stateless signature matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreatDetector;

impl ThreatDetector {
    /// Returns every signature family found, with where it was found.
    #[must_use]
    pub fn scan(&self, input: ThreatScanInput<'_>) -> Vec<ThreatIndicator> {
        let mut findings = Vec::new();

        if let Some(path) = input.path {
            scan_text(path, "path", &mut findings);
        }
        for (key, value) in input.query {
            scan_text(value, &format!("query.{key}"), &mut findings);
        }
        scan_value(input.body, "body", 0, &mut findings);

        if let Some(user_agent) = input.user_agent {
            let lowered = user_agent.to_ascii_lowercase();
            if MALICIOUS_AGENT_SIGNATURES
                .iter()
                .any(|signature| lowered.contains(signature))
            {
                findings.push(ThreatIndicator {
                    kind: ThreatKind::MaliciousUserAgent,
                    location: "userAgent".to_owned(),
                });
            }
        }

        findings
    }
}

/// Raises `severity` to at least HIGH when any threat was observed.
#[must_use]
pub fn escalate_severity(severity: Severity, threats: &[ThreatIndicator]) -> Severity {
    if threats.is_empty() {
        severity
    } else {
        severity.max(Severity::High)
    }
}

fn scan_value(value: &Value, location: &str, depth: usize, findings: &mut Vec<ThreatIndicator>) {
    if depth > MAX_BODY_DEPTH {
        return;
    }

    match value {
        Value::String(text) => scan_text(text, location, findings),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                scan_value(item, &format!("{location}[{index}]"), depth + 1, findings);
            }
        }
        Value::Object(map) => {
            for (key, entry) in map {
                scan_value(entry, &format!("{location}.{key}"), depth + 1, findings);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn scan_text(text: &str, location: &str, findings: &mut Vec<ThreatIndicator>) {
    let lowered = text.to_lowercase();
    let families = [
        (ThreatKind::SqlInjection, SQL_INJECTION_SIGNATURES),
        (ThreatKind::CrossSiteScripting, XSS_SIGNATURES),
        (ThreatKind::PathTraversal, PATH_TRAVERSAL_SIGNATURES),
        (ThreatKind::CommandInjection, COMMAND_INJECTION_SIGNATURES),
    ];

    for (kind, signatures) in families {
        if signatures.iter().any(|signature| lowered.contains(signature)) {
            findings.push(ThreatIndicator {
                kind,
                location: location.to_owned(),
            });
        }
    }
}
