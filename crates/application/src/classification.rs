//! Compliance classification of audit events by request shape.

use bastion_core::{AppError, AppResult};
use bastion_domain::ComplianceCategory;
use regex::Regex;
use serde_json::Value;

/// Retention applied when no category matches.
pub const DEFAULT_RETENTION_YEARS: u16 = 3;

const CATEGORY_PATTERNS: &[(ComplianceCategory, &str)] = &[
    (
        ComplianceCategory::FinancialRecords,
        r"billing|invoice|payment|ledger|trust[-_ ]?account",
    ),
    (
        ComplianceCategory::LegalPrivilege,
        r"document|matter|case|privileged|evidence",
    ),
    (
        ComplianceCategory::HealthInformation,
        r"medical|health|diagnos|patient",
    ),
    (
        ComplianceCategory::PersonalData,
        r"user|contact|profile|client|identity",
    ),
    (
        ComplianceCategory::AccessGovernance,
        r"override|sovereign|tenant_scope|security|auth",
    ),
];

/// Shape of the activity being classified.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationInput<'a> {
    /// HTTP method, when the event stems from a request.
    pub method: Option<&'a str>,
    /// Request path, when the event stems from a request.
    pub path: Option<&'a str>,
    /// Logical resource name.
    pub resource: &'a str,
    /// Logical action name.
    pub action: &'a str,
    /// Caller metadata; only its top-level keys are inspected.
    pub metadata: &'a Value,
}

/// Matched categories and the resulting retention obligation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Matched categories in declaration order.
    pub categories: Vec<ComplianceCategory>,
    /// Longest retention across the matched categories, or the default.
    pub retention_years: u16,
}

/// Regex-based classifier over method, path, resource, action and metadata keys.
pub struct ComplianceClassifier {
    rules: Vec<(ComplianceCategory, Regex)>,
    default_retention_years: u16,
}

impl ComplianceClassifier {
    /// Compiles the classification rules.
    pub fn new(default_retention_years: u16) -> AppResult<Self> {
        let rules = CATEGORY_PATTERNS
            .iter()
            .map(|(category, pattern)| {
                Regex::new(&format!("(?i){pattern}"))
                    .map(|regex| (*category, regex))
                    .map_err(|error| {
                        AppError::Internal(format!(
                            "invalid classification rule for {}: {error}",
                            category.as_str()
                        ))
                    })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            rules,
            default_retention_years,
        })
    }

    /// Classifies one event.
    #[must_use]
    pub fn classify(&self, input: ClassificationInput<'_>) -> Classification {
        let mut shape = String::new();
        for part in [input.method, input.path].into_iter().flatten() {
            shape.push_str(part);
            shape.push(' ');
        }
        shape.push_str(input.resource);
        shape.push(' ');
        shape.push_str(input.action);
        if let Value::Object(map) = input.metadata {
            for key in map.keys() {
                shape.push(' ');
                shape.push_str(key);
            }
        }

        let categories = self
            .rules
            .iter()
            .filter(|(_, regex)| regex.is_match(&shape))
            .map(|(category, _)| *category)
            .collect::<Vec<_>>();

        let retention_years = categories
            .iter()
            .map(ComplianceCategory::retention_years)
            .max()
            .unwrap_or(self.default_retention_years);

        Classification {
            categories,
            retention_years,
        }
    }
}
