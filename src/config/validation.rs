//! Configuration validation with detailed error reporting, run once at
//! startup and again before every accepted `/__reload`.

use std::collections::HashSet;

use log::{info, warn};

use crate::models::RouteEntry;

/// Result of validating a route table: errors block the table from being
/// installed, warnings and recommendations are informational.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        ValidationResult {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_recommendation(&mut self, recommendation: String) {
        self.recommendations.push(recommendation);
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a parsed route table: structural correctness (each entry
    /// validates in isolation), route-prefix uniqueness, and a few
    /// non-fatal hygiene checks carried over from the teacher's
    /// comprehensive validator.
    pub fn validate_comprehensive(entries: &[RouteEntry]) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_basic_structure(entries, &mut result);
        Self::validate_security(entries, &mut result);
        Self::validate_route_conflicts(entries, &mut result);
        Self::log_validation_results(&result);

        result
    }

    fn validate_basic_structure(entries: &[RouteEntry], result: &mut ValidationResult) {
        if entries.is_empty() {
            result.add_warning("no routes configured - the gateway will 404 everything".to_string());
        }

        for entry in entries {
            if let Err(error) = entry.validate() {
                result.add_error(format!("route {:?}: {error}", entry.prefix));
            }
        }
    }

    fn validate_security(entries: &[RouteEntry], result: &mut ValidationResult) {
        for entry in entries {
            if entry.backend.starts_with("http://") {
                result.add_warning(format!(
                    "insecure HTTP backend for route {}: {} - consider HTTPS",
                    entry.prefix, entry.backend
                ));
            }
        }
    }

    fn validate_route_conflicts(entries: &[RouteEntry], result: &mut ValidationResult) {
        let mut seen: HashSet<&str> = HashSet::new();
        for entry in entries {
            if !seen.insert(entry.prefix.as_str()) {
                result.add_error(format!("duplicate route prefix: {}", entry.prefix));
            }
        }
    }

    fn log_validation_results(result: &ValidationResult) {
        if result.is_valid {
            info!("route table validation passed ({} warnings)", result.warnings.len());
        } else {
            for error in &result.errors {
                log::error!("validation error: {error}");
            }
        }
        for warning in &result.warnings {
            warn!("validation warning: {warning}");
        }
        for recommendation in &result.recommendations {
            info!("recommendation: {recommendation}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::route::parse_route_table;

    #[test]
    fn empty_table_is_valid_with_warning() {
        let result = ConfigValidator::validate_comprehensive(&[]);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn flags_insecure_http_backend() {
        let entries = parse_route_table(r#"{"/a": {"backend": "http://b"}}"#).unwrap();
        let result = ConfigValidator::validate_comprehensive(&entries);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }
}
