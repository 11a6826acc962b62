//! Validation of a workload's zone annotation and subdomain label

use crate::config::ConfigSet;
use crate::error::ValidationFailure;
use crate::zone::ZoneResolver;
use expose_api::WorkloadSnapshot;

/// Split an annotation value into zone tokens.
///
/// Order and duplicates are preserved; tokens are not trimmed.
pub fn zone_tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split(',')
}

/// At least one token of the annotation value resolves to a zone
pub fn annotation_valid(value: &str, resolver: &ZoneResolver<'_>) -> bool {
    zone_tokens(value).any(|token| resolver.is_known(token))
}

pub fn subdomain_label_present(workload: &WorkloadSnapshot, config: &ConfigSet) -> bool {
    workload.labels.contains_key(&config.label_subdomain_key)
}

/// The content of a valid rule. Two rules are equal when the annotation
/// value and the subdomain label value are equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub annotation: String,
    pub subdomain: String,
}

impl Rule {
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        zone_tokens(&self.annotation)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleState {
    /// The workload does not carry the zone annotation
    Absent,
    /// The annotation is present but the rule cannot be applied
    Invalid(Vec<ValidationFailure>),
    Valid(Rule),
}

impl RuleState {
    pub fn is_valid(&self) -> bool {
        matches!(self, RuleState::Valid(_))
    }

    pub fn annotation_present(&self) -> bool {
        !matches!(self, RuleState::Absent)
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        match self {
            RuleState::Invalid(failures) => failures,
            _ => &[],
        }
    }
}

/// Evaluate both rules (and the presence of a container port) for a workload
pub fn evaluate(workload: &WorkloadSnapshot, config: &ConfigSet) -> RuleState {
    let Some(annotation) = workload.annotation(&config.annotation_key) else {
        return RuleState::Absent;
    };

    let mut failures = Vec::new();

    if !annotation_valid(annotation, &config.resolver()) {
        failures.push(ValidationFailure::NoResolvableZone {
            key: config.annotation_key.clone(),
            value: annotation.to_string(),
        });
    }

    let subdomain = workload.label(&config.label_subdomain_key);
    if subdomain.is_none() {
        failures.push(ValidationFailure::MissingSubdomainLabel(
            config.label_subdomain_key.clone(),
        ));
    }

    if workload.container_port.is_none() {
        failures.push(ValidationFailure::MissingContainerPort);
    }

    match subdomain {
        Some(subdomain) if failures.is_empty() => RuleState::Valid(Rule {
            annotation: annotation.to_string(),
            subdomain: subdomain.to_string(),
        }),
        _ => RuleState::Invalid(failures),
    }
}
