//! Requirement marker validation
//!
//! Runs over the whole collected set before anything executes, so a suite
//! with a single untagged test never partially runs, and the error names
//! every offender at once.

use crate::config::RequirementPolicy;
use crate::error::{MissingRequirementError, RequirementViolation};
use regex::Regex;
use std::sync::LazyLock;
use testbed_types::{NodeId, TestItem};

/// Tag accepted in place of a real requirement id
pub const NOT_APPLICABLE: &str = "NA";

// Anchored at both ends: `REQ-123-4567` is not a valid id
static REQUIREMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^REQ-\d{3}-\d{3}$").expect("requirement pattern is valid"));

/// Items after validation, with their captured tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub items: Vec<TestItem>,
    pub violations: Vec<RequirementViolation>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turn violations into the batch error, or hand back the items
    pub fn into_result(self) -> Result<Vec<TestItem>, MissingRequirementError> {
        if self.violations.is_empty() {
            Ok(self.items)
        } else {
            Err(MissingRequirementError {
                violations: self.violations,
            })
        }
    }
}

/// Check every item against the policy.
///
/// Tags are trimmed and blank ones dropped before anything else. Without a
/// mandate, nothing is rejected.
pub fn validate(items: Vec<TestItem>, policy: RequirementPolicy) -> ValidationResult {
    let items: Vec<TestItem> = items.into_iter().map(drop_blank_tags).collect();
    if !policy.mandated {
        return ValidationResult {
            items,
            violations: Vec::new(),
        };
    }

    let mut violations = Vec::new();
    let mut validated = Vec::with_capacity(items.len());

    for mut item in items {
        let problems = check_item(&item, policy.strict_format);
        if !problems.is_empty() {
            item.valid = false;
            violations.extend(problems);
        }
        validated.push(item);
    }

    if !violations.is_empty() {
        tracing::error!(
            "{} requirement violation(s) found during collection",
            violations.len()
        );
    }

    ValidationResult {
        items: validated,
        violations,
    }
}

fn drop_blank_tags(mut item: TestItem) -> TestItem {
    item.requirements = item
        .requirements
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    item
}

fn check_item(item: &TestItem, strict_format: bool) -> Vec<RequirementViolation> {
    let violation = |reason: String| RequirementViolation {
        node_id: item.node_id.clone(),
        reason,
    };

    if item.requirements.is_empty() {
        return vec![violation("missing `requirements` marker (or args)".to_string())];
    }
    if !strict_format {
        return Vec::new();
    }

    let mut problems = Vec::new();
    // REQ-001-001 must come before REQ-001-002
    if item.requirements.windows(2).any(|pair| pair[1] < pair[0]) {
        problems.push(violation("requirements are not sorted correctly".to_string()));
    }

    let mut valid_tags = 0;
    for tag in &item.requirements {
        if is_well_formed(tag) {
            valid_tags += 1;
        } else {
            problems.push(violation(format!(
                "requirement {} does not match pattern REQ-###-###",
                tag
            )));
        }
    }
    if valid_tags == 0 {
        problems.push(violation("has no valid requirements".to_string()));
    }
    problems
}

/// `REQ-###-###` or `NA`
pub fn is_well_formed(tag: &str) -> bool {
    tag == NOT_APPLICABLE || REQUIREMENT_PATTERN.is_match(tag)
}

/// Node ids that failed validation, in collection order
pub fn offending_nodes(result: &ValidationResult) -> Vec<NodeId> {
    result
        .items
        .iter()
        .filter(|item| !item.valid)
        .map(|item| item.node_id.clone())
        .collect()
}
