//! Structural, referential, and slug validation over a parsed
//! catalogue (C2).

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::models::Catalogue;

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex"))
}

fn repo_segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid regex"))
}

/// Raised when a catalogue fails validation. Always carries the
/// complete list of issues, never only the first (Open Question d).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("catalogue validation failed: {}", issues.join("; "))]
pub struct CatalogueValidationError {
    pub issues: Vec<String>,
}

/// Validate a catalogue, returning it unchanged on success or a
/// [`CatalogueValidationError`] aggregating every issue found.
pub fn validate_catalogue(catalogue: Catalogue) -> Result<Catalogue, CatalogueValidationError> {
    let mut issues = Vec::new();

    if catalogue.version < 1 {
        issues.push("version must be >= 1".to_string());
    }

    let mut programme_keys: HashSet<&str> = HashSet::new();
    for programme in &catalogue.programmes {
        if !slug_pattern().is_match(&programme.key) {
            issues.push(format!("programme key '{}' is not a valid slug", programme.key));
        }
        if !programme_keys.insert(programme.key.as_str()) {
            issues.push(format!("duplicate programme key '{}'", programme.key));
        }
    }

    let mut project_keys: HashSet<&str> = HashSet::new();
    for project in &catalogue.projects {
        if !slug_pattern().is_match(&project.key) {
            issues.push(format!("project key '{}' is not a valid slug", project.key));
        }
        if !project_keys.insert(project.key.as_str()) {
            issues.push(format!("duplicate project key '{}'", project.key));
        }
        if let Some(programme) = &project.programme {
            if !programme_keys.contains(programme.as_str()) {
                issues.push(format!(
                    "project '{}' references unknown programme '{}'",
                    project.key, programme
                ));
            }
        }
    }

    for programme in &catalogue.programmes {
        for member in &programme.projects {
            if !project_keys.contains(member.as_str()) {
                issues.push(format!(
                    "programme '{}' references unknown project '{}'",
                    programme.key, member
                ));
            }
        }
    }

    // Component keys are globally unique across all projects (the
    // importer relies on this for edge resolution).
    let mut component_keys: HashMap<&str, &str> = HashMap::new();
    for project in &catalogue.projects {
        for component in &project.components {
            if !slug_pattern().is_match(&component.key) {
                issues.push(format!(
                    "component key '{}' is not a valid slug",
                    component.key
                ));
            }
            if let Some(owner_project) = component_keys.insert(&component.key, &project.key) {
                issues.push(format!(
                    "duplicate component key '{}' in projects '{}' and '{}'",
                    component.key, owner_project, project.key
                ));
            }
            if let Some(repository) = &component.repository {
                if !repo_segment_pattern().is_match(&repository.owner) {
                    issues.push(format!(
                        "repository owner '{}' on component '{}' is invalid",
                        repository.owner, component.key
                    ));
                }
                if !repo_segment_pattern().is_match(&repository.name) {
                    issues.push(format!(
                        "repository name '{}' on component '{}' is invalid",
                        repository.name, component.key
                    ));
                }
                if repository.default_branch.is_empty() {
                    issues.push(format!(
                        "repository default_branch on component '{}' must not be empty",
                        component.key
                    ));
                }
            }
        }
    }

    for project in &catalogue.projects {
        for component in &project.components {
            for (_relationship, link) in component.edges() {
                if link.component == component.key {
                    issues.push(format!(
                        "component '{}' has a self-referential edge",
                        component.key
                    ));
                    continue;
                }
                if !component_keys.contains_key(link.component.as_str()) {
                    issues.push(format!(
                        "component '{}' references unknown edge target '{}'",
                        component.key, link.component
                    ));
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(catalogue)
    } else {
        Err(CatalogueValidationError { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::models::*;

    fn minimal_component(key: &str) -> Component {
        Component {
            key: key.to_string(),
            name: key.to_string(),
            r#type: ComponentType::Service,
            description: None,
            lifecycle: Lifecycle::Active,
            repository: None,
            depends_on: Vec::new(),
            blocked_by: Vec::new(),
            emits_events_to: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn minimal_catalogue() -> Catalogue {
        Catalogue {
            version: 1,
            programmes: Vec::new(),
            projects: vec![Project {
                key: "wildside".to_string(),
                name: "Wildside".to_string(),
                description: None,
                programme: None,
                components: vec![minimal_component("api")],
                noise: NoiseFilters::default(),
                status: StatusSettings::default(),
                documentation_paths: Vec::new(),
            }],
        }
    }

    #[test]
    fn accepts_a_minimal_valid_catalogue() {
        assert!(validate_catalogue(minimal_catalogue()).is_ok());
    }

    #[test]
    fn rejects_version_zero() {
        let mut catalogue = minimal_catalogue();
        catalogue.version = 0;
        let err = validate_catalogue(catalogue).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("version")));
    }

    #[test]
    fn aggregates_multiple_issues_rather_than_failing_fast() {
        let mut catalogue = minimal_catalogue();
        catalogue.version = 0;
        catalogue.projects[0].key = "Not A Slug".to_string();
        let err = validate_catalogue(catalogue).unwrap_err();
        assert!(err.issues.len() >= 2);
    }

    #[test]
    fn rejects_duplicate_component_keys_across_projects() {
        let mut catalogue = minimal_catalogue();
        let mut second = catalogue.projects[0].clone();
        second.key = "other".to_string();
        catalogue.projects.push(second);
        let err = validate_catalogue(catalogue).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("duplicate component key")));
    }

    #[test]
    fn rejects_self_referential_edges() {
        let mut catalogue = minimal_catalogue();
        catalogue.projects[0].components[0].depends_on.push(ComponentLink {
            component: "api".to_string(),
            kind: EdgeKind::Runtime,
            rationale: None,
        });
        let err = validate_catalogue(catalogue).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("self-referential")));
    }

    #[test]
    fn rejects_edges_to_unknown_components() {
        let mut catalogue = minimal_catalogue();
        catalogue.projects[0].components[0].depends_on.push(ComponentLink {
            component: "ghost".to_string(),
            kind: EdgeKind::Runtime,
            rationale: None,
        });
        let err = validate_catalogue(catalogue).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("unknown edge target")));
    }

    #[test]
    fn rejects_unknown_programme_reference() {
        let mut catalogue = minimal_catalogue();
        catalogue.projects[0].programme = Some("nonexistent".to_string());
        let err = validate_catalogue(catalogue).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("unknown programme")));
    }
}
