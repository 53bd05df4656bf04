//! Typed, immutable catalogue value objects (C1).
//!
//! These mirror the declarative YAML estate catalogue. Parsing the YAML
//! itself is out of scope for this crate; callers hand in an already
//! deserialised [`Catalogue`] (hence `Deserialize` but no loader here).

use serde::{Deserialize, Serialize};

/// Relationship kind for a [`ComponentEdge`] / [`ComponentLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Runtime,
    Dev,
    Test,
    Ops,
}

impl Default for EdgeKind {
    fn default() -> Self {
        EdgeKind::Runtime
    }
}

/// The three directed relationships a component can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeRelationship {
    DependsOn,
    BlockedBy,
    EmitsEventsTo,
}

impl EdgeRelationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeRelationship::DependsOn => "depends_on",
            EdgeRelationship::BlockedBy => "blocked_by",
            EdgeRelationship::EmitsEventsTo => "emits_events_to",
        }
    }
}

/// A directed edge declared on a component, pointing at another
/// component by key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComponentLink {
    pub component: String,
    #[serde(default)]
    pub kind: EdgeKind,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Component classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentType {
    Service,
    Ui,
    Library,
    DataPipeline,
    Job,
    Tooling,
    Other,
}

impl Default for ComponentType {
    fn default() -> Self {
        ComponentType::Service
    }
}

/// Lifecycle stage of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Planned,
    Active,
    Deprecated,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle::Active
    }
}

/// Declared source repository mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub documentation_paths: Vec<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Repository {
    /// GitHub-style `owner/name` identifier.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// A unit of work inside a project; optionally maps to a source
/// repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Component {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub r#type: ComponentType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub depends_on: Vec<ComponentLink>,
    #[serde(default)]
    pub blocked_by: Vec<ComponentLink>,
    #[serde(default)]
    pub emits_events_to: Vec<ComponentLink>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Component {
    /// Walk the three edge lists in declaration order, pairing each
    /// link with its relationship kind.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeRelationship, &ComponentLink)> {
        self.depends_on
            .iter()
            .map(|l| (EdgeRelationship::DependsOn, l))
            .chain(
                self.blocked_by
                    .iter()
                    .map(|l| (EdgeRelationship::BlockedBy, l)),
            )
            .chain(
                self.emits_events_to
                    .iter()
                    .map(|l| (EdgeRelationship::EmitsEventsTo, l)),
            )
    }
}

/// Per-filter enable/disable toggles, independent of configured values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseFilterToggles {
    #[serde(default = "default_true")]
    pub ignore_authors: bool,
    #[serde(default = "default_true")]
    pub ignore_labels: bool,
    #[serde(default = "default_true")]
    pub ignore_paths: bool,
    #[serde(default = "default_true")]
    pub ignore_title_prefixes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NoiseFilterToggles {
    fn default() -> Self {
        Self {
            ignore_authors: true,
            ignore_labels: true,
            ignore_paths: true,
            ignore_title_prefixes: true,
        }
    }
}

/// Noise control for ingestion and reporting. This crate does not
/// compile the glob/regex values itself; it only carries and diffs
/// them for the importer (§1 non-goals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseFilters {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub toggles: NoiseFilterToggles,
    #[serde(default)]
    pub ignore_authors: Vec<String>,
    #[serde(default)]
    pub ignore_labels: Vec<String>,
    #[serde(default)]
    pub ignore_paths: Vec<String>,
    #[serde(default)]
    pub ignore_title_prefixes: Vec<String>,
}

impl Default for NoiseFilters {
    fn default() -> Self {
        Self {
            enabled: true,
            toggles: NoiseFilterToggles::default(),
            ignore_authors: Vec::new(),
            ignore_labels: Vec::new(),
            ignore_paths: Vec::new(),
            ignore_title_prefixes: Vec::new(),
        }
    }
}

/// Status generation preferences for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSettings {
    #[serde(default)]
    pub summarise_dependency_prs: bool,
    #[serde(default)]
    pub emphasise_documentation: bool,
    #[serde(default)]
    pub prefer_long_form: bool,
}

/// A reporting unit owning components.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub programme: Option<String>,
    pub components: Vec<Component>,
    #[serde(default)]
    pub noise: NoiseFilters,
    #[serde(default)]
    pub status: StatusSettings,
    #[serde(default)]
    pub documentation_paths: Vec<String>,
}

/// Declarative grouping of projects; display-only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Programme {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub projects: Vec<String>,
}

/// Top-level declarative estate catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Catalogue {
    pub version: u32,
    pub projects: Vec<Project>,
    #[serde(default)]
    pub programmes: Vec<Programme>,
}
