use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{DraftingError, Result};
use crate::render::is_valid_key;

/// Answers collected for a session, keyed by variable key
pub type FilledValues = BTreeMap<String, serde_json::Value>;

/// Data type hint for a template variable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    #[default]
    Text,
    Date,
    Number,
    Email,
    Address,
    Choice,
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableType::Text => write!(f, "text"),
            VariableType::Date => write!(f, "date"),
            VariableType::Number => write!(f, "number"),
            VariableType::Email => write!(f, "email"),
            VariableType::Address => write!(f, "address"),
            VariableType::Choice => write!(f, "choice"),
        }
    }
}

/// One fillable slot in a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub dtype: VariableType,
    /// Advisory; the store does not enforce it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// Allowed values for `choice` variables; advisory
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

fn default_required() -> bool {
    true
}

impl VariableDefinition {
    pub fn new(key: &str, dtype: VariableType) -> Self {
        Self {
            key: key.to_string(),
            label: String::new(),
            description: String::new(),
            example: None,
            required: true,
            dtype,
            regex: None,
            choices: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_example(mut self, example: &str) -> Self {
        self.example = Some(example.to_string());
        self
    }
}

/// Reusable document skeleton with `{{key}}` placeholders
///
/// Templates are immutable once created; editing means creating a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub title: String,
    pub doc_type: String,
    pub jurisdiction: String,
    pub description: String,
    pub body: String,
    pub variables: Vec<VariableDefinition>,
    pub similarity_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl Template {
    /// Index partition this template lives in
    pub fn partition(&self) -> String {
        partition_key(&self.doc_type)
    }

    pub fn variable(&self, key: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|v| v.key == key)
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            doc_type: self.doc_type.clone(),
            jurisdiction: self.jurisdiction.clone(),
            description: self.description.clone(),
            similarity_tags: self.similarity_tags.clone(),
            variable_count: self.variables.len(),
            created_at: self.created_at,
        }
    }
}

/// Partition slug for a document type: lower-case, whitespace collapsed to `-`
pub fn partition_key(doc_type: &str) -> String {
    let slug = doc_type
        .split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "default".to_string()
    } else {
        slug
    }
}

/// Listing view of a template (no body, no embedding)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: String,
    pub title: String,
    pub doc_type: String,
    pub jurisdiction: String,
    pub description: String,
    pub similarity_tags: Vec<String>,
    pub variable_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Creation payload for a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub title: String,
    pub doc_type: String,
    pub jurisdiction: String,
    #[serde(default)]
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Text the retrieval embedding is computed from; derived from the
    /// metadata when omitted
    #[serde(default)]
    pub embedding_seed_text: Option<String>,
}

impl NewTemplate {
    /// Canonical summary used as embedding seed
    pub fn seed_text_for(doc_type: &str, jurisdiction: &str, description: &str) -> String {
        format!("{} {} {}", doc_type, jurisdiction, description)
            .trim()
            .to_string()
    }

    pub fn seed_text(&self) -> String {
        match &self.embedding_seed_text {
            Some(seed) if !seed.trim().is_empty() => seed.clone(),
            _ => Self::seed_text_for(&self.doc_type, &self.jurisdiction, &self.description),
        }
    }

    /// Reject payloads that would break placeholder substitution or completion checks
    pub fn validate(&self) -> Result<()> {
        if self.body.trim().is_empty() {
            return Err(DraftingError::Validation(
                "template body must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for variable in &self.variables {
            if !is_valid_key(&variable.key) {
                return Err(DraftingError::Validation(format!(
                    "invalid variable key '{}'",
                    variable.key
                )));
            }
            if !seen.insert(variable.key.as_str()) {
                return Err(DraftingError::Validation(format!(
                    "duplicate variable key '{}'",
                    variable.key
                )));
            }
        }

        if self.seed_text().is_empty() {
            return Err(DraftingError::Validation(
                "embedding seed text must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Tags with set semantics: trimmed, non-empty, first occurrence wins
    pub fn normalized_tags(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect()
    }
}

/// Optional listing filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateFilter {
    pub doc_type: Option<String>,
    pub jurisdiction: Option<String>,
}

impl TemplateFilter {
    pub fn matches(&self, template: &Template) -> bool {
        let doc_type_ok = self
            .doc_type
            .as_deref()
            .map_or(true, |d| d.eq_ignore_ascii_case(&template.doc_type));
        let jurisdiction_ok = self
            .jurisdiction
            .as_deref()
            .map_or(true, |j| j.eq_ignore_ascii_case(&template.jurisdiction));
        doc_type_ok && jurisdiction_ok
    }
}

/// Draft session status; monotonic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// One in-flight drafting attempt against exactly one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSession {
    pub session_id: String,
    pub template_id: String,
    pub filled_values: FilledValues,
    pub status: SessionStatus,
    /// Incremented on every write; used for compare-and-set
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub final_draft: Option<String>,
}

impl DraftSession {
    pub fn new(session_id: String, template_id: String, filled_values: FilledValues) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            template_id,
            filled_values,
            status: SessionStatus::InProgress,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            final_draft: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// A key counts as filled when present with a non-null value
    pub fn is_filled(&self, key: &str) -> bool {
        self.filled_values
            .get(key)
            .map_or(false, |value| !value.is_null())
    }
}
