//! Questions asked for unfilled variables

use serde::{Deserialize, Serialize};

use crate::document::{VariableDefinition, VariableType};

/// A prompt for one missing variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub key: String,
    pub text: String,
    pub dtype: VariableType,
    pub example: Option<String>,
    pub help_text: Option<String>,
}

impl Question {
    /// Deterministic phrasing used when no phrasing service is involved
    pub fn for_variable(variable: &VariableDefinition) -> Self {
        let subject = [&variable.description, &variable.label]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or(variable.key.as_str());

        let help_text = match variable.choices.as_deref() {
            Some(choices) if !choices.is_empty() => Some(format!("One of: {}", choices.join(", "))),
            _ => None,
        };

        Self {
            key: variable.key.clone(),
            text: format!("Please provide the value for: {}", subject),
            dtype: variable.dtype,
            example: variable.example.clone(),
            help_text,
        }
    }
}

pub fn questions_for(variables: &[&VariableDefinition]) -> Vec<Question> {
    variables.iter().map(|v| Question::for_variable(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_description_then_label_then_key() {
        let bare = VariableDefinition::new("party_name", VariableType::Text);
        assert_eq!(
            Question::for_variable(&bare).text,
            "Please provide the value for: party_name"
        );

        let labelled = bare.clone().with_label("Party name");
        assert_eq!(
            Question::for_variable(&labelled).text,
            "Please provide the value for: Party name"
        );

        let described = labelled.with_description("Full legal name of the party");
        assert_eq!(
            Question::for_variable(&described).text,
            "Please provide the value for: Full legal name of the party"
        );
    }

    #[test]
    fn test_choices_become_help_text() {
        let mut variable = VariableDefinition::new("tier", VariableType::Choice).with_example("gold");
        variable.choices = Some(vec!["gold".to_string(), "silver".to_string()]);

        let question = Question::for_variable(&variable);
        assert_eq!(question.help_text.as_deref(), Some("One of: gold, silver"));
        assert_eq!(question.example.as_deref(), Some("gold"));
        assert_eq!(question.dtype, VariableType::Choice);
    }
}
