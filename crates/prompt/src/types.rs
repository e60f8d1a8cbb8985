//! Prompt types for Fable.
//!
//! This module defines the domain entities for the prompt system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Variables the template expects (all are required at render time)
    #[serde(default)]
    pub variables: Vec<String>,

    /// Template string with Handlebars syntax
    pub template: String,

    /// Output specification
    pub output: PromptOutputSpec,
}

/// Expected shape of the model's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Free-form prose
    Text,

    /// A list of items numbered `1.`, `2.`, ...
    NumberedList,
}

/// Output specification for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format
    pub format: OutputFormat,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// Rendered prompt text
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Names of the template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: Vec<String>,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(user: String, source_prompt_id: String, variables: &HashMap<String, String>) -> Self {
        let mut resolved_variables: Vec<String> = variables.keys().cloned().collect();
        resolved_variables.sort();

        Self {
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id,
                resolved_variables,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: story.image_prompts
title: Image prompts
apiVersion: "1.0"
createdBy: test
variables: [text, count]
template: "{{count}} prompts for {{text}}"
output:
  format: numbered-list
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "story.image_prompts");
        assert_eq!(def.variables, vec!["text", "count"]);
        assert_eq!(def.output.format, OutputFormat::NumberedList);
    }

    #[test]
    fn test_unknown_output_format_rejected() {
        let yaml = r#"
id: x
title: X
apiVersion: "1.0"
template: "{{text}}"
output:
  format: haiku
"#;

        let result: Result<PromptDefinition, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_built_prompt_creation() {
        let mut vars = HashMap::new();
        vars.insert("text".to_string(), "resumen".to_string());
        vars.insert("count".to_string(), "6".to_string());

        let built = BuiltPrompt::new("Prompt".to_string(), "story.image_prompts".to_string(), &vars);

        assert_eq!(built.user, "Prompt");
        assert_eq!(built.metadata.source_prompt_id, "story.image_prompts");
        assert_eq!(built.metadata.resolved_variables, vec!["count", "text"]);
    }
}
