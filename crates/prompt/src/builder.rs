//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use fable_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// A prompt definition compiled once and rendered many times.
///
/// The map phase renders the same template once per chunk, so the template is
/// registered a single time. Rendering is strict: a variable missing from the
/// input is an error rather than an empty string.
pub struct PromptTemplate {
    definition: PromptDefinition,
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptTemplate")
            .field("id", &self.definition.id)
            .finish()
    }
}

impl PromptTemplate {
    /// Compile a prompt definition.
    pub fn compile(definition: PromptDefinition) -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Plain text, never HTML
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(true);

        registry
            .register_template_string(&definition.id, &definition.template)
            .map_err(|e| {
                AppError::Prompt(format!(
                    "Failed to register template {}: {}",
                    definition.id, e
                ))
            })?;

        Ok(Self {
            definition,
            registry,
        })
    }

    /// Compile an ad-hoc template string (tests, one-off prompts).
    pub fn from_template(id: &str, template: &str) -> AppResult<Self> {
        Self::compile(PromptDefinition {
            id: id.to_string(),
            title: id.to_string(),
            api_version: "1.0".to_string(),
            created_by: String::new(),
            variables: Vec::new(),
            template: template.to_string(),
            output: crate::types::PromptOutputSpec {
                format: crate::types::OutputFormat::Text,
            },
        })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn definition(&self) -> &PromptDefinition {
        &self.definition
    }

    /// Render with the given variables.
    pub fn render(&self, variables: &HashMap<String, String>) -> AppResult<BuiltPrompt> {
        for required in &self.definition.variables {
            if !variables.contains_key(required) {
                return Err(AppError::Prompt(format!(
                    "Prompt {} requires variable '{}'",
                    self.definition.id, required
                )));
            }
        }

        let rendered = self
            .registry
            .render(&self.definition.id, variables)
            .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

        Ok(BuiltPrompt::new(rendered, self.definition.id.clone(), variables))
    }

    /// Render with a single `text` variable.
    pub fn render_text(&self, text: &str) -> AppResult<BuiltPrompt> {
        let mut variables = HashMap::new();
        variables.insert("text".to_string(), text.to_string());
        self.render(&variables)
    }
}
