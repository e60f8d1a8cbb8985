//! Narrative transforms: one model call that rewrites a text into a
//! derivative artifact, checked against a structural constraint.

use crate::model::ModelCaller;
use fable_core::{AppError, AppResult, PipelineStep};
use fable_prompt::{OutputFormat, PromptTemplate};
use std::collections::HashMap;
use std::sync::Arc;

/// Shape the model output must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputConstraint {
    /// Any non-empty text
    FreeForm,
    /// Exactly `count` items numbered `1..=count` in order
    NumberedItems { count: usize },
}

impl OutputConstraint {
    /// Constraint implied by a prompt's declared output format.
    pub fn for_format(format: OutputFormat, count: usize) -> Self {
        match format {
            OutputFormat::Text => Self::FreeForm,
            OutputFormat::NumberedList => Self::NumberedItems { count },
        }
    }
}

/// Output of one transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeArtifact {
    /// Artifact name ("story", "image_prompts")
    pub name: String,
    /// Model output, trimmed
    pub text: String,
    /// Parsed items for numbered constraints; empty for free-form output
    pub items: Vec<String>,
}

/// A named template plus the constraint its output must satisfy.
#[derive(Debug, Clone)]
pub struct NarrativeTransform {
    name: String,
    template: Arc<PromptTemplate>,
    constraint: OutputConstraint,
}

impl NarrativeTransform {
    pub fn new(name: impl Into<String>, template: Arc<PromptTemplate>, constraint: OutputConstraint) -> Self {
        Self {
            name: name.into(),
            template,
            constraint,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraint(&self) -> OutputConstraint {
        self.constraint
    }

    /// Render the template over `input`, call the model once and validate.
    ///
    /// Errors are attributed to this artifact. A malformed answer is a
    /// validation error, never a transport error.
    pub async fn apply(&self, caller: &ModelCaller, input: &str) -> AppResult<NarrativeArtifact> {
        self.run(caller, input)
            .await
            .map_err(|e| e.at(PipelineStep::Artifact(self.name.clone())))
    }

    async fn run(&self, caller: &ModelCaller, input: &str) -> AppResult<NarrativeArtifact> {
        let mut variables = HashMap::new();
        variables.insert("text".to_string(), input.trim().to_string());
        if let OutputConstraint::NumberedItems { count } = self.constraint {
            variables.insert("count".to_string(), count.to_string());
        }

        let prompt = self.template.render(&variables)?;
        let text = caller.call(&prompt.user).await?;
        let items = validate_output(&text, self.constraint)?;

        tracing::debug!(artifact = %self.name, chars = text.len(), items = items.len(), "Artifact generated");

        Ok(NarrativeArtifact {
            name: self.name.clone(),
            text,
            items,
        })
    }
}

/// Check `text` against `constraint`, returning the parsed items.
pub fn validate_output(text: &str, constraint: OutputConstraint) -> AppResult<Vec<String>> {
    match constraint {
        OutputConstraint::FreeForm => {
            if text.trim().is_empty() {
                return Err(AppError::Validation("expected non-empty text".to_string()));
            }
            Ok(Vec::new())
        }
        OutputConstraint::NumberedItems { count } => {
            let items = parse_numbered_items(text);

            if items.len() != count {
                return Err(AppError::Validation(format!(
                    "expected {} numbered items, found {}",
                    count,
                    items.len()
                )));
            }

            for (expected, (number, item)) in (1..).zip(&items) {
                if *number != expected {
                    return Err(AppError::Validation(format!(
                        "item {} is numbered {}; items must be numbered 1 to {} in order",
                        expected, number, count
                    )));
                }
                if item.is_empty() {
                    return Err(AppError::Validation(format!("item {} is empty", number)));
                }
            }

            Ok(items.into_iter().map(|(_, item)| item).collect())
        }
    }
}

/// Numbered items in `text`, with their numbers.
///
/// An item starts at a line beginning with `N.` or `N)`, optionally wrapped
/// in markdown bold (`**1.**`). Following lines without a marker continue the
/// current item. Lines before the first marker are ignored.
pub fn parse_numbered_items(text: &str) -> Vec<(usize, String)> {
    let mut items: Vec<(usize, String)> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match split_marker(line) {
            Some((number, rest)) => items.push((number, rest.to_string())),
            None => {
                if let Some((_, current)) = items.last_mut() {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(line);
                }
            }
        }
    }

    items
}

fn split_marker(line: &str) -> Option<(usize, &str)> {
    let unbolded = line.strip_prefix("**").unwrap_or(line);

    let digits = unbolded.len() - unbolded.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 || digits > 3 {
        return None;
    }
    let number: usize = unbolded[..digits].parse().ok()?;

    let rest = unbolded[digits..].strip_prefix(['.', ')'])?;
    let rest = rest.strip_prefix("**").unwrap_or(rest);

    // "1.5 grados" is a number, not a marker
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    Some((number, rest.trim()))
}
