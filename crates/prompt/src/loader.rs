//! Prompt loader for built-in and workspace YAML prompt definitions.
//!
//! Every prompt the pipeline uses ships compiled into the binary. A workspace
//! may override any of them by placing `<id>.yml` in `.fable/prompts/`.

use crate::types::PromptDefinition;
use fable_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Map-phase summary of one chunk.
pub const MAP_PROMPT_ID: &str = "summary.map";
/// Intermediate merge of a group of summaries.
pub const COLLAPSE_PROMPT_ID: &str = "summary.collapse";
/// Final merge into the document summary.
pub const COMBINE_PROMPT_ID: &str = "summary.combine";
/// Children's story from a summary.
pub const STORY_PROMPT_ID: &str = "story.children";
/// Numbered image prompts from a story.
pub const IMAGE_PROMPTS_PROMPT_ID: &str = "story.image_prompts";

const BUILTIN_PROMPTS: [(&str, &str); 5] = [
    (MAP_PROMPT_ID, include_str!("../prompts/summary.map.yml")),
    (COLLAPSE_PROMPT_ID, include_str!("../prompts/summary.collapse.yml")),
    (COMBINE_PROMPT_ID, include_str!("../prompts/summary.combine.yml")),
    (STORY_PROMPT_ID, include_str!("../prompts/story.children.yml")),
    (IMAGE_PROMPTS_PROMPT_ID, include_str!("../prompts/story.image_prompts.yml")),
];

/// Directory holding workspace prompt overrides.
pub fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".fable/prompts")
}

/// Load a prompt definition by ID.
///
/// The workspace override wins over the built-in definition.
///
/// # Example
/// ```no_run
/// use fable_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "story.children")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        let definition = parse_prompt(&contents, &prompt_file.display().to_string())?;
        if definition.id != prompt_id {
            return Err(AppError::Prompt(format!(
                "Prompt file {:?} declares id '{}', expected '{}'",
                prompt_file, definition.id, prompt_id
            )));
        }

        tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);
        return Ok(definition);
    }

    load_builtin(prompt_id)
}

/// Load one of the prompts compiled into the binary.
pub fn load_builtin(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, contents) = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))?;

    parse_prompt(contents, prompt_id)
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    for variable in &def.variables {
        if !def.template.contains(&format!("{{{{{}}}}}", variable)) {
            return Err(AppError::Prompt(format!(
                "Prompt {} declares variable '{}' but its template never uses it",
                def.id, variable
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OutputFormat;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, id: &str, content: &str) -> PathBuf {
        let prompts_dir = prompts_dir(dir);
        fs::create_dir_all(&prompts_dir).unwrap();
        let file_path = prompts_dir.join(format!("{}.yml", id));
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_all_builtins_parse() {
        for (id, _) in BUILTIN_PROMPTS {
            let def = load_builtin(id).unwrap();
            assert_eq!(def.id, id);
            assert!(def.variables.contains(&"text".to_string()));
        }
    }

    #[test]
    fn test_image_prompts_builtin_is_numbered() {
        let def = load_builtin(IMAGE_PROMPTS_PROMPT_ID).unwrap();
        assert_eq!(def.output.format, OutputFormat::NumberedList);
        assert!(def.variables.contains(&"count".to_string()));
    }

    #[test]
    fn test_load_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let def = load_prompt(temp_dir.path(), STORY_PROMPT_ID).unwrap();
        assert!(def.template.contains("Había una vez"));
    }

    #[test]
    fn test_workspace_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            STORY_PROMPT_ID,
            r#"
id: story.children
title: "Bedtime story"
apiVersion: "1.0"
variables: [text]
template: "Once upon a time: {{text}}"
output:
  format: text
"#,
        );

        let def = load_prompt(temp_dir.path(), STORY_PROMPT_ID).unwrap();
        assert_eq!(def.title, "Bedtime story");
    }

    #[test]
    fn test_override_with_mismatched_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            MAP_PROMPT_ID,
            r#"
id: something.else
title: "Wrong"
apiVersion: "1.0"
template: "{{text}}"
output:
  format: text
"#,
        );

        assert!(load_prompt(temp_dir.path(), MAP_PROMPT_ID).is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "broken", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "broken").is_err());
    }

    #[test]
    fn test_unknown_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_declared_variable_must_be_used() {
        let yaml = r#"
id: x.y
title: "X"
apiVersion: "1.0"
variables: [text, count]
template: "{{text}}"
output:
  format: text
"#;
        assert!(parse_prompt(yaml, "inline").is_err());
    }
}
