use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tera::Tera;

/// Maximum template file size (1MB)
const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

/// Document fields a template must reference
const REQUIRED_VARIABLES: &[&str] = &["project_name", "project_summary", "sections"];

/// Per-section and per-entry fields most templates use
const OPTIONAL_FIELDS: &[&str] = &["title", "entries", "name", "url", "summary"];

/// Validates external Tera templates for the index document.
pub(crate) struct TemplateValidator;

impl TemplateValidator {
    /// Validates an external template file.
    ///
    /// Performs the following checks:
    /// 1. File exists and is a regular file
    /// 2. File size is within limits
    /// 3. Template is not blank
    /// 4. Template syntax is valid (can be compiled by Tera)
    /// 5. Template references the document fields
    ///
    /// # Errors
    ///
    /// Returns an error if any check fails.
    pub(crate) fn validate_template(path: &Path) -> Result<()> {
        let name = path.to_string_lossy().to_string();

        if !path.exists() {
            return Err(Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "Template file not found"),
            ));
        }

        if !path.is_file() {
            return Err(Error::template_validation(name, "Path is not a file"));
        }

        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(Error::template_validation(
                name,
                format!(
                    "Template file too large: {} bytes (max: {} bytes)",
                    metadata.len(),
                    MAX_TEMPLATE_SIZE
                ),
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::validate_content(&name, &content)
    }

    /// Validates template text already in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is blank, does not compile, or does
    /// not reference every required variable.
    pub(crate) fn validate_content(name: &str, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(Error::template_validation(name, "Template file is empty"));
        }

        Tera::default()
            .add_raw_template("validation", content)
            .map_err(|e| {
                Error::template_validation(name, format!("Template syntax error: {e}"))
            })?;

        Self::check_required_variables(name, content)?;
        Self::check_optional_fields(content);

        Ok(())
    }

    /// Heuristic search for `ctx.var`, `{{ var` and `in var` references.
    fn check_required_variables(name: &str, content: &str) -> Result<()> {
        let missing: Vec<&str> = REQUIRED_VARIABLES
            .iter()
            .filter(|var| {
                let patterns = [
                    format!("ctx.{var}"),
                    format!("{{{{{var} "),
                    format!("{{{{ {var}"),
                    format!("in {var}"),
                ];

                !patterns.iter().any(|pattern| content.contains(pattern))
            })
            .copied()
            .collect();

        if !missing.is_empty() {
            return Err(Error::template_validation(
                name,
                format!(
                    "Template may be missing required variables: {}. \n\
                    Templates should access: {}. \n\
                    See templates/llms.md.tera for reference.",
                    missing.join(", "),
                    REQUIRED_VARIABLES.join(", ")
                ),
            ));
        }

        Ok(())
    }

    fn check_optional_fields(content: &str) {
        for field in OPTIONAL_FIELDS {
            if !content.contains(&format!(".{field}")) {
                tracing::debug!("Template does not use field: {}", field);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    const VALID: &str = "# {{ ctx.project_name }}\n\n{{ ctx.project_summary }}\n\
        {% for section in ctx.sections %}## {{ section.title }}\n\
        {% for entry in section.entries %}- [{{ entry.name }}]({{ entry.url }}){% endfor %}\
        {% endfor %}";

    #[test]
    fn test_validate_valid_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("llms.tera");
        template_file.write_str(VALID).unwrap();

        assert!(TemplateValidator::validate_template(template_file.path()).is_ok());
    }

    #[test]
    fn test_builtin_template_is_valid() {
        let builtin = include_str!("../templates/llms.md.tera");
        assert!(TemplateValidator::validate_content("builtin", builtin).is_ok());
    }

    #[test]
    fn test_validate_nonexistent_file() {
        let result = TemplateValidator::validate_template(Path::new("/nonexistent/template.tera"));
        assert!(result.unwrap_err().is_io());
    }

    #[test]
    fn test_validate_empty_template() {
        let result = TemplateValidator::validate_content("empty", "   \n  \n  ");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_syntax_error() {
        let result = TemplateValidator::validate_content("broken", "{% if condition %}\nUnclosed if");
        assert!(result.unwrap_err().to_string().contains("Template syntax error"));
    }

    #[test]
    fn test_validate_missing_required_vars() {
        let result = TemplateValidator::validate_content("partial", "# {{ ctx.project_name }}");
        let err_msg = result.unwrap_err().to_string();

        assert!(err_msg.contains("missing required variables"));
        assert!(err_msg.contains("project_summary"));
        assert!(err_msg.contains("sections"));
    }

    #[test]
    fn test_validate_file_too_large() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("large.tera");

        let large_content = "x".repeat(usize::try_from(MAX_TEMPLATE_SIZE).unwrap() + 1);
        template_file.write_str(&large_content).unwrap();

        let result = TemplateValidator::validate_template(template_file.path());
        assert!(result.unwrap_err().to_string().contains("too large"));
    }
}
