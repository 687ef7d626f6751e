use crate::{
    assembly::Document,
    config::{Config, OutputFormat},
    error::{Error, Result},
    summarizer::normalize_summary,
};
use std::collections::HashMap;
use std::fs;
use tera::{Context, Tera, Value};

const MARKDOWN_TEMPLATE: &str = "markdown";
const CUSTOM_TEMPLATE: &str = "custom";

/// Renders the assembled document in the configured format.
pub(crate) struct TemplateEngine {
    tera: Tera,
    format: OutputFormat,
    has_custom: bool,
}

impl TemplateEngine {
    /// Creates a new template engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a template fails to compile or the custom
    /// template cannot be read.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template(MARKDOWN_TEMPLATE, include_str!("../templates/llms.md.tera"))
            .map_err(|e| Error::template(MARKDOWN_TEMPLATE, e))?;

        let has_custom = if let Some(ref path) = config.template_path {
            let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            tera.add_raw_template(CUSTOM_TEMPLATE, &content)
                .map_err(|e| Error::template(path.display().to_string(), e))?;
            true
        } else {
            false
        };

        tera.register_filter("one_line", Self::one_line_filter);

        Ok(Self {
            tera,
            format: config.format,
            has_custom,
        })
    }

    /// Collapses a value onto a single line.
    fn one_line_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        match value.as_str() {
            Some(s) => Ok(Value::String(normalize_summary(s))),
            None => Ok(value.clone()),
        }
    }

    /// Renders a document.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering or JSON encoding fails.
    pub(crate) fn render(&self, document: &Document) -> Result<String> {
        if self.format == OutputFormat::Json {
            let mut json = serde_json::to_string_pretty(document)?;
            json.push('\n');
            return Ok(json);
        }

        let template_name = if self.has_custom {
            CUSTOM_TEMPLATE
        } else {
            MARKDOWN_TEMPLATE
        };

        let mut context = Context::new();
        context.insert("ctx", document);
        context.insert(
            "generated_at",
            &chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        );

        self.tera
            .render(template_name, &context)
            .map_err(|e| Error::template(template_name, e))
    }
}
