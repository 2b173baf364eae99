//! Text-generation collaborator for model-assisted query generation.
//!
//! The service is consumed behind the [`TextGenerator`] trait; its
//! absence simply disables the model-assisted strategy. The bundled
//! implementation targets an OpenAI-style chat-completions endpoint.
//! All configuration arrives in an explicit [`TextGenConfig`] at
//! construction; nothing is read from ambient process state.

use crate::Result;
use crate::error::DqScanError;
use crate::models::SchemaSnapshot;
use async_trait::async_trait;

/// Prompt material handed to the text-generation service.
#[derive(Debug, Clone)]
pub struct PromptContext {
    /// One line per table: name plus typed column list
    pub schema_digest: String,
    /// Task instructions (profiling + data-quality query catalog)
    pub instructions: String,
}

impl PromptContext {
    /// Builds the prompt context for a snapshot.
    pub fn from_snapshot(snapshot: &SchemaSnapshot) -> Self {
        let mut digest = String::new();
        for table in &snapshot.tables {
            let columns: Vec<String> = table
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.declared_type))
                .collect();
            digest.push_str(&format!("table {}: {}\n", table.name, columns.join(", ")));
        }

        Self {
            schema_digest: digest,
            instructions: "Generate SQLite SELECT queries that profile the data and check its \
                           quality. Cover: record counts per column; categorical column summaries \
                           (distinct values, unique ratio, min/max/mean value length); basic \
                           statistics for numerical columns (min, max, mean, median); missing \
                           values (NULLs) per column; duplicate records; outliers in numerical \
                           columns beyond 1.5 times the IQR; and referential-integrity violations \
                           where foreign-key relationships exist. Use only the table and column \
                           names listed in the schema. Return ONLY a JSON array of SQL strings, \
                           no other text."
                .to_string(),
        }
    }
}

/// External text-generation service interface.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produces raw candidate SQL strings for the given context.
    ///
    /// # Errors
    /// Returns `Generation` when the service is unreachable or its
    /// response cannot be interpreted.
    async fn generate_queries(&self, context: &PromptContext) -> Result<Vec<String>>;
}

/// Configuration for [`HttpTextGenerator`].
#[derive(Debug, Clone)]
pub struct TextGenConfig {
    /// Base URL of the chat-completions API (e.g. `https://api.openai.com/v1`)
    pub endpoint: String,
    /// Bearer token, passed explicitly by the caller
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature; low by default, this is codegen not prose
    pub temperature: f32,
}

impl TextGenConfig {
    /// Creates a config with the default model and temperature.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: "gpt-4".to_string(),
            temperature: 0.1,
        }
    }

    /// Overrides the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl std::fmt::Display for TextGenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The API key is intentionally omitted.
        write!(f, "TextGenConfig({}, model={})", self.endpoint, self.model)
    }
}

/// OpenAI-style chat-completions client.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    config: TextGenConfig,
}

impl HttpTextGenerator {
    /// Creates a client from an explicit configuration.
    pub fn new(config: TextGenConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate_queries(&self, context: &PromptContext) -> Result<Vec<String>> {
        let prompt = format!(
            "{}\n\nSchema:\n{}",
            context.instructions, context.schema_digest
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a SQL generator. Always return a valid JSON array of SQL strings, no other text."
                },
                {"role": "user", "content": prompt}
            ],
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.endpoint.trim_end_matches('/')
            ))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| DqScanError::generation_failed("Text-generation request failed", e))?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DqScanError::generation_failed("Text-generation response unreadable", e))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| DqScanError::Generation {
                context: "Text-generation response carried no message content".to_string(),
                source: "missing choices[0].message.content".into(),
            })?;

        parse_query_list(content)
    }
}

/// Interprets the service's reply as a list of SQL strings.
///
/// Accepts a JSON array (optionally wrapped in a Markdown code fence);
/// falls back to collecting lines that start like read queries.
pub fn parse_query_list(content: &str) -> Result<Vec<String>> {
    let trimmed = strip_code_fence(content.trim());

    if let Ok(queries) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Ok(queries);
    }

    let lines: Vec<String> = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| {
            let upper = line.to_uppercase();
            upper.starts_with("SELECT") || upper.starts_with("WITH")
        })
        .map(|line| line.trim_end_matches(';').to_string())
        .collect();

    if lines.is_empty() {
        return Err(DqScanError::Generation {
            context: "Text-generation response contained no queries".to_string(),
            source: format!("unparseable content: {} bytes", content.len()).into(),
        });
    }

    Ok(lines)
}

fn strip_code_fence(content: &str) -> &str {
    let content = content
        .strip_prefix("```json")
        .or_else(|| content.strip_prefix("```"))
        .unwrap_or(content);
    content.strip_suffix("```").unwrap_or(content).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDescriptor, TableSchema};

    #[test]
    fn test_prompt_context_lists_tables() {
        let snapshot = SchemaSnapshot::new(vec![TableSchema {
            name: "emp".to_string(),
            columns: vec![
                ColumnDescriptor::new("id", "INTEGER", 0),
                ColumnDescriptor::new("name", "TEXT", 1),
            ],
        }]);

        let context = PromptContext::from_snapshot(&snapshot);
        assert!(context.schema_digest.contains("table emp"));
        assert!(context.schema_digest.contains("id INTEGER"));
        assert!(context.instructions.contains("IQR"));
    }

    #[test]
    fn test_parse_query_list_json_array() {
        let parsed =
            parse_query_list(r#"["SELECT 1 FROM emp", "SELECT COUNT(*) FROM emp"]"#).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_parse_query_list_fenced_json() {
        let content = "```json\n[\"SELECT id FROM emp\"]\n```";
        let parsed = parse_query_list(content).unwrap();
        assert_eq!(parsed, vec!["SELECT id FROM emp".to_string()]);
    }

    #[test]
    fn test_parse_query_list_line_fallback() {
        let content = "Here are the queries:\nSELECT COUNT(*) FROM emp;\nWITH x AS (SELECT 1) SELECT * FROM x";
        let parsed = parse_query_list(content).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], "SELECT COUNT(*) FROM emp");
    }

    #[test]
    fn test_parse_query_list_rejects_prose() {
        assert!(parse_query_list("I could not generate any queries.").is_err());
    }

    #[test]
    fn test_config_display_omits_key() {
        let config = TextGenConfig::new("https://api.example.com/v1", "sk-secret");
        assert!(!config.to_string().contains("sk-secret"));
    }
}
