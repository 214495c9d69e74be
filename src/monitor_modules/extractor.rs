//! Pulls the monitored value out of a response document.
use serde_json::Value;
use thiserror::Error;

use super::config::ConfigError;

// Largest integer an f64 holds exactly.
const MAX_EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Found(Value),
    /// The expression matched nothing in this document.
    Absent,
}

#[derive(Error, Debug)]
#[error("Failed to evaluate `{expression}`: {message}")]
pub struct ExtractError {
    pub expression: String,
    pub message: String,
}

/// Evaluates a query expression against a JSON document.
pub trait ValueExtractor {
    fn expression(&self) -> &str;
    fn extract(&self, document: &Value) -> Result<Extraction, ExtractError>;
}

pub struct JmesPathExtractor {
    source: String,
    compiled: jmespath::Expression<'static>,
}

impl JmesPathExtractor {
    /// Compiles `expression`; syntax errors are configuration errors.
    pub fn compile(expression: &str) -> Result<Self, ConfigError> {
        let compiled =
            jmespath::compile(expression).map_err(|e| ConfigError::InvalidQuery {
                expression: expression.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            source: expression.to_string(),
            compiled,
        })
    }
}

impl ValueExtractor for JmesPathExtractor {
    fn expression(&self) -> &str {
        &self.source
    }

    fn extract(&self, document: &Value) -> Result<Extraction, ExtractError> {
        let failed = |message: String| ExtractError {
            expression: self.source.clone(),
            message,
        };

        let result = self
            .compiled
            .search(document)
            .map_err(|e| failed(e.to_string()))?;
        if result.is_null() {
            return Ok(Extraction::Absent);
        }

        let value = serde_json::to_value(&*result).map_err(|e| failed(e.to_string()))?;
        Ok(Extraction::Found(normalize_numbers(value)))
    }
}

/// Turns integral floats back into integers so `1000.0` compares and prints
/// as `1000`.
fn normalize_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_F64_INT => {
                if f < 0.0 {
                    Value::from(f as i64)
                } else {
                    Value::from(f as u64)
                }
            }
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_numbers(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn player_doc(exp: u64) -> Value {
        json!({
            "success": true,
            "player": {
                "displayname": "Steve",
                "networkExp": exp,
                "stats": { "Bedwars": { "wins_bedwars": 12, "kills": [1, 2.5, 3] } }
            }
        })
    }

    #[test]
    fn test_extract_scalar() {
        let extractor = JmesPathExtractor::compile("player.networkExp").unwrap();
        let result = extractor.extract(&player_doc(1000)).unwrap();
        assert_eq!(result, Extraction::Found(json!(1000)));
    }

    #[test]
    fn test_extract_structure() {
        let extractor = JmesPathExtractor::compile("player.stats.Bedwars").unwrap();
        let result = extractor.extract(&player_doc(1000)).unwrap();
        assert_eq!(
            result,
            Extraction::Found(json!({ "wins_bedwars": 12, "kills": [1, 2.5, 3] }))
        );
    }

    #[test]
    fn test_missing_key_is_absent() {
        let extractor = JmesPathExtractor::compile("player.karma").unwrap();
        assert_eq!(extractor.extract(&player_doc(1000)).unwrap(), Extraction::Absent);
    }

    #[test]
    fn test_invalid_expression_is_config_error() {
        let result = JmesPathExtractor::compile("player.[networkExp");
        assert!(matches!(result, Err(ConfigError::InvalidQuery { .. })));
    }

    #[test]
    fn test_runtime_error_is_extract_error() {
        // abs() on a string is a type error at evaluation time.
        let extractor = JmesPathExtractor::compile("abs(player.displayname)").unwrap();
        let err = extractor.extract(&player_doc(1000)).unwrap_err();
        assert_eq!(err.expression, "abs(player.displayname)");
    }

    #[test]
    fn test_reextracting_same_document_is_stable() {
        let extractor = JmesPathExtractor::compile("player.stats").unwrap();
        let doc = player_doc(42);
        let first = extractor.extract(&doc).unwrap();
        let second = extractor.extract(&doc).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_normalize_numbers() {
        assert_eq!(normalize_numbers(json!(1500.0)), json!(1500));
        assert_eq!(normalize_numbers(json!(-3.0)), json!(-3));
        assert_eq!(normalize_numbers(json!(2.5)), json!(2.5));
        assert_eq!(normalize_numbers(json!({ "a": [1.0, "x"] })), json!({ "a": [1, "x"] }));
    }
}
