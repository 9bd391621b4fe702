//! Tool input types with JSON Schema generation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input for the `execute_sql` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteSqlInput {
    /// Name of the database to connect to.
    #[schemars(description = "Name of the database to run the query against")]
    pub database: String,

    /// The SQL statement to execute verbatim.
    #[schemars(description = "SQL statement to execute (one statement per call)")]
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_sql_input_deserializes() {
        let input: ExecuteSqlInput =
            serde_json::from_str(r#"{"database": "sales", "query": "SELECT 1"}"#).unwrap();
        assert_eq!(input.database, "sales");
        assert_eq!(input.query, "SELECT 1");
    }

    #[test]
    fn test_execute_sql_input_requires_both_fields() {
        assert!(serde_json::from_str::<ExecuteSqlInput>(r#"{"query": "SELECT 1"}"#).is_err());
        assert!(serde_json::from_str::<ExecuteSqlInput>(r#"{"database": "db"}"#).is_err());
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = serde_json::to_value(schemars::schema_for!(ExecuteSqlInput)).unwrap();
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&serde_json::json!("database")));
        assert!(required.contains(&serde_json::json!("query")));
    }
}
