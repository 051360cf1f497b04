//! # Architecture Plan
//!
//! Produced once per run by the Architect and handed read-only to every
//! worker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TechStack {
    #[serde(default)]
    pub frontend: Vec<String>,
    #[serde(default)]
    pub backend: Vec<String>,
    #[serde(default)]
    pub database: Vec<String>,
    #[serde(default)]
    pub testing: Vec<String>,
}

impl TechStack {
    /// Every named technology, in frontend/backend/database/testing order
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.frontend
            .iter()
            .chain(&self.backend)
            .chain(&self.database)
            .chain(&self.testing)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchitecturePlan {
    #[serde(default)]
    pub tech_stack: TechStack,
    #[serde(default)]
    pub architecture_pattern: String,
    /// Free-form sketch; models return either a tree string or a nested object
    #[serde(default)]
    pub folder_structure: serde_json::Value,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub design_patterns: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub guidelines: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tolerates_missing_sections() {
        let plan: ArchitecturePlan =
            serde_json::from_str(r#"{"architecturePattern": "hexagonal"}"#).unwrap();
        assert_eq!(plan.architecture_pattern, "hexagonal");
        assert!(plan.modules.is_empty());
        assert!(plan.folder_structure.is_null());
    }

    #[test]
    fn test_tech_stack_all() {
        let stack = TechStack {
            frontend: vec!["react".into()],
            backend: vec!["axum".into()],
            database: vec![],
            testing: vec!["vitest".into()],
        };
        let names: Vec<_> = stack.all().cloned().collect();
        assert_eq!(names, vec!["react", "axum", "vitest"]);
    }
}
