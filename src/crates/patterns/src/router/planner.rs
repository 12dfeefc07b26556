use super::{ContextData, ExecutionPlan, ExecutionPlanner, IntentCategory, PlannedStep};
use crate::error::{PatternError, Result};

/// Default planner: one generic tool per intent
///
/// Backends usually install their own planner for domain-specific steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPlanner;

impl StaticPlanner {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionPlanner for StaticPlanner {
    fn plan(
        &self,
        intent: IntentCategory,
        _message: &str,
        _context: &ContextData,
    ) -> Result<ExecutionPlan> {
        let (description, reasoning, tool, step) = match intent {
            IntentCategory::SchemaDiscovery => (
                "Discover data schema",
                "User wants to explore data structure. Using schema discovery tools.",
                "get_schema",
                "Retrieve schema information",
            ),
            IntentCategory::RelationshipQuery => (
                "Analyze data relationships",
                "User wants to understand data relationships. Using relationship inference.",
                "infer_relationships",
                "Infer foreign key relationships",
            ),
            IntentCategory::DataQuality => (
                "Execute data quality assessment",
                "User needs quality validation. Using quality check tools.",
                "check_quality",
                "Run data quality checks",
            ),
            IntentCategory::DataTransform => (
                "Execute data transformation",
                "User wants to transform data. Using ETL workflow.",
                "transform_data",
                "Execute transformation pipeline",
            ),
            IntentCategory::Analytics => (
                "Generate and execute analytics",
                "User wants analytics. Using query generation and execution.",
                "execute_query",
                "Execute analytics query",
            ),
            IntentCategory::QueryGeneration => (
                "Generate query",
                "User wants query generation. Creating query from requirements.",
                "generate_query",
                "Generate query from natural language",
            ),
            IntentCategory::DocumentSearch => (
                "Search documents",
                "User wants document search. Using search tools.",
                "search_documents",
                "Search document collection",
            ),
            IntentCategory::ApiCall => (
                "Execute API call",
                "User wants API interaction. Using HTTP client.",
                "call_api",
                "Execute API request",
            ),
            IntentCategory::Unknown => {
                return Err(PatternError::Planning(
                    "cannot plan execution for unknown intent".to_string(),
                ))
            }
        };

        Ok(ExecutionPlan {
            intent,
            description: description.to_string(),
            reasoning: reasoning.to_string(),
            steps: vec![PlannedStep::new(tool, step)],
        })
    }
}
