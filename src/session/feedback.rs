//! Interview scorecard domain types and tool declaration.
//!
//! The model ends an interview by invoking the `generate_feedback` tool
//! with a structured scorecard. The schema here is the contract the model
//! must satisfy; [`FeedbackReport`] is the typed view of a valid payload.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::live::ToolDeclaration;

/// Name of the feedback tool declared to the model.
pub const FEEDBACK_TOOL: &str = "generate_feedback";

/// Structured interview feedback emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReport {
    /// Detailed interview feedback
    pub text: String,
    /// Interview performance score (0-100)
    pub score: f64,
    /// Key strengths demonstrated
    pub strengths: Vec<String>,
    /// Areas for improvement
    pub improvements: Vec<String>,
    /// Suggestions to improve the resume
    pub resume_suggestions: Vec<String>,
    /// Career development plan
    pub career_development: CareerDevelopment,
}

/// Career development section of the scorecard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerDevelopment {
    /// Suggested projects to build
    pub project_ideas: Vec<String>,
    /// Recommended technologies to learn
    pub tech_stack: Vec<String>,
    /// Step-by-step learning path
    pub learning_path: Vec<String>,
}

impl FeedbackReport {
    /// Typed view over an extracted tool result. Returns `None` when the
    /// payload does not match the declared schema.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// The `generate_feedback` tool declaration with its full argument schema.
pub fn feedback_declaration() -> ToolDeclaration {
    ToolDeclaration {
        name: FEEDBACK_TOOL.to_string(),
        description: "Displays interview feedback with detailed analysis".to_string(),
        parameters: json!({
            "type": "OBJECT",
            "required": [
                "text",
                "score",
                "strengths",
                "improvements",
                "resumeSuggestions",
                "careerDevelopment"
            ],
            "properties": {
                "text": {
                    "type": "STRING",
                    "description": "Detailed interview feedback"
                },
                "score": {
                    "type": "NUMBER",
                    "description": "Interview performance score (0-100)"
                },
                "strengths": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Key strengths demonstrated"
                },
                "improvements": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Areas for improvement"
                },
                "resumeSuggestions": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Suggestions to improve resume"
                },
                "careerDevelopment": {
                    "type": "OBJECT",
                    "required": ["projectIdeas", "techStack", "learningPath"],
                    "properties": {
                        "projectIdeas": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" },
                            "description": "Suggested projects to build"
                        },
                        "techStack": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" },
                            "description": "Recommended technologies to learn"
                        },
                        "learningPath": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" },
                            "description": "Step-by-step learning path"
                        }
                    }
                }
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> Value {
        json!({
            "text": "Strong problem solving, thin on databases.",
            "score": 78,
            "strengths": ["algorithms", "communication"],
            "improvements": ["SQL depth"],
            "resumeSuggestions": ["quantify project impact"],
            "careerDevelopment": {
                "projectIdeas": ["build a key-value store"],
                "techStack": ["PostgreSQL"],
                "learningPath": ["indexes", "query planning"]
            }
        })
    }

    #[test]
    fn test_declaration_shape() {
        let decl = feedback_declaration();
        assert_eq!(decl.name, FEEDBACK_TOOL);
        assert_eq!(decl.parameters["type"], "OBJECT");
        let required = decl.parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 6);
        assert_eq!(
            decl.parameters["properties"]["careerDevelopment"]["required"]
                .as_array()
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn test_report_from_valid_payload() {
        let report = FeedbackReport::from_value(&sample_payload()).unwrap();
        assert_eq!(report.score, 78.0);
        assert_eq!(report.strengths.len(), 2);
        assert_eq!(report.career_development.tech_stack, vec!["PostgreSQL"]);
    }

    #[test]
    fn test_report_rejects_wrong_shape() {
        assert!(FeedbackReport::from_value(&json!({"score": "high"})).is_none());
        assert!(FeedbackReport::from_value(&json!(null)).is_none());
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = FeedbackReport::from_value(&sample_payload()).unwrap();
        let back = serde_json::to_value(&report).unwrap();
        assert!(back.get("resumeSuggestions").is_some());
        assert!(back["careerDevelopment"].get("projectIdeas").is_some());
    }
}
