//! Session configuration builder.
//!
//! Pure assembly of a [`LiveConfig`] from the caller-supplied context.
//! There is deliberately no failure path: thin or missing context produces
//! a degraded-but-valid configuration so a session can always be started.

use crate::core::live::{GeminiLiveModel, LiveConfig, ResponseModality};

use super::feedback::feedback_declaration;

/// Which assistant persona the session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionProfile {
    /// Technical interviewer with the feedback tool declared
    #[default]
    Interview,
    /// DSA practice mentor (screen-share guided, no tools)
    DsaPractice,
    /// Online shopping helper for less technical users (no tools)
    ShoppingAssistant,
}

impl SessionProfile {
    /// Parse a profile name, `None` when unknown.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "interview" => Some(Self::Interview),
            "dsa" | "dsa_practice" | "dsa-practice" => Some(Self::DsaPractice),
            "shopping" | "shopping_assistant" => Some(Self::ShoppingAssistant),
            _ => None,
        }
    }

    /// Stable name for logging and wire messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interview => "interview",
            Self::DsaPractice => "dsa_practice",
            Self::ShoppingAssistant => "shopping_assistant",
        }
    }
}

impl std::fmt::Display for SessionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-scoped context a session is built from.
///
/// Rebuilt-from on every connect and reconnect, so settings changed
/// between attempts (a different model, an edited resume) always take
/// effect.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    /// Assistant persona
    pub profile: SessionProfile,
    /// Candidate resume text; may be empty
    pub resume_text: String,
    /// Model to run the session on
    pub model: GeminiLiveModel,
}

impl SessionContext {
    /// Interview context with the default model.
    pub fn interview(resume_text: impl Into<String>) -> Self {
        Self {
            profile: SessionProfile::Interview,
            resume_text: resume_text.into(),
            model: GeminiLiveModel::default(),
        }
    }
}

/// Build the session configuration for `ctx`.
///
/// Pure: equal contexts yield structurally equal configs.
pub fn build_config(ctx: &SessionContext) -> LiveConfig {
    match ctx.profile {
        SessionProfile::Interview => LiveConfig {
            model: ctx.model.as_str().to_string(),
            response_modality: ResponseModality::Audio,
            system_instruction: interview_instruction(&ctx.resume_text),
            tools: vec![feedback_declaration()],
        },
        SessionProfile::DsaPractice => LiveConfig {
            model: ctx.model.as_str().to_string(),
            response_modality: ResponseModality::Audio,
            system_instruction: DSA_MENTOR_INSTRUCTION.to_string(),
            tools: Vec::new(),
        },
        SessionProfile::ShoppingAssistant => LiveConfig {
            model: ctx.model.as_str().to_string(),
            response_modality: ResponseModality::Audio,
            system_instruction: SHOPPING_ASSISTANT_INSTRUCTION.to_string(),
            tools: Vec::new(),
        },
    }
}

/// Interviewer instruction, personalized with the candidate resume.
fn interview_instruction(resume_text: &str) -> String {
    let resume_section = if resume_text.trim().is_empty() {
        // Degraded path: no resume was provided. The session still starts;
        // the model is told to work without background data and to say so
        // in its feedback.
        "No resume was provided for this candidate. Conduct a general \
         software engineering interview, and state in your feedback that \
         the assessment is based on the conversation alone because no \
         background data was available."
            .to_string()
    } else {
        format!("CANDIDATE RESUME DETAILS:\n{resume_text}")
    };

    format!(
        "You are a seasoned and approachable technical interviewer evaluating \
candidates for a software engineering position. Your goal is to create an \
engaging, insightful and professional interview experience, assessing the \
candidate's technical skills, problem-solving ability and overall potential \
as a team contributor. Balance rigor with encouragement.

INTERVIEW STRUCTURE:
1. Introduction (2-3 minutes)
   - Welcome the candidate warmly and set a positive tone.
   - Briefly review their background, referencing their resume.
   - Start with a relaxed, non-technical question to ease them in.

2. Technical Assessment (15-20 minutes)
   - Begin with foundational concepts or basic data structures and
     algorithms questions, then progress based on their responses.
   - Explore data structures and algorithms, programming languages,
     operating systems, databases and computer networks, focusing on the
     skills highlighted in their resume.
   - Include coding problems, design scenarios and logical puzzles.

3. Project Deep Dive (5-10 minutes)
   - Discuss specific projects from their resume: technical decisions,
     challenges faced, and the candidate's personal contribution.

4. Behavioral Wrap-up (5-10 minutes)
   - Ask about extracurriculars and pose simple workplace scenarios to
     understand their mindset and interpersonal skills. Keep the tone
     light and conversational.

{resume_section}

FEEDBACK GENERATION:
Evaluate the candidate holistically across technical knowledge (30%), \
problem solving (20%), project understanding (15%), values and mindset \
(10%), communication (10%) and resume quality (15%). Also provide resume \
optimization suggestions and a career development plan: suggested \
projects, a recommended tech stack, and a structured learning path.

When the candidate says the interview is over, call the generate_feedback \
tool with the complete scorecard. Do not speak after generating feedback."
    )
}

/// DSA practice mentor instruction.
const DSA_MENTOR_INSTRUCTION: &str = "\
You are an expert DSA mentor helping users solve coding problems. Guide \
them through problem solving while promoting understanding, not just \
answers. Ask the user to share their screen and help them work through \
the problem that is visible.

MENTORING APPROACH:
1. Problem analysis: break down the statement, identify constraints and
   edge cases, develop test cases.
2. Solution development: start from brute force, guide toward
   optimization with leading questions, discuss time and space
   complexity trade-offs.
3. Implementation support: syntax guidance, debugging help, common
   pitfalls.
4. Learning reinforcement: connect the problem to similar patterns and
   suggest related practice problems.

Give hints instead of direct solutions, ask clarifying questions, and \
keep an encouraging tone throughout.";

/// Shopping assistant instruction.
const SHOPPING_ASSISTANT_INSTRUCTION: &str = "\
You are a patient shopping assistant helping less technical users \
navigate online stores. First ask the user to share their screen so you \
can see what they see, then ask in plain conversation what they want to \
buy. Do not assume any prior knowledge.

Guide them through website orientation, product search, comparing items, \
adding to cart, checkout and order tracking. Speak slowly and clearly, \
use simple non-technical language, repeat instructions patiently, and \
confirm understanding frequently.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::feedback::FEEDBACK_TOOL;

    #[test]
    fn test_build_is_pure() {
        let ctx = SessionContext::interview("Rust developer, 3 years.");
        assert_eq!(build_config(&ctx), build_config(&ctx));
    }

    #[test]
    fn test_interview_config_shape() {
        let ctx = SessionContext::interview("Worked on distributed caches.");
        let config = build_config(&ctx);

        assert_eq!(config.model, GeminiLiveModel::default().as_str());
        assert_eq!(config.response_modality, ResponseModality::Audio);
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].name, FEEDBACK_TOOL);
        assert!(
            config
                .system_instruction
                .contains("Worked on distributed caches.")
        );
    }

    #[test]
    fn test_blank_resume_yields_degraded_config() {
        let ctx = SessionContext::interview("   \n ");
        let config = build_config(&ctx);

        // Still a complete, startable config, just with the degraded
        // instruction instead of resume details.
        assert_eq!(config.tools.len(), 1);
        assert!(config.system_instruction.contains("No resume was provided"));
        assert!(!config.system_instruction.contains("CANDIDATE RESUME"));
    }

    #[test]
    fn test_companion_profiles_declare_no_tools() {
        for profile in [SessionProfile::DsaPractice, SessionProfile::ShoppingAssistant] {
            let ctx = SessionContext {
                profile,
                resume_text: String::new(),
                model: GeminiLiveModel::Flash20Exp,
            };
            let config = build_config(&ctx);
            assert!(config.tools.is_empty());
            assert_eq!(config.model, "models/gemini-2.0-flash-exp");
        }
    }

    #[test]
    fn test_model_choice_is_respected() {
        let ctx = SessionContext {
            model: GeminiLiveModel::Flash20Live,
            ..SessionContext::interview("resume")
        };
        assert_eq!(build_config(&ctx).model, "models/gemini-2.0-flash-live-001");
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(SessionProfile::parse("interview"), Some(SessionProfile::Interview));
        assert_eq!(SessionProfile::parse("DSA"), Some(SessionProfile::DsaPractice));
        assert_eq!(
            SessionProfile::parse("shopping"),
            Some(SessionProfile::ShoppingAssistant)
        );
        assert_eq!(SessionProfile::parse("unknown"), None);
    }
}
