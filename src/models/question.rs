// src/models/question.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Question as stored by the exam service, including the answer key.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    /// The text content of the question.
    #[validate(length(min = 1, max = 1000))]
    pub content: String,

    /// Offered options in display order (e.g., ["Option A", "Option B"]).
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,

    /// The option that scores a point. Never sent to students.
    #[validate(length(min = 1, max = 500))]
    pub correct_option: String,
}

/// DTO for sending a question to a student (excludes the answer key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub content: String,
    pub options: Vec<String>,
}

impl Question {
    pub fn offers(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

impl From<&QuestionRecord> for Question {
    fn from(q: &QuestionRecord) -> Self {
        Self {
            id: q.id.clone(),
            content: q.content.clone(),
            options: q.options.clone(),
        }
    }
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.is_empty() {
        return Err(validator::ValidationError::new("options_cannot_be_empty"));
    }
    for opt in options {
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
