// src/models/quiz.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::SessionError,
    models::question::{Question, QuestionRecord},
};

/// Identifies one quiz inside one course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRef {
    pub course_id: String,
    pub quiz_id: String,
}

impl QuizRef {
    pub fn new(course_id: impl Into<String>, quiz_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            quiz_id: quiz_id.into(),
        }
    }
}

/// Quiz as seen by a student taking it. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinition {
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub topic: Option<String>,
    /// Length of one attempt, in minutes.
    pub duration: u32,
    /// Last moment at which an attempt may be started.
    pub deadline: DateTime<Utc>,
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    pub fn quiz_ref(&self) -> QuizRef {
        QuizRef::new(&self.course_id, &self.id)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Rejects quiz data a session cannot be run against.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.id.is_empty() || self.course_id.is_empty() {
            return Err(SessionError::Protocol("quiz identifiers are missing".to_string()));
        }
        if self.questions.is_empty() {
            return Err(SessionError::Protocol("quiz has no questions".to_string()));
        }

        let mut seen = HashSet::new();
        for q in &self.questions {
            if q.id.is_empty() {
                return Err(SessionError::Protocol("question without id".to_string()));
            }
            if !seen.insert(q.id.as_str()) {
                return Err(SessionError::Protocol(format!("duplicate question id '{}'", q.id)));
            }
            if q.options.is_empty() {
                return Err(SessionError::Protocol(format!("question '{}' has no options", q.id)));
            }
        }
        Ok(())
    }
}

/// Quiz as stored by the exam service.
#[derive(Debug, Clone)]
pub struct QuizRecord {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub topic: Option<String>,
    pub duration: u32,
    pub deadline: DateTime<Utc>,
    pub questions: Vec<QuestionRecord>,
}

impl QuizRecord {
    /// Strips the answer keys.
    pub fn to_public(&self) -> QuizDefinition {
        QuizDefinition {
            id: self.id.clone(),
            course_id: self.course_id.clone(),
            title: self.title.clone(),
            topic: self.topic.clone(),
            duration: self.duration,
            deadline: self.deadline,
            questions: self.questions.iter().map(Question::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(questions: Vec<Question>) -> QuizDefinition {
        QuizDefinition {
            id: "quiz-1".to_string(),
            course_id: "course-1".to_string(),
            title: "Networks".to_string(),
            topic: None,
            duration: 10,
            deadline: Utc::now(),
            questions,
        }
    }

    fn q(id: &str, options: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            content: format!("Question {}", id),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_quiz() {
        assert!(quiz(vec![q("1", &["A", "B"]), q("2", &["C"])]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_quiz() {
        assert!(matches!(quiz(vec![]).validate(), Err(SessionError::Protocol(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let result = quiz(vec![q("1", &["A"]), q("1", &["B"])]).validate();
        assert!(matches!(result, Err(SessionError::Protocol(_))));
    }

    #[test]
    fn test_validate_rejects_question_without_options() {
        let result = quiz(vec![q("1", &[])]).validate();
        assert!(matches!(result, Err(SessionError::Protocol(_))));
    }

    #[test]
    fn test_deserializes_service_shape() {
        let json = serde_json::json!({
            "id": "quiz-1",
            "courseId": "course-1",
            "title": "Networks",
            "duration": 1,
            "deadline": "2030-01-01T00:00:00Z",
            "questions": [{ "id": "1", "content": "?", "options": ["A", "B"] }]
        });
        let parsed: QuizDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.topic, None);
        assert_eq!(parsed.question("1").map(|q| q.options.len()), Some(2));
    }
}
