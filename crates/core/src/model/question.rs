use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shape of a quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
}

impl QuestionKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple choice",
            QuestionKind::TrueFalse => "true/false",
        }
    }
}

/// Why a [`QuestionDraft`] failed validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,
    #[error("true/false questions take exactly 2 options, got {0}")]
    BadTrueFalseOptions(usize),
    #[error("multiple choice questions take 2 to 6 options, got {0}")]
    BadOptionCount(usize),
    #[error("answer options cannot be empty")]
    EmptyOption,
    #[error("correct answer index {index} is out of range for {options} options")]
    CorrectIndexOutOfRange { index: usize, options: usize },
    #[error("expected {expected} incorrect-answer explanations, got {got}")]
    ExplanationMismatch { expected: usize, got: usize },
}

/// Explanations shown after the learner answers.
///
/// `incorrect` holds one entry per wrong option, in option order with
/// the correct option skipped. An empty list means the source supplied
/// none, which is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerExplanations {
    pub correct: String,
    pub incorrect: Vec<String>,
}

/// Unvalidated question data as it arrives from a generator or a
/// question bank. [`QuestionDraft::validate`] is the only way to get a
/// [`QuizQuestion`].
#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub prompt: String,
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanations: AnswerExplanations,
}

impl QuestionDraft {
    /// Checks the draft and produces a question that is safe to show.
    ///
    /// # Errors
    ///
    /// Returns a [`QuestionError`] when the prompt or an option is
    /// blank, the option count does not fit the kind, the correct
    /// index is out of range, or the incorrect-answer explanations
    /// do not line up with the options.
    pub fn validate(self) -> Result<QuizQuestion, QuestionError> {
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        let options: Vec<String> = self
            .options
            .iter()
            .map(|opt| opt.trim().to_string())
            .collect();
        if options.iter().any(String::is_empty) {
            return Err(QuestionError::EmptyOption);
        }
        match self.kind {
            QuestionKind::TrueFalse if options.len() != 2 => {
                return Err(QuestionError::BadTrueFalseOptions(options.len()));
            }
            QuestionKind::MultipleChoice if !(2..=6).contains(&options.len()) => {
                return Err(QuestionError::BadOptionCount(options.len()));
            }
            _ => {}
        }

        if self.correct_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: self.correct_index,
                options: options.len(),
            });
        }

        let incorrect: Vec<String> = self
            .explanations
            .incorrect
            .iter()
            .map(|text| text.trim().to_string())
            .collect();
        if !incorrect.is_empty() && incorrect.len() != options.len() - 1 {
            return Err(QuestionError::ExplanationMismatch {
                expected: options.len() - 1,
                got: incorrect.len(),
            });
        }

        Ok(QuizQuestion {
            prompt,
            kind: self.kind,
            options,
            correct_index: self.correct_index,
            explanations: AnswerExplanations {
                correct: self.explanations.correct.trim().to_string(),
                incorrect,
            },
        })
    }
}

/// A validated quiz question.
///
/// Invariants held by construction: non-empty prompt and options, an
/// option count that fits the kind, and a correct index inside the
/// option range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    prompt: String,
    kind: QuestionKind,
    options: Vec<String>,
    correct_index: usize,
    explanations: AnswerExplanations,
}

impl QuizQuestion {
    /// Builds a true/false question without going through a draft.
    ///
    /// # Errors
    ///
    /// Returns [`QuestionError::EmptyPrompt`] when `prompt` is blank.
    pub fn true_false(
        prompt: impl Into<String>,
        answer_is_true: bool,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        QuestionDraft {
            prompt: prompt.into(),
            kind: QuestionKind::TrueFalse,
            options: vec!["True".to_string(), "False".to_string()],
            correct_index: usize::from(!answer_is_true),
            explanations: AnswerExplanations {
                correct: explanation.into(),
                incorrect: Vec::new(),
            },
        }
        .validate()
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_index
    }

    /// Explanation for the given option, when one was supplied.
    ///
    /// Incorrect-answer explanations are stored in option order with
    /// the correct slot skipped, so the lookup re-inserts that gap.
    #[must_use]
    pub fn explanation_for(&self, choice: usize) -> Option<&str> {
        if choice >= self.options.len() {
            return None;
        }
        if choice == self.correct_index {
            return non_empty(&self.explanations.correct);
        }
        let slot = if choice < self.correct_index {
            choice
        } else {
            choice - 1
        };
        self.explanations
            .incorrect
            .get(slot)
            .and_then(|text| non_empty(text))
    }
}

fn non_empty(text: &str) -> Option<&str> {
    if text.is_empty() { None } else { Some(text) }
}
