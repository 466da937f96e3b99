//! Deterministic grade computation for answer-key and rubric assessments.
//!
//! Precondition violations (non-positive totals, sheet/key length mismatch,
//! criterion scores outside their weight) are returned as [`ScoringError`]
//! rather than clamped. Data-entry invariants (key points summing to the
//! assignment total, rubric weights summing to 100) are reported through
//! separate checks and never block scoring.

pub mod answer_key;
pub mod grade;
pub mod rubric;

pub use answer_key::{
    score_multiple_choice, AnswerKey, AnswerKeyEntry, AnswerSheet, Choice, MultipleChoiceScore,
    PointsCheck,
};
pub use grade::{format_percent, letter_grade, round_off_1_decimal};
pub use rubric::{
    score_rubric, scored_weights, CriterionScore, FeedbackLevel, Rubric, RubricCriterion,
    RubricKind, WeightCheck,
};

/// Tolerance used when comparing point and weight totals.
pub const TOTAL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("total points must be a finite number greater than zero (got {0})")]
    NonPositiveTotal(f64),
    #[error("answer sheet has {answers} answers but the key has {questions} questions")]
    SheetLengthMismatch { answers: usize, questions: usize },
    #[error("criterion `{name}` score {raw_score} is outside 0..={weight}")]
    CriterionOutOfRange {
        name: String,
        raw_score: f64,
        weight: f64,
    },
    #[error("criterion `{name}` weight {weight} is outside (0, 100]")]
    InvalidWeight { name: String, weight: f64 },
    #[error("unknown answer choice `{0}`; expected one of A, B, C, D, E")]
    UnknownChoice(String),
    #[error("question at position {position} is numbered {found}; expected {expected}")]
    BadNumbering {
        position: usize,
        found: u32,
        expected: u32,
    },
    #[error("question {question} has invalid points {points}")]
    InvalidPoints { question: u32, points: f64 },
}

impl ScoringError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NonPositiveTotal(_) => "non_positive_total",
            Self::SheetLengthMismatch { .. } => "sheet_length_mismatch",
            Self::CriterionOutOfRange { .. } => "criterion_out_of_range",
            Self::InvalidWeight { .. } => "invalid_weight",
            Self::UnknownChoice(_) => "unknown_choice",
            Self::BadNumbering { .. } => "bad_numbering",
            Self::InvalidPoints { .. } => "invalid_points",
        }
    }
}
