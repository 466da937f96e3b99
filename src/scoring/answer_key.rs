use super::grade::round_off_1_decimal;
use super::{ScoringError, TOTAL_EPSILON};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
    D,
    E,
}

impl Choice {
    pub const ALL: [Choice; 5] = [Choice::A, Choice::B, Choice::C, Choice::D, Choice::E];

    pub fn as_str(self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
            Choice::D => "D",
            Choice::E => "E",
        }
    }

    /// Blank input means "not answered".
    pub fn parse_answer(s: &str) -> Result<Option<Choice>, ScoringError> {
        let t = s.trim();
        if t.is_empty() {
            return Ok(None);
        }
        t.parse().map(Some)
    }
}

impl FromStr for Choice {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Choice::A),
            "B" => Ok(Choice::B),
            "C" => Ok(Choice::C),
            "D" => Ok(Choice::D),
            "E" => Ok(Choice::E),
            _ => Err(ScoringError::UnknownChoice(s.to_string())),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    #[serde(rename = "question")]
    pub question_number: u32,
    #[serde(rename = "correct")]
    pub correct_choice: Choice,
    pub points: f64,
}

impl AnswerKeyEntry {
    pub fn new(question_number: u32, correct_choice: Choice, points: f64) -> Self {
        Self {
            question_number,
            correct_choice,
            points,
        }
    }
}

/// Ordered correct-choice table for one objective assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey {
    entries: Vec<AnswerKeyEntry>,
}

/// Result of comparing a key's point total with the assignment total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsCheck {
    pub expected: f64,
    pub actual: f64,
}

impl PointsCheck {
    pub fn is_balanced(&self) -> bool {
        (self.expected - self.actual).abs() < TOTAL_EPSILON
    }
}

impl AnswerKey {
    pub fn new(entries: Vec<AnswerKeyEntry>) -> Self {
        Self { entries }
    }

    /// Editor starting point: every answer `A`, points split evenly and
    /// rounded down.
    pub fn with_defaults(questions: u32, total_points: f64) -> Self {
        let per_question = if questions == 0 {
            0.0
        } else {
            (total_points / f64::from(questions)).floor()
        };
        Self {
            entries: (1..=questions)
                .map(|q| AnswerKeyEntry::new(q, Choice::A, per_question))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[AnswerKeyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_points(&self) -> f64 {
        self.entries.iter().map(|e| e.points).sum()
    }

    pub fn check_points(&self, assignment_total: f64) -> PointsCheck {
        PointsCheck {
            expected: assignment_total,
            actual: self.total_points(),
        }
    }

    /// Question numbers must run 1..=n in order and points must be finite
    /// and non-negative.
    pub fn validate_entries(&self) -> Result<(), ScoringError> {
        for (i, e) in self.entries.iter().enumerate() {
            let expected = (i + 1) as u32;
            if e.question_number != expected {
                return Err(ScoringError::BadNumbering {
                    position: i,
                    found: e.question_number,
                    expected,
                });
            }
            if !e.points.is_finite() || e.points < 0.0 {
                return Err(ScoringError::InvalidPoints {
                    question: e.question_number,
                    points: e.points,
                });
            }
        }
        Ok(())
    }

    /// Appends a question defaulting to `A`, worth `floor(total / new_len)`.
    pub fn push_question(&self, assignment_total: f64) -> Self {
        let next = (self.entries.len() + 1) as u32;
        let mut entries = self.entries.clone();
        entries.push(AnswerKeyEntry::new(
            next,
            Choice::A,
            (assignment_total / f64::from(next)).floor(),
        ));
        Self { entries }
    }

    /// Drops the question at `index` and renumbers the rest from 1.
    pub fn remove_question(&self, index: usize) -> Self {
        let entries = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .enumerate()
            .map(|(n, (_, e))| AnswerKeyEntry {
                question_number: (n + 1) as u32,
                ..*e
            })
            .collect();
        Self { entries }
    }
}

/// One student's submitted choices, positionally aligned with the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSheet {
    pub student_id: String,
    pub answers: Vec<Option<Choice>>,
}

impl AnswerSheet {
    pub fn new(student_id: impl Into<String>, answers: Vec<Option<Choice>>) -> Self {
        Self {
            student_id: student_id.into(),
            answers,
        }
    }

    pub fn blank(student_id: impl Into<String>, questions: usize) -> Self {
        Self::new(student_id, vec![None; questions])
    }

    /// Copy padded with blanks (or truncated) to exactly `questions` answers.
    pub fn padded_to(&self, questions: usize) -> Self {
        let mut answers = self.answers.clone();
        answers.resize(questions, None);
        Self::new(self.student_id.clone(), answers)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceScore {
    pub score: f64,
    /// Rounded to one decimal.
    pub percentage: f64,
    pub correct: Vec<bool>,
}

impl MultipleChoiceScore {
    pub fn correct_count(&self) -> usize {
        self.correct.iter().filter(|c| **c).count()
    }
}

pub fn score_multiple_choice(
    sheet: &AnswerSheet,
    key: &AnswerKey,
    total_points: f64,
) -> Result<MultipleChoiceScore, ScoringError> {
    if !total_points.is_finite() || total_points <= 0.0 {
        return Err(ScoringError::NonPositiveTotal(total_points));
    }
    if sheet.answers.len() != key.len() {
        return Err(ScoringError::SheetLengthMismatch {
            answers: sheet.answers.len(),
            questions: key.len(),
        });
    }

    let correct: Vec<bool> = key
        .entries()
        .iter()
        .zip(&sheet.answers)
        .map(|(entry, answer)| *answer == Some(entry.correct_choice))
        .collect();
    let score = key
        .entries()
        .iter()
        .zip(&correct)
        .filter(|(_, ok)| **ok)
        .map(|(entry, _)| entry.points)
        .sum::<f64>();

    Ok(MultipleChoiceScore {
        score,
        percentage: round_off_1_decimal(score / total_points * 100.0),
        correct,
    })
}
