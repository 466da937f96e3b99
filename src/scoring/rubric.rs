use super::{ScoringError, TOTAL_EPSILON};
use serde::{Deserialize, Serialize};

/// Nominal weight total of a well-formed rubric.
pub const RUBRIC_TOTAL_WEIGHT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub name: String,
    pub weight: f64,
}

impl RubricCriterion {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricKind {
    Essay,
    ShortAnswer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RubricKind,
    pub criteria: Vec<RubricCriterion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightCheck {
    pub expected: f64,
    pub actual: f64,
}

impl WeightCheck {
    pub fn is_balanced(&self) -> bool {
        (self.expected - self.actual).abs() < TOTAL_EPSILON
    }
}

impl Rubric {
    pub fn new(name: impl Into<String>, kind: RubricKind, criteria: Vec<RubricCriterion>) -> Self {
        Self {
            name: name.into(),
            kind,
            criteria,
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight).sum()
    }

    pub fn check_weights(&self) -> WeightCheck {
        WeightCheck {
            expected: RUBRIC_TOTAL_WEIGHT,
            actual: self.total_weight(),
        }
    }

    /// Every weight must lie in (0, 100].
    pub fn validate_criteria(&self) -> Result<(), ScoringError> {
        match self
            .criteria
            .iter()
            .find(|c| !(c.weight > 0.0 && c.weight <= RUBRIC_TOTAL_WEIGHT))
        {
            Some(c) => Err(ScoringError::InvalidWeight {
                name: c.name.clone(),
                weight: c.weight,
            }),
            None => Ok(()),
        }
    }

    /// Built-in essay rubrics offered as starting points.
    pub fn templates() -> Vec<Rubric> {
        let build = |name: &str, criteria: &[(&str, f64)]| {
            Rubric::new(
                name,
                RubricKind::Essay,
                criteria
                    .iter()
                    .map(|(n, w)| RubricCriterion::new(*n, *w))
                    .collect(),
            )
        };
        vec![
            build(
                "5-Paragraph Essay Rubric",
                &[
                    ("Introduction & Thesis", 20.0),
                    ("Body Paragraphs", 40.0),
                    ("Evidence & Analysis", 20.0),
                    ("Conclusion", 10.0),
                    ("Grammar & Mechanics", 10.0),
                ],
            ),
            build(
                "Research Paper Rubric",
                &[
                    ("Research & Sources", 25.0),
                    ("Argument Development", 25.0),
                    ("Organization", 20.0),
                    ("Writing Quality", 20.0),
                    ("Citations & Format", 10.0),
                ],
            ),
            build(
                "Creative Writing Rubric",
                &[
                    ("Creativity & Originality", 30.0),
                    ("Character Development", 25.0),
                    ("Plot & Structure", 25.0),
                    ("Language & Style", 20.0),
                ],
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionScore {
    pub criterion: RubricCriterion,
    pub raw_score: f64,
}

impl CriterionScore {
    pub fn new(criterion: RubricCriterion, raw_score: f64) -> Self {
        Self {
            criterion,
            raw_score,
        }
    }

    fn check_range(&self) -> Result<(), ScoringError> {
        let w = self.criterion.weight;
        if self.raw_score.is_finite() && self.raw_score >= 0.0 && self.raw_score <= w {
            Ok(())
        } else {
            Err(ScoringError::CriterionOutOfRange {
                name: self.criterion.name.clone(),
                raw_score: self.raw_score,
                weight: w,
            })
        }
    }

    pub fn level(&self) -> FeedbackLevel {
        if self.criterion.weight > 0.0 {
            FeedbackLevel::for_percent(100.0 * self.raw_score / self.criterion.weight)
        } else {
            FeedbackLevel::Low
        }
    }
}

/// Weight total of the criteria a score sheet was graded against.
pub fn scored_weights(scores: &[CriterionScore]) -> WeightCheck {
    WeightCheck {
        expected: RUBRIC_TOTAL_WEIGHT,
        actual: scores.iter().map(|s| s.criterion.weight).sum(),
    }
}

/// Sum of criterion scores. No clamping and no weight-total check.
pub fn score_rubric(scores: &[CriterionScore]) -> Result<f64, ScoringError> {
    scores.iter().try_fold(0.0, |total, s| {
        s.check_range()?;
        Ok(total + s.raw_score)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLevel {
    High,
    Medium,
    Low,
}

impl FeedbackLevel {
    pub fn for_percent(percent: f64) -> Self {
        if percent >= 90.0 {
            Self::High
        } else if percent >= 75.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(weights: &[f64], raws: &[f64]) -> Vec<CriterionScore> {
        weights
            .iter()
            .zip(raws)
            .enumerate()
            .map(|(i, (w, r))| CriterionScore::new(RubricCriterion::new(format!("c{i}"), *w), *r))
            .collect()
    }

    #[test]
    fn aggregate_is_plain_sum() {
        let s = scores(&[20.0, 30.0, 20.0, 20.0, 10.0], &[18.0, 25.0, 16.0, 18.0, 9.0]);
        assert_eq!(score_rubric(&s), Ok(86.0));
        assert_eq!(score_rubric(&[]), Ok(0.0));
    }

    #[test]
    fn fractional_scores_keep_input_precision() {
        let s = scores(&[50.0, 50.0], &[12.5, 40.25]);
        assert_eq!(score_rubric(&s), Ok(52.75));
    }

    #[test]
    fn out_of_range_scores_are_precondition_errors() {
        let over = scores(&[10.0], &[10.5]);
        assert_eq!(
            score_rubric(&over),
            Err(ScoringError::CriterionOutOfRange {
                name: "c0".into(),
                raw_score: 10.5,
                weight: 10.0
            })
        );
        assert!(score_rubric(&scores(&[10.0], &[-1.0])).is_err());
        assert!(score_rubric(&scores(&[10.0], &[f64::NAN])).is_err());
    }

    #[test]
    fn mismatched_weights_are_flagged_not_rejected() {
        let rubric = Rubric::new(
            "Short",
            RubricKind::ShortAnswer,
            vec![RubricCriterion::new("a", 40.0), RubricCriterion::new("b", 40.0)],
        );
        let check = rubric.check_weights();
        assert!(!check.is_balanced());
        assert_eq!(check.actual, 80.0);
        let s = scores(&[40.0, 40.0], &[40.0, 40.0]);
        assert_eq!(score_rubric(&s), Ok(80.0));
        assert_eq!(scored_weights(&s), check);
    }

    #[test]
    fn templates_are_well_formed() {
        let templates = Rubric::templates();
        assert_eq!(templates.len(), 3);
        for t in &templates {
            assert!(t.check_weights().is_balanced(), "{} weights", t.name);
            assert!(t.validate_criteria().is_ok());
        }
    }

    #[test]
    fn criterion_weights_must_be_positive() {
        let rubric = Rubric::new(
            "Bad",
            RubricKind::Essay,
            vec![RubricCriterion::new("zero", 0.0), RubricCriterion::new("all", 100.0)],
        );
        assert!(matches!(
            rubric.validate_criteria(),
            Err(ScoringError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn feedback_levels() {
        let s = scores(&[20.0, 20.0, 20.0], &[18.0, 15.0, 14.0]);
        let levels: Vec<FeedbackLevel> = s.iter().map(CriterionScore::level).collect();
        assert_eq!(
            levels,
            vec![FeedbackLevel::High, FeedbackLevel::Medium, FeedbackLevel::Low]
        );
    }
}
