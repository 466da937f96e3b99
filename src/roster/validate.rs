use super::{ImportedRecord, InvalidReason, InvalidRecord, ValidationOutcome};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

/// Syntactic sieve only: one `@`, no whitespace, a dot in the domain.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// First failing check, in fixed precedence order.
pub fn check_record(record: &ImportedRecord) -> Option<InvalidReason> {
    let malformed = |v: &Option<String>| {
        v.as_deref()
            .is_some_and(|e| !e.is_empty() && !is_valid_email(e))
    };

    if record.first_name.is_empty() && record.last_name.is_empty() {
        Some(InvalidReason::MissingBothNames)
    } else if record.first_name.is_empty() {
        Some(InvalidReason::MissingFirstName)
    } else if record.last_name.is_empty() {
        Some(InvalidReason::MissingLastName)
    } else if malformed(&record.email) {
        Some(InvalidReason::InvalidEmail)
    } else if malformed(&record.parent_email) {
        Some(InvalidReason::InvalidParentEmail)
    } else {
        None
    }
}

pub fn validate(records: &[ImportedRecord]) -> ValidationOutcome {
    records
        .iter()
        .fold(ValidationOutcome::default(), |mut outcome, record| {
            match check_record(record) {
                None => outcome.valid.push(record.clone()),
                Some(reason) => outcome.invalid.push(InvalidRecord {
                    record: record.clone(),
                    reason,
                }),
            }
            outcome
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(first: &str, last: &str) -> ImportedRecord {
        ImportedRecord::new(first, last)
    }

    #[test]
    fn email_acceptance_table() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@school.k12.us"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn absent_or_empty_email_is_not_checked() {
        let mut r = record("Ada", "Lovelace");
        assert_eq!(check_record(&r), None);
        r.email = Some(String::new());
        assert_eq!(check_record(&r), None);
    }

    #[test]
    fn reasons_follow_precedence() {
        let mut both = record("", "");
        both.email = Some("bad".into());
        assert_eq!(check_record(&both), Some(InvalidReason::MissingBothNames));

        let mut first = record("", "Lovelace");
        first.email = Some("bad".into());
        assert_eq!(check_record(&first), Some(InvalidReason::MissingFirstName));

        assert_eq!(
            check_record(&record("Ada", "")),
            Some(InvalidReason::MissingLastName)
        );

        let mut emails = record("Ada", "Lovelace");
        emails.email = Some("a@b".into());
        emails.parent_email = Some("also bad".into());
        assert_eq!(check_record(&emails), Some(InvalidReason::InvalidEmail));

        emails.email = Some("a@b.co".into());
        assert_eq!(check_record(&emails), Some(InvalidReason::InvalidParentEmail));
    }

    #[test]
    fn partition_loses_nothing() {
        let input = vec![
            record("Ada", "Lovelace"),
            record("", "Turing"),
            record("Grace", "Hopper"),
            record("Alan", ""),
        ];
        let outcome = validate(&input);
        assert_eq!(outcome.total(), input.len());
        assert_eq!(outcome.valid.len(), 2);
        assert_eq!(outcome.invalid.len(), 2);
        assert_eq!(outcome, validate(&input));
    }

    #[test]
    fn reason_messages_are_stable() {
        assert_eq!(
            InvalidReason::MissingBothNames.to_string(),
            "missing both first and last name"
        );
        assert_eq!(
            InvalidReason::InvalidParentEmail.to_string(),
            "invalid parent email format"
        );
        assert_eq!(InvalidReason::InvalidEmail.code(), "invalid_email");
    }
}
