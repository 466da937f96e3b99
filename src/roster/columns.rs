use super::ColumnMapping;
use once_cell::sync::Lazy;
use regex::Regex;

/// Singular student fields a header can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    FirstName,
    LastName,
    StudentId,
    ParentEmail,
    Email,
}

impl Role {
    /// Binding priority. Parent email is tried before email so that
    /// "contact email" never lands in the student's own address.
    pub const ALL: [Role; 5] = [
        Role::FirstName,
        Role::LastName,
        Role::StudentId,
        Role::ParentEmail,
        Role::Email,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::FirstName => "firstName",
            Role::LastName => "lastName",
            Role::StudentId => "studentId",
            Role::ParentEmail => "parentEmail",
            Role::Email => "email",
        }
    }
}

static ROLE_PATTERNS: Lazy<Vec<(Role, Regex)>> = Lazy::new(|| {
    vec![
        (
            Role::FirstName,
            role_regex(r"first[_\s]?name|fname|given[_\s]?name|student[_\s]?first"),
        ),
        (
            Role::LastName,
            role_regex(r"last[_\s]?name|lname|surname|family[_\s]?name|student[_\s]?last"),
        ),
        (
            Role::StudentId,
            role_regex(r"student[_\s]?id|id|student[_\s]?number|sid"),
        ),
        (
            Role::ParentEmail,
            role_regex(r"parent[_\s]?email|guardian[_\s]?email|contact[_\s]?email"),
        ),
        (Role::Email, role_regex(r"email|student[_\s]?email|e-?mail")),
    ]
});

static GRADE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(grade|score|mark|assignment|test|quiz|exam)").expect("grade pattern")
});

fn role_regex(alternatives: &str) -> Regex {
    Regex::new(&format!("(?i)^({alternatives})$")).expect("role pattern")
}

pub fn matches_role(role: Role, header: &str) -> bool {
    ROLE_PATTERNS
        .iter()
        .find(|(r, _)| *r == role)
        .is_some_and(|(_, re)| re.is_match(header.trim()))
}

pub fn looks_like_grade_column(header: &str) -> bool {
    GRADE_PATTERN.is_match(header.trim())
}

/// Resolve semantic roles from a header row.
///
/// Each header is offered to the roles in priority order and binds to the
/// first one that matches and is still free; later duplicates fall through
/// to lower roles or stay unmapped. Headers not bound to a singular role are
/// then collected as grade columns when they look like assessments.
pub fn detect_columns(headers: &[String]) -> ColumnMapping {
    let bound = headers.iter().fold(ColumnMapping::default(), |mapping, header| {
        let free_role = ROLE_PATTERNS.iter().find(|(role, re)| {
            mapping.header_for(*role).is_none() && re.is_match(header.trim())
        });
        match free_role {
            Some((role, _)) => mapping.with(*role, header.clone()),
            None => mapping,
        }
    });

    let grade_columns = headers
        .iter()
        .filter(|h| looks_like_grade_column(h))
        .filter(|h| !Role::ALL.iter().any(|r| bound.header_for(*r) == Some(h.as_str())))
        .cloned()
        .collect();

    ColumnMapping {
        grade_columns,
        ..bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn binds_common_spellings() {
        let m = detect_columns(&headers(&[
            "Given Name",
            "SURNAME",
            "Student_Number",
            "E-mail",
            "Guardian Email",
        ]));
        assert_eq!(m.first_name.as_deref(), Some("Given Name"));
        assert_eq!(m.last_name.as_deref(), Some("SURNAME"));
        assert_eq!(m.student_id.as_deref(), Some("Student_Number"));
        assert_eq!(m.email.as_deref(), Some("E-mail"));
        assert_eq!(m.parent_email.as_deref(), Some("Guardian Email"));
        assert!(m.grade_columns.is_empty());
    }

    #[test]
    fn first_matching_header_wins() {
        let m = detect_columns(&headers(&["fname", "first_name", "lname"]));
        assert_eq!(m.first_name.as_deref(), Some("fname"));
        assert_eq!(m.last_name.as_deref(), Some("lname"));
        assert!(!m.is_mapped("first_name"));
    }

    #[test]
    fn surrounding_whitespace_is_ignored_but_header_kept_verbatim() {
        let m = detect_columns(&headers(&["  First Name ", "Last_Name"]));
        assert_eq!(m.first_name.as_deref(), Some("  First Name "));
    }

    #[test]
    fn parent_email_takes_priority_over_email() {
        let m = detect_columns(&headers(&["contact email", "email"]));
        assert_eq!(m.parent_email.as_deref(), Some("contact email"));
        assert_eq!(m.email.as_deref(), Some("email"));
    }

    #[test]
    fn grade_columns_collect_every_assessment_header() {
        let m = detect_columns(&headers(&[
            "first",
            "Quiz 1",
            "test_2",
            "Exam",
            "Grade Level",
            "notes",
        ]));
        assert_eq!(m.first_name, None);
        assert_eq!(m.grade_columns, headers(&["Quiz 1", "test_2", "Exam", "Grade Level"]));
    }

    #[test]
    fn singular_binding_excludes_grade_column() {
        let m = detect_columns(&headers(&["id", "score"]));
        assert_eq!(m.student_id.as_deref(), Some("id"));
        assert_eq!(m.grade_columns, headers(&["score"]));
    }

    #[test]
    fn no_match_is_not_an_error() {
        let m = detect_columns(&headers(&["alpha", "beta"]));
        assert_eq!(m, ColumnMapping::default());
    }

    #[test]
    fn role_helpers_agree_with_detection() {
        assert!(matches_role(Role::FirstName, " student first "));
        assert!(matches_role(Role::StudentId, "SID"));
        assert!(!matches_role(Role::Email, "email address"));
        assert!(looks_like_grade_column("Marks (Term 1)"));
        assert!(!looks_like_grade_column("midterm"));
    }
}
