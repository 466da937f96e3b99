use chrono::NaiveDate;
use csv::Writer;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer flush failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv output was not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub student_no: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeEntry {
    pub student_no: Option<String>,
    pub last_name: String,
    pub first_name: String,
    pub score: f64,
    pub status: String,
    pub graded_on: Option<NaiveDate>,
}

pub fn roster_csv(entries: &[RosterEntry]) -> Result<String, ExportError> {
    let mut sorted: Vec<&RosterEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        a.last_name
            .to_lowercase()
            .cmp(&b.last_name.to_lowercase())
            .then_with(|| a.first_name.to_lowercase().cmp(&b.first_name.to_lowercase()))
    });

    let mut w = Writer::from_writer(Vec::new());
    w.write_record(["student_id", "first_name", "last_name", "email"])?;
    for e in sorted {
        w.write_record([
            e.student_no.as_deref().unwrap_or(""),
            e.first_name.as_str(),
            e.last_name.as_str(),
            e.email.as_deref().unwrap_or(""),
        ])?;
    }
    finish(w)
}

pub fn grades_csv(entries: &[GradeEntry], total_points: f64) -> Result<String, ExportError> {
    let mut w = Writer::from_writer(Vec::new());
    w.write_record([
        "Student ID",
        "Last Name",
        "First Name",
        "Score",
        "Percentage",
        "Status",
        "Graded Date",
    ])?;
    for e in entries {
        let percentage = if total_points > 0.0 {
            format!("{:.1}%", e.score / total_points * 100.0)
        } else {
            String::new()
        };
        let graded = e
            .graded_on
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        w.write_record([
            e.student_no.as_deref().unwrap_or(""),
            e.last_name.as_str(),
            e.first_name.as_str(),
            format_points(e.score).as_str(),
            percentage.as_str(),
            e.status.as_str(),
            graded.as_str(),
        ])?;
    }
    finish(w)
}

/// `Math 8B` + `roster` => `Math_8B_roster.csv`
pub fn export_file_name(title: &str, suffix: &str) -> String {
    let safe: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{safe}_{suffix}.csv")
}

fn format_points(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        v.to_string()
    }
}

fn finish(w: Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = w.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
