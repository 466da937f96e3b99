use super::InvalidRecord;

/// How many rejected rows the summary spells out.
pub const SUMMARY_ERROR_LIMIT: usize = 5;

pub fn import_summary(
    total: usize,
    successful: usize,
    failed: usize,
    errors: &[InvalidRecord],
) -> String {
    let mut lines = vec![
        "Import Summary:".to_string(),
        format!("- Total rows: {total}"),
        format!("- Successfully imported: {successful}"),
        format!("- Failed: {failed}"),
    ];

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for e in errors.iter().take(SUMMARY_ERROR_LIMIT) {
            lines.push(format!(
                "- {} {}: {}",
                e.record.first_name, e.record.last_name, e.reason
            ));
        }
        if errors.len() > SUMMARY_ERROR_LIMIT {
            lines.push(format!(
                "... and {} more errors",
                errors.len() - SUMMARY_ERROR_LIMIT
            ));
        }
    }

    lines.join("\n")
}
