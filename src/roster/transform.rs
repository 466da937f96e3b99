use super::{ColumnMapping, ImportedRecord, RawRow, Role};
use std::collections::{BTreeMap, HashMap};

/// Apply `mapping` to each row. Rows with neither name are dropped.
pub fn transform(rows: &[RawRow], mapping: &ColumnMapping) -> Vec<ImportedRecord> {
    rows.iter()
        .map(|row| transform_row(row, mapping))
        .filter(|r| !(r.first_name.is_empty() && r.last_name.is_empty()))
        .collect()
}

fn transform_row(row: &RawRow, mapping: &ColumnMapping) -> ImportedRecord {
    let field = |role: Role| -> Option<String> {
        mapping
            .header_for(role)
            .and_then(|h| row.get(h))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    // The first cell under a role header feeds the role; repeats of any
    // header land under a numbered key (`notes`, `notes_2`, ...).
    let mut grades = BTreeMap::new();
    let mut extra = BTreeMap::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (header, value) in row.iter() {
        let occurrence = *seen.entry(header).and_modify(|n| *n += 1).or_insert(1);
        if occurrence == 1 && mapping.role_of(header).is_some() {
            continue;
        }
        if mapping.grade_columns.iter().any(|g| g == header) {
            if !value.is_empty() {
                insert_numbered(&mut grades, header, occurrence, value);
            }
        } else {
            insert_numbered(&mut extra, header, occurrence, value);
        }
    }

    ImportedRecord {
        first_name: field(Role::FirstName).unwrap_or_default(),
        last_name: field(Role::LastName).unwrap_or_default(),
        student_id: field(Role::StudentId),
        email: field(Role::Email),
        parent_email: field(Role::ParentEmail),
        grades: (!mapping.grade_columns.is_empty()).then_some(grades),
        extra,
    }
}

fn insert_numbered(
    map: &mut BTreeMap<String, String>,
    header: &str,
    occurrence: usize,
    value: &str,
) {
    let mut n = occurrence;
    let mut key = header.to_string();
    if n > 1 {
        key = format!("{}_{}", header, n);
    }
    while map.contains_key(&key) {
        n += 1;
        key = format!("{}_{}", header, n);
    }
    map.insert(key, value.to_string());
}
