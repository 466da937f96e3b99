use super::RawRow;
use csv::{ReaderBuilder, StringRecord, Trim};

/// Column order assumed when a file has no header row.
const POSITIONAL_HEADERS: [&str; 4] = ["student_id", "first_name", "last_name", "email"];

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const DELIMITER_SAMPLE_LINES: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("input contains no rows")]
    Empty,
    #[error("failed to parse delimited text near line {line}: {source}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// `None` sniffs the delimiter from the first lines.
    pub delimiter: Option<u8>,
    pub has_headers: bool,
    pub trim: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            has_headers: true,
            trim: true,
        }
    }
}

impl ReadOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

pub fn read_rows(text: &str, opts: &ReadOptions) -> Result<Vec<RawRow>, ReadError> {
    read_table(text, opts).map(|t| t.rows)
}

pub fn headers(text: &str, opts: &ReadOptions) -> Result<Vec<String>, ReadError> {
    read_table(text, opts).map(|t| t.headers)
}

pub fn read_table(text: &str, opts: &ReadOptions) -> Result<Table, ReadError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let delimiter = opts.delimiter.unwrap_or_else(|| detect_delimiter(text));

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(if opts.trim { Trim::All } else { Trim::None })
        .from_reader(text.as_bytes());

    let mut records: Vec<StringRecord> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ReadError::Csv {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            source: e,
        })?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        records.push(record);
    }
    if records.is_empty() {
        return Err(ReadError::Empty);
    }

    let (headers, body) = if opts.has_headers {
        let first = records.remove(0);
        (first.iter().map(str::to_string).collect::<Vec<_>>(), records)
    } else {
        let width = records.iter().map(StringRecord::len).max().unwrap_or(0);
        ((0..width).map(positional_header).collect(), records)
    };

    let rows = body
        .iter()
        .map(|record| {
            let mut row = RawRow::new();
            for (i, value) in record.iter().enumerate() {
                let header = headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| overflow_header(i));
                row.push(header, value);
            }
            row
        })
        .collect();

    Ok(Table { headers, rows })
}

fn positional_header(i: usize) -> String {
    POSITIONAL_HEADERS
        .get(i)
        .map(|h| h.to_string())
        .unwrap_or_else(|| overflow_header(i))
}

fn overflow_header(i: usize) -> String {
    format!("column_{}", i + 1)
}

/// Pick the candidate delimiter that appears most often and most consistently
/// across the first lines. Falls back to comma.
pub fn detect_delimiter(text: &str) -> u8 {
    let sample: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(DELIMITER_SAMPLE_LINES)
        .collect();
    if sample.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0.0f64;
    for &candidate in &DELIMITER_CANDIDATES {
        let counts: Vec<f64> = sample
            .iter()
            .map(|line| line.bytes().filter(|b| *b == candidate).count() as f64)
            .collect();
        let avg = counts.iter().sum::<f64>() / counts.len() as f64;
        let variance =
            counts.iter().map(|c| (c - avg).powi(2)).sum::<f64>() / counts.len() as f64;
        let score = avg / (1.0 + variance.sqrt());
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }
    best
}
