/// One-decimal rounding used for displayed percentages:
/// `floor(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn format_percent(percent: f64) -> String {
    format!("{percent:.1}%")
}

const LETTER_CUTOFFS: [(f64, &str); 11] = [
    (93.0, "A"),
    (90.0, "A-"),
    (87.0, "B+"),
    (83.0, "B"),
    (80.0, "B-"),
    (77.0, "C+"),
    (73.0, "C"),
    (70.0, "C-"),
    (67.0, "D+"),
    (63.0, "D"),
    (60.0, "D-"),
];

pub fn letter_grade(percent: f64) -> &'static str {
    LETTER_CUTOFFS
        .iter()
        .find(|(cutoff, _)| percent >= *cutoff)
        .map(|(_, letter)| *letter)
        .unwrap_or("F")
}
