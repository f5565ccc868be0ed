//! Roll numbers of the form `<class code><section><NNN>`, e.g. `03A007`.

/// Attempts made with successive sequence numbers before giving up.
pub const MAX_ROLL_ATTEMPTS: i64 = 5;

/// Short code of a class: `JKG`/`SKG` for kindergarten, a two-digit number
/// for "1st" through "12th", `GEN` for anything else.
pub fn class_code(class_name: &str) -> String {
    if class_name.contains("Jr. KG") {
        return "JKG".to_string();
    }
    if class_name.contains("Sr. KG") {
        return "SKG".to_string();
    }

    class_name
        .split_whitespace()
        .find_map(ordinal)
        .map(|n| format!("{n:02}"))
        .unwrap_or_else(|| "GEN".to_string())
}

/// Parses "1st", "2nd", "3rd", "4th" ... "12th".
fn ordinal(word: &str) -> Option<u32> {
    let digits_end = word.find(|c: char| !c.is_ascii_digit())?;
    let (digits, suffix) = word.split_at(digits_end);
    let n: u32 = digits.parse().ok()?;

    let expected = match (n % 100, n % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    };

    (suffix.eq_ignore_ascii_case(expected) && (1..=12).contains(&n)).then_some(n)
}

pub fn roll_number(class_name: &str, section: &str, sequence: i64) -> String {
    format!("{}{}{:03}", class_code(class_name), section, sequence)
}
