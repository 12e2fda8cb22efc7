/// Normalize a Brazilian-formatted number (`"1.234,56"`, `"R$ 3,49"`, `"2"`) to a plain decimal string
/// (`"1234.56"`, `"3.49"`, `"2"`).
///
/// Returns `None` if the text does not contain a number in that format.
pub fn normalize_amount(text: &str) -> Option<String> {
    let text = text.trim().trim_start_matches("R$").trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };

    let (integer, fraction) = match text.split_once(',') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (text, None),
    };

    // Thousands separators must group exactly three digits.
    let mut groups = integer.split('.');
    let first = groups.next()?;
    if first.is_empty() || (first.len() > 3 && integer.contains('.')) || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut digits = first.to_string();
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
    }

    let mut result = String::with_capacity(digits.len() + 4);
    if negative {
        result.push('-');
    }
    result.push_str(&digits);

    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        result.push('.');
        result.push_str(fraction);
    }

    Some(result)
}
