//! CNJ case number normalisation.
//!
//! The canonical CNJ layout is `NNNNNNN-DD.AAAA.J.TR.OOOO` (20 digits):
//! sequence, check digits, filing year, judicial segment, court, origin unit.
//! Spreadsheets often carry the bare 20-digit form; those are reformatted so
//! that lookups match the API's `numero_cnj`.

use std::collections::HashSet;

/// Format a bare 20-digit CNJ number. Anything else is returned trimmed but unchanged.
pub fn format_cnj(numero: &str) -> String {
    let n = numero.trim();
    if n.len() != 20 || !n.bytes().all(|b| b.is_ascii_digit()) {
        return n.to_string();
    }
    format!(
        "{}-{}.{}.{}.{}.{}",
        &n[..7],
        &n[7..9],
        &n[9..13],
        &n[13..14],
        &n[14..16],
        &n[16..]
    )
}

/// Trim, format, drop empties, and deduplicate keeping the first occurrence.
pub fn normalize_numbers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|s| format_cnj(s.as_ref()))
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bare_twenty_digits() {
        assert_eq!(
            format_cnj("00012345620208260053"),
            "0001234-56.2020.8.26.0053"
        );
    }

    #[test]
    fn leaves_other_values_alone() {
        assert_eq!(
            format_cnj("0001234-56.2020.8.26.0053"),
            "0001234-56.2020.8.26.0053"
        );
        assert_eq!(format_cnj("  123  "), "123");
        assert_eq!(format_cnj("0001234562020826005X"), "0001234562020826005X");
    }

    #[test]
    fn normalize_dedupes_after_formatting() {
        let numbers = normalize_numbers([
            " 00012345620208260053",
            "0001234-56.2020.8.26.0053",
            "",
            "   ",
            "0009999-11.2019.4.03.6100",
        ]);
        assert_eq!(
            numbers,
            vec![
                "0001234-56.2020.8.26.0053".to_string(),
                "0009999-11.2019.4.03.6100".to_string(),
            ]
        );
    }
}
