//! Phone canonicalization.
//!
//! Accounts are keyed by the digits-only form of their phone number, but
//! historical rows were stored in a human-readable `+7 (XXX) XXX-XX-XX`
//! format. Every lookup therefore considers both forms; see
//! `auth::service` for the self-healing merge that repairs old rows.

/// Strips every non-digit character. Idempotent.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Renders the canonical 11-digit form back into the legacy stored format:
/// `79123456789` -> `+7 (912) 345-67-89`.
///
/// Returns `None` when the number does not have the 11 digits the legacy
/// format assumed; such rows never existed in the formatted style.
pub fn legacy_format(canonical: &str) -> Option<String> {
    if canonical.len() != 11 || !canonical.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!(
        "+7 ({}) {}-{}-{}",
        &canonical[1..4],
        &canonical[4..7],
        &canonical[7..9],
        &canonical[9..11]
    ))
}

/// Both spellings a phone may be stored under, canonical first.
pub fn lookup_forms(canonical: &str) -> Vec<String> {
    let mut forms = vec![canonical.to_string()];
    if let Some(legacy) = legacy_format(canonical) {
        forms.push(legacy);
    }
    forms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_everything_but_digits() {
        assert_eq!(normalize_phone("+7 (912) 345-67-89"), "79123456789");
        assert_eq!(normalize_phone("8-900-123-45-67"), "89001234567");
        assert_eq!(normalize_phone("phone: none"), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["+7 (912) 345-67-89", "79123456789", "", "abc123"] {
            let once = normalize_phone(raw);
            assert_eq!(normalize_phone(&once), once);
        }
    }

    #[test]
    fn legacy_format_round_trips_through_normalize() {
        let legacy = legacy_format("79123456789").unwrap();
        assert_eq!(legacy, "+7 (912) 345-67-89");
        assert_eq!(normalize_phone(&legacy), "79123456789");
    }

    #[test]
    fn legacy_format_rejects_short_numbers() {
        assert_eq!(legacy_format("12345"), None);
        assert_eq!(legacy_format(""), None);
        assert_eq!(legacy_format("791234567890"), None);
    }

    #[test]
    fn lookup_forms_cover_both_spellings() {
        let forms = lookup_forms("79123456789");
        assert_eq!(forms, vec!["79123456789", "+7 (912) 345-67-89"]);
        // No legacy variant for non-11-digit numbers.
        assert_eq!(lookup_forms("12345"), vec!["12345"]);
    }
}
