//! TMX timestamps (`YYYYMMDDThhmmssZ`) are fixed-width and most-significant
//! first, so plain string comparison orders them chronologically.

/// Placeholder used for missing or malformed dates in reports.
pub const NO_DATE: &str = "-";

/// `true` when `candidate` is strictly later than `current` (or nothing is stored yet).
pub fn is_newer(candidate: &str, current: Option<&str>) -> bool {
    match current {
        None => true,
        Some(cur) => candidate > cur,
    }
}

/// Replace `slot` with `candidate` if the candidate is present and newer.
pub fn keep_latest(slot: &mut Option<String>, candidate: Option<&str>) {
    if let Some(c) = candidate {
        if is_newer(c, slot.as_deref()) {
            *slot = Some(c.to_string());
        }
    }
}

/// Day part (`YYYYMMDD`) of a timestamp.
pub fn day(ts: Option<&str>) -> Option<&str> {
    let ts = ts?;
    let end = ts.char_indices().nth(8).map(|(i, _)| i).unwrap_or(ts.len());
    Some(&ts[..end])
}

/// `YYYY.MM.DD` for display; [`NO_DATE`] when absent or shorter than 8 chars.
pub fn format_date(ts: Option<&str>) -> String {
    let Some(ts) = ts else {
        return NO_DATE.to_string();
    };
    if ts.len() < 8 || !ts.is_char_boundary(8) {
        return NO_DATE.to_string();
    }
    format!("{}.{}.{}", &ts[0..4], &ts[4..6], &ts[6..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_is_lexicographic() {
        assert!(is_newer("20240102T000000Z", Some("20240101T235959Z")));
        assert!(!is_newer("20240101T000000Z", Some("20240101T000000Z")));
        assert!(is_newer("20000101T000000Z", None));
    }

    #[test]
    fn keep_latest_only_moves_forward() {
        let mut slot = None;
        keep_latest(&mut slot, Some("20240105T100000Z"));
        keep_latest(&mut slot, Some("20240101T100000Z"));
        keep_latest(&mut slot, None);
        assert_eq!(slot.as_deref(), Some("20240105T100000Z"));
    }

    #[test]
    fn day_truncation() {
        assert_eq!(day(Some("20240101T100000Z")), Some("20240101"));
        assert_eq!(day(Some("2024")), Some("2024"));
        assert_eq!(day(None), None);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_date(Some("20250714T160952Z")), "2025.07.14");
        assert_eq!(format_date(Some("2025")), "-");
        assert_eq!(format_date(None), "-");
    }
}
