//! Utterance normalization
//!
//! Every knowledge-store key goes through [`normalize`] before it is stored or
//! looked up, so lookups are insensitive to case and surrounding whitespace.

/// Canonical lookup key for an utterance: trimmed and lower-cased.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// True when nothing but whitespace was entered
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Hello There \n"), "hello there");
        assert_eq!(normalize(" Hi "), normalize("hi"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["  MiXeD Case ", "ÉCOLE", "\tspaces  inside\t", ""] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank("   \t\n"));
        assert!(!is_blank(" a "));
    }
}
