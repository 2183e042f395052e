//! Token estimation utilities.
//!
//! Uses a byte-based heuristic: ~4 bytes per token. This approximation is
//! accurate within ~10% for BPE tokenizers on English text and keeps budget
//! decisions deterministic and cheap. It is not a tokenizer.

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Largest byte budget whose estimate stays within `tokens`.
pub fn max_bytes_for(tokens: usize) -> usize {
    tokens.saturating_mul(4)
}

/// Longest prefix of `text` that is at most `max_bytes` long and ends on a
/// char boundary.
pub fn prefix_within(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn counts_bytes_not_chars() {
        // 'é' is two bytes in UTF-8.
        assert_eq!(estimate_tokens("éé"), 1);
        assert_eq!(estimate_tokens("ééé"), 2);
    }

    #[test]
    fn prefix_never_splits_a_char() {
        let text = "aé";
        assert_eq!(prefix_within(text, 2), "a");
        assert_eq!(prefix_within(text, 3), "aé");
        assert_eq!(prefix_within(text, 0), "");
    }

    #[test]
    fn prefix_fits_its_token_budget() {
        let text = "word ".repeat(50);
        let cut = prefix_within(&text, max_bytes_for(10));
        assert!(estimate_tokens(cut) <= 10);
    }
}
