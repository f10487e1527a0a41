//! PII redaction for error messages and log lines.
//!
//! Every piece of free text derived from user-supplied or extracted content
//! must pass through [`PiiRedactor::redact`] before it reaches a log sink or
//! an outbound event payload.

use regex::Regex;

const REDACTED_EMAIL: &str = "[EMAIL_REDACTED]";
const REDACTED_PHONE: &str = "[PHONE_REDACTED]";
const REDACTED_CARD: &str = "[CARD_REDACTED]";

/// Replaces email-like, card-like and phone-like substrings with fixed
/// placeholder tokens. Pure text transformation, no I/O.
///
/// There is no dedicated national-ID pattern. Long digit runs (8+ digits,
/// e.g. a 12-digit VN CCCD) are still caught by the phone pattern; shorter
/// numeric tokens pass through untouched.
pub struct PiiRedactor {
    email: Regex,
    phone: Regex,
    card: Regex,
}

impl PiiRedactor {
    pub fn new() -> Self {
        // Hard-coded patterns, compilation cannot fail.
        Self {
            email: Regex::new(r"(?i)[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
                .expect("email pattern compiles"),
            phone: Regex::new(r"(\+?\d{1,3}[-.]?)?\(?\d{2,4}\)?[-.]?\d{3,4}[-.]?\d{3,4}")
                .expect("phone pattern compiles"),
            card: Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").expect("card pattern compiles"),
        }
    }

    /// Redacts all supported PII classes.
    ///
    /// Cards are redacted before phones: the looser phone pattern would
    /// otherwise consume part of a card number and leave the remainder
    /// exposed. The placeholders contain no digits or '@', so the function
    /// is idempotent.
    pub fn redact(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let result = self.email.replace_all(text, REDACTED_EMAIL);
        let result = self.card.replace_all(&result, REDACTED_CARD);
        let result = self.phone.replace_all(&result, REDACTED_PHONE);
        result.into_owned()
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_email() {
        let r = PiiRedactor::new();
        assert_eq!(
            r.redact("contact john.doe@example.com for details"),
            "contact [EMAIL_REDACTED] for details"
        );
    }

    #[test]
    fn test_redacts_phone() {
        let r = PiiRedactor::new();
        let out = r.redact("call +84-123-456-789 now");
        assert!(out.contains("[PHONE_REDACTED]"), "got: {}", out);
        assert!(!out.contains("123"));
    }

    #[test]
    fn test_redacts_credit_card() {
        let r = PiiRedactor::new();
        let out = r.redact("card 4111-1111-1111-1111 declined");
        assert!(out.contains("[CARD_REDACTED]"), "got: {}", out);
        assert!(!out.contains("4111"));
    }

    #[test]
    fn test_redacts_card_with_spaces() {
        let r = PiiRedactor::new();
        let out = r.redact("4111 1111 1111 1111");
        assert!(out.contains("[CARD_REDACTED]"), "got: {}", out);
    }

    #[test]
    fn test_leaves_plain_text_unchanged() {
        let r = PiiRedactor::new();
        assert_eq!(
            r.redact("failed to load PDF: invalid xref table"),
            "failed to load PDF: invalid xref table"
        );
    }

    #[test]
    fn test_empty_input() {
        let r = PiiRedactor::new();
        assert_eq!(r.redact(""), "");
    }

    #[test]
    fn test_idempotent() {
        let r = PiiRedactor::new();
        let inputs = [
            "mail a@b.com, phone 0123-456-789, card 4111-1111-1111-1111",
            "nothing sensitive here",
            "",
            "a@b.co and c@d.org",
        ];
        for input in inputs {
            let once = r.redact(input);
            let twice = r.redact(&once);
            assert_eq!(once, twice, "not idempotent for: {}", input);
        }
    }

    #[test]
    fn test_long_digit_runs_fall_under_phone_pattern() {
        // A 12-digit national-ID-like run is indistinguishable from a phone
        // number and gets the phone placeholder.
        let r = PiiRedactor::new();
        let out = r.redact("reference 079123456789 in section 2");
        assert!(out.contains("[PHONE_REDACTED]"), "got: {}", out);
        assert!(!out.contains("079123456789"));
    }

    #[test]
    fn test_short_numeric_tokens_pass_through() {
        let r = PiiRedactor::new();
        assert_eq!(r.redact("code 42"), "code 42");
        // Seven contiguous digits are below the phone pattern's minimum.
        assert_eq!(r.redact("ticket 1234567"), "ticket 1234567");
    }
}
