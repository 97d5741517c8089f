/// Outcome of categorizing a transport-layer error string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceCategory {
    Hard,
    Soft,
}

const HARD_TRIGGERS: &[&str] = &[
    "user unknown",
    "no such user",
    "invalid recipient",
    "recipient address rejected",
    "user not found",
    "domain not found",
    "no mx record",
    "domain does not exist",
];

const SOFT_TRIGGERS: &[&str] = &[
    "mailbox full",
    "quota exceeded",
    "insufficient storage",
    "temporarily deferred",
    "try again later",
    "temporary failure",
    "rate limit",
    "too many emails",
    "sending quota",
];

/// Categorizes a raw SMTP transport error using case-insensitive substring
/// matching. Unmatched errors default to soft, per the error taxonomy: an
/// error we don't recognize should not permanently fail a send.
pub fn categorize(error_message: &str) -> BounceCategory {
    let lower = error_message.to_lowercase();

    if HARD_TRIGGERS.iter().any(|t| lower.contains(t)) {
        return BounceCategory::Hard;
    }
    if SOFT_TRIGGERS.iter().any(|t| lower.contains(t)) {
        return BounceCategory::Soft;
    }
    BounceCategory::Soft
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_known_hard_triggers() {
        assert_eq!(categorize("550 user unknown"), BounceCategory::Hard);
        assert_eq!(categorize("RCPT TO failed: No Such User here"), BounceCategory::Hard);
        assert_eq!(categorize("Domain Does Not Exist"), BounceCategory::Hard);
    }

    #[test]
    fn categorizes_known_soft_triggers() {
        assert_eq!(categorize("452 mailbox full"), BounceCategory::Soft);
        assert_eq!(categorize("421 try again later"), BounceCategory::Soft);
        assert_eq!(categorize("rate limit exceeded, slow down"), BounceCategory::Soft);
    }

    #[test]
    fn defaults_unknown_errors_to_soft() {
        assert_eq!(categorize("connection reset by peer"), BounceCategory::Soft);
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(categorize("USER UNKNOWN"), BounceCategory::Hard);
    }
}
