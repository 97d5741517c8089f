//! Pure transformation over already-tokenized recipient rows (§11
//! "Recipient ingestion parsing"). The *file* decoding (xlsx/csv) stays
//! with the external importer collaborator; everything downstream of
//! "I already have a `Vec<Vec<String>>`" lives here so `CreateCampaign`
//! has a real, testable path instead of assuming pre-validated input.

use crate::store::NewRecipient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Email,
    FirstName,
    LastName,
    Company,
    Other,
}

/// Normalizes a header cell for synonym matching: lowercased, with
/// whitespace, dashes and underscores stripped, per §6's "case-insensitive
/// with whitespace/dash/underscore normalization" rule.
fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect::<String>()
        .to_lowercase()
}

fn classify(normalized: &str) -> Field {
    const EMAIL: &[&str] = &["email", "emailaddress", "mail"];
    const FIRST: &[&str] = &["firstname", "fname", "givenname", "name"];
    const LAST: &[&str] = &["lastname", "lname", "surname", "familyname"];
    const COMPANY: &[&str] = &["company", "organization", "org", "business", "employer"];

    if EMAIL.contains(&normalized) {
        Field::Email
    } else if FIRST.contains(&normalized) {
        Field::FirstName
    } else if LAST.contains(&normalized) {
        Field::LastName
    } else if COMPANY.contains(&normalized) {
        Field::Company
    } else {
        Field::Other
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub total_rows: usize,
    pub accepted: usize,
    pub rejected_invalid_email: usize,
    pub duplicates_dropped: usize,
}

/// Column names matched case-insensitively against the §6 synonym sets.
/// Rows without a syntactically valid email are rejected; duplicate
/// emails (lowercased) are deduplicated, keeping the first occurrence. All
/// unmapped non-empty columns become entries in the recipient's opaque
/// variable map, keyed by their original (unnormalized) header text.
pub fn parse_rows(rows: &[Vec<String>]) -> (Vec<NewRecipient>, IngestSummary) {
    let mut summary = IngestSummary::default();

    let Some(header) = rows.first() else {
        return (Vec::new(), summary);
    };

    let columns: Vec<(Field, &str)> = header.iter().map(|cell| (classify(&normalize_header(cell)), cell.as_str())).collect();

    let mut out = Vec::new();
    let mut seen_emails = std::collections::HashSet::new();

    for row in rows.iter().skip(1) {
        summary.total_rows += 1;

        let mut email = None;
        let mut first_name = None;
        let mut last_name = None;
        let mut variables = serde_json::Map::new();

        for (i, (field, original_header)) in columns.iter().enumerate() {
            let Some(value) = row.get(i) else { continue };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match field {
                Field::Email => email = Some(value.to_string()),
                Field::FirstName => first_name = Some(value.to_string()),
                Field::LastName => last_name = Some(value.to_string()),
                Field::Company => {
                    variables.insert("company".to_string(), serde_json::Value::String(value.to_string()));
                }
                Field::Other => {
                    variables.insert(original_header.to_string(), serde_json::Value::String(value.to_string()));
                }
            }
        }

        let Some(email) = email else {
            summary.rejected_invalid_email += 1;
            continue;
        };

        if !email_address::EmailAddress::is_valid(&email) {
            summary.rejected_invalid_email += 1;
            continue;
        }

        let normalized_email = email.to_lowercase();
        if !seen_emails.insert(normalized_email.clone()) {
            summary.duplicates_dropped += 1;
            continue;
        }

        summary.accepted += 1;
        out.push(NewRecipient {
            email: normalized_email,
            first_name,
            last_name,
            variables: serde_json::Value::Object(variables),
        });
    }

    (out, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(header: &[&str], data: &[&[&str]]) -> Vec<Vec<String>> {
        let mut rows = vec![header.iter().map(|s| s.to_string()).collect()];
        rows.extend(data.iter().map(|r| r.iter().map(|s| s.to_string()).collect()));
        rows
    }

    #[test]
    fn matches_synonym_headers_case_and_separator_insensitively() {
        let input = rows(
            &["E-Mail", "First Name", "Last_Name", "Organization"],
            &[&["a@x.com", "Ada", "Lovelace", "Acme"]],
        );
        let (parsed, summary) = parse_rows(&input);
        assert_eq!(summary.accepted, 1);
        assert_eq!(parsed[0].email, "a@x.com");
        assert_eq!(parsed[0].first_name.as_deref(), Some("Ada"));
        assert_eq!(parsed[0].variables["company"], "Acme");
    }

    #[test]
    fn rejects_rows_without_a_syntactically_valid_email() {
        let input = rows(&["email", "firstName"], &[&["not-an-email", "Ada"], &["", "Ben"]]);
        let (parsed, summary) = parse_rows(&input);
        assert!(parsed.is_empty());
        assert_eq!(summary.rejected_invalid_email, 2);
    }

    #[test]
    fn deduplicates_by_lowercased_email_keeping_first_occurrence() {
        let input = rows(
            &["email", "firstName"],
            &[&["a@x.com", "First"], &["A@X.COM", "Second"]],
        );
        let (parsed, summary) = parse_rows(&input);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].first_name.as_deref(), Some("First"));
        assert_eq!(summary.duplicates_dropped, 1);
    }

    #[test]
    fn unmapped_columns_become_opaque_variables() {
        let input = rows(&["email", "favoriteColor"], &[&["a@x.com", "blue"]]);
        let (parsed, _) = parse_rows(&input);
        assert_eq!(parsed[0].variables["favoriteColor"], "blue");
    }
}
