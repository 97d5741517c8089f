use std::sync::OnceLock;

use entity::{campaign_recipient, template};
use regex::Regex;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").unwrap())
}

/// The `{{identifier}}` tokens referenced by `subject` and `body`, as a
/// deduplicated, order-preserving list. Used by `CreateTemplate` to
/// recompute `Template.variables`, which is advisory and never trusted by
/// the renderer itself.
pub fn extract_variables(subject: &str, body: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for text in [subject, body] {
        for caps in token_re().captures_iter(text) {
            let name = caps[1].to_string();
            if seen.insert(name.clone()) {
                out.push(name);
            }
        }
    }
    out
}

/// Pure, deterministic template renderer. Given a `Template` and a
/// `CampaignRecipient`, produces the rendered `(subject, htmlBody)` pair
/// that the Sender ships to the transport. No I/O, safe to call
/// concurrently from any number of sender workers.
pub struct Renderer<'a> {
    unsubscribe_host: &'a str,
}

pub struct Rendered {
    pub subject: String,
    pub html_body: String,
}

impl<'a> Renderer<'a> {
    pub fn new(unsubscribe_host: &'a str) -> Self {
        Self { unsubscribe_host }
    }

    pub fn render(&self, tpl: &template::Model, recipient: &campaign_recipient::Model) -> Rendered {
        let unsubscribe_url = self.unsubscribe_url(&recipient.email);

        let subject = self.substitute(&tpl.subject, recipient, &unsubscribe_url);
        let body = self.substitute(&tpl.body, recipient, &unsubscribe_url);
        let body = Self::replace_unsubscribe_marker(&body, &unsubscribe_url);
        let html_body = Self::ensure_html_shell(&body, &unsubscribe_url);

        Rendered { subject, html_body }
    }

    fn unsubscribe_url(&self, email: &str) -> String {
        format!(
            "https://{}/unsubscribe?email={}",
            self.unsubscribe_host,
            urlencoding::encode(email)
        )
    }

    fn substitute(&self, input: &str, recipient: &campaign_recipient::Model, unsubscribe_url: &str) -> String {
        token_re()
            .replace_all(input, |caps: &regex::Captures| {
                let key = &caps[1];
                self.resolve(key, recipient, unsubscribe_url)
            })
            .into_owned()
    }

    fn resolve(&self, key: &str, recipient: &campaign_recipient::Model, unsubscribe_url: &str) -> String {
        if let Some(value) = recipient.variables.get(key).and_then(|v| v.as_str()) {
            return value.to_string();
        }

        match key {
            "email" => recipient.email.clone(),
            "firstName" => recipient.first_name.clone().unwrap_or_default(),
            "lastName" => recipient.last_name.clone().unwrap_or_default(),
            "fullName" => {
                let first = recipient.first_name.clone().unwrap_or_default();
                let last = recipient.last_name.clone().unwrap_or_default();
                format!("{first} {last}").trim().to_string()
            }
            "unsubscribe_url" => unsubscribe_url.to_string(),
            _ => String::new(),
        }
    }

    fn replace_unsubscribe_marker(body: &str, unsubscribe_url: &str) -> String {
        body.replace(
            "[UNSUBSCRIBE]",
            &format!(r#"<a href="{unsubscribe_url}">Unsubscribe</a>"#),
        )
    }

    fn ensure_html_shell(body: &str, unsubscribe_url: &str) -> String {
        if body.to_lowercase().contains("<html") {
            return body.to_string();
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body>
<div style="max-width:600px;margin:0 auto;font-family:sans-serif;">
{body}
</div>
<footer style="font-size:12px;color:#888;text-align:center;margin-top:24px;">
<a href="{unsubscribe_url}">Unsubscribe</a>
</footer>
</body>
</html>"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use entity::enums::RecipientStatus;

    fn recipient(email: &str, first: &str, last: &str, vars: serde_json::Value) -> campaign_recipient::Model {
        campaign_recipient::Model {
            id: 1,
            created_at: Utc::now(),
            campaign_id: 1,
            email: email.into(),
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            variables: vars,
            status: RecipientStatus::Pending,
            sent_at: None,
            failed_reason: None,
            smtp_account_id: None,
        }
    }

    fn tpl(subject: &str, body: &str) -> template::Model {
        template::Model {
            id: 1,
            created_at: Utc::now(),
            user_id: 1,
            name: "t".into(),
            subject: subject.into(),
            body: body.into(),
            variables: vec![],
            active: true,
        }
    }

    #[test]
    fn substitutes_builtins_and_custom_vars() {
        let r = Renderer::new("app.example.com");
        let rcpt = recipient("a@x.com", "Ada", "Lovelace", serde_json::json!({"company": "X"}));
        let t = tpl("Hi {{firstName}}", "Hello {{firstName}} at {{company}}");
        let out = r.render(&t, &rcpt);
        assert_eq!(out.subject, "Hi Ada");
        assert!(out.html_body.contains("Hello Ada at X"));
    }

    #[test]
    fn unresolved_tokens_become_empty() {
        let r = Renderer::new("app.example.com");
        let rcpt = recipient("a@x.com", "Ada", "Lovelace", serde_json::json!({}));
        let t = tpl("Hi {{nope}}", "body");
        let out = r.render(&t, &rcpt);
        assert_eq!(out.subject, "Hi ");
    }

    #[test]
    fn marker_becomes_unsubscribe_anchor() {
        let r = Renderer::new("app.example.com");
        let rcpt = recipient("a@x.com", "Ada", "Lovelace", serde_json::json!({}));
        let t = tpl("s", "body [UNSUBSCRIBE] tail");
        let out = r.render(&t, &rcpt);
        assert!(out.html_body.contains("Unsubscribe</a>"));
        assert!(out.html_body.contains("email=a%40x.com"));
    }

    #[test]
    fn wraps_bare_body_in_shell_but_not_full_documents() {
        let r = Renderer::new("app.example.com");
        let rcpt = recipient("a@x.com", "Ada", "Lovelace", serde_json::json!({}));

        let bare = r.render(&tpl("s", "hello"), &rcpt);
        assert!(bare.html_body.starts_with("<!DOCTYPE html>"));

        let full = r.render(&tpl("s", "<html><body>hi</body></html>"), &rcpt);
        assert_eq!(full.html_body, "<html><body>hi</body></html>");
    }

    #[test]
    fn extract_variables_dedupes_across_subject_and_body() {
        let vars = extract_variables("Hi {{firstName}}", "Hello {{firstName}} at {{company}}");
        assert_eq!(vars, vec!["firstName".to_string(), "company".to_string()]);
    }

    #[test]
    fn rendering_is_deterministic() {
        let r = Renderer::new("app.example.com");
        let rcpt = recipient("a@x.com", "Ada", "Lovelace", serde_json::json!({"company": "X"}));
        let t = tpl("Hi {{firstName}}", "Hello {{fullName}}");
        let a = r.render(&t, &rcpt);
        let b = r.render(&t, &rcpt);
        assert_eq!(a.subject, b.subject);
        assert_eq!(a.html_body, b.html_body);
    }
}
