use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Subject and body with `{placeholder}` tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    #[serde(default)]
    pub id: Option<String>,
    pub subject: String,
    pub body: String,
}

impl EmailTemplate {
    pub fn rejection() -> Self {
        Self {
            id: Some("application_rejected".to_string()),
            subject: "Update on your application for {position}".to_string(),
            body: "Hi {name},\n\nThank you for your interest in the {position} role at {company}. \
                   After careful review we have decided not to move forward with your application.\n\n\
                   We appreciate the time you invested and wish you the best in your search.\n\n\
                   {company} Hiring Team"
                .to_string(),
        }
    }

    pub fn render(&self, values: &TemplateValues) -> RenderedEmail {
        RenderedEmail {
            subject: substitute(&self.subject, values),
            body: substitute(&self.body, values),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

/// Per-recipient values for the recognized placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateValues {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub company: String,
}

impl TemplateValues {
    fn lookup(&self, placeholder: &str) -> Option<&str> {
        match placeholder.to_ascii_lowercase().as_str() {
            "name" | "candidate_name" | "candidatename" | "first_name" => Some(&self.name),
            "email" | "candidate_email" => Some(&self.email),
            "position" | "job_title" | "jobtitle" | "role" => Some(&self.position),
            "company" | "company_name" | "companyname" => Some(&self.company),
            _ => None,
        }
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}").expect("placeholder pattern is valid")
    })
}

/// Replace recognized placeholders and strip every other `{identifier}` token.
///
/// Values are scrubbed of tokens too, so a candidate named `{company}` cannot leak one into the
/// rendered text.
pub fn substitute(template: &str, values: &TemplateValues) -> String {
    placeholder_pattern()
        .replace_all(template, |captures: &Captures<'_>| {
            scrub(values.lookup(&captures[1]).unwrap_or_default())
        })
        .into_owned()
}

fn scrub(value: &str) -> String {
    let mut current = value.to_string();
    // Stripping can splice a new token together, e.g. `{{x}name}`.
    while placeholder_pattern().is_match(&current) {
        current = placeholder_pattern().replace_all(&current, "").into_owned();
    }
    current
}
