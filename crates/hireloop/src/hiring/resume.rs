use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::domain::{
    Application, ApplicationId, Education, OwnerId, ParsedResume, ResumeRef, WorkExperience,
};
use super::intake::owned_application;
use super::repository::{ApplicationPatch, ApplicationRepository, FileStore};
use crate::billing::{Feature, PlanGate};
use crate::error::ServiceError;
use crate::functions::{unwrap_text_payload, ResumeParseRequest, ResumeParser};

const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOC: &str = "application/msword";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ParseOutcome {
    Updated { application: Box<Application> },
    /// The parser returned nothing usable; the record was left as it was.
    Empty,
}

/// Resume upload plus the parsing trigger.
pub struct ResumeService {
    applications: Arc<dyn ApplicationRepository>,
    files: Arc<dyn FileStore>,
    parser: Arc<dyn ResumeParser>,
    plans: Arc<PlanGate>,
    max_bytes: usize,
}

impl ResumeService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        files: Arc<dyn FileStore>,
        parser: Arc<dyn ResumeParser>,
        plans: Arc<PlanGate>,
        max_bytes: usize,
    ) -> Self {
        Self {
            applications,
            files,
            parser,
            plans,
            max_bytes,
        }
    }

    pub fn upload_resume(
        &self,
        owner: &OwnerId,
        id: &ApplicationId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Application, ServiceError> {
        let file_name = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if file_name.is_empty() {
            return Err(ServiceError::validation("a file name is required"));
        }
        if bytes.is_empty() {
            return Err(ServiceError::validation("resume file is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(ServiceError::validation(format!(
                "resume exceeds the {} byte limit",
                self.max_bytes
            )));
        }
        let content_type = allowed_content_type(&file_name).ok_or_else(|| {
            ServiceError::validation("resumes must be PDF, Word or plain text documents")
        })?;

        owned_application(self.applications.as_ref(), owner, id)?;
        let path = format!("resumes/{id}/{file_name}");
        let size_bytes = bytes.len();
        self.files.put(&path, bytes, &content_type)?;

        let patch = ApplicationPatch {
            resume: Some(ResumeRef {
                path,
                file_name,
                content_type,
                size_bytes,
            }),
            ..ApplicationPatch::default()
        };
        let updated = self.applications.patch(id, patch, Utc::now())?;
        info!(application_id = %id, size_bytes, "resume stored");
        Ok(updated)
    }

    /// Parse the stored resume and merge non-empty fields into the application.
    pub async fn parse_resume(
        &self,
        owner: &OwnerId,
        id: &ApplicationId,
    ) -> Result<ParseOutcome, ServiceError> {
        self.plans.ensure_feature(owner, Feature::ResumeParsing)?;
        let application = owned_application(self.applications.as_ref(), owner, id)?;
        let resume = application
            .resume
            .as_ref()
            .ok_or_else(|| ServiceError::validation("application has no resume"))?;
        if !self.files.exists(&resume.path)? {
            return Err(ServiceError::validation(format!(
                "resume file '{}' is missing from storage",
                resume.path
            )));
        }

        let request = ResumeParseRequest {
            file_path: resume.path.clone(),
            file_name: resume.file_name.clone(),
            content_type: resume.content_type.clone(),
        };
        let response = self.parser.parse(&request).await.map_err(|err| {
            warn!(application_id = %id, error = %err, "resume parsing failed");
            ServiceError::external("resume parsing", err)
        })?;

        let parsed = decode_parsed_resume(response);
        if parsed.is_empty() {
            warn!(application_id = %id, "resume parser returned no usable fields");
            return Ok(ParseOutcome::Empty);
        }

        let merged = merge_parsed(application.parsed_resume.clone().unwrap_or_default(), parsed);
        let patch = ApplicationPatch {
            parsed_resume: Some(merged),
            ..ApplicationPatch::default()
        };
        let updated = self.applications.patch(id, patch, Utc::now())?;
        info!(application_id = %id, "parsed resume stored");
        Ok(ParseOutcome::Updated {
            application: Box::new(updated),
        })
    }
}

fn allowed_content_type(file_name: &str) -> Option<String> {
    let guessed = mime_guess::from_path(file_name).first()?;
    let allowed = guessed == mime::APPLICATION_PDF
        || guessed == mime::TEXT_PLAIN
        || guessed.essence_str() == DOC
        || guessed.essence_str() == DOCX;
    allowed.then(|| guessed.essence_str().to_string())
}

/// Lenient decode of the parser payload; unknown shapes yield empty fields.
fn decode_parsed_resume(response: Value) -> ParsedResume {
    let payload = match unwrap_text_payload(response) {
        Value::Object(mut fields) if matches!(fields.get("data"), Some(Value::Object(_))) => {
            fields.remove("data").unwrap_or_default()
        }
        other => other,
    };

    let field = |keys: &[&str]| -> Value {
        keys.iter()
            .find_map(|key| payload.get(*key))
            .cloned()
            .unwrap_or(Value::Null)
    };
    let work_experience: Vec<WorkExperience> =
        serde_json::from_value(field(&["work_experience", "experience"])).unwrap_or_default();
    let education: Vec<Education> =
        serde_json::from_value(field(&["education"])).unwrap_or_default();
    let skills = match field(&["skills"]) {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                Value::Object(fields) => fields
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .map(|skill| skill.trim().to_string())
            .filter(|skill| !skill.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    ParsedResume {
        work_experience,
        education,
        skills,
        raw: Some(payload),
    }
}

/// Overwrite a field only when the fresh parse produced something for it.
fn merge_parsed(mut existing: ParsedResume, fresh: ParsedResume) -> ParsedResume {
    if !fresh.work_experience.is_empty() {
        existing.work_experience = fresh.work_experience;
    }
    if !fresh.education.is_empty() {
        existing.education = fresh.education;
    }
    if !fresh.skills.is_empty() {
        existing.skills = fresh.skills;
    }
    if let Some(raw) = fresh.raw.filter(|raw| !ParsedResume::blank_raw(raw)) {
        existing.raw = Some(raw);
    }
    existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_types_follow_the_allow_list() {
        assert_eq!(allowed_content_type("cv.pdf").as_deref(), Some("application/pdf"));
        assert_eq!(allowed_content_type("cv.docx").as_deref(), Some(DOCX));
        assert_eq!(allowed_content_type("cv.txt").as_deref(), Some("text/plain"));
        assert_eq!(allowed_content_type("cv.exe"), None);
        assert_eq!(allowed_content_type("cv"), None);
    }

    #[test]
    fn decodes_nested_and_object_skills() {
        let parsed = decode_parsed_resume(json!({
            "data": {
                "experience": [{ "title": "Engineer", "company": "Initech" }],
                "skills": ["Rust", { "name": "SQL" }, "  "]
            }
        }));
        assert_eq!(parsed.work_experience.len(), 1);
        assert_eq!(parsed.skills, vec!["Rust".to_string(), "SQL".to_string()]);
        assert!(parsed.education.is_empty());
    }

    #[test]
    fn empty_parse_never_blanks_existing_fields() {
        let existing = ParsedResume {
            skills: vec!["Go".to_string()],
            education: vec![Education {
                institution: Some("MIT".to_string()),
                ..Education::default()
            }],
            ..ParsedResume::default()
        };
        let fresh = ParsedResume {
            skills: vec!["Rust".to_string()],
            raw: Some(json!({})),
            ..ParsedResume::default()
        };
        let merged = merge_parsed(existing, fresh);
        assert_eq!(merged.skills, vec!["Rust".to_string()]);
        assert_eq!(merged.education.len(), 1);
        assert_eq!(merged.raw, None);
    }
}
