use std::io::Write;

use serde::Serialize;

use super::domain::Application;

#[derive(Debug, Serialize)]
struct ApplicationRow<'a> {
    application_id: &'a str,
    job_id: &'a str,
    candidate_name: &'a str,
    candidate_email: &'a str,
    phone: &'a str,
    status: &'static str,
    pipeline_stage: &'a str,
    ai_rating: Option<f32>,
    manual_rating: Option<u8>,
    rejection_reason: &'a str,
    created_at: String,
}

impl<'a> From<&'a Application> for ApplicationRow<'a> {
    fn from(application: &'a Application) -> Self {
        Self {
            application_id: &application.id.0,
            job_id: &application.job_id.0,
            candidate_name: &application.candidate.name,
            candidate_email: &application.candidate.email,
            phone: application.candidate.phone.as_deref().unwrap_or_default(),
            status: application.status.label(),
            pipeline_stage: application.pipeline_stage.as_str(),
            ai_rating: application.ai_rating,
            manual_rating: application.manual_rating,
            rejection_reason: application.rejection_reason.as_deref().unwrap_or_default(),
            created_at: application.created_at.to_rfc3339(),
        }
    }
}

/// Write one CSV row per application, header included.
pub fn write_csv<W: Write>(applications: &[Application], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if applications.is_empty() {
        csv_writer.write_record([
            "application_id",
            "job_id",
            "candidate_name",
            "candidate_email",
            "phone",
            "status",
            "pipeline_stage",
            "ai_rating",
            "manual_rating",
            "rejection_reason",
            "created_at",
        ])?;
    }
    for application in applications {
        csv_writer.serialize(ApplicationRow::from(application))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn export_csv(applications: &[Application]) -> Result<String, csv::Error> {
    let mut buffer = Vec::new();
    write_csv(applications, &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| {
        csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}
