//! Applicant tracking backend: job postings, candidate intake, AI-assisted screening, hiring
//! pipeline moves and candidate e-mail, exposed as an axum router.

pub mod billing;
pub mod config;
pub mod email;
pub mod error;
pub mod functions;
pub mod hiring;
pub mod preferences;
pub mod router;
pub mod telemetry;
