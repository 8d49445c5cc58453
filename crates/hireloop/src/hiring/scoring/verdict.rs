use serde::Serialize;
use serde_json::Value;

use crate::functions::unwrap_text_payload;

/// Validated result of an `analyze-application` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ScoreVerdict {
    Rated { rating: f32, summary: String },
    ParseError { reason: String },
}

impl ScoreVerdict {
    /// Accepts `{rating|score, summary|analysis|reasoning}` either as an object or as JSON
    /// embedded in a text payload. Anything else is a parse error.
    pub fn from_value(value: Value, rating_scale: f32) -> Self {
        let value = match unwrap_text_payload(value) {
            Value::Object(mut fields) if matches!(fields.get("result"), Some(Value::Object(_))) => {
                fields.remove("result").unwrap_or_default()
            }
            other => other,
        };
        let Value::Object(fields) = value else {
            return parse_error("response is not a JSON object");
        };

        let rating = match ["rating", "score"].iter().find_map(|key| fields.get(*key)) {
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        let Some(rating) = rating.map(|rating| rating as f32) else {
            return parse_error("response has no numeric rating");
        };
        if !rating.is_finite() || rating < 1.0 || rating > rating_scale {
            return parse_error(format!("rating {rating} outside 1..={rating_scale}"));
        }

        let summary = ["summary", "analysis", "reasoning"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .unwrap_or_default();
        if summary.is_empty() {
            return parse_error("response has no summary");
        }

        ScoreVerdict::Rated {
            rating,
            summary: summary.to_string(),
        }
    }
}

fn parse_error(reason: impl Into<String>) -> ScoreVerdict {
    ScoreVerdict::ParseError {
        reason: reason.into(),
    }
}

/// Fixed instruction template sent with every scoring request.
pub fn scoring_instructions(rating_scale: f32) -> String {
    format!(
        "You are an experienced technical recruiter. Evaluate the candidate's screening answers \
         and resume against the job description. Respond with JSON only, shaped as \
         {{\"rating\": <number from 1 to {rating_scale}>, \"summary\": \"<two or three sentences \
         naming the strongest match and the biggest gap>\"}}. Judge only job-relevant \
         qualifications."
    )
}
