use chrono::NaiveDate;

use crate::models::booking::DATE_FORMAT;
use crate::models::{CandidateRecord, Step, Turn};
use crate::services::ai::{LlmProvider, Message};

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("extraction provider failed: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("unparseable extraction response: {0}")]
    Parse(String),
}

/// Everything the extraction service sees for one turn.
pub struct ExtractionRequest<'a> {
    pub step: Step,
    pub history: &'a [Turn],
    pub utterance: &'a str,
    pub context: StepContext,
    pub today: NaiveDate,
}

/// Already-known fields and candidate options relevant to the current step.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    pub department: Option<String>,
    pub visit_type: Option<String>,
    pub doctor: Option<String>,
    pub date: Option<String>,
    pub options: Vec<String>,
}

const RESPONSE_FORMAT: &str = r#"Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "extractedData": {
    "patientNumber": "string or null",
    "visitType": "new_visit|follow_up|checkup or null",
    "department": "string or null",
    "doctor": "string or null",
    "date": "YYYY-MM-DD or null",
    "time": "HH:MM (24-hour) or null",
    "userConfirmed": true, false or null
  },
  "containsOtherStepInfo": false,
  "confidence": 0.0
}"#;

fn step_instructions(step: Step) -> &'static str {
    match step {
        Step::PatientId => {
            "Extract the PATIENT NUMBER.
- Format: P followed by 3 digits (P001, P002, ...).
- A bare number is a patient number: \"1\" -> \"P001\", \"123\" -> \"P123\"."
        }
        Step::VisitType => {
            "Extract the VISIT TYPE. It must be one of new_visit, follow_up, checkup.
- new_visit: first visit, new patient.
- follow_up: continuing treatment, return visit.
- checkup: routine exam, physical, annual checkup."
        }
        Step::Department => {
            "Extract the DEPARTMENT. Accept names and abbreviations (\"Cardio\" -> Cardiology, \"skin\" -> Dermatology)."
        }
        Step::Doctor => {
            "Extract the DOCTOR NAME. Partial names are fine when unambiguous (\"Dr. Chen\")."
        }
        Step::Date => {
            "Extract the APPOINTMENT DATE. Resolve relative dates (\"tomorrow\", \"next Monday\") against today's date and return YYYY-MM-DD."
        }
        Step::Time => {
            "Extract the APPOINTMENT TIME and convert it to 24-hour HH:MM (\"2PM\" -> \"14:00\", \"3:30 in the afternoon\" -> \"15:30\")."
        }
        Step::Confirmation => {
            "This is the CONFIRMATION step. Look only at the latest user message.
- userConfirmed = true for a positive answer (yes, confirm, okay, sure, sounds good).
- userConfirmed = false if the user declines.
- userConfirmed = null if the answer is unclear.
- Every other extractedData field must be null and containsOtherStepInfo must be false."
        }
    }
}

pub fn build_system_prompt(request: &ExtractionRequest<'_>) -> String {
    let step = request.step;
    let mut prompt = format!(
        "You are parsing user input for the {step} step of a hospital appointment booking system.\n\
         Today's date is {}.\n\n{}\n",
        request.today.format(DATE_FORMAT),
        step_instructions(step),
    );

    let ctx = &request.context;
    let known: Vec<String> = [
        ("Department", ctx.department.as_deref()),
        ("Visit type", ctx.visit_type.as_deref()),
        ("Doctor", ctx.doctor.as_deref()),
        ("Date", ctx.date.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| format!("{label}: {v}")))
    .collect();
    if !known.is_empty() {
        prompt.push_str(&format!("\nAlready collected:\n{}\n", known.join("\n")));
    }

    if !ctx.options.is_empty() {
        prompt.push_str(&format!(
            "\nAvailable options: {}\nIf the input is a typo or partial name, correct it to one of these exact values.\n",
            ctx.options.join(", ")
        ));
    }

    prompt.push_str(&format!(
        "\nExtract ALL appointment information present in the message, even for other steps.\n\
         Set containsOtherStepInfo to true if the message carries data for any step other than {step}.\n\
         Set fields that are not mentioned to null and give a confidence between 0 and 1.\n\n{RESPONSE_FORMAT}"
    ));

    prompt
}

pub async fn extract_candidate(
    llm: &dyn LlmProvider,
    request: &ExtractionRequest<'_>,
) -> Result<CandidateRecord, ExtractionError> {
    let mut messages: Vec<Message> = request
        .history
        .iter()
        .map(|t| Message {
            role: t.role.as_str().to_string(),
            content: t.content.clone(),
        })
        .collect();

    messages.push(Message {
        role: "user".to_string(),
        content: request.utterance.to_string(),
    });

    let system = build_system_prompt(request);
    let response = llm.chat(&system, &messages).await?;

    let candidate = parse_candidate_response(&response)?;
    tracing::debug!(
        step = %request.step,
        other_step = candidate.contains_other_step_info,
        confidence = candidate.confidence,
        "extracted candidate"
    );
    Ok(candidate)
}

pub fn parse_candidate_response(response: &str) -> Result<CandidateRecord, ExtractionError> {
    let trimmed = response.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    let parsed = serde_json::from_str::<CandidateRecord>(cleaned).or_else(|first_err| {
        // Models sometimes wrap the object in prose.
        match (cleaned.find('{'), cleaned.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<CandidateRecord>(&cleaned[start..=end])
            }
            _ => Err(first_err),
        }
    });

    match parsed {
        Ok(mut candidate) => {
            candidate.confidence = if candidate.confidence.is_finite() {
                candidate.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            };
            Ok(candidate)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse extraction response");
            Err(ExtractionError::Parse(e.to_string()))
        }
    }
}
