use serde::{Deserialize, Serialize};

/// Every field the extraction service may pull out of one utterance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    #[serde(default)]
    pub patient_number: Option<String>,
    #[serde(default)]
    pub visit_type: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub doctor: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub user_confirmed: Option<bool>,
}

/// Structured output of one extraction call. Lives for a single turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub extracted_data: ExtractedFields,
    #[serde(default)]
    pub contains_other_step_info: bool,
    #[serde(default)]
    pub confidence: f64,
}
