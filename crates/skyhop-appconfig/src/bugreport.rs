//! Bug-report form policy
//!
//! The report form shown to the user is remotely configured; a built-in
//! default model is used until the first fetch succeeds.

use serde::{Deserialize, Serialize};
use skyhop_common::Storage;

const STORE_KEY: &str = "default_bug_report";

/// Remote description of the bug-report form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicReportModel {
    #[serde(rename = "Categories")]
    pub categories: Vec<ReportCategory>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCategory {
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "SubmitLabel")]
    pub submit_label: String,
    #[serde(rename = "Suggestions", default)]
    pub suggestions: Vec<ReportSuggestion>,
    #[serde(rename = "InputFields", default)]
    pub input_fields: Vec<ReportInputField>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSuggestion {
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "Link", default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportInputField {
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "SubmitLabel")]
    pub submit_label: String,
    #[serde(rename = "Type")]
    pub field_type: ReportFieldType,
    #[serde(rename = "IsMandatory", default)]
    pub is_mandatory: bool,
    #[serde(rename = "Placeholder", default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFieldType {
    TextSingleLine,
    TextMultiLine,
    Dropdown,
}

impl Default for DynamicReportModel {
    fn default() -> Self {
        let what_happened = ReportInputField {
            label: "What went wrong?".to_string(),
            submit_label: "What went wrong".to_string(),
            field_type: ReportFieldType::TextMultiLine,
            is_mandatory: true,
            placeholder: Some("Please describe the problem in as much detail as you can".to_string()),
        };
        Self {
            categories: vec![
                ReportCategory {
                    label: "Connecting to VPN".to_string(),
                    submit_label: "Connection".to_string(),
                    suggestions: vec![ReportSuggestion {
                        text: "Try a different server or protocol".to_string(),
                        link: None,
                    }],
                    input_fields: vec![what_happened.clone()],
                },
                ReportCategory {
                    label: "Something else".to_string(),
                    submit_label: "Other".to_string(),
                    suggestions: Vec::new(),
                    input_fields: vec![what_happened],
                },
            ],
        }
    }
}

/// Persisted bug-report policy
#[derive(Clone)]
pub struct BugReportConfigStore {
    storage: Storage,
}

impl BugReportConfigStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn load(&self) -> DynamicReportModel {
        self.storage.load(STORE_KEY).unwrap_or_default()
    }

    pub fn save(&self, model: &DynamicReportModel) {
        if let Err(err) = self.storage.save(STORE_KEY, model) {
            tracing::warn!(%err, "failed to persist bug report config");
        }
    }
}
