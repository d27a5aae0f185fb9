use serde::{Deserialize, Serialize};

/// Body of `POST /api/answer` responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerResponse {
    /// "success" or "error".
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateResponse {
    pub status: String,
}
