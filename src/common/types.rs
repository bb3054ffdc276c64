use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw record as returned by a dataset port (field name → value)
pub type RawRecord = serde_json::Value;

/// Harm taxonomy bucket assigned to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyCategory {
    NonviolentWrongdoing,
    HateSpeech,
    SelfHarm,
    SexualContent,
    ViolentHarm,
}

impl PolicyCategory {
    pub const ALL: [PolicyCategory; 5] = [
        PolicyCategory::NonviolentWrongdoing,
        PolicyCategory::HateSpeech,
        PolicyCategory::SelfHarm,
        PolicyCategory::SexualContent,
        PolicyCategory::ViolentHarm,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            PolicyCategory::NonviolentWrongdoing => "NONVIOLENT_WRONGDOING",
            PolicyCategory::HateSpeech => "HATE_SPEECH",
            PolicyCategory::SelfHarm => "SELF_HARM",
            PolicyCategory::SexualContent => "SEXUAL_CONTENT",
            PolicyCategory::ViolentHarm => "VIOLENT_HARM",
        }
    }
}

impl fmt::Display for PolicyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation decision; variant order is the band order allow < suggest < block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Suggest,
    Block,
}

impl Decision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Suggest => "suggest",
            Decision::Block => "block",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserResponse {
    None,
    Dispute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealOutcome {
    None,
    Upheld,
    Overturned,
}

/// One unified output record describing a simulated moderation decision.
///
/// Field order matches the output column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementRow {
    pub id: String,
    pub ts: String,
    pub policy_category: PolicyCategory,
    pub confidence: f64,
    pub decision: Decision,
    pub rationale: String,
    pub slice: String,
    pub language: String,
    #[serde(rename = "latencyMs")]
    pub latency_ms: u32,
    #[serde(rename = "costCents")]
    pub cost_cents: u32,
    pub user_response: UserResponse,
    pub appeal_outcome: AppealOutcome,
}

impl EnforcementRow {
    /// Clamp confidence into [0, 1]. NaN collapses to 0.
    pub fn clamp_confidence(&mut self) {
        self.confidence = if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        };
    }
}
