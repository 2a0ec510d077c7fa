use serde::Serialize;
use serde_json::Value;

/// One append-only audit record on a group. Written for every successful
/// membership mutation and invite issuance.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub action: String,
    pub performed_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub created_at: String,
}
