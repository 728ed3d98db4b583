use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit columns shared by every persisted entity, embedded by value
/// (`#[serde(flatten)]`) rather than inherited. `id` and `created_at`
/// come from database defaults; the `*_by` columns are stamped by the
/// service layer from the request identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMeta {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}
