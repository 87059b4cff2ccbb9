// ── User (reference target only) ──

use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;

/// A server account. Users are never reconciled here; teams and role
/// assignments only need to know they exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub name: String,
    pub email: Option<String>,
    pub active: bool,
}
