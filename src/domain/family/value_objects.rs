use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Family Value Objects
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FamilyMember {
    pub member_id: Uuid,
    pub display_name: String,
    pub role: FamilyRole,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FamilyRole {
    Owner,
    Adult,
    Child,
}
