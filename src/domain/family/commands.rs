use uuid::Uuid;

use super::value_objects::FamilyRole;

// ============================================================================
// Family Commands
// ============================================================================

#[derive(Debug, Clone)]
pub enum FamilyCommand {
    CreateFamily {
        name: String,
    },
    AddMember {
        member_id: Uuid,
        display_name: String,
        role: FamilyRole,
    },
    RemoveMember {
        member_id: Uuid,
        reason: Option<String>,
    },
    RenameFamily {
        name: String,
    },
    DisbandFamily {
        reason: Option<String>,
    },
}
