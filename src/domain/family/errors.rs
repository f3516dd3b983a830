use uuid::Uuid;

// ============================================================================
// Family Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FamilyError {
    #[error("Family has already been created")]
    AlreadyCreated,

    #[error("Family has not been created yet")]
    NotCreated,

    #[error("Family is already disbanded")]
    AlreadyDisbanded,

    #[error("Family name cannot be empty")]
    EmptyFamilyName,

    #[error("Member display name cannot be empty")]
    EmptyMemberName,

    #[error("Member {0} already belongs to the family")]
    DuplicateMember(Uuid),

    #[error("Member {0} does not belong to the family")]
    UnknownMember(Uuid),
}
