// ============================================================================
// Family Domain
// ============================================================================
//
// Demo aggregate exercising every engine seam: event enum, commands,
// business-rule errors, and the aggregate itself.
//
// ============================================================================

pub mod aggregate;
pub mod commands;
pub mod errors;
pub mod events;
pub mod value_objects;

pub use aggregate::FamilyAggregate;
pub use commands::FamilyCommand;
pub use errors::FamilyError;
pub use events::{
    FamilyCreated, FamilyDisbanded, FamilyEvent, FamilyMemberAdded, FamilyMemberRemoved,
    FamilyRenamed,
};
pub use value_objects::{FamilyMember, FamilyRole};
