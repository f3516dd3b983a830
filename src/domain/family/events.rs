use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{FamilyMember, FamilyRole};
use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Family Events
// ============================================================================

/// Family Event - union type for all family events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FamilyEvent {
    Created(FamilyCreated),
    MemberAdded(FamilyMemberAdded),
    MemberRemoved(FamilyMemberRemoved),
    Renamed(FamilyRenamed),
    Disbanded(FamilyDisbanded),
}

impl DomainEvent for FamilyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FamilyEvent::Created(_) => "FamilyCreated",
            FamilyEvent::MemberAdded(_) => "FamilyMemberAdded",
            FamilyEvent::MemberRemoved(_) => "FamilyMemberRemoved",
            FamilyEvent::Renamed(_) => "FamilyRenamed",
            FamilyEvent::Disbanded(_) => "FamilyDisbanded",
        }
    }

    fn event_names() -> &'static [&'static str] {
        &[
            "FamilyCreated",
            "FamilyMemberAdded",
            "FamilyMemberRemoved",
            "FamilyRenamed",
            "FamilyDisbanded",
        ]
    }
}

impl FamilyEvent {
    pub fn created(name: &str) -> Self {
        FamilyEvent::Created(FamilyCreated {
            name: name.to_string(),
        })
    }

    pub fn member_added(member_id: Uuid, display_name: &str, role: FamilyRole) -> Self {
        FamilyEvent::MemberAdded(FamilyMemberAdded {
            member: FamilyMember {
                member_id,
                display_name: display_name.to_string(),
                role,
            },
        })
    }
}

// ============================================================================
// Individual Event Payloads
// ============================================================================

/// First event in the family lifecycle.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FamilyCreated {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FamilyMemberAdded {
    pub member: FamilyMember,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FamilyMemberRemoved {
    pub member_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FamilyRenamed {
    pub name: String,
}

/// Family lifecycle ended.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FamilyDisbanded {
    pub reason: Option<String>,
}
