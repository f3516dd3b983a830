use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commands::FamilyCommand;
use super::errors::FamilyError;
use super::events::*;
use super::value_objects::FamilyMember;
use crate::event_sourcing::core::Aggregate;

// ============================================================================
// Family Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,

    // Current state (derived from events)
    pub name: String,
    pub members: Vec<FamilyMember>,
    pub created: bool,
    pub disbanded: bool,

    // Produced by in-memory mutation, flushed by the repository. Excluded
    // from snapshots.
    #[serde(skip)]
    uncommitted: Vec<FamilyEvent>,
}

impl FamilyAggregate {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    fn has_member(&self, member_id: Uuid) -> bool {
        self.members
            .iter()
            .any(|member| member.member_id == member_id)
    }

    /// Shared guard for every command that mutates an existing family.
    fn require_active(&self) -> Result<(), FamilyError> {
        if !self.created {
            return Err(FamilyError::NotCreated);
        }
        if self.disbanded {
            return Err(FamilyError::AlreadyDisbanded);
        }
        Ok(())
    }
}

impl Aggregate for FamilyAggregate {
    type Event = FamilyEvent;
    type Command = FamilyCommand;
    type Error = FamilyError;

    fn aggregate_type() -> &'static str {
        "Family"
    }

    fn empty(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            name: String::new(),
            members: Vec::new(),
            created: false,
            disbanded: false,
            uncommitted: Vec::new(),
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn apply(&mut self, event: &FamilyEvent) {
        match event {
            FamilyEvent::Created(e) => {
                self.name = e.name.clone();
                self.created = true;
            }
            FamilyEvent::MemberAdded(e) => {
                self.members.push(e.member.clone());
            }
            FamilyEvent::MemberRemoved(e) => {
                self.members
                    .retain(|member| member.member_id != e.member_id);
            }
            FamilyEvent::Renamed(e) => {
                self.name = e.name.clone();
            }
            FamilyEvent::Disbanded(_) => {
                self.disbanded = true;
            }
        }
    }

    fn handle(&self, command: &FamilyCommand) -> Result<Vec<FamilyEvent>, FamilyError> {
        match command {
            FamilyCommand::CreateFamily { name } => {
                if self.created {
                    return Err(FamilyError::AlreadyCreated);
                }
                if name.trim().is_empty() {
                    return Err(FamilyError::EmptyFamilyName);
                }

                Ok(vec![FamilyEvent::Created(FamilyCreated {
                    name: name.clone(),
                })])
            }

            FamilyCommand::AddMember {
                member_id,
                display_name,
                role,
            } => {
                self.require_active()?;
                if display_name.trim().is_empty() {
                    return Err(FamilyError::EmptyMemberName);
                }
                if self.has_member(*member_id) {
                    return Err(FamilyError::DuplicateMember(*member_id));
                }

                Ok(vec![FamilyEvent::MemberAdded(FamilyMemberAdded {
                    member: FamilyMember {
                        member_id: *member_id,
                        display_name: display_name.clone(),
                        role: *role,
                    },
                })])
            }

            FamilyCommand::RemoveMember { member_id, reason } => {
                self.require_active()?;
                if !self.has_member(*member_id) {
                    return Err(FamilyError::UnknownMember(*member_id));
                }

                Ok(vec![FamilyEvent::MemberRemoved(FamilyMemberRemoved {
                    member_id: *member_id,
                    reason: reason.clone(),
                })])
            }

            FamilyCommand::RenameFamily { name } => {
                self.require_active()?;
                if name.trim().is_empty() {
                    return Err(FamilyError::EmptyFamilyName);
                }

                Ok(vec![FamilyEvent::Renamed(FamilyRenamed {
                    name: name.clone(),
                })])
            }

            FamilyCommand::DisbandFamily { reason } => {
                self.require_active()?;

                Ok(vec![FamilyEvent::Disbanded(FamilyDisbanded {
                    reason: reason.clone(),
                })])
            }
        }
    }

    fn uncommitted_events(&self) -> &[FamilyEvent] {
        &self.uncommitted
    }

    fn record(&mut self, event: FamilyEvent) {
        self.apply(&event);
        self.uncommitted.push(event);
    }

    fn mark_committed(&mut self) {
        self.uncommitted.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::family::FamilyRole;

    fn created() -> FamilyAggregate {
        let mut family = FamilyAggregate::empty(Uuid::new_v4());
        let events = family
            .handle(&FamilyCommand::CreateFamily {
                name: "Okafor".to_string(),
            })
            .unwrap();
        for event in events {
            family.record(event);
        }
        family
    }

    #[test]
    fn create_rejects_empty_names() {
        let family = FamilyAggregate::empty(Uuid::new_v4());
        let err = family
            .handle(&FamilyCommand::CreateFamily {
                name: "   ".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, FamilyError::EmptyFamilyName));
    }

    #[test]
    fn create_twice_is_rejected() {
        let family = created();
        let err = family
            .handle(&FamilyCommand::CreateFamily {
                name: "Again".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, FamilyError::AlreadyCreated));
    }

    #[test]
    fn members_must_be_unique() {
        let mut family = created();
        let member_id = Uuid::new_v4();
        let events = family
            .handle(&FamilyCommand::AddMember {
                member_id,
                display_name: "Ada".to_string(),
                role: FamilyRole::Owner,
            })
            .unwrap();
        for event in events {
            family.record(event);
        }

        let err = family
            .handle(&FamilyCommand::AddMember {
                member_id,
                display_name: "Ada again".to_string(),
                role: FamilyRole::Adult,
            })
            .unwrap_err();
        assert!(matches!(err, FamilyError::DuplicateMember(id) if id == member_id));
    }

    #[test]
    fn remove_requires_a_known_member() {
        let family = created();
        let missing = Uuid::new_v4();
        let err = family
            .handle(&FamilyCommand::RemoveMember {
                member_id: missing,
                reason: None,
            })
            .unwrap_err();
        assert!(matches!(err, FamilyError::UnknownMember(id) if id == missing));
    }

    #[test]
    fn disbanded_family_refuses_mutation() {
        let mut family = created();
        let events = family
            .handle(&FamilyCommand::DisbandFamily { reason: None })
            .unwrap();
        for event in events {
            family.record(event);
        }

        let err = family
            .handle(&FamilyCommand::AddMember {
                member_id: Uuid::new_v4(),
                display_name: "Late".to_string(),
                role: FamilyRole::Adult,
            })
            .unwrap_err();
        assert!(matches!(err, FamilyError::AlreadyDisbanded));
    }

    #[test]
    fn record_queues_uncommitted_events_until_marked() {
        let mut family = created();
        assert_eq!(family.uncommitted_events().len(), 1);
        assert_eq!(family.member_count(), 0);

        family.record(FamilyEvent::member_added(
            Uuid::new_v4(),
            "Ben",
            FamilyRole::Child,
        ));
        assert_eq!(family.uncommitted_events().len(), 2);
        assert_eq!(family.member_count(), 1);

        family.mark_committed();
        assert!(family.uncommitted_events().is_empty());
        assert_eq!(family.member_count(), 1);
    }

    #[test]
    fn snapshot_serialization_excludes_uncommitted_events() {
        let mut family = created();
        family.record(FamilyEvent::member_added(
            Uuid::new_v4(),
            "Ben",
            FamilyRole::Child,
        ));

        let json = serde_json::to_value(&family).unwrap();
        assert!(json.get("uncommitted").is_none());

        let restored: FamilyAggregate = serde_json::from_value(json).unwrap();
        assert!(restored.uncommitted_events().is_empty());
        assert_eq!(restored.member_count(), 1);
    }
}
