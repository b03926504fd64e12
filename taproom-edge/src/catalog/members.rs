//! Member store

use parking_lot::RwLock;
use shared::models::{Member, MemberCreate, MemberUpdate};
use shared::util::Clock;
use std::sync::Arc;

use crate::message::{ChangeAction, ChangeBus, Collection};
use crate::storage::{self, LocalStorage, Persist, StorageResult, keys};
use crate::utils::{AppError, AppResult};

pub struct MemberStore {
    members: RwLock<Vec<Member>>,
    persist: Arc<dyn Persist>,
    clock: Arc<dyn Clock>,
    bus: ChangeBus,
}

impl std::fmt::Debug for MemberStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberStore")
            .field("members", &self.members.read().len())
            .finish()
    }
}

fn validate(member: &Member) -> AppResult<()> {
    if member.name.trim().is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    if member.points < 0 {
        return Err(AppError::validation(format!(
            "points must be non-negative, got {}",
            member.points
        )));
    }
    if let Some(email) = &member.email {
        if !email.contains('@') {
            return Err(AppError::validation(format!("invalid email: {email}")));
        }
    }
    Ok(())
}

impl MemberStore {
    pub fn new(persist: Arc<dyn Persist>, clock: Arc<dyn Clock>, bus: ChangeBus) -> Self {
        Self {
            members: RwLock::new(Vec::new()),
            persist,
            clock,
            bus,
        }
    }

    pub fn load(
        storage: &LocalStorage,
        persist: Arc<dyn Persist>,
        clock: Arc<dyn Clock>,
        bus: ChangeBus,
    ) -> StorageResult<Self> {
        let members: Vec<Member> = storage::load_collection(storage, keys::MEMBERS)?;
        tracing::info!(count = members.len(), "Members rehydrated");
        let store = Self::new(persist, clock, bus);
        *store.members.write() = members;
        Ok(store)
    }

    pub fn add_member(&self, input: MemberCreate) -> AppResult<Member> {
        let mut members = self.members.write();
        let now = self.clock.now_millis();
        let member = Member {
            id: match input.id {
                Some(id) if !id.trim().is_empty() => id,
                _ => uuid::Uuid::new_v4().to_string(),
            },
            name: input.name,
            phone: input.phone.filter(|p| !p.is_empty()),
            email: input.email.filter(|e| !e.is_empty()),
            points: 0,
            notes: input.notes.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        let verdict = if members.iter().any(|m| m.id == member.id) {
            Err(AppError::conflict(format!("Member {} already exists", member.id)))
        } else if member.phone.is_some() && members.iter().any(|m| m.phone == member.phone) {
            Err(AppError::conflict("A member with this phone already exists"))
        } else {
            validate(&member)
        };
        if let Err(e) = verdict {
            tracing::warn!(error = %e, "Rejected new member");
            return Err(e);
        }

        members.push(member.clone());
        self.commit(&members, &member.id, ChangeAction::Upsert);
        tracing::info!(member_id = %member.id, "Member added");
        Ok(member)
    }

    pub fn update_member(&self, id: &str, update: MemberUpdate) -> AppResult<Member> {
        let mut members = self.members.write();
        let Some(index) = members.iter().position(|m| m.id == id) else {
            return Err(AppError::not_found(format!("Member {id}")));
        };

        let mut draft = members[index].clone();
        if let Some(name) = update.name {
            draft.name = name;
        }
        if let Some(phone) = update.phone {
            draft.phone = Some(phone).filter(|p| !p.is_empty());
        }
        if let Some(email) = update.email {
            draft.email = Some(email).filter(|e| !e.is_empty());
        }
        if let Some(points) = update.points {
            draft.points = points;
        }
        if let Some(notes) = update.notes {
            draft.notes = notes;
        }
        if let Err(e) = validate(&draft) {
            tracing::warn!(member_id = %id, error = %e, "Rejected member update");
            return Err(e);
        }

        draft.updated_at = self.clock.now_millis();
        members[index] = draft.clone();
        self.commit(&members, id, ChangeAction::Upsert);
        Ok(draft)
    }

    pub fn delete_member(&self, id: &str) -> AppResult<Member> {
        let mut members = self.members.write();
        let Some(index) = members.iter().position(|m| m.id == id) else {
            return Err(AppError::not_found(format!("Member {id}")));
        };
        let removed = members.remove(index);
        self.commit(&members, id, ChangeAction::Delete);
        tracing::info!(member_id = %id, "Member deleted");
        Ok(removed)
    }

    pub fn set_members(&self, list: Vec<Member>) {
        let mut members = self.members.write();
        *members = list;
        storage::persist_collection(self.persist.as_ref(), keys::MEMBERS, &*members);
        tracing::info!(count = members.len(), "Members replaced");
    }

    fn commit(&self, members: &[Member], id: &str, action: ChangeAction) {
        storage::persist_collection(self.persist.as_ref(), keys::MEMBERS, members);
        self.bus.publish(Collection::Members, id, action);
    }

    pub fn get(&self, id: &str) -> Option<Member> {
        self.members.read().iter().find(|m| m.id == id).cloned()
    }

    /// Case-insensitive match on name, exact-prefix match on phone
    pub fn search(&self, query: &str) -> Vec<Member> {
        let needle = query.trim().to_lowercase();
        self.members
            .read()
            .iter()
            .filter(|m| {
                m.name.to_lowercase().contains(&needle)
                    || m.phone.as_deref().is_some_and(|p| p.starts_with(query.trim()))
            })
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Member> {
        self.members.read().clone()
    }
}
