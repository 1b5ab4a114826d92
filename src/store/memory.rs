//! In-process datastore used for local development and tests.
//!
//! Every map is a `DashMap`; a transition holds the request's entry lock while it
//! checks the status, applies the side effect and writes the new status, which makes
//! the conditional write atomic against concurrent resolvers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{Datastore, EffectOutcome, SideEffect, StoreError, Transition};
use crate::models::approval::{ApprovalRequest, RequestStatus};
use crate::models::chemical::{Chemical, StockDeduction, UsageRecord};
use crate::models::user::{ActorTier, Role, UserAccount, UserStatus};

#[derive(Clone, Default)]
pub struct MemoryStore {
    requests: Arc<DashMap<Uuid, ApprovalRequest>>,
    users: Arc<DashMap<Uuid, UserAccount>>,
    emails: Arc<DashMap<String, Uuid>>,
    chemicals: Arc<DashMap<String, Chemical>>,
    usage: Arc<DashMap<Uuid, UsageRecord>>,
    counters: Arc<DashMap<String, i64>>,
    offline: Arc<AtomicBool>,
    directory_offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every call fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// When set, only approver address lookups fail.
    pub fn set_directory_unavailable(&self, offline: bool) {
        self.directory_offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    fn put_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        match self.emails.entry(user.email.to_lowercase()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!("user {}", user.email))),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(())
            }
        }
    }

    fn apply_effect(&self, effect: &SideEffect) -> EffectOutcome {
        match effect {
            SideEffect::None => EffectOutcome::Nothing,
            SideEffect::SetUserStatus { user_id, status } => match self.users.get_mut(user_id) {
                Some(mut user) => {
                    user.status = *status;
                    EffectOutcome::Applied
                }
                None => EffectOutcome::SubjectMissing,
            },
            SideEffect::DeleteUser { user_id } => match self.users.remove(user_id) {
                Some((_, user)) => {
                    self.emails.remove(&user.email.to_lowercase());
                    EffectOutcome::Applied
                }
                None => EffectOutcome::SubjectMissing,
            },
            SideEffect::DeleteChemical { chemical_id } => {
                match self.chemicals.remove(chemical_id) {
                    Some(_) => EffectOutcome::Applied,
                    None => EffectOutcome::SubjectMissing,
                }
            }
        }
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn insert_request(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        self.check_online()?;
        match self.requests.entry(request.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!("request {}", request.id))),
            Entry::Vacant(slot) => {
                slot.insert(request.clone());
                Ok(())
            }
        }
    }

    async fn insert_registration(
        &self,
        user: &UserAccount,
        request: &ApprovalRequest,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        self.put_user(user)?;
        if let Entry::Vacant(slot) = self.requests.entry(request.id) {
            slot.insert(request.clone());
            return Ok(());
        }
        // roll back the user so the pair stays all-or-nothing
        self.users.remove(&user.id);
        self.emails.remove(&user.email.to_lowercase());
        Err(StoreError::Duplicate(format!("request {}", request.id)))
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<ApprovalRequest>, StoreError> {
        self.check_online()?;
        Ok(self.requests.get(&id).map(|r| r.value().clone()))
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        self.check_online()?;
        let mut rows: Vec<ApprovalRequest> = self
            .requests
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn apply_transition(
        &self,
        transition: &Transition,
    ) -> Result<Option<EffectOutcome>, StoreError> {
        self.check_online()?;
        let Some(mut request) = self.requests.get_mut(&transition.request_id) else {
            return Ok(None);
        };
        if request.status != transition.from {
            return Ok(None);
        }
        let outcome = self.apply_effect(&transition.effect);
        request.status = transition.to;
        request.updated_at = Utc::now();
        Ok(Some(outcome))
    }

    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        self.check_online()?;
        self.put_user(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        self.check_online()?;
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        self.check_online()?;
        let id = match self.emails.get(&email.to_lowercase()) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn list_actor_emails(&self, tier: ActorTier) -> Result<Vec<String>, StoreError> {
        self.check_online()?;
        if self.directory_offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        let role = Role::from(tier);
        let mut emails: Vec<String> = self
            .users
            .iter()
            .filter(|u| u.role == role && u.status == UserStatus::Approved)
            .map(|u| u.email.clone())
            .collect();
        emails.sort();
        Ok(emails)
    }

    async fn insert_chemical(&self, chemical: &Chemical) -> Result<(), StoreError> {
        self.check_online()?;
        match self.chemicals.entry(chemical.chemical_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!(
                "chemical {}",
                chemical.chemical_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(chemical.clone());
                Ok(())
            }
        }
    }

    async fn get_chemical(&self, chemical_id: &str) -> Result<Option<Chemical>, StoreError> {
        self.check_online()?;
        Ok(self.chemicals.get(chemical_id).map(|c| c.value().clone()))
    }

    async fn list_chemicals(&self) -> Result<Vec<Chemical>, StoreError> {
        self.check_online()?;
        let mut rows: Vec<Chemical> = self.chemicals.iter().map(|c| c.value().clone()).collect();
        rows.sort_by(|a, b| a.chemical_id.cmp(&b.chemical_id));
        Ok(rows)
    }

    async fn deduct_stock(
        &self,
        chemical_id: &str,
        quantity: f64,
        usage: &UsageRecord,
    ) -> Result<StockDeduction, StoreError> {
        self.check_online()?;
        let Some(mut chemical) = self.chemicals.get_mut(chemical_id) else {
            return Ok(StockDeduction::NotFound);
        };
        if chemical.quantity_available < quantity {
            return Ok(StockDeduction::Insufficient {
                available: chemical.quantity_available,
            });
        }
        chemical.quantity_available -= quantity;
        self.usage.insert(usage.id, usage.clone());
        Ok(StockDeduction::Issued {
            remaining: chemical.quantity_available,
        })
    }

    async fn list_usage(&self, user_id: Option<Uuid>) -> Result<Vec<UsageRecord>, StoreError> {
        self.check_online()?;
        let mut rows: Vec<UsageRecord> = self
            .usage
            .iter()
            .filter(|r| user_id.map_or(true, |id| r.user_id == id))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by(|a, b| b.used_at.cmp(&a.used_at));
        Ok(rows)
    }

    async fn next_sequence(&self, name: &str) -> Result<i64, StoreError> {
        self.check_online()?;
        let mut value = self.counters.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::RequestKind;
    use chrono::NaiveDate;

    fn user(email: &str, role: Role, status: UserStatus) -> UserAccount {
        UserAccount {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: email.into(),
            password_hash: String::new(),
            role,
            salutation: "Dr".into(),
            designation: "Other".into(),
            department: "Chemistry".into(),
            contact_number: "000".into(),
            joining_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            status,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected_case_insensitively() {
        let store = MemoryStore::new();
        store
            .insert_user(&user("a@lab.org", Role::User, UserStatus::Pending))
            .await
            .unwrap();
        let err = store
            .insert_user(&user("A@Lab.org", Role::User, UserStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let store = MemoryStore::new();
        let req = ApprovalRequest::new(
            RequestKind::NewChemicalRequest,
            "Toluene",
            Uuid::new_v4(),
            "Asha",
            serde_json::json!({}),
        );
        store.insert_request(&req).await.unwrap();

        let stale = Transition {
            request_id: req.id,
            from: RequestStatus::AdminApproved,
            to: RequestStatus::Approved,
            effect: SideEffect::None,
        };
        assert_eq!(store.apply_transition(&stale).await.unwrap(), None);

        let ok = Transition {
            from: RequestStatus::Pending,
            to: RequestStatus::AdminApproved,
            ..stale
        };
        assert_eq!(
            store.apply_transition(&ok).await.unwrap(),
            Some(EffectOutcome::Nothing)
        );
        let stored = store.get_request(req.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::AdminApproved);
    }

    #[tokio::test]
    async fn test_actor_emails_only_include_approved_accounts_of_tier() {
        let store = MemoryStore::new();
        for u in [
            user("admin@lab.org", Role::Admin, UserStatus::Approved),
            user("pending-admin@lab.org", Role::Admin, UserStatus::Pending),
            user("boss@lab.org", Role::SuperAdmin, UserStatus::Approved),
            user("student@lab.org", Role::User, UserStatus::Approved),
        ] {
            store.insert_user(&u).await.unwrap();
        }
        assert_eq!(
            store.list_actor_emails(ActorTier::Admin).await.unwrap(),
            vec!["admin@lab.org".to_string()]
        );
        assert_eq!(
            store.list_actor_emails(ActorTier::SuperAdmin).await.unwrap(),
            vec!["boss@lab.org".to_string()]
        );
    }

    #[tokio::test]
    async fn test_counter_starts_at_one() {
        let store = MemoryStore::new();
        assert_eq!(store.next_sequence("chemicalId").await.unwrap(), 1);
        assert_eq!(store.next_sequence("chemicalId").await.unwrap(), 2);
        assert_eq!(store.next_sequence("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_usage_is_filtered_by_user_and_newest_first() {
        let store = MemoryStore::new();
        let chem = Chemical {
            chemical_id: "CHEM-001".into(),
            chemical_name: "Ethanol".into(),
            chemical_type: "Hydrous".into(),
            grade: "AR".into(),
            phase: "Liquid".into(),
            quantity_available: 10.0,
            unit: "L".into(),
            make: None,
            date_of_mfg: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            date_of_exp: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            rack: "C3".into(),
            created_at: Utc::now(),
        };
        store.insert_chemical(&chem).await.unwrap();

        let (asha, ravi) = (Uuid::new_v4(), Uuid::new_v4());
        for (i, user_id) in [asha, ravi, asha].into_iter().enumerate() {
            let usage = UsageRecord {
                id: Uuid::new_v4(),
                user_id,
                user_name: "n".into(),
                chemical_id: chem.chemical_id.clone(),
                chemical_name: chem.chemical_name.clone(),
                quantity_used: 1.0 + i as f64,
                unit: "L".into(),
                used_at: Utc::now() + chrono::Duration::seconds(i as i64),
            };
            store.deduct_stock(&chem.chemical_id, 1.0, &usage).await.unwrap();
        }

        assert_eq!(store.list_usage(None).await.unwrap().len(), 3);
        let mine = store.list_usage(Some(asha)).await.unwrap();
        assert_eq!(
            mine.iter().map(|r| r.quantity_used).collect::<Vec<_>>(),
            vec![3.0, 1.0]
        );
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.list_chemicals().await,
            Err(StoreError::Unavailable)
        ));
        store.set_unavailable(false);
        assert!(store.list_chemicals().await.unwrap().is_empty());
    }
}
