//! In-memory storage used by unit and router tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepo,
        repo_types::{
            Account, NewUser, OAuthUser, ProviderAccount, Role, TokenPurpose, User,
            VerificationToken,
        },
    },
    contacts::{
        repo::ContactRepo,
        repo_types::{Contact, ContactPatch, ContactType, NewContact},
    },
    interactions::repo::InteractionRepo,
    mailer::{Mailer, OutgoingMail},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    accounts: Vec<Account>,
    tokens: Vec<VerificationToken>,
    contacts: Vec<Contact>,
    interactions: Vec<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

fn new_user(new: NewUser) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        email: new.email,
        name: new.name,
        image: new.image,
        password_hash: new.password_hash,
        email_verified: new.email_verified,
        role: new.role,
        created_at: now,
        updated_at: now,
    }
}

fn account_row(user_id: Uuid, a: &ProviderAccount) -> Account {
    Account {
        id: Uuid::new_v4(),
        user_id,
        provider_type: a.provider_type.clone(),
        provider: a.provider.clone(),
        provider_account_id: a.provider_account_id.clone(),
        access_token: a.access_token.clone(),
        expires_at: a.expires_at,
        refresh_token: a.refresh_token.clone(),
        id_token: a.id_token.clone(),
        scope: a.scope.clone(),
        session_state: a.session_state.clone(),
        token_type: a.token_type.clone(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    fn writable(&self) -> anyhow::Result<MutexGuard<'_, Tables>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated write failure"));
        }
        Ok(self.tables())
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn insert_user(&self, email: &str, password_hash: Option<&str>, verified: bool) -> User {
        let user = new_user(NewUser {
            email: email.to_string(),
            name: None,
            image: None,
            password_hash: password_hash.map(str::to_string),
            role: Role::User,
            email_verified: verified.then(OffsetDateTime::now_utc),
        });
        self.tables().users.push(user.clone());
        user
    }

    pub fn find_user(&self, email: &str) -> Option<User> {
        self.tables().users.iter().find(|u| u.email == email).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.tables().users.len()
    }

    pub fn set_role(&self, id: Uuid, role: Role) {
        if let Some(u) = self.tables().users.iter_mut().find(|u| u.id == id) {
            u.role = role;
        }
    }

    pub fn remove_user(&self, id: Uuid) {
        let mut t = self.tables();
        t.users.retain(|u| u.id != id);
        t.accounts.retain(|a| a.user_id != id);
        t.contacts.retain(|c| c.user_id != id);
        t.interactions.retain(|(u, _)| *u != id);
    }

    pub fn accounts_of(&self, user_id: Uuid) -> Vec<Account> {
        self.tables()
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn account_count(&self) -> usize {
        self.tables().accounts.len()
    }

    pub fn contacts_of(&self, user_id: Uuid) -> Vec<Contact> {
        self.tables()
            .contacts
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn insert_contact(&self, user_id: Uuid, email: &str) -> Contact {
        let now = OffsetDateTime::now_utc();
        let contact = Contact {
            id: Uuid::new_v4(),
            user_id,
            first_name: "Test".into(),
            last_name: "Contact".into(),
            email: email.to_string(),
            phone: None,
            contact_type: ContactType::Lead,
            created_at: now,
            updated_at: now,
        };
        self.tables().contacts.push(contact.clone());
        contact
    }

    pub fn interaction_count(&self) -> usize {
        self.tables().interactions.len()
    }

    fn link(t: &mut Tables, user_id: Uuid, account: &ProviderAccount) -> bool {
        if t.accounts.iter().any(|a| account.matches(a)) {
            return false;
        }
        t.accounts.push(account_row(user_id, account));
        true
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find_user(email))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email_with_accounts(
        &self,
        email: &str,
    ) -> anyhow::Result<Option<(User, Vec<Account>)>> {
        Ok(self.find_user(email).map(|u| {
            let accounts = self.accounts_of(u.id);
            (u, accounts)
        }))
    }

    async fn find_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let t = self.tables();
        Ok(t.accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_account_id == provider_account_id)
            .and_then(|a| t.users.iter().find(|u| u.id == a.user_id))
            .cloned())
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let mut t = self.writable()?;
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(anyhow!("duplicate email"));
        }
        let user = new_user(new);
        t.users.push(user.clone());
        Ok(user)
    }

    async fn create_with_account(
        &self,
        new: NewUser,
        account: &ProviderAccount,
    ) -> anyhow::Result<User> {
        let mut t = self.writable()?;
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(anyhow!("duplicate email"));
        }
        let owner = t.accounts.iter().find(|a| account.matches(a)).map(|a| a.user_id);
        if let Some(owner) = owner {
            return t
                .users
                .iter()
                .find(|u| u.id == owner)
                .cloned()
                .ok_or_else(|| anyhow!("account owner missing"));
        }
        let user = new_user(new);
        Self::link(&mut t, user.id, account);
        t.users.push(user.clone());
        Ok(user)
    }

    async fn link_account(&self, user_id: Uuid, account: &ProviderAccount) -> anyhow::Result<bool> {
        let mut t = self.writable()?;
        Ok(Self::link(&mut t, user_id, account))
    }

    async fn upsert_oauth_profile(
        &self,
        email: &str,
        profile: &OAuthUser,
        verified_at: OffsetDateTime,
    ) -> anyhow::Result<User> {
        let mut t = self.writable()?;
        if let Some(u) = t.users.iter_mut().find(|u| u.email == email) {
            u.name = profile.name.clone();
            u.image = profile.image.clone();
            u.email_verified = Some(verified_at);
            u.updated_at = OffsetDateTime::now_utc();
            return Ok(u.clone());
        }
        let user = new_user(NewUser {
            email: email.to_string(),
            name: profile.name.clone(),
            image: profile.image.clone(),
            password_hash: None,
            role: Role::User,
            email_verified: Some(verified_at),
        });
        t.users.push(user.clone());
        Ok(user)
    }

    async fn mark_email_verified(&self, email: &str, at: OffsetDateTime) -> anyhow::Result<bool> {
        let mut t = self.writable()?;
        Ok(match t.users.iter_mut().find(|u| u.email == email) {
            Some(u) => {
                u.email_verified = Some(at);
                true
            }
            None => false,
        })
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let mut t = self.writable()?;
        if let Some(u) = t.users.iter_mut().find(|u| u.id == user_id) {
            u.password_hash = Some(password_hash.to_string());
        }
        Ok(())
    }

    async fn save_token(&self, token: &VerificationToken) -> anyhow::Result<()> {
        let mut t = self.writable()?;
        t.tokens
            .retain(|x| !(x.identifier == token.identifier && x.purpose == token.purpose));
        t.tokens.push(token.clone());
        Ok(())
    }

    async fn take_token(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> anyhow::Result<Option<VerificationToken>> {
        let mut t = self.writable()?;
        let pos = t
            .tokens
            .iter()
            .position(|x| x.token == token && x.purpose == purpose);
        Ok(pos.map(|i| t.tokens.remove(i)))
    }
}

#[async_trait]
impl ContactRepo for MemoryStore {
    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Contact>> {
        let mut rows = self.contacts_of(user_id);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        Ok(self
            .tables()
            .contacts
            .iter()
            .find(|c| c.id == id && c.user_id == user_id)
            .cloned())
    }

    async fn create(&self, user_id: Uuid, new: NewContact) -> anyhow::Result<Contact> {
        let mut t = self.writable()?;
        let now = OffsetDateTime::now_utc();
        let contact = Contact {
            id: Uuid::new_v4(),
            user_id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            contact_type: new.contact_type,
            created_at: new.created_at.unwrap_or(now),
            updated_at: now,
        };
        t.contacts.push(contact.clone());
        Ok(contact)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> anyhow::Result<Option<Contact>> {
        let mut t = self.writable()?;
        let Some(c) = t
            .contacts
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user_id)
        else {
            return Ok(None);
        };
        if let Some(v) = patch.first_name {
            c.first_name = v;
        }
        if let Some(v) = patch.last_name {
            c.last_name = v;
        }
        if let Some(v) = patch.email {
            c.email = v;
        }
        if let Some(v) = patch.phone {
            c.phone = v;
        }
        if let Some(v) = patch.contact_type {
            c.contact_type = v;
        }
        c.updated_at = OffsetDateTime::now_utc();
        Ok(Some(c.clone()))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.writable()?;
        let before = t.contacts.len();
        t.contacts.retain(|c| !(c.id == id && c.user_id == user_id));
        let deleted = t.contacts.len() != before;
        if deleted {
            t.interactions.retain(|(_, contact)| *contact != id);
        }
        Ok(deleted)
    }

    async fn delete_by_email_suffix(&self, user_id: Uuid, suffix: &str) -> anyhow::Result<u64> {
        let mut t = self.writable()?;
        let before = t.contacts.len();
        t.contacts
            .retain(|c| !(c.user_id == user_id && c.email.ends_with(suffix)));
        Ok((before - t.contacts.len()) as u64)
    }

    async fn insert_many(&self, user_id: Uuid, rows: Vec<NewContact>) -> anyhow::Result<u64> {
        let n = rows.len() as u64;
        for row in rows {
            ContactRepo::create(self, user_id, row).await?;
        }
        Ok(n)
    }
}

#[async_trait]
impl InteractionRepo for MemoryStore {
    async fn upsert_viewed(&self, user_id: Uuid, contact_id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.writable()?;
        if !t
            .contacts
            .iter()
            .any(|c| c.id == contact_id && c.user_id == user_id)
        {
            return Ok(false);
        }
        if !t.interactions.contains(&(user_id, contact_id)) {
            t.interactions.push((user_id, contact_id));
        }
        Ok(true)
    }

    async fn viewed_contact_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        Ok(self
            .tables()
            .interactions
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, c)| *c)
            .collect())
    }
}

/// Mailer that keeps every message for inspection.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub fn last(&self) -> Option<OutgoingMail> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}
