//! Synthetic contact data for a development user.
//!
//! Seeded rows are recognizable by their email domain; every run removes the
//! previous batch for that user before inserting a fresh one.

use clap::Parser;
use rand::{seq::SliceRandom, Rng};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::{
    auth::repo::UserRepo,
    contacts::{
        repo::ContactRepo,
        repo_types::{ContactType, NewContact},
    },
};

pub const SEED_DOMAIN: &str = "@seed.faker";
pub const NUMBER_OF_CONTACTS: usize = 50;

const COUNTRY_CODES: [&str; 7] = ["+46", "+47", "+45", "+358", "+49", "+44", "+1"];

const FIRST_NAMES: &[&str] = &[
    "Astrid", "Bjorn", "Clara", "David", "Elsa", "Filip", "Greta", "Hugo", "Ingrid", "Johan",
    "Karin", "Lars", "Maja", "Nils", "Olivia", "Per", "Rut", "Sven", "Tove", "Viktor",
];

const LAST_NAMES: &[&str] = &[
    "Andersson", "Berg", "Carlsson", "Dahl", "Ek", "Forsberg", "Gustafsson", "Holm", "Isaksson",
    "Johansson", "Karlsson", "Lind", "Nilsson", "Olsson", "Persson", "Svensson",
];

const WORDS: &[&str] = &[
    "alpha", "amber", "brisk", "cedar", "delta", "ember", "fjord", "gale", "harbor", "iris",
    "juniper", "kestrel", "lumen", "maple", "north", "orbit",
];

#[derive(Parser, Debug)]
#[clap(name = "seed", about = "Insert synthetic contacts for an existing user")]
pub struct SeedArgs {
    /// Email of the user who will own the contacts
    #[clap(long)]
    pub email: String,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("user with email {0} not found; create the user first")]
    UserNotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub deleted: u64,
    pub created: u64,
}

fn pick<'a, R: Rng>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn phone<R: Rng>(rng: &mut R) -> Option<String> {
    if !rng.gen_bool(0.5) {
        return None;
    }
    let code = pick(rng, &COUNTRY_CODES);
    let first = rng.gen_range(1..=9);
    let rest: String = (0..8).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect();
    Some(format!("{code}{first}{rest}"))
}

/// One synthetic contact; `index` keeps emails unique within a batch.
pub fn fake_contact<R: Rng>(rng: &mut R, index: usize, now: OffsetDateTime) -> NewContact {
    let first_name = pick(rng, FIRST_NAMES);
    let last_name = pick(rng, LAST_NAMES);
    let email = format!(
        "{}_{}.{}{}{}",
        pick(rng, WORDS),
        first_name.to_lowercase(),
        last_name.to_lowercase(),
        index,
        SEED_DOMAIN
    );
    let age = Duration::seconds(rng.gen_range(1..=365 * 24 * 60 * 60));
    NewContact {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email,
        phone: phone(rng),
        contact_type: *ContactType::ALL.choose(rng).unwrap_or(&ContactType::Lead),
        created_at: Some(now - age),
    }
}

pub async fn run<R: Rng>(
    users: &dyn UserRepo,
    contacts: &dyn ContactRepo,
    email: &str,
    rng: &mut R,
) -> Result<SeedReport, SeedError> {
    let email = email.trim().to_lowercase();
    info!(%email, "starting seed");

    let user = users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| SeedError::UserNotFound(email.clone()))?;
    info!(user_id = %user.id, "found user");

    let deleted = contacts
        .delete_by_email_suffix(user.id, SEED_DOMAIN)
        .await?;
    info!(user_id = %user.id, deleted, "removed previously seeded contacts");

    let now = OffsetDateTime::now_utc();
    let rows: Vec<NewContact> = (0..NUMBER_OF_CONTACTS)
        .map(|i| fake_contact(rng, i, now))
        .collect();
    let created = contacts.insert_many(user.id, rows).await?;
    info!(user_id = %user.id, created, "seed finished");

    Ok(SeedReport { deleted, created })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn email_flag_is_required() {
        assert!(SeedArgs::try_parse_from(["seed"]).is_err());
        let args = SeedArgs::try_parse_from(["seed", "--email=a@x.com"]).unwrap();
        assert_eq!(args.email, "a@x.com");
    }

    #[tokio::test]
    async fn second_run_replaces_first_batch() {
        let store = MemoryStore::new();
        let user = store.insert_user("owner@x.com", None, true);
        store.insert_contact(user.id, "real@customer.com");
        let mut rng = StdRng::seed_from_u64(7);

        let first = run(&store, &store, "OWNER@x.com", &mut rng).await.unwrap();
        let second = run(&store, &store, "owner@x.com", &mut rng).await.unwrap();

        assert_eq!(first, SeedReport { deleted: 0, created: 50 });
        assert_eq!(second, SeedReport { deleted: 50, created: 50 });
        let contacts = store.contacts_of(user.id);
        let seeded = contacts
            .iter()
            .filter(|c| c.email.ends_with(SEED_DOMAIN))
            .count();
        assert_eq!(seeded, NUMBER_OF_CONTACTS);
        assert_eq!(contacts.len(), NUMBER_OF_CONTACTS + 1);
    }

    #[tokio::test]
    async fn unknown_user_writes_nothing() {
        let store = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let err = run(&store, &store, "ghost@x.com", &mut rng).await.unwrap_err();
        assert!(matches!(err, SeedError::UserNotFound(_)));
    }

    #[test]
    fn fake_contacts_look_right() {
        let mut rng = StdRng::seed_from_u64(42);
        let now = OffsetDateTime::now_utc();
        for i in 0..200 {
            let c = fake_contact(&mut rng, i, now);
            assert!(c.email.ends_with(&format!("{i}{SEED_DOMAIN}")));
            let created = c.created_at.unwrap();
            assert!(created < now && created >= now - Duration::days(366));
            if let Some(phone) = c.phone {
                let code = COUNTRY_CODES
                    .iter()
                    .find(|code| phone.starts_with(*code))
                    .expect("known country code");
                let digits = &phone[code.len()..];
                assert_eq!(digits.len(), 9);
                assert!(!digits.starts_with('0'));
            }
        }
    }
}
