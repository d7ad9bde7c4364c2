//! Phone-based identity resolution.
//!
//! Two login flows coexist, named after what they do:
//! - strict OTP (`request_code` + `verify_code_and_login`): only known
//!   phones get a code, so the portal never provisions strangers;
//! - implicit provisioning (`implicit_login`): the legacy `/login` endpoint
//!   that finds-or-creates an account for any phone.
//!
//! Phones arrived in two historical formats. Every lookup matches both, and
//! the verify path opportunistically repairs rows: duplicates are merged
//! into one surviving account and the stored phone is rewritten to its
//! canonical digits-only form.

use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::error::{is_unique_violation, ApiError};
use crate::phone::{lookup_forms, normalize_phone};
use crate::state::AppState;
use crate::tokens;

use super::repo::{self, Account};

const CODE_TTL: Duration = Duration::from_secs(300);

/// Name prefixes of auto-created guest accounts. A merge prefers any account
/// whose name is not one of these defaults.
const DEFAULT_NAME_PREFIXES: [&str; 2] = ["Клиент", "Client"];

fn code_cache_key(canonical: &str) -> String {
    format!("sms_code_{canonical}")
}

fn generate_code() -> u32 {
    rand::thread_rng().gen_range(1000..=9999)
}

/// Cached and submitted codes are interchangeable numeric/text values.
fn codes_match(cached: &str, submitted: &str) -> bool {
    let cached = cached.trim();
    let submitted = submitted.trim();
    if cached == submitted {
        return true;
    }
    match (cached.parse::<u64>(), submitted.parse::<u64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Index of the account that survives a duplicate merge: the first whose
/// name is not an auto-generated default, else the first in stored order.
fn pick_survivor(accounts: &[Account]) -> usize {
    accounts
        .iter()
        .position(|a| {
            !DEFAULT_NAME_PREFIXES
                .iter()
                .any(|prefix| a.name.starts_with(prefix))
        })
        .unwrap_or(0)
}

/// Generates a 4-digit code for a known phone and sends it by SMS.
///
/// Unknown phones fail `NotFound` before anything is generated or cached.
/// The cached code survives a delivery failure, so a retry resends against
/// the same pending code.
pub async fn request_code(state: &AppState, raw_phone: &str) -> Result<(), ApiError> {
    let canonical = normalize_phone(raw_phone);
    if canonical.is_empty() {
        return Err(ApiError::Validation("Введите телефон.".into()));
    }

    let forms = lookup_forms(&canonical);
    let known = repo::exists_by_phones(&state.db, &forms).await?;
    generate_and_send(state, &canonical, known).await
}

/// Seam below the account lookup: refuses unknown phones before anything
/// is generated or cached.
async fn generate_and_send(
    state: &AppState,
    canonical: &str,
    account_exists: bool,
) -> Result<(), ApiError> {
    if !account_exists {
        return Err(ApiError::NotFound(
            "Пользователь с таким номером не найден".into(),
        ));
    }

    let code = generate_code();
    state
        .codes
        .put(&code_cache_key(canonical), &code.to_string(), CODE_TTL);

    let message = format!("Код подтверждения: {code}");
    if let Err(e) = state.sms.send(canonical, &message).await {
        warn!(phone = %canonical, error = %e, "sms delivery failed");
        return Err(ApiError::DeliveryFailed);
    }

    info!(phone = %canonical, "sms code sent");
    Ok(())
}

/// Verifies the submitted code and logs the account in, merging duplicate
/// rows and canonicalizing the stored phone along the way.
pub async fn verify_code_and_login(
    state: &AppState,
    raw_phone: &str,
    submitted_code: &str,
) -> Result<(String, Account), ApiError> {
    let canonical = normalize_phone(raw_phone);

    // Compare-and-delete under one lock: of two racing verifiers only the
    // first consumes the code, and a mismatch leaves the pending code in
    // place for another attempt.
    state
        .codes
        .take_if(&code_cache_key(&canonical), |cached| {
            codes_match(cached, submitted_code)
        })
        .ok_or(ApiError::InvalidOrExpiredCode)?;

    let forms = lookup_forms(&canonical);
    let accounts = repo::find_by_phones(&state.db, &forms).await?;
    if accounts.is_empty() {
        // send-code checked existence, but the account may have been
        // deleted in between.
        return Err(ApiError::NotFound("Пользователь не найден".into()));
    }

    let survivor_idx = pick_survivor(&accounts);
    let mut survivor = accounts[survivor_idx].clone();

    if accounts.len() > 1 {
        let mut tx = state
            .db
            .begin()
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        for account in accounts.iter().filter(|a| a.id != survivor.id) {
            repo::reassign_orders(&mut tx, account.id, survivor.id)
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            repo::delete_in_tx(&mut tx, account.id)
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            info!(merged = %account.id, into = %survivor.id, "merged duplicate account");
        }
        tx.commit()
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
    }

    if survivor.phone != canonical {
        match repo::set_phone(&state.db, survivor.id, &canonical).await {
            Ok(()) => survivor.phone = canonical.clone(),
            // A concurrent login already repaired the row.
            Err(e) if is_unique_violation(&e) => {}
            Err(e) => return Err(ApiError::Internal(e.to_string())),
        }
    }

    let token = tokens::issue(&state.db, tokens::KIND_ACCOUNT, survivor.id, None).await?;
    info!(account_id = %survivor.id, "client logged in");
    Ok((token, survivor))
}

/// Legacy find-or-create login kept for old clients. Unknown phones get a
/// guest account on the spot, named with a default prefix so a later merge
/// treats it as expendable.
pub async fn implicit_login(
    state: &AppState,
    raw_phone: &str,
) -> Result<(String, Account), ApiError> {
    let canonical = normalize_phone(raw_phone);
    if canonical.is_empty() {
        return Err(ApiError::Validation("Введите телефон.".into()));
    }

    let forms = lookup_forms(&canonical);
    let accounts = repo::find_by_phones(&state.db, &forms).await?;
    let account = match accounts.into_iter().next() {
        Some(existing) => existing,
        None => {
            let suffix = &canonical[canonical.len().saturating_sub(4)..];
            let account =
                repo::create_guest(&state.db, &canonical, &format!("Клиент {suffix}")).await?;
            info!(account_id = %account.id, "guest account provisioned");
            account
        }
    };

    let token = tokens::issue(&state.db, tokens::KIND_ACCOUNT, account.id, None).await?;
    Ok((token, account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn account(name: &str, phone: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: None,
            phone: phone.to_string(),
            organization_name: String::new(),
            inn: String::new(),
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn generated_codes_stay_in_range() {
        for _ in 0..1000 {
            let code = generate_code();
            assert!((1000..=9999).contains(&code));
        }
    }

    #[test]
    fn codes_match_coerces_types() {
        assert!(codes_match("1234", "1234"));
        assert!(codes_match("1234", " 1234 "));
        assert!(codes_match(" 1234", "1234"));
        assert!(!codes_match("1234", "4321"));
        assert!(!codes_match("1234", ""));
        assert!(!codes_match("1234", "12a4"));
    }

    #[test]
    fn survivor_prefers_custom_name() {
        let accounts = vec![
            account("Клиент 6789", "79123456789"),
            account("ООО Ромашка", "+7 (912) 345-67-89"),
            account("Client 6789", "79123456789"),
        ];
        assert_eq!(pick_survivor(&accounts), 1);
    }

    #[test]
    fn survivor_falls_back_to_first_when_all_are_defaults() {
        let accounts = vec![
            account("Клиент 6789", "79123456789"),
            account("Client 6789", "+7 (912) 345-67-89"),
        ];
        assert_eq!(pick_survivor(&accounts), 0);
    }

    #[test]
    fn survivor_is_first_for_single_account() {
        let accounts = vec![account("Клиент 6789", "79123456789")];
        assert_eq!(pick_survivor(&accounts), 0);
    }

    #[test]
    fn cache_key_is_deterministic_per_phone() {
        assert_eq!(code_cache_key("79123456789"), code_cache_key("79123456789"));
        assert_ne!(code_cache_key("79123456789"), code_cache_key("79123456780"));
    }

    #[tokio::test]
    async fn wrong_code_keeps_the_pending_code() {
        let state = AppState::fake();
        let key = code_cache_key("79123456789");
        state.codes.put(&key, "1234", CODE_TTL);

        // The mismatch must fail before the code is consumed (and before
        // any account lookup).
        let err = verify_code_and_login(&state, "+7 (912) 345-67-89", "9999")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidOrExpiredCode));
        assert_eq!(state.codes.get(&key).as_deref(), Some("1234"));
    }

    #[tokio::test]
    async fn unknown_phone_fails_not_found_and_writes_nothing() {
        let state = AppState::fake();
        let err = generate_and_send(&state, "79123456789", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(state.codes.get(&code_cache_key("79123456789")), None);
    }

    #[tokio::test]
    async fn known_phone_caches_a_code_in_range() {
        let state = AppState::fake();
        generate_and_send(&state, "79123456789", true)
            .await
            .expect("console sms always delivers");

        let code = state
            .codes
            .get(&code_cache_key("79123456789"))
            .expect("code must be cached");
        let value: u32 = code.parse().expect("code is numeric");
        assert!((1000..=9999).contains(&value));
    }
}
