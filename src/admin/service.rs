//! Dual-tier admin authentication.
//!
//! The master identity lives in configuration: its email/password pair is
//! compared in plain text against `AdminRealmConfig` before any database
//! lookup, so the master can always log in even with a broken moderators
//! table. Moderators are ordinary rows with argon2-hashed passwords.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::{error, info, warn};

use crate::config::AdminRealmConfig;
use crate::error::{is_unique_violation, ApiError};
use crate::state::AppState;
use crate::tokens::{self, AdminAbility};

use super::repo::{self, Moderator};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Moderator password policy: at least 10 characters with lowercase,
/// uppercase and a digit.
pub fn check_password_policy(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 10 {
        return Err(ApiError::Validation(
            "Пароль должен содержать минимум 10 символов.".into(),
        ));
    }
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Err(ApiError::Validation(
            "Пароль должен содержать заглавные и строчные буквы, а также цифры.".into(),
        ));
    }
    Ok(())
}

/// Plain comparison against configuration; never touches stored hashes.
pub fn is_master(realm: &AdminRealmConfig, email: &str, password: &str) -> bool {
    email == realm.master_email && password == realm.master_password
}

/// Lazily creates the master's row so tokens have something to bind to.
/// The stored hash is a throwaway random value, never used for login.
pub async fn ensure_master_row(state: &AppState) -> Result<Moderator, ApiError> {
    let master_email = &state.config.admin.master_email;
    if let Some(existing) = repo::find_by_email(&state.db, master_email).await? {
        return Ok(existing);
    }

    let placeholder = hash_password(&tokens::generate_secret())?;
    match repo::create(&state.db, "Master Admin", master_email, &placeholder).await {
        Ok(created) => {
            info!(email = %master_email, "master admin row created");
            Ok(created)
        }
        // A concurrent login created it first.
        Err(e) if is_unique_violation(&e) => repo::find_by_email(&state.db, master_email)
            .await?
            .ok_or_else(|| ApiError::Internal("master row vanished".into())),
        Err(e) => Err(e.into()),
    }
}

/// Classifies a login attempt and issues an ability-scoped token.
pub async fn admin_login(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<(String, AdminAbility, Moderator), ApiError> {
    if !is_valid_email(email) {
        return Err(ApiError::Validation("Введите корректный Email.".into()));
    }
    if password.is_empty() {
        return Err(ApiError::Validation("Введите пароль.".into()));
    }

    if is_master(&state.config.admin, email, password) {
        let admin = ensure_master_row(state).await?;
        let token = tokens::issue(
            &state.db,
            tokens::KIND_ADMIN,
            admin.id,
            Some(AdminAbility::Master.as_str()),
        )
        .await?;
        info!(admin_id = %admin.id, "master logged in");
        return Ok((token, AdminAbility::Master, admin));
    }

    let moderator = repo::find_by_email(&state.db, email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !verify_password(password, &moderator.password_hash)? {
        warn!(email = %email, "moderator login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = tokens::issue(
        &state.db,
        tokens::KIND_ADMIN,
        moderator.id,
        Some(AdminAbility::Moderator.as_str()),
    )
    .await?;
    info!(admin_id = %moderator.id, "moderator logged in");
    Ok((token, AdminAbility::Moderator, moderator))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm() -> AdminRealmConfig {
        AdminRealmConfig {
            master_email: "master@example.com".into(),
            master_password: "master-secret".into(),
        }
    }

    #[test]
    fn master_classification_requires_both_fields() {
        let realm = realm();
        assert!(is_master(&realm, "master@example.com", "master-secret"));
        assert!(!is_master(&realm, "master@example.com", "wrong"));
        assert!(!is_master(&realm, "other@example.com", "master-secret"));
        assert!(!is_master(&realm, "", ""));
    }

    #[test]
    fn password_policy_accepts_strong_passwords() {
        assert!(check_password_policy("Aa1bbbbbbb").is_ok());
        assert!(check_password_policy("SuperSecret42").is_ok());
    }

    #[test]
    fn password_policy_rejects_weak_passwords() {
        assert!(check_password_policy("Aa1").is_err()); // too short
        assert!(check_password_policy("alllowercase1x").is_err()); // no upper
        assert!(check_password_policy("ALLUPPERCASE1X").is_err()); // no lower
        assert!(check_password_policy("NoDigitsHere!").is_err()); // no digit
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("admin@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("Secur3P@ssw0rd!").expect("hashing should succeed");
        assert!(verify_password("Secur3P@ssw0rd!", &hash).expect("verify should succeed"));
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }
}
