use argon2::{
    Argon2,
    PasswordHash,
    PasswordVerifier,
    PasswordHasher,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Verify a password against the argon2 PHC string in usuarios.password.
/// Anything that is not a PHC string (e.g. a legacy plain-text value) never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Verified against when the correo is unknown so both login paths pay for argon2.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("sin-usuario").unwrap_or_default());

/// Login check that costs the same whether or not the usuario exists.
pub fn verify_login(password: &str, stored_hash: Option<&str>) -> bool {
    match stored_hash {
        Some(stored) => verify_password(password, stored),
        None => {
            let _ = verify_password(password, &DUMMY_HASH);
            false
        }
    }
}

/// Hash a new password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut PHOsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| format!("argon2 hash error: {e}"))
}

pub fn validate_new_password(pw: &str) -> Result<(), String> {
    if pw.trim().chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "la contraseña debe tener al menos {MIN_PASSWORD_LEN} caracteres"
        ));
    }
    Ok(())
}

/// Opaque bearer token handed to the client; only its hash is persisted.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex of the token, as stored in session_token.session_token_hash.
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies_and_rejects_others() {
        let phc = hash_password("sonrisa-2025").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password("sonrisa-2025", &phc));
        assert!(!verify_password("sonrisa-2024", &phc));
    }

    #[test]
    fn plain_text_stored_value_never_matches() {
        assert!(!verify_password("123456", "123456"));
    }

    #[test]
    fn unknown_usuario_still_runs_argon2_and_fails() {
        assert!(PasswordHash::new(&DUMMY_HASH).is_ok());
        assert!(!verify_login("sin-usuario", None));
        let phc = hash_password("sonrisa-2025").unwrap();
        assert!(verify_login("sonrisa-2025", Some(&phc)));
    }

    #[test]
    fn tokens_are_unique_and_hash_is_stable() {
        let a = generate_access_token();
        let b = generate_access_token();
        assert_ne!(a, b);
        assert_eq!(hash_access_token(&a), hash_access_token(&a));
        assert_eq!(hash_access_token(&a).len(), 64);
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_new_password("corta").is_err());
        assert!(validate_new_password("suficiente").is_ok());
    }
}
