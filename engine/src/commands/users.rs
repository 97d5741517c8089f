use entity::user;

use crate::error::EngineError;
use crate::store::{NewUser, Store};

/// `RegisterUser` (§6). Password hashing and auth-token issuance belong to
/// the authentication collaborator (§1 Non-goals); this only persists the
/// User row from an already-hashed credential.
pub async fn register_user(
    store: &Store,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<user::Model, EngineError> {
    if !email_address::EmailAddress::is_valid(&email) {
        return Err(EngineError::Validation(format!("{email} is not a syntactically valid email address")));
    }

    store
        .create_user(NewUser { email, password_hash, first_name, last_name })
        .await
}

#[cfg(test)]
mod tests {
    #[test]
    fn rejects_obviously_malformed_email_before_touching_the_store() {
        assert!(!email_address::EmailAddress::is_valid("not-an-email"));
        assert!(email_address::EmailAddress::is_valid("ok@example.com"));
    }
}
