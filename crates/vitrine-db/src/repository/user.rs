//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (m=19456 KiB, t=2, p=1). A random 16-byte salt is generated per hash.
//! An optional pepper (server-side secret) is prepended before hashing.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vitrine_core::error::VitrineResult;
use vitrine_core::identity::SystemRole;
use vitrine_core::models::user::{CreateUser, User};
use vitrine_core::repository::{PaginatedResult, Pagination, UserRepository};

use super::CountRow;
use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    email: String,
    name: Option<String>,
    password_hash: String,
    system_role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let system_role = SystemRole::parse(&self.system_role).ok_or_else(|| {
            DbError::decode("user", format!("invalid system_role: {}", self.system_role))
        })?;
        Ok(User {
            id: parse_uuid("user", "id", &self.record_id)?,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            system_role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn peppered(password: &str, pepper: Option<&str>) -> Vec<u8> {
    match pepper {
        Some(p) => format!("{p}{password}").into_bytes(),
        None => password.as_bytes().to_vec(),
    }
}

/// Hash a password with Argon2id.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Password(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(&peppered(password, pepper), &salt)
        .map_err(|e| DbError::Password(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against an Argon2id hash.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, DbError> {
    use argon2::PasswordVerifier;

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| DbError::Password(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(&peppered(password, pepper), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::Password(format!("verify error: {e}"))),
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    /// Checks `password` against the stored hash of `user`.
    pub fn verify(&self, user: &User, password: &str) -> VitrineResult<bool> {
        Ok(verify_password(
            password,
            &user.password_hash,
            self.pepper.as_deref(),
        )?)
    }

    async fn fetch(&self, clause: &str, name: &'static str, value: String) -> VitrineResult<User> {
        let query = format!("SELECT meta::id(id) AS record_id, * FROM {clause}");
        let mut result = self
            .db
            .query(query)
            .bind((name, value.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: value,
        })?;
        Ok(row.try_into_user()?)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> VitrineResult<User> {
        let id = Uuid::new_v4();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        self.db
            .query(
                "CREATE type::record('user', $id) SET \
                 email = $email, name = $name, \
                 password_hash = $password_hash, \
                 system_role = $system_role",
            )
            .bind(("id", id.to_string()))
            .bind(("email", input.email))
            .bind(("name", input.name))
            .bind(("password_hash", password_hash))
            .bind(("system_role", input.system_role.as_str()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement("user", e))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> VitrineResult<User> {
        self.fetch("type::record('user', $id)", "id", id.to_string())
            .await
    }

    async fn get_by_email(&self, email: &str) -> VitrineResult<User> {
        self.fetch("user WHERE email = $email LIMIT 1", "email", email.to_string())
            .await
    }

    async fn list(&self, pagination: Pagination) -> VitrineResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_with_pepper() {
        let hash = hash_password("s3cret!", Some("pepper")).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret!", &hash, Some("pepper")).unwrap());
        assert!(!verify_password("s3cret!", &hash, None).unwrap());
        assert!(!verify_password("wrong", &hash, Some("pepper")).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("x", "not-a-hash", None).is_err());
    }
}
