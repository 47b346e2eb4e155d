//! Console access control.
//!
//! Authentication happens upstream; the console only sees who the caller
//! is (`CurrentUser`) and asks an `AccessPolicy` whether that caller may
//! touch a given entity.

use std::fmt;
use std::str::FromStr;

use crate::blog::db::SoloDb;
use crate::blog::repo::articles;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Author,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Author => "author",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "author" => Ok(Self::Author),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// What an access check is about.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Page(&'a str),
    Article(&'a str),
    Comment(&'a str),
    /// Blog-wide operations: creating pages, pinning articles, listing
    /// every comment, repairing counters.
    Blog,
}

pub trait AccessPolicy: Send + Sync {
    fn can_access(
        &self,
        db: &SoloDb,
        entity: Entity<'_>,
        user: &CurrentUser,
    ) -> Result<bool, ServiceError>;
}

/// Fail with `Forbidden` unless `policy` lets `user` at `entity`.
pub fn ensure(
    policy: &dyn AccessPolicy,
    db: &SoloDb,
    entity: Entity<'_>,
    user: &CurrentUser,
) -> Result<(), ServiceError> {
    if policy.can_access(db, entity, user)? {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

/// Admins may do anything; authors may manage their own articles.
pub struct DefaultAccessPolicy;

impl AccessPolicy for DefaultAccessPolicy {
    fn can_access(
        &self,
        db: &SoloDb,
        entity: Entity<'_>,
        user: &CurrentUser,
    ) -> Result<bool, ServiceError> {
        if user.is_admin() {
            return Ok(true);
        }
        match entity {
            Entity::Article(id) => Ok(articles::get(db.conn(), id)?
                .map(|a| a.author_id == user.id)
                .unwrap_or(false)),
            Entity::Page(_) | Entity::Comment(_) | Entity::Blog => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn user(id: &str, role: Role) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            role,
        }
    }

    #[test]
    fn role_parses() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("author").unwrap(), Role::Author);
        assert!(Role::from_str("visitor").is_err());
    }

    #[test]
    fn admin_accesses_everything() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let admin = user("a", Role::Admin);
        for entity in [
            Entity::Page("1"),
            Entity::Article("missing"),
            Entity::Comment("2"),
            Entity::Blog,
        ] {
            assert!(DefaultAccessPolicy.can_access(&db, entity, &admin)?);
        }
        Ok(())
    }

    #[test]
    fn ensure_maps_denial_to_forbidden() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let author = user("x", Role::Author);
        assert!(matches!(
            ensure(&DefaultAccessPolicy, &db, Entity::Blog, &author),
            Err(ServiceError::Forbidden)
        ));
        ensure(&DefaultAccessPolicy, &db, Entity::Blog, &user("x", Role::Admin))?;
        Ok(())
    }

    #[test]
    fn author_accesses_only_own_articles() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        articles::insert(db.conn(), &articles::sample("mine", "/m", true))?;
        let owner = user("author", Role::Author);
        let stranger = user("someone", Role::Author);

        assert!(DefaultAccessPolicy.can_access(&db, Entity::Article("mine"), &owner)?);
        assert!(!DefaultAccessPolicy.can_access(&db, Entity::Article("mine"), &stranger)?);
        assert!(!DefaultAccessPolicy.can_access(&db, Entity::Article("missing"), &owner)?);
        assert!(!DefaultAccessPolicy.can_access(&db, Entity::Page("1"), &owner)?);
        assert!(!DefaultAccessPolicy.can_access(&db, Entity::Blog, &owner)?);
        Ok(())
    }
}
