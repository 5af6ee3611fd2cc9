//! Shared fixtures. Every test names its rows and scopes uniquely so the
//! suites can run in parallel against one database.

#![allow(dead_code)]

use directory_core::{DirectoryDeps, Scope};
use directory_domains::Directory;
use sqlx::PgPool;
use uuid::Uuid;

pub fn directory(pool: &PgPool) -> Directory {
    let deps = DirectoryDeps::builder().db_pool(pool.clone()).build();
    Directory::new(&deps)
}

/// Short random tag for keys, cities, and brand names.
pub fn tag() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

/// A scope id nobody else uses.
pub fn fresh_scope_id() -> i64 {
    (Uuid::new_v4().as_u128() >> 65) as i64
}

pub fn sub_regional() -> Scope {
    Scope::sub_regional(fresh_scope_id())
}

pub fn regional() -> Scope {
    Scope::regional(fresh_scope_id())
}
