//! Fast availability checks for usernames and e-mails.
//!
//! Lookup order: cuckoo filter (definite "free"), then the taken-cache
//! (definite "taken"), then the database. The filter only answers once its
//! warmup has loaded every user; until then each miss goes to the database.
//! The database stays the source of truth; inserts still rely on its unique keys.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use futures::StreamExt;
use sqlx::MySqlPool;
use tracing::info;

use super::{identity_cache::TakenCache, identity_filter::IdentityFilter};
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    Username,
    Email,
}

impl IdentityKind {
    fn column(self) -> &'static str {
        match self {
            IdentityKind::Username => "username",
            IdentityKind::Email => "email",
        }
    }
}

#[inline]
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Default)]
pub struct IdentityIndex {
    filter: IdentityFilter,
    cache: TakenCache,
    warm: AtomicBool,
}

impl IdentityIndex {
    /// Definitely unused. Never true before the filter warmup finished.
    fn surely_free(&self, kind: IdentityKind, value: &str) -> bool {
        self.warm.load(Ordering::Acquire) && !self.filter.might_exist(kind, value)
    }

    /// true => available, false => taken
    pub async fn is_available(
        &self,
        kind: IdentityKind,
        value: &str,
        pool: &MySqlPool,
    ) -> AppResult<bool> {
        let value = normalize(value);

        if self.surely_free(kind, &value) {
            return Ok(true);
        }

        if self.cache.is_taken(kind, &value).await {
            return Ok(false);
        }

        let sql = format!("SELECT COUNT(*) FROM `user` WHERE LOWER({}) = ?", kind.column());
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(&value)
            .fetch_one(pool)
            .await?;

        if count > 0 {
            self.cache.mark_taken(kind, &value).await;
            return Ok(false);
        }

        Ok(true)
    }

    /// Availability for an update: the user's own current value does not count.
    pub async fn is_available_except(
        &self,
        kind: IdentityKind,
        value: &str,
        user_id: u64,
        pool: &MySqlPool,
    ) -> AppResult<bool> {
        let value = normalize(value);

        if self.surely_free(kind, &value) {
            return Ok(true);
        }

        let sql = format!(
            "SELECT COUNT(*) FROM `user` WHERE LOWER({}) = ? AND id <> ?",
            kind.column()
        );
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(&value)
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count == 0)
    }

    pub async fn record(&self, kind: IdentityKind, value: &str) {
        let value = normalize(value);
        self.filter.insert(kind, &value);
        self.cache.mark_taken(kind, &value).await;
    }

    pub async fn forget(&self, kind: IdentityKind, value: &str) {
        let value = normalize(value);
        self.filter.remove(kind, &value);
        self.cache.forget(kind, &value).await;
    }

    /// Streams every user into the filter in batches.
    pub async fn warmup_filter(&self, pool: &MySqlPool, batch_size: usize) -> Result<()> {
        let mut stream =
            sqlx::query_as::<_, (String, String)>("SELECT username, email FROM `user`").fetch(pool);

        let mut usernames = Vec::with_capacity(batch_size);
        let mut emails = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (username, email) = row.context("user row fetch failed")?;
            usernames.push(normalize(&username));
            emails.push(normalize(&email));
            total += 1;

            if usernames.len() >= batch_size {
                self.filter.insert_batch(IdentityKind::Username, &usernames);
                self.filter.insert_batch(IdentityKind::Email, &emails);
                usernames.clear();
                emails.clear();
            }
        }

        if !usernames.is_empty() {
            self.filter.insert_batch(IdentityKind::Username, &usernames);
            self.filter.insert_batch(IdentityKind::Email, &emails);
        }

        self.warm.store(true, Ordering::Release);
        info!(total, "Identity filter warmup complete");
        Ok(())
    }

    /// Loads users who logged in during the last `days` days into the taken-cache.
    pub async fn warmup_cache(&self, pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT username, email
            FROM `user`
            WHERE last_login_at >= NOW() - INTERVAL ? DAY
            ORDER BY last_login_at DESC
            "#,
        )
        .bind(days)
        .fetch(pool);

        let mut usernames = Vec::with_capacity(batch_size);
        let mut emails = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (username, email) = row.context("recent user row fetch failed")?;
            usernames.push(normalize(&username));
            emails.push(normalize(&email));
            total += 1;

            if usernames.len() >= batch_size {
                self.cache.mark_batch(IdentityKind::Username, &usernames).await;
                self.cache.mark_batch(IdentityKind::Email, &emails).await;
                usernames.clear();
                emails.clear();
            }
        }

        if !usernames.is_empty() {
            self.cache.mark_batch(IdentityKind::Username, &usernames).await;
            self.cache.mark_batch(IdentityKind::Email, &emails).await;
        }

        info!(total, days, "Identity cache warmup complete");
        Ok(())
    }
}
