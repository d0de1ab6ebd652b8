//! Test doubles for the limiters.

use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{CacheError, CacheProvider};

/// Cache whose every operation fails, as if the backend were down.
pub(crate) struct FailingCache;

fn down() -> CacheError {
    CacheError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl CacheProvider for FailingCache {
    async fn get_raw(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(down())
    }

    async fn set_raw(
        &self,
        _key: &str,
        _value: String,
        _ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        Err(down())
    }

    async fn del(&self, _key: &str) -> Result<(), CacheError> {
        Err(down())
    }

    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Err(down())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Err(down())
    }

    async fn incr(&self, _key: &str, _by: i64, _ttl: Duration) -> Result<i64, CacheError> {
        Err(down())
    }

    async fn incr_float(&self, _key: &str, _by: f64, _ttl: Duration) -> Result<f64, CacheError> {
        Err(down())
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CacheError> {
        Err(down())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}
