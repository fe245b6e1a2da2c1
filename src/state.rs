use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::Key;
use diesel::{
    Connection, SqliteConnection,
    connection::TransactionManager,
    r2d2::{ConnectionManager, Pool, PooledConnection},
};

use crate::util_resp::FailureResponse;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;
type SqliteTm = <SqliteConnection as Connection>::TransactionManager;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: DbPool,
    pub key: Key,
}

/// Holds the connection checked out for the current request, so that every
/// extractor (and the commit middleware) sees the same one.
#[derive(Clone, Default)]
struct RequestConn(Arc<std::sync::Mutex<Option<ThreadSafeConn>>>);

#[derive(Clone)]
pub struct ThreadSafeConn {
    pub inner: Arc<tokio::sync::Mutex<PooledConn>>,
    in_tx: Arc<std::sync::atomic::AtomicBool>,
}

/// Commits the transaction opened by a `Conn<true>` once the handler has
/// produced a response, or rolls it back if the response is an error.
pub async fn tx_commit(mut req: Request, next: Next) -> Response {
    let slot = RequestConn::default();
    req.extensions_mut().insert(slot.clone());

    let res = next.run(req).await;

    let conn = match slot.0.lock() {
        Ok(mut guard) => guard.take(),
        Err(_) => None,
    };

    let Some(conn) = conn else { return res };
    if !conn.in_tx.load(std::sync::atomic::Ordering::SeqCst) {
        return res;
    }

    let mut pooled = conn.inner.lock().await;
    let status = res.status();
    let outcome = if status.is_success()
        || status.is_redirection()
        || status.is_informational()
    {
        SqliteTm::commit_transaction(&mut **pooled)
    } else {
        SqliteTm::rollback_transaction(&mut **pooled)
    };

    match outcome {
        Ok(()) => res,
        Err(e) => {
            tracing::error!("failed to finish request transaction: {e}");
            FailureResponse::ServerError.into_response()
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ThreadSafeConn
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    type Rejection = FailureResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let slot = parts.extensions.get::<RequestConn>().cloned();

        if let Some(slot) = &slot
            && let Ok(guard) = slot.0.lock()
            && let Some(conn) = guard.as_ref()
        {
            return Ok(conn.clone());
        }

        let pool = DbPool::from_ref(state);
        let conn = tokio::task::spawn_blocking(move || pool.get())
            .await
            .map_err(|_| FailureResponse::ServerError)?
            .map_err(|e| {
                tracing::error!("could not check out a connection: {e}");
                FailureResponse::ServerError
            })?;

        let conn = ThreadSafeConn {
            inner: Arc::new(tokio::sync::Mutex::new(conn)),
            in_tx: Default::default(),
        };

        if let Some(slot) = slot
            && let Ok(mut guard) = slot.0.lock()
        {
            *guard = Some(conn.clone());
        }

        Ok(conn)
    }
}

pub struct Conn<const TX: bool> {
    inner: tokio::sync::OwnedMutexGuard<PooledConn>,
}

impl<const TX: bool> Deref for Conn<TX> {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        self.inner.deref().deref()
    }
}

impl<const TX: bool> DerefMut for Conn<TX> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.deref_mut().deref_mut()
    }
}

#[async_trait]
impl<S, const TX: bool> FromRequestParts<S> for Conn<TX>
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    type Rejection = FailureResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let tracked = parts.extensions.get::<RequestConn>().is_some();
        let conn = ThreadSafeConn::from_request_parts(parts, state).await?;
        let mut inner = conn.inner.clone().lock_owned().await;

        // without the middleware nobody would ever commit, so only open a
        // transaction when it is installed
        if TX
            && tracked
            && !conn.in_tx.swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            SqliteTm::begin_transaction(&mut **inner).map_err(|e| {
                tracing::error!("could not begin transaction: {e}");
                FailureResponse::ServerError
            })?;
        }

        Ok(Conn { inner })
    }
}
