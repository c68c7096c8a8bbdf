//! RAII guard around one exclusively-owned session.

use crate::db::backend::Session;
use tracing::warn;

/// Owns a [`Session`] and guarantees it is closed exactly once.
///
/// Call [`ConnectionGuard::release`] on every path. Drop is the fallback for
/// panics and cancelled futures: it spawns the close on the current runtime.
pub struct ConnectionGuard {
    session: Option<Box<dyn Session>>,
    backend: &'static str,
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("backend", &self.backend)
            .field("released", &self.session.is_none())
            .finish_non_exhaustive()
    }
}

impl ConnectionGuard {
    pub fn new(session: Box<dyn Session>, backend: &'static str) -> Self {
        Self {
            session: Some(session),
            backend,
        }
    }

    /// The guarded session. `None` only after release.
    pub fn session(&mut self) -> Option<&mut (dyn Session + 'static)> {
        self.session.as_deref_mut()
    }

    /// Close the session. A close failure is logged, never returned: by the
    /// time a session is released its outcome has already been decided.
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!(backend = self.backend, error = %e, "Failed to close database session");
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        let backend = self.backend;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!(backend, error = %e, "Failed to close database session");
                    }
                    warn!(backend, "Session released via Drop - consider using explicit release()");
                });
            }
            // Outside a runtime the driver drops the socket with the session
            Err(_) => {
                warn!(backend, "Session dropped outside a runtime without a clean close");
            }
        }
    }
}
