//! Blocking entry point on top of the asynchronous engine.

use {
    crate::{engine::Session, error::Error, res, utils::Result},
    log::debug,
    std::{
        future::Future,
        sync::atomic::{AtomicBool, Ordering},
    },
    tokio::runtime::{Builder, Handle},
};

/// Marks a session as running a blocking call; cleared on drop.
struct SyncGuard<'a> {
    active: &'a AtomicBool,
}

impl<'a> SyncGuard<'a> {
    fn acquire(active: &'a AtomicBool) -> Result<Self> {
        active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SyncGuard { active })
            .map_err(|_| Error::InvalidParameter)
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Run `op` to completion on a private single-threaded runtime.
///
/// Fails with [`Error::InvalidParameter`] without touching the session when
/// it has requests outstanding, when another blocking call is running on it,
/// or when called from inside a tokio runtime. The runtime and everything
/// `op` allocated are released before this returns.
///
/// ```no_run
/// use rscifs::{Session, SessionConfig, sync::run_sync, transport::NetbiosTransport};
///
/// # fn main() -> rscifs::Result<()> {
/// let transport = NetbiosTransport::connect("tcp!fileserver!445")?;
/// let session = Session::new(transport, SessionConfig::default().with_tid(1));
/// let stat = run_sync(&session, |s| async move { s.posix_stat("\\docs\\a.txt").await })?;
/// println!("{} bytes", stat.size);
/// # Ok(())
/// # }
/// ```
pub fn run_sync<T, F, Fut>(session: &Session, op: F) -> Result<T>
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if Handle::try_current().is_ok() {
        debug!("Refusing blocking call from inside a runtime");
        return res!(Error::InvalidParameter);
    }
    let outstanding = session.outstanding();
    if outstanding > 0 {
        debug!("Refusing blocking call with {} request(s) outstanding", outstanding);
        return res!(Error::InvalidParameter);
    }
    let _guard = SyncGuard::acquire(&session.inner.sync_active)?;

    let runtime = Builder::new_current_thread().enable_all().build()?;
    let result = runtime.block_on(op(session.clone()));
    drop(runtime);
    result
}

impl Session {
    /// See [`run_sync`].
    pub fn run_sync<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        run_sync(self, op)
    }
}
