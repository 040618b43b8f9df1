//! Wrapping drivers and registering them by name.

use crate::connection::HookedConnection;
use crate::hooks::Hooks;
use sqlhooks_core::{
    AnyDriver, Cx, Driver, DriverRegistry, Error, Outcome, Result, map_outcome,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A driver whose connections report to a set of [`Hooks`].
///
/// Opening is delegated to the wrapped driver; each connection it returns is
/// wrapped in a [`HookedConnection`] sharing the same hooks.
///
/// ```rust,ignore
/// let driver = HookedDriver::new(MemDriver::new(), TracingHooks::default());
/// let conn = driver.open(&cx, "db").await?;
/// ```
pub struct HookedDriver<D, H: ?Sized = dyn Hooks> {
    inner: D,
    hooks: Arc<H>,
}

impl<D: Driver, H: Hooks + 'static> HookedDriver<D, H> {
    /// Wrap `driver`, reporting to `hooks`.
    pub fn new(driver: D, hooks: H) -> Self {
        Self::with_shared(driver, Arc::new(hooks))
    }
}

impl<D: Driver, H: Hooks + ?Sized + 'static> HookedDriver<D, H> {
    /// Wrap `driver`, reporting to hooks that are already shared.
    pub fn with_shared(driver: D, hooks: Arc<H>) -> Self {
        Self {
            inner: driver,
            hooks,
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn hooks(&self) -> &Arc<H> {
        &self.hooks
    }
}

impl<H: Hooks + ?Sized + 'static> HookedDriver<AnyDriver, H> {
    /// Wrap the driver registered under `name` in `registry`.
    ///
    /// Fails with [`DriverErrorKind::NotFound`](sqlhooks_core::DriverErrorKind)
    /// if no such driver is registered.
    #[allow(clippy::result_large_err)]
    pub fn from_registry(registry: &DriverRegistry, name: &str, hooks: Arc<H>) -> Result<Self> {
        let driver = registry.get(name)?;
        Ok(Self::with_shared(driver, hooks))
    }
}

impl<D: fmt::Debug, H: ?Sized> fmt::Debug for HookedDriver<D, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookedDriver")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<D, H> Driver for HookedDriver<D, H>
where
    D: Driver,
    H: Hooks + ?Sized + 'static,
{
    type Conn = HookedConnection<D::Conn, H>;

    fn open(
        &self,
        cx: &Cx,
        dsn: &str,
    ) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send {
        let hooks = Arc::clone(&self.hooks);
        let open = self.inner.open(cx, dsn);
        async move { map_outcome(open.await, |conn| HookedConnection::new(conn, hooks)) }
    }
}

/// Register, in `registry`, a hooked version of the driver registered there
/// as `driver_name`, under the new name `name`.
///
/// Connections opened through `name` report to `hooks`; `driver_name` stays
/// registered and unhooked.
#[allow(clippy::result_large_err)]
#[tracing::instrument(level = "debug", skip(registry, hooks))]
pub fn register_in<H: Hooks + 'static>(
    registry: &DriverRegistry,
    name: &str,
    driver_name: &str,
    hooks: H,
) -> Result<()> {
    let driver = HookedDriver::from_registry(registry, driver_name, Arc::new(hooks))?;
    registry.register(name, driver)
}

/// [`register_in`] against the process-wide registry.
///
/// ```rust,ignore
/// sqlhooks_core::register("memdb", MemDriver::new())?;
/// sqlhooks::register("memdb-traced", "memdb", TracingHooks::default())?;
/// let conn = sqlhooks_core::open(&cx, "memdb-traced", "db").await?;
/// ```
#[allow(clippy::result_large_err)]
pub fn register<H: Hooks + 'static>(name: &str, driver_name: &str, hooks: H) -> Result<()> {
    register_in(DriverRegistry::global(), name, driver_name, hooks)
}
