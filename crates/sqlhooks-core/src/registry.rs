//! Name-based driver registration.
//!
//! A [`DriverRegistry`] maps names to drivers so a connection can be opened
//! by name. The process-wide registry behind [`register`] and [`open`] is
//! what most callers use; separate registries are handy in tests.
//!
//! ```rust,ignore
//! sqlhooks_core::register("memdb", MemDriver::new())?;
//! let conn = sqlhooks_core::open(&cx, "memdb", "db").await?;
//! ```

use crate::driver::{AnyConnection, AnyDriver, Driver};
use crate::error::{DriverError, Error, Result};
use asupersync::{Cx, Outcome};
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

static GLOBAL_REGISTRY: OnceLock<DriverRegistry> = OnceLock::new();

/// A set of drivers addressable by name.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: RwLock<HashMap<String, AnyDriver>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static DriverRegistry {
        GLOBAL_REGISTRY.get_or_init(DriverRegistry::new)
    }

    /// Register `driver` under `name`.
    ///
    /// Fails with [`DriverErrorKind::AlreadyRegistered`](crate::error::DriverErrorKind)
    /// if the name is taken; the existing registration is kept.
    #[allow(clippy::result_large_err)]
    pub fn register<D: Driver>(&self, name: impl Into<String>, driver: D) -> Result<()> {
        let name = name.into();
        let mut drivers = self.drivers.write().unwrap_or_else(PoisonError::into_inner);
        if drivers.contains_key(&name) {
            return Err(DriverError::already_registered(name).into());
        }
        tracing::debug!(driver = %name, "Registered driver");
        drivers.insert(name, AnyDriver::new(driver));
        Ok(())
    }

    /// Look up the driver registered under `name`.
    #[allow(clippy::result_large_err)]
    pub fn get(&self, name: &str) -> Result<AnyDriver> {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| DriverError::not_found(name).into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered driver names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Open a connection through the driver registered under `name`.
    #[tracing::instrument(level = "debug", skip(self, cx, dsn))]
    pub async fn open(&self, cx: &Cx, name: &str, dsn: &str) -> Outcome<AnyConnection, Error> {
        let driver = match self.get(name) {
            Ok(driver) => driver,
            Err(e) => return Outcome::Err(e),
        };
        driver.open(cx, dsn).await
    }
}

/// Register `driver` under `name` in the process-wide registry.
#[allow(clippy::result_large_err)]
pub fn register<D: Driver>(name: impl Into<String>, driver: D) -> Result<()> {
    DriverRegistry::global().register(name, driver)
}

/// Open a connection by driver name from the process-wide registry.
pub async fn open(cx: &Cx, name: &str, dsn: &str) -> Outcome<AnyConnection, Error> {
    DriverRegistry::global().open(cx, name, dsn).await
}

/// Names registered in the process-wide registry, sorted.
pub fn drivers() -> Vec<String> {
    DriverRegistry::global().names()
}
