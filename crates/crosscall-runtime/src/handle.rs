//! Opaque, serializable module handles the host embedding layer can store
//! and later exchange back for the live in-process module.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crosscall_types::FfiError;

use crate::module::Module;

/// Name plus an address token. Exchanging a handle whose token is unknown,
/// released, or whose name disagrees with the registered module fails with
/// `InvalidHandle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleHandle {
    pub name: String,
    pub token: u64,
}

static MODULES: Lazy<RwLock<HashMap<u64, Arc<Module>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Park a fully-constructed module in the process-wide registry and hand
/// back the handle the host can round-trip.
pub fn export_module(module: Module) -> ModuleHandle {
    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    let handle = ModuleHandle {
        name: module.name().to_string(),
        token,
    };
    if let Ok(mut guard) = MODULES.write() {
        guard.insert(token, Arc::new(module));
    }
    log::debug!("exported module `{}` as token {}", handle.name, token);
    handle
}

/// Exchange a handle back for the live module.
pub fn module_from_handle(handle: &ModuleHandle) -> Result<Arc<Module>, FfiError> {
    let invalid = || FfiError::InvalidHandle {
        name: handle.name.clone(),
    };
    let guard = MODULES.read().map_err(|_| invalid())?;
    match guard.get(&handle.token) {
        Some(module) if module.name() == handle.name => Ok(module.clone()),
        _ => Err(invalid()),
    }
}

/// Tear the module down; its method records drop together. The handle is
/// stale afterwards and further exchanges fail.
pub fn release_module(handle: &ModuleHandle) -> Result<(), FfiError> {
    let invalid = || FfiError::InvalidHandle {
        name: handle.name.clone(),
    };
    let mut guard = MODULES.write().map_err(|_| invalid())?;
    match guard.get(&handle.token) {
        Some(module) if module.name() == handle.name => {
            guard.remove(&handle.token);
            log::debug!("released module `{}` (token {})", handle.name, handle.token);
            Ok(())
        }
        _ => Err(invalid()),
    }
}
