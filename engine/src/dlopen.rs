//! Production engine binding backed by `libloading`.
//!
//! `DlopenLoader` is the one registered loader hook: nothing in this crate
//! or the sandbox touches the native library except through
//! [`EngineLoader::load`], which keeps the engine's own initialization from
//! racing host symbol availability.

use std::ffi::CString;
use std::os::raw::c_void;
use std::path::Path;
use std::ptr;
use std::slice;
use std::sync::Arc;

use tracing::debug;

use crate::error::EngineError;
use crate::ffi::{self, Api, CFunction, LuaState, LUA_OK, LUA_TNIL, LUA_TNONE, LUA_TTABLE};
use crate::modules::StdModule;
use crate::rng::SharedRng;
use crate::traits::{split_path, EngineInstance, EngineLoader, NativeEngine};

/// Loader hook that performs the real dynamic load.
#[derive(Debug, Default)]
pub struct DlopenLoader;

impl EngineLoader for DlopenLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn NativeEngine>, EngineError> {
        let loaded = ffi::load_api(path)?;
        Ok(Arc::new(FfiEngine { loaded }))
    }
}

struct FfiEngine {
    loaded: &'static ffi::LoadedApi,
}

impl NativeEngine for FfiEngine {
    fn new_instance(
        &self,
        memory_limit: Option<u64>,
    ) -> Result<Box<dyn EngineInstance>, EngineError> {
        let api = &self.loaded.api;
        let (state, alloc) = match memory_limit {
            Some(limit) => {
                let mut alloc = Box::new(ffi::AllocState::new(limit as usize));
                let ud = &mut *alloc as *mut ffi::AllocState as *mut c_void;
                let state = unsafe { (api.newstate)(ffi::limited_alloc, ud) };
                (state, Some(alloc))
            }
            None => (unsafe { (api.newstate_default)() }, None),
        };
        if state.is_null() {
            debug!(limit = ?memory_limit, "interpreter state allocation failed");
            return Err(EngineError::OutOfMemory);
        }
        Ok(Box::new(FfiInstance {
            loaded: self.loaded,
            state,
            rng: None,
            // Must outlive `state`; freed after close() in Drop.
            _alloc: alloc,
        }))
    }
}

/// One native interpreter state.
struct FfiInstance {
    loaded: &'static ffi::LoadedApi,
    state: *mut LuaState,
    /// Keeps the generator referenced by the installed wrappers alive for
    /// the lifetime of the state.
    rng: Option<SharedRng>,
    _alloc: Option<Box<ffi::AllocState>>,
}

// The raw state pointer is only touched through &mut self; moving the
// instance between threads is safe, concurrent use is not offered.
unsafe impl Send for FfiInstance {}

impl Drop for FfiInstance {
    fn drop(&mut self) {
        unsafe { (self.loaded.api.close)(self.state) };
    }
}

fn cstring(s: &str) -> Result<CString, EngineError> {
    CString::new(s)
        .map_err(|_| EngineError::BadArgument(format!("embedded NUL in {:?}", s)))
}

impl FfiInstance {
    fn api(&self) -> &'static Api {
        &self.loaded.api
    }

    fn pop(&mut self, n: i32) {
        unsafe { (self.api().settop)(self.state, -n - 1) };
    }

    /// Take the error value off the stack top as a message.
    fn pop_error(&mut self) -> String {
        let api = self.api();
        let mut len: usize = 0;
        let p = unsafe { (api.tolstring)(self.state, -1, &mut len) };
        let msg = if p.is_null() {
            "unknown engine error".to_string()
        } else {
            let bytes = unsafe { slice::from_raw_parts(p as *const u8, len) };
            String::from_utf8_lossy(bytes).into_owned()
        };
        self.pop(1);
        msg
    }

    fn install_wrapper(
        &mut self,
        field: &CString,
        f: CFunction,
        rng_ptr: *mut c_void,
    ) {
        let api = self.api();
        unsafe {
            (api.pushlightuserdata)(self.state, rng_ptr);
            (api.pushcclosure)(self.state, f, 1);
            (api.setfield)(self.state, -2, field.as_ptr());
        }
    }
}

impl EngineInstance for FfiInstance {
    fn open_module(&mut self, module: StdModule) -> Result<(), EngineError> {
        let symbol = format!("{}\0", module.open_symbol());
        let open: CFunction = unsafe {
            *self
                .loaded
                .lib
                .get::<CFunction>(symbol.as_bytes())
                .map_err(|_| EngineError::MissingSymbol(module.open_symbol().to_string()))?
        };
        let name = cstring(module.registry_name())?;
        let api = self.api();
        unsafe { (api.requiref)(self.state, name.as_ptr(), open, 1) };
        // requiref leaves a copy of the module on the stack
        self.pop(1);
        Ok(())
    }

    fn reserve_namespace(&mut self, name: &str) -> Result<(), EngineError> {
        let name = cstring(name)?;
        let api = self.api();
        unsafe {
            (api.createtable)(self.state, 0, 0);
            (api.setglobal)(self.state, name.as_ptr());
        }
        Ok(())
    }

    fn clear_global(&mut self, path: &str) -> Result<(), EngineError> {
        let (global, field) = split_path(path);
        let global = cstring(global)?;
        let api = self.api();
        match field {
            None => unsafe {
                (api.pushnil)(self.state);
                (api.setglobal)(self.state, global.as_ptr());
            },
            Some(field) => {
                let field = cstring(field)?;
                unsafe { (api.getglobal)(self.state, global.as_ptr()) };
                if unsafe { (api.type_of)(self.state, -1) } == LUA_TTABLE {
                    unsafe {
                        (api.pushnil)(self.state);
                        (api.setfield)(self.state, -2, field.as_ptr());
                    }
                }
                self.pop(1);
            }
        }
        Ok(())
    }

    fn install_random(&mut self, rng: SharedRng) -> Result<(), EngineError> {
        let math = cstring("math")?;
        let api = self.api();
        unsafe { (api.getglobal)(self.state, math.as_ptr()) };
        if unsafe { (api.type_of)(self.state, -1) } != LUA_TTABLE {
            self.pop(1);
            return Err(EngineError::Runtime(
                "math module must be loaded before installing randomness".to_string(),
            ));
        }

        // The wrappers borrow the Mutex behind the Arc; keeping a clone in
        // the instance ties its lifetime to the state's.
        let rng_ptr = Arc::as_ptr(&rng) as *mut c_void;
        self.rng = Some(rng);

        let random = cstring("random")?;
        let randomseed = cstring("randomseed")?;
        self.install_wrapper(&random, ffi::native_random, rng_ptr);
        self.install_wrapper(&randomseed, ffi::native_randomseed, rng_ptr);
        self.pop(1);
        Ok(())
    }

    fn eval(&mut self, chunk: &str) -> Result<(), EngineError> {
        let chunk = cstring(chunk)?;
        let api = self.api();
        let rc = unsafe { (api.loadstring)(self.state, chunk.as_ptr()) };
        if rc != LUA_OK {
            return Err(EngineError::Runtime(self.pop_error()));
        }
        let rc =
            unsafe { (api.pcallk)(self.state, 0, 0, 0, 0, ptr::null_mut()) };
        if rc != LUA_OK {
            return Err(EngineError::Runtime(self.pop_error()));
        }
        Ok(())
    }

    fn global_exists(&mut self, path: &str) -> Result<bool, EngineError> {
        let (global, field) = split_path(path);
        let global = cstring(global)?;
        let api = self.api();
        unsafe { (api.getglobal)(self.state, global.as_ptr()) };
        let t = unsafe { (api.type_of)(self.state, -1) };
        let exists = match field {
            None => {
                self.pop(1);
                t != LUA_TNIL && t != LUA_TNONE
            }
            Some(field) => {
                if t != LUA_TTABLE {
                    self.pop(1);
                    return Ok(false);
                }
                let field = cstring(field)?;
                unsafe { (api.getfield)(self.state, -1, field.as_ptr()) };
                let ft = unsafe { (api.type_of)(self.state, -1) };
                self.pop(2);
                ft != LUA_TNIL && ft != LUA_TNONE
            }
        };
        Ok(exists)
    }
}
