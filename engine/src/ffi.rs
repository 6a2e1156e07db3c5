//! Raw C API surface of the native Lua engine (5.2 ABI).
//!
//! Symbols are resolved once from the staged library into a function-pointer
//! table (`Api`). The table and the mapped library live for the rest of the
//! process: availability is decided exactly once, and a staged library may
//! stay mapped by live instances until exit, so the binding is never
//! unloaded.
//!
//! The injected `math.random` / `math.randomseed` wrappers are fixed-
//! signature `extern "C"` functions with explicit argument-count branching;
//! they receive their per-instance generator through a light-userdata
//! upvalue.

use std::alloc::{alloc, dealloc, realloc, Layout};
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr;
use std::sync::{Mutex, OnceLock};

use libloading::Library;
use tracing::debug;

use crate::error::EngineError;
use crate::rng::GuestRng;

/// Opaque interpreter state.
#[repr(C)]
pub struct LuaState {
    _private: [u8; 0],
}

pub type CFunction = unsafe extern "C" fn(*mut LuaState) -> c_int;
pub type AllocFn =
    unsafe extern "C" fn(*mut c_void, *mut c_void, usize, usize) -> *mut c_void;

// 5.2 constants (LUAI_MAXSTACK = 1_000_000).
const LUA_REGISTRYINDEX: c_int = -1_001_000;
pub const LUA_OK: c_int = 0;
pub const LUA_TNONE: c_int = -1;
pub const LUA_TNIL: c_int = 0;
pub const LUA_TTABLE: c_int = 5;

/// Pseudo-index of the i-th upvalue of the running C closure.
pub const fn upvalue_index(i: c_int) -> c_int {
    LUA_REGISTRYINDEX - i
}

/// Resolved engine entry points.
///
/// All pointers reference code inside the library held by [`LoadedApi`];
/// the table is only handed out with `'static` lifetime from there.
#[derive(Clone, Copy)]
pub struct Api {
    pub newstate: unsafe extern "C" fn(AllocFn, *mut c_void) -> *mut LuaState,
    pub newstate_default: unsafe extern "C" fn() -> *mut LuaState,
    pub close: unsafe extern "C" fn(*mut LuaState),
    pub requiref:
        unsafe extern "C" fn(*mut LuaState, *const c_char, CFunction, c_int),
    pub createtable: unsafe extern "C" fn(*mut LuaState, c_int, c_int),
    pub setglobal: unsafe extern "C" fn(*mut LuaState, *const c_char),
    pub getglobal: unsafe extern "C" fn(*mut LuaState, *const c_char),
    pub setfield: unsafe extern "C" fn(*mut LuaState, c_int, *const c_char),
    pub getfield: unsafe extern "C" fn(*mut LuaState, c_int, *const c_char),
    pub settop: unsafe extern "C" fn(*mut LuaState, c_int),
    pub gettop: unsafe extern "C" fn(*mut LuaState) -> c_int,
    pub type_of: unsafe extern "C" fn(*mut LuaState, c_int) -> c_int,
    pub pushnil: unsafe extern "C" fn(*mut LuaState),
    pub pushnumber: unsafe extern "C" fn(*mut LuaState, f64),
    pub pushinteger: unsafe extern "C" fn(*mut LuaState, i64),
    pub pushlstring:
        unsafe extern "C" fn(*mut LuaState, *const c_char, usize) -> *const c_char,
    pub pushcclosure: unsafe extern "C" fn(*mut LuaState, CFunction, c_int),
    pub pushlightuserdata: unsafe extern "C" fn(*mut LuaState, *mut c_void),
    pub touserdata: unsafe extern "C" fn(*mut LuaState, c_int) -> *mut c_void,
    pub tonumberx: unsafe extern "C" fn(*mut LuaState, c_int, *mut c_int) -> f64,
    pub tolstring:
        unsafe extern "C" fn(*mut LuaState, c_int, *mut usize) -> *const c_char,
    pub error: unsafe extern "C" fn(*mut LuaState) -> c_int,
    pub loadstring: unsafe extern "C" fn(*mut LuaState, *const c_char) -> c_int,
    pub pcallk: unsafe extern "C" fn(
        *mut LuaState,
        c_int,
        c_int,
        c_int,
        isize,
        *mut c_void,
    ) -> c_int,
}

/// The once-loaded library and its resolved entry points.
pub struct LoadedApi {
    pub lib: Library,
    pub api: Api,
}

static LOADED: OnceLock<LoadedApi> = OnceLock::new();

macro_rules! resolve {
    ($lib:expr, $name:literal) => {{
        let sym = unsafe { $lib.get(concat!($name, "\0").as_bytes()) }
            .map_err(|_| EngineError::MissingSymbol($name.to_string()))?;
        *sym
    }};
}

impl Api {
    fn resolve(lib: &Library) -> Result<Api, EngineError> {
        Ok(Api {
            newstate: resolve!(lib, "lua_newstate"),
            newstate_default: resolve!(lib, "luaL_newstate"),
            close: resolve!(lib, "lua_close"),
            requiref: resolve!(lib, "luaL_requiref"),
            createtable: resolve!(lib, "lua_createtable"),
            setglobal: resolve!(lib, "lua_setglobal"),
            getglobal: resolve!(lib, "lua_getglobal"),
            setfield: resolve!(lib, "lua_setfield"),
            getfield: resolve!(lib, "lua_getfield"),
            settop: resolve!(lib, "lua_settop"),
            gettop: resolve!(lib, "lua_gettop"),
            type_of: resolve!(lib, "lua_type"),
            pushnil: resolve!(lib, "lua_pushnil"),
            pushnumber: resolve!(lib, "lua_pushnumber"),
            pushinteger: resolve!(lib, "lua_pushinteger"),
            pushlstring: resolve!(lib, "lua_pushlstring"),
            pushcclosure: resolve!(lib, "lua_pushcclosure"),
            pushlightuserdata: resolve!(lib, "lua_pushlightuserdata"),
            touserdata: resolve!(lib, "lua_touserdata"),
            tonumberx: resolve!(lib, "lua_tonumberx"),
            tolstring: resolve!(lib, "lua_tolstring"),
            error: resolve!(lib, "lua_error"),
            loadstring: resolve!(lib, "luaL_loadstring"),
            pcallk: resolve!(lib, "lua_pcallk"),
        })
    }
}

/// Load the native library and resolve its entry points, once per process.
///
/// A second call returns the already-loaded binding without touching the
/// path again; the binding is never unloaded.
pub fn load_api(path: &Path) -> Result<&'static LoadedApi, EngineError> {
    if let Some(loaded) = LOADED.get() {
        return Ok(loaded);
    }
    let lib = unsafe { Library::new(path)? };
    let api = Api::resolve(&lib)?;
    debug!(path = %path.display(), "native engine symbols resolved");
    Ok(LOADED.get_or_init(|| LoadedApi { lib, api }))
}

// ── Memory-ceiling allocator ──

/// Byte accounting for one memory-limited interpreter state.
///
/// Owned (boxed) by the instance and handed to the engine as the
/// allocator userdata; it must outlive the state it serves.
pub struct AllocState {
    used: usize,
    limit: usize,
}

impl AllocState {
    pub fn new(limit: usize) -> Self {
        Self { used: 0, limit }
    }

    pub fn used(&self) -> usize {
        self.used
    }
}

const ALLOC_ALIGN: usize = 16;

/// `lua_Alloc` implementation enforcing the per-instance byte ceiling.
///
/// Growth past the limit returns null and the engine raises its own
/// out-of-memory condition; shrinking and freeing always succeed.
pub unsafe extern "C" fn limited_alloc(
    ud: *mut c_void,
    ptr: *mut c_void,
    osize: usize,
    nsize: usize,
) -> *mut c_void {
    let state = &mut *(ud as *mut AllocState);
    // osize is a type tag, not a size, when ptr is null.
    let old = if ptr.is_null() { 0 } else { osize };

    if nsize == 0 {
        if !ptr.is_null() {
            dealloc(
                ptr as *mut u8,
                Layout::from_size_align_unchecked(old, ALLOC_ALIGN),
            );
            state.used -= old;
        }
        return ptr::null_mut();
    }

    if nsize > old && state.used - old + nsize > state.limit {
        return ptr::null_mut();
    }

    let new_ptr = if ptr.is_null() {
        alloc(Layout::from_size_align_unchecked(nsize, ALLOC_ALIGN))
    } else {
        realloc(
            ptr as *mut u8,
            Layout::from_size_align_unchecked(old, ALLOC_ALIGN),
            nsize,
        )
    };
    if new_ptr.is_null() {
        return ptr::null_mut();
    }
    state.used = state.used - old + nsize;
    new_ptr as *mut c_void
}

// ── Injected randomness wrappers ──

enum Draw {
    Real(f64),
    Int(i64),
}

/// Read the shared generator out of upvalue 1.
unsafe fn upvalue_rng<'a>(api: &Api, l: *mut LuaState) -> Option<&'a Mutex<GuestRng>> {
    let p = (api.touserdata)(l, upvalue_index(1)) as *const Mutex<GuestRng>;
    p.as_ref()
}

unsafe fn number_arg(api: &Api, l: *mut LuaState, idx: c_int) -> Result<i64, String> {
    let mut isnum: c_int = 0;
    let v = (api.tonumberx)(l, idx, &mut isnum);
    if isnum == 0 {
        Err(format!("bad argument #{} (number expected)", idx))
    } else {
        Ok(v as i64)
    }
}

/// Push `msg` as the error value and raise it. Never returns.
unsafe fn raise(api: &Api, l: *mut LuaState, msg: String) -> c_int {
    let _ = (api.pushlstring)(l, msg.as_ptr() as *const c_char, msg.len());
    // lua_error longjmps; nothing with a destructor may be live past here.
    drop(msg);
    (api.error)(l)
}

/// `math.random` replacement: `()` → real in [0,1); `(n)` → int in [1,n];
/// `(lo, hi)` → int in [lo,hi]. Range violations raise argument errors.
pub unsafe extern "C" fn native_random(l: *mut LuaState) -> c_int {
    let Some(loaded) = LOADED.get() else { return 0 };
    let api = &loaded.api;
    let Some(rng) = upvalue_rng(api, l) else { return 0 };

    let argc = (api.gettop)(l);
    let outcome: Result<Draw, String> = (|| {
        let mut g = match rng.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match argc {
            0 => Ok(Draw::Real(g.next_real())),
            1 => {
                let n = number_arg(api, l, 1)?;
                g.next_up_to(n).map(Draw::Int).map_err(|e| e.to_string())
            }
            2 => {
                let lo = number_arg(api, l, 1)?;
                let hi = number_arg(api, l, 2)?;
                g.next_range(lo, hi).map(Draw::Int).map_err(|e| e.to_string())
            }
            _ => Err("wrong number of arguments".to_string()),
        }
    })();

    match outcome {
        Ok(Draw::Real(x)) => {
            (api.pushnumber)(l, x);
            1
        }
        Ok(Draw::Int(i)) => {
            (api.pushinteger)(l, i);
            1
        }
        Err(msg) => raise(api, l, msg),
    }
}

/// `math.randomseed` replacement: reseeds the instance-private generator.
pub unsafe extern "C" fn native_randomseed(l: *mut LuaState) -> c_int {
    let Some(loaded) = LOADED.get() else { return 0 };
    let api = &loaded.api;
    let Some(rng) = upvalue_rng(api, l) else { return 0 };

    match number_arg(api, l, 1) {
        Ok(seed) => {
            let mut g = match rng.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            g.reseed(seed);
            0
        }
        Err(msg) => raise(api, l, msg),
    }
}
