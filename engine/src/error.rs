//! Binding-layer error types.

/// Errors produced while loading the native engine or driving an
/// interpreter instance.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Dynamic loading failed (dlopen/LoadLibrary or symbol resolution).
    #[error("native engine link failure: {0}")]
    Link(#[from] libloading::Error),

    /// A required symbol is missing from the loaded library.
    #[error("missing engine symbol: {0}")]
    MissingSymbol(String),

    /// The engine could not allocate a new interpreter state.
    #[error("interpreter state allocation failed")]
    OutOfMemory,

    /// A caller-supplied argument was rejected (e.g. an empty random range).
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// The engine reported a runtime error while evaluating guest code.
    #[error("engine runtime error: {0}")]
    Runtime(String),
}
