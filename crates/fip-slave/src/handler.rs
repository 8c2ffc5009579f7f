use fip_proto::{Signature, TargetTriple};

/// Result of a [`ModuleHandler::compile`] call, carried back to the master
/// as an `ObjectResponse` (`spec.md` §3.3, tag 5).
#[derive(Debug, Clone, Default)]
pub struct CompileOutcome {
    /// At least one object file was produced.
    pub has_obj: bool,
    /// Compilation was attempted and failed outright.
    pub compilation_failed: bool,
    /// Path hashes of the produced object files (`fip_hash::create_hash`
    /// applied to each output path), at most `FIP_PATHS_SIZE /
    /// FIP_PATH_SIZE` entries.
    pub paths: Vec<String>,
}

/// What an interop module actually knows how to do, independent of the
/// wire protocol that drives it (`spec.md` §4.6, Slave Runtime).
///
/// [`crate::run`] owns the message loop; a `ModuleHandler` owns the
/// per-language logic — source scanning, invoking a compiler, matching
/// fingerprints — and never touches a byte of wire framing.
pub trait ModuleHandler: Send {
    /// The fixed, at-most-16-byte name this module reports in its
    /// `ConnectRequest` (`spec.md` §4.1, `FIP_MAX_MODULE_NAME_LEN`).
    fn module_name(&self) -> &str;

    /// Whether module-specific setup (config load, source scan) succeeded.
    /// A `false` here is still sent as `ConnectRequest { setup_ok: false,
    /// .. } }`; the master decides what to do about it.
    fn setup_ok(&self) -> bool;

    /// Looks up `query` by structural fingerprint (`spec.md` §4.3: exact
    /// name plus structurally-equal argument/return types including
    /// `is_mutable`). Returns the module's own signature for the symbol
    /// when found, so the caller can echo it back even though the query
    /// and the stored signature are fingerprint-equal by construction.
    fn lookup_symbol(&mut self, query: &Signature) -> Option<Signature>;

    /// Compiles this module's sources for `target`.
    fn compile(&mut self, target: &TargetTriple) -> CompileOutcome;

    /// Whether any symbol in this module carries `tag`.
    fn has_tag(&self, tag: &str) -> bool;

    /// Every signature in this module carrying `tag`, in a stable order —
    /// streamed back to the master one `TagSymbolResponse` per entry,
    /// terminated by an empty one (`spec.md` §4.5.6).
    fn symbols_for_tag(&self, tag: &str) -> Vec<Signature>;
}
