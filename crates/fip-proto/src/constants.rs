/// Every wire message (length prefix included) fits in this many bytes.
pub const FIP_MSG_SIZE: usize = 1024;

/// Largest payload a single frame may carry (`FIP_MSG_SIZE` minus the 4-byte
/// length prefix).
pub const FIP_MAX_PAYLOAD: usize = FIP_MSG_SIZE - 4;

/// Upper bound on concurrently spawned interop modules.
pub const FIP_MAX_SLAVES: usize = 64;

/// Fixed width of a module name field on the wire.
pub const FIP_MAX_MODULE_NAME_LEN: usize = 16;

/// Fixed width of a `FnSig`/`DataSig`/`EnumSig` name field on the wire.
pub const FIP_SIGNATURE_NAME_LEN: usize = 128;

/// Width of one path-hash entry within an `ObjectResponse`.
pub const FIP_PATH_SIZE: usize = 8;

/// Maximum total size of the concatenated path-hash list in an
/// `ObjectResponse`.
pub const FIP_PATHS_SIZE: usize = 992;

/// Cap on modules a master configuration file may enable.
pub const FIP_MAX_ENABLED_MODULES: usize = 16;

/// Cap on a `TagRequest`'s tag string length.
pub const FIP_MAX_TAG_LEN: usize = 128;

/// This implementation's protocol version, sent in every `ConnectRequest`
/// and checked by the master during the handshake (`spec.md` §4.5.3).
pub const FIP_PROTOCOL_VERSION: (u8, u8, u8) = (1, 0, 0);

/// Per-round and per-message deadline for a child's response, in seconds
/// (`spec.md` §9: resolved to 1.0s, configurable).
pub const FIP_RESPONSE_TIMEOUT_SECS: f64 = 1.0;
