//! `fip-c-im`: an example interop module showing how a language binding
//! plugs into the slave runtime ([`fip_slave::run`]) end to end — source
//! scanning, compiling, and tag lookup, wired over real stdio pipes.
//!
//! Real C parsing is out of scope; this module recognizes a small export
//! marker convention (`// fip:export tag=<tag>` above a function
//! declaration) in a fixed demo source file, and shells out to `cc` to
//! actually produce an object file.

use std::path::PathBuf;
use std::process::Command;

use fip_proto::{FnSig, Signature, TargetTriple};
use fip_slave::{CompileOutcome, ModuleHandler};
use fip_types::{PrimitiveKind, Type};

const DEMO_SOURCE: &str = include_str!("../demo/source.c");
const MODULE_NAME: &str = "fip-c";

/// One function recognized by the export-marker scanner.
struct ScannedFn {
    signature: FnSig,
    tag: String,
}

/// Scans `source` for `// fip:export tag=<tag>` markers immediately
/// preceding a `<ret-type> <name>(<args>)` declaration, turning each
/// recognized argument/return into an `i32`/`void` [`Type`] — enough to
/// exercise the wire format without a real C type system.
fn scan_exports(source: &str) -> Vec<ScannedFn> {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(marker) = line.trim().strip_prefix("// fip:export ") else {
            continue;
        };
        let Some(tag) = marker.trim().strip_prefix("tag=") else {
            continue;
        };
        let Some(decl) = lines.get(i + 1) else {
            continue;
        };
        if let Some(scanned) = parse_decl(decl, tag.trim()) {
            out.push(scanned);
        }
    }

    out
}

fn parse_decl(decl: &str, tag: &str) -> Option<ScannedFn> {
    let open = decl.find('(')?;
    let close = decl[open..].find(')')? + open;
    let head = decl[..open].trim();
    let (_ret, name) = head.rsplit_once(' ')?;

    let args_text = decl[open + 1..close].trim();
    let args = if args_text.is_empty() {
        Vec::new()
    } else {
        args_text
            .split(',')
            .map(|_| Type::primitive(PrimitiveKind::I32, false))
            .collect()
    };

    Some(ScannedFn {
        signature: FnSig {
            name: name.to_string(),
            args,
            rets: vec![Type::primitive(PrimitiveKind::I32, false)],
        },
        tag: tag.to_string(),
    })
}

struct CModule {
    exports: Vec<ScannedFn>,
    setup_ok: bool,
    work_dir: PathBuf,
}

impl CModule {
    fn new() -> Self {
        let exports = scan_exports(DEMO_SOURCE);
        Self {
            setup_ok: !exports.is_empty(),
            exports,
            work_dir: std::env::temp_dir().join("fip-c-im"),
        }
    }
}

impl ModuleHandler for CModule {
    fn module_name(&self) -> &str {
        MODULE_NAME
    }

    fn setup_ok(&self) -> bool {
        self.setup_ok
    }

    fn lookup_symbol(&mut self, query: &Signature) -> Option<Signature> {
        let Signature::Function(want) = query else {
            return None;
        };
        self.exports
            .iter()
            .find(|e| e.signature == *want)
            .map(|e| Signature::Function(e.signature.clone()))
    }

    fn compile(&mut self, _target: &TargetTriple) -> CompileOutcome {
        if let Err(e) = std::fs::create_dir_all(&self.work_dir) {
            tracing::warn!("could not create work dir: {e}");
            return CompileOutcome {
                has_obj: false,
                compilation_failed: true,
                paths: Vec::new(),
            };
        }

        let source_path = self.work_dir.join("source.c");
        if std::fs::write(&source_path, DEMO_SOURCE).is_err() {
            return CompileOutcome {
                has_obj: false,
                compilation_failed: true,
                paths: Vec::new(),
            };
        }

        let object_path = self.work_dir.join("source.o");
        let status = Command::new("cc")
            .arg("-c")
            .arg(&source_path)
            .arg("-o")
            .arg(&object_path)
            .status();

        match status {
            Ok(status) if status.success() => CompileOutcome {
                has_obj: true,
                compilation_failed: false,
                paths: vec![fip_hash::create_hash(&object_path.to_string_lossy())],
            },
            _ => CompileOutcome {
                has_obj: false,
                compilation_failed: true,
                paths: Vec::new(),
            },
        }
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.exports.iter().any(|e| e.tag == tag)
    }

    fn symbols_for_tag(&self, tag: &str) -> Vec<Signature> {
        self.exports
            .iter()
            .filter(|e| e.tag == tag)
            .map(|e| Signature::Function(e.signature.clone()))
            .collect()
    }
}

/// Reads the `[slave_index] [log_level]` argv contract `fip-masterd` spawns
/// every interop module with.
fn parse_args() -> (usize, String) {
    let mut args = std::env::args().skip(1);
    let index = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let log_level = args.next().unwrap_or_else(|| "info".to_string());
    (index, log_level)
}

#[tokio::main]
async fn main() {
    let (index, log_level) = parse_args();
    std::env::set_var("RUST_LOG", &log_level);
    fip_log::init("fip-c");

    // Best-effort: this module's own config schema is not interpreted by
    // FIP itself (`spec.md` §6), so a missing file is not fatal here.
    if let Ok(project_root) = std::env::current_dir() {
        match fip_config::load_module_config_value(&project_root, MODULE_NAME) {
            Ok(_) => tracing::debug!("loaded module config"),
            Err(e) => tracing::debug!("no module config loaded: {e}"),
        }
    }

    let mut handler = CModule::new();
    tracing::info!(slave_index = index, exports = handler.exports.len(), "fip-c-im starting");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    match fip_slave::run(&mut handler, fip_proto::FIP_PROTOCOL_VERSION, stdin, stdout).await {
        Ok(exit) => tracing::info!(?exit, "fip-c-im exiting"),
        Err(e) => {
            tracing::error!("fip-c-im exiting on error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_marked_exports_and_skips_unmarked_helpers() {
        let exports = scan_exports(DEMO_SOURCE);
        let names: Vec<&str> = exports.iter().map(|e| e.signature.name.as_str()).collect();
        assert_eq!(names, vec!["add", "sub", "square"]);
        assert!(!names.contains(&"helper_not_exported"));
    }

    #[test]
    fn two_arg_function_has_two_i32_params() {
        let exports = scan_exports(DEMO_SOURCE);
        let add = exports.iter().find(|e| e.signature.name == "add").unwrap();
        assert_eq!(add.signature.args.len(), 2);
        assert_eq!(add.tag, "ext");
    }

    #[test]
    fn tag_lookup_matches_marker_tags() {
        let module = CModule::new();
        assert!(module.has_tag("ext"));
        assert!(module.has_tag("math"));
        assert!(!module.has_tag("missing"));
        assert_eq!(module.symbols_for_tag("math").len(), 1);
    }

    #[test]
    fn lookup_symbol_finds_exact_fingerprint_match() {
        let mut module = CModule::new();
        let query = Signature::Function(FnSig {
            name: "add".to_string(),
            args: vec![
                Type::primitive(PrimitiveKind::I32, false),
                Type::primitive(PrimitiveKind::I32, false),
            ],
            rets: vec![Type::primitive(PrimitiveKind::I32, false)],
        });
        assert!(module.lookup_symbol(&query).is_some());
    }
}
