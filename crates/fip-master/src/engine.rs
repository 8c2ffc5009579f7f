use std::time::Duration;

use tracing::{info, warn};

use fip_proto::{
    decode_frame, encode_frame, KillReason, Message, Signature, TargetTriple, FIP_MAX_SLAVES,
    FIP_MSG_SIZE, FIP_PROTOCOL_VERSION, FIP_RESPONSE_TIMEOUT_SECS,
};
use fip_transport::{read_frame, write_message};

use crate::child::{wait_or_kill, ChildHandle, ManagedChild, StreamChild};
use crate::error::MasterError;

fn round_deadline() -> Duration {
    Duration::from_secs_f64(FIP_RESPONSE_TIMEOUT_SECS)
}

/// Outcome of a `compile_request` round across every spawned module
/// (`spec.md` §4.5.5, resolved per §9: success is "no wrong response AND no
/// `compilation_failed`", not "every module produced an object").
#[derive(Debug, Default)]
pub struct CompileResult {
    pub succeeded: bool,
    /// Path hashes from every module that reported `has_obj = true`.
    pub paths: Vec<String>,
    pub faulty_modules: Vec<String>,
}

/// Outcome of a `tag_request` streaming round (`spec.md` §4.5.6).
#[derive(Debug, PartialEq)]
pub enum TagOutcome {
    /// No module reported the tag present.
    Unknown,
    /// More than one module reported the tag present.
    Ambiguous,
    /// Exactly one module provides the tag; these are its symbols.
    Provided {
        module_name: String,
        signatures: Vec<Signature>,
    },
}

/// Owns every spawned interop module and drives the round-based dialogue
/// described in `spec.md` §4.5: spawn, broadcast, await with per-child
/// deadlines, and the three request/response rounds built on top.
pub struct MasterState {
    children: Vec<Box<dyn ChildHandle>>,
}

impl Default for MasterState {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterState {
    pub fn new() -> Self {
        MasterState {
            children: Vec::new(),
        }
    }

    pub fn module_names(&self) -> Vec<String> {
        self.children.iter().map(|c| c.module_name().to_string()).collect()
    }

    /// Spawns `program` as interop module `module_name` and performs the
    /// version handshake (`spec.md` §4.5.3): the child's first message must
    /// be a `ConnectRequest` whose version matches ours, within one round
    /// deadline. On mismatch, a `Kill { VersionMismatch }` is sent before
    /// returning the error, matching `spec.md`'s fatal-handshake behavior.
    pub async fn spawn_module(
        &mut self,
        module_name: &str,
        program: &str,
        args: &[String],
    ) -> Result<(), MasterError> {
        if self.children.len() >= FIP_MAX_SLAVES {
            return Err(MasterError::Faulty {
                module: module_name.to_string(),
                detail: format!("already at the cap of {FIP_MAX_SLAVES} modules"),
            });
        }

        let child = ManagedChild::spawn(module_name, program, args)?;
        info!(module = module_name, "spawned interop module");
        self.handshake(Box::new(child)).await
    }

    /// Handshakes with a module reached over an arbitrary duplex stream
    /// rather than a spawned process's stdio. Useful for transports other
    /// than a child process, and for driving the engine against an
    /// in-process fake module in integration tests.
    pub async fn connect_stream<S>(&mut self, module_name: &str, stream: S) -> Result<(), MasterError>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        self.handshake(Box::new(StreamChild::new(module_name, stream))).await
    }

    /// Shared by [`spawn_module`](Self::spawn_module) and tests: runs the
    /// handshake against an already-constructed [`ChildHandle`] and, on
    /// success, adds it to the managed set.
    async fn handshake(&mut self, mut child: Box<dyn ChildHandle>) -> Result<(), MasterError> {
        let module_name = child.module_name().to_string();

        let handshake = tokio::time::timeout(round_deadline(), read_frame(child.reader()))
            .await
            .map_err(|_| MasterError::Timeout {
                module: module_name.clone(),
            })?
            .map_err(|source| MasterError::Transport {
                module: module_name.clone(),
                source,
            })?;

        let Some(payload) = handshake else {
            return Err(MasterError::Transport {
                module: module_name.clone(),
                source: fip_transport::TransportError::ShortRead,
            });
        };

        match decode_frame(&payload) {
            Message::ConnectRequest { version, .. } if version == FIP_PROTOCOL_VERSION => {
                self.children.push(child);
                Ok(())
            }
            Message::ConnectRequest { .. } => {
                send_to(
                    child.as_mut(),
                    &Message::Kill {
                        reason: KillReason::VersionMismatch,
                    },
                )
                .await
                .ok();
                Err(MasterError::VersionMismatch { module: module_name })
            }
            _ => Err(MasterError::Faulty {
                module: module_name,
                detail: "first message was not ConnectRequest".to_string(),
            }),
        }
    }

    /// Sends `msg` to every spawned module, resetting each child's
    /// `wrong_count` for the round about to begin.
    async fn broadcast(&mut self, msg: &Message) -> Vec<Result<(), MasterError>> {
        let mut results = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            child.set_wrong_count(0);
            results.push(send_to(child.as_mut(), msg).await);
        }
        results
    }

    /// Reads one response from every child within [`round_deadline`],
    /// incrementing `wrong_count` for any timeout, transport error, or
    /// `Unknown` decode. A child's own response ordering is per-module:
    /// this does not block a fast child on a slow one.
    async fn await_responses(&mut self) -> Vec<Result<Message, MasterError>> {
        let mut results = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            let outcome = tokio::time::timeout(round_deadline(), read_frame(child.reader())).await;
            let result = match outcome {
                Err(_) => {
                    child.set_wrong_count(child.wrong_count() + 1);
                    Err(MasterError::Timeout {
                        module: child.module_name().to_string(),
                    })
                }
                Ok(Err(source)) => {
                    child.set_wrong_count(child.wrong_count() + 1);
                    Err(MasterError::Transport {
                        module: child.module_name().to_string(),
                        source,
                    })
                }
                Ok(Ok(None)) => {
                    child.set_wrong_count(child.wrong_count() + 1);
                    Err(MasterError::Transport {
                        module: child.module_name().to_string(),
                        source: fip_transport::TransportError::ShortRead,
                    })
                }
                Ok(Ok(Some(payload))) => {
                    let message = decode_frame(&payload);
                    if message == Message::Unknown {
                        child.set_wrong_count(child.wrong_count() + 1);
                        Err(MasterError::Faulty {
                            module: child.module_name().to_string(),
                            detail: "response decoded to Unknown".to_string(),
                        })
                    } else {
                        Ok(message)
                    }
                }
            };
            results.push(result);
        }
        results
    }

    /// Existential-OR symbol lookup across every module (`spec.md` §4.5.4):
    /// the first module that reports `found = true` wins.
    pub async fn symbol_request(&mut self, signature: Signature) -> Option<(String, Signature)> {
        self.broadcast(&Message::SymbolRequest { signature }).await;
        let responses = self.await_responses().await;
        for response in responses {
            if let Ok(Message::SymbolResponse {
                found: true,
                module_name,
                signature,
            }) = response
            {
                return Some((module_name, signature));
            }
        }
        None
    }

    /// Compile round across every module (`spec.md` §4.5.5).
    pub async fn compile_request(&mut self, target: TargetTriple) -> CompileResult {
        self.broadcast(&Message::CompileRequest { target }).await;
        let responses = self.await_responses().await;

        let mut result = CompileResult {
            succeeded: true,
            ..Default::default()
        };
        for response in responses {
            match response {
                Ok(Message::ObjectResponse {
                    has_obj,
                    compilation_failed,
                    module_name,
                    paths,
                }) => {
                    if compilation_failed {
                        result.succeeded = false;
                        result.faulty_modules.push(module_name);
                    } else if has_obj {
                        result.paths.extend(paths);
                    }
                }
                Ok(_) | Err(_) => {
                    result.succeeded = false;
                }
            }
        }
        result
    }

    /// Streaming tag lookup (`spec.md` §4.5.6): broadcast, collect
    /// presence, then drain the symbol stream from every module that
    /// claimed the tag (a module proceeds to stream unconditionally once
    /// it has reported `is_present`, so the master must read every stream
    /// to completion even when the overall answer is `Unknown`/`Ambiguous`).
    pub async fn tag_request(&mut self, tag: String) -> TagOutcome {
        self.broadcast(&Message::TagRequest { tag }).await;
        let presence = self.await_responses().await;

        let provider_indices: Vec<usize> = presence
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match r {
                Ok(Message::TagPresentResponse { is_present: true }) => Some(i),
                _ => None,
            })
            .collect();

        let mut drained: Vec<(String, Vec<Signature>)> = Vec::new();
        for idx in provider_indices {
            let module_name = self.children[idx].module_name().to_string();
            let signatures = self.drain_tag_stream(idx).await;
            drained.push((module_name, signatures));
        }

        match drained.len() {
            0 => TagOutcome::Unknown,
            1 => {
                let (module_name, signatures) = drained.into_iter().next().unwrap();
                TagOutcome::Provided {
                    module_name,
                    signatures,
                }
            }
            _ => TagOutcome::Ambiguous,
        }
    }

    async fn drain_tag_stream(&mut self, idx: usize) -> Vec<Signature> {
        let mut signatures = Vec::new();
        loop {
            let child = &mut self.children[idx];
            let outcome = tokio::time::timeout(round_deadline(), read_frame(child.reader())).await;
            match outcome {
                Ok(Ok(Some(payload))) => match decode_frame(&payload) {
                    Message::TagSymbolResponse { signature: Some(sig) } => signatures.push(sig),
                    Message::TagSymbolResponse { signature: None } => break,
                    _ => {
                        child.set_wrong_count(child.wrong_count() + 1);
                        break;
                    }
                },
                _ => {
                    child.set_wrong_count(child.wrong_count() + 1);
                    break;
                }
            }
        }
        signatures
    }

    /// Broadcasts `Kill`, waits a grace period for each child to exit on
    /// its own, then force-terminates any straggler (`spec.md` §4.5.7).
    pub async fn shutdown(&mut self, reason: KillReason, grace: Duration) {
        self.broadcast(&Message::Kill { reason }).await;
        for child in &mut self.children {
            if let Some(process) = child.take_process() {
                wait_or_kill(process, grace).await;
            }
            child.stop_stderr_forward();
        }
        self.children.clear();
        warn!("all interop modules shut down");
    }
}

async fn send_to(child: &mut dyn ChildHandle, msg: &Message) -> Result<(), MasterError> {
    let mut buf = [0u8; FIP_MSG_SIZE];
    let total = encode_frame(msg, &mut buf).map_err(|_| MasterError::Faulty {
        module: child.module_name().to_string(),
        detail: "message did not fit in a frame".to_string(),
    })?;
    write_message(child.writer(), &buf[..total])
        .await
        .map_err(|source| MasterError::Transport {
            module: child.module_name().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child::StreamChild;
    use fip_proto::{FnSig, KillReason};
    use fip_types::{PrimitiveKind, Type};

    fn fn_sig(name: &str) -> Signature {
        Signature::Function(FnSig {
            name: name.to_string(),
            args: vec![Type::primitive(PrimitiveKind::I32, false)],
            rets: vec![],
        })
    }

    async fn write_frame(stream: &mut tokio::io::DuplexStream, msg: &Message) {
        let mut buf = [0u8; FIP_MSG_SIZE];
        let total = encode_frame(msg, &mut buf).unwrap();
        write_message(stream, &buf[..total]).await.unwrap();
    }

    async fn read_and_decode(stream: &mut tokio::io::DuplexStream) -> Message {
        let payload = read_frame(stream).await.unwrap().unwrap();
        decode_frame(&payload)
    }

    /// Connects a `StreamChild` straight past the handshake, as if
    /// `ConnectRequest` had already been exchanged, for tests that only
    /// care about round logic.
    async fn add_connected_child(state: &mut MasterState, name: &str) -> tokio::io::DuplexStream {
        let (master_side, module_side) = tokio::io::duplex(FIP_MSG_SIZE * 4);
        state.children.push(Box::new(StreamChild::new(name, module_side)));
        master_side
    }

    #[tokio::test]
    async fn handshake_accepts_matching_version() {
        let mut state = MasterState::new();
        let (mut master_side, module_side) = tokio::io::duplex(FIP_MSG_SIZE * 4);
        let child = Box::new(StreamChild::new("fip-c", module_side));

        write_frame(
            &mut master_side,
            &Message::ConnectRequest {
                setup_ok: true,
                version: FIP_PROTOCOL_VERSION,
                module_name: "fip-c".to_string(),
            },
        )
        .await;

        state.handshake(child).await.unwrap();
        assert_eq!(state.module_names(), vec!["fip-c".to_string()]);
    }

    #[tokio::test]
    async fn handshake_rejects_version_mismatch_and_sends_kill() {
        let mut state = MasterState::new();
        let (mut master_side, module_side) = tokio::io::duplex(FIP_MSG_SIZE * 4);
        let child = Box::new(StreamChild::new("fip-c", module_side));

        write_frame(
            &mut master_side,
            &Message::ConnectRequest {
                setup_ok: true,
                version: (9, 9, 9),
                module_name: "fip-c".to_string(),
            },
        )
        .await;

        let result = state.handshake(child).await;
        assert!(matches!(result, Err(MasterError::VersionMismatch { .. })));

        let kill = read_and_decode(&mut master_side).await;
        assert_eq!(
            kill,
            Message::Kill {
                reason: KillReason::VersionMismatch
            }
        );
    }

    #[tokio::test]
    async fn symbol_request_returns_first_found() {
        let mut state = MasterState::new();
        let mut a = add_connected_child(&mut state, "fip-zig").await;
        let mut b = add_connected_child(&mut state, "fip-c").await;

        let query = fn_sig("add");
        let handle = tokio::spawn(async move { state.symbol_request(query).await.map(|(m, _)| m) });

        assert_eq!(
            read_and_decode(&mut a).await,
            Message::SymbolRequest { signature: fn_sig("add") }
        );
        write_frame(
            &mut a,
            &Message::SymbolResponse {
                found: false,
                module_name: "fip-zig".to_string(),
                signature: fn_sig("add"),
            },
        )
        .await;

        assert_eq!(
            read_and_decode(&mut b).await,
            Message::SymbolRequest { signature: fn_sig("add") }
        );
        write_frame(
            &mut b,
            &Message::SymbolResponse {
                found: true,
                module_name: "fip-c".to_string(),
                signature: fn_sig("add"),
            },
        )
        .await;

        assert_eq!(handle.await.unwrap(), Some("fip-c".to_string()));
    }

    #[tokio::test]
    async fn compile_request_fails_on_any_compilation_failure() {
        let mut state = MasterState::new();
        let mut a = add_connected_child(&mut state, "fip-c").await;
        let mut b = add_connected_child(&mut state, "fip-zig").await;

        let target = TargetTriple::default();
        let handle = tokio::spawn(async move { state.compile_request(target).await });

        let _ = read_and_decode(&mut a).await;
        write_frame(
            &mut a,
            &Message::ObjectResponse {
                has_obj: true,
                compilation_failed: false,
                module_name: "fip-c".to_string(),
                paths: vec!["aB3k9Xyz".to_string()],
            },
        )
        .await;

        let _ = read_and_decode(&mut b).await;
        write_frame(
            &mut b,
            &Message::ObjectResponse {
                has_obj: false,
                compilation_failed: true,
                module_name: "fip-zig".to_string(),
                paths: vec![],
            },
        )
        .await;

        let result = handle.await.unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.faulty_modules, vec!["fip-zig".to_string()]);
    }

    #[tokio::test]
    async fn tag_request_with_two_providers_is_ambiguous_but_drains_both() {
        let mut state = MasterState::new();
        let mut a = add_connected_child(&mut state, "fip-c").await;
        let mut b = add_connected_child(&mut state, "fip-zig").await;

        let handle = tokio::spawn(async move { state.tag_request("ext".to_string()).await });

        let _ = read_and_decode(&mut a).await;
        write_frame(&mut a, &Message::TagPresentResponse { is_present: true }).await;
        write_frame(
            &mut a,
            &Message::TagSymbolResponse { signature: Some(fn_sig("a_export")) },
        )
        .await;
        write_frame(&mut a, &Message::TagSymbolResponse { signature: None }).await;

        let _ = read_and_decode(&mut b).await;
        write_frame(&mut b, &Message::TagPresentResponse { is_present: true }).await;
        write_frame(&mut b, &Message::TagSymbolResponse { signature: None }).await;

        assert_eq!(handle.await.unwrap(), TagOutcome::Ambiguous);
    }

    #[tokio::test]
    async fn tag_request_with_no_providers_is_unknown() {
        let mut state = MasterState::new();
        let mut a = add_connected_child(&mut state, "fip-c").await;

        let handle = tokio::spawn(async move { state.tag_request("ext".to_string()).await });

        let _ = read_and_decode(&mut a).await;
        write_frame(&mut a, &Message::TagPresentResponse { is_present: false }).await;

        assert_eq!(handle.await.unwrap(), TagOutcome::Unknown);
    }
}
