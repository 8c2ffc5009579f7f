//! Generic interop-module runtime (C6): the message loop every `fip-*`
//! child process drives, parameterized over a [`ModuleHandler`].
//!
//! Grounded on the teacher's `Handler`/dispatch split (`dispatch.rs`):
//! wire-level concerns live here, language-specific logic lives behind a
//! small trait the caller implements once per interop module.

mod error;
mod handler;

pub use error::SlaveError;
pub use handler::{CompileOutcome, ModuleHandler};

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use fip_proto::{
    decode_frame, encode_frame, FIP_MSG_SIZE, KillReason, Message, Signature,
};
use fip_transport::{read_frame, write_message};

/// Why [`run`] returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveExit {
    /// The master sent `Kill { reason: Finish }`.
    Finished,
    /// The master sent `Kill { reason: VersionMismatch }`: this module's
    /// `ConnectRequest` version did not match what the master expected.
    VersionMismatch,
}

/// Sends the initial handshake, then services requests from `reader`
/// until the master sends `Kill` or closes the pipe.
///
/// `version` is this module's own protocol version, echoed in
/// `ConnectRequest` for the master's handshake check (`spec.md` §4.5.3).
pub async fn run<H, R, W>(
    handler: &mut H,
    version: (u8, u8, u8),
    mut reader: R,
    mut writer: W,
) -> Result<SlaveExit, SlaveError>
where
    H: ModuleHandler,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    send(
        &mut writer,
        &Message::ConnectRequest {
            setup_ok: handler.setup_ok(),
            version,
            module_name: handler.module_name().to_string(),
        },
    )
    .await?;
    info!(module = handler.module_name(), "sent ConnectRequest");

    loop {
        let payload = match read_frame(&mut reader).await? {
            Some(payload) => payload,
            None => return Err(SlaveError::MasterHungUp),
        };
        let message = decode_frame(&payload);

        match message {
            Message::SymbolRequest { signature } => {
                let response = handle_symbol_request(handler, signature);
                send(&mut writer, &response).await?;
            }
            Message::CompileRequest { target } => {
                let outcome = handler.compile(&target);
                send(
                    &mut writer,
                    &Message::ObjectResponse {
                        has_obj: outcome.has_obj,
                        compilation_failed: outcome.compilation_failed,
                        module_name: handler.module_name().to_string(),
                        paths: outcome.paths,
                    },
                )
                .await?;
            }
            Message::TagRequest { tag } => {
                let is_present = handler.has_tag(&tag);
                send(&mut writer, &Message::TagPresentResponse { is_present }).await?;
                if is_present {
                    for signature in handler.symbols_for_tag(&tag) {
                        send(
                            &mut writer,
                            &Message::TagSymbolResponse {
                                signature: Some(signature),
                            },
                        )
                        .await?;
                    }
                    send(&mut writer, &Message::TagSymbolResponse { signature: None }).await?;
                }
            }
            Message::Kill { reason } => {
                return Ok(match reason {
                    KillReason::Finish => SlaveExit::Finished,
                    KillReason::VersionMismatch => SlaveExit::VersionMismatch,
                });
            }
            Message::Unknown => {
                warn!("received undecodable or unexpected message, ignoring");
            }
            other => {
                warn!(kind = other.kind(), "received message not valid for a slave to receive, ignoring");
            }
        }
    }
}

fn handle_symbol_request<H: ModuleHandler>(handler: &mut H, query: Signature) -> Message {
    match handler.lookup_symbol(&query) {
        Some(signature) => Message::SymbolResponse {
            found: true,
            module_name: handler.module_name().to_string(),
            signature,
        },
        // No match: echo the query back verbatim rather than inventing a
        // placeholder signature (see `fip-proto`'s `Message::SymbolResponse`
        // doc comment for why `found = false` still carries a signature).
        None => Message::SymbolResponse {
            found: false,
            module_name: handler.module_name().to_string(),
            signature: query,
        },
    }
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, message: &Message) -> Result<(), SlaveError> {
    let mut buf = [0u8; FIP_MSG_SIZE];
    let total = encode_frame(message, &mut buf)
        .map_err(|_| fip_transport::TransportError::InvalidLength(FIP_MSG_SIZE))?;
    write_message(writer, &buf[..total]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fip_proto::{FnSig, TargetTriple};
    use fip_types::{PrimitiveKind, Type};

    struct FakeModule {
        name: String,
        symbols: Vec<(Signature, &'static str)>,
    }

    impl ModuleHandler for FakeModule {
        fn module_name(&self) -> &str {
            &self.name
        }

        fn setup_ok(&self) -> bool {
            true
        }

        fn lookup_symbol(&mut self, query: &Signature) -> Option<Signature> {
            self.symbols
                .iter()
                .find(|(sig, _)| sig == query)
                .map(|(sig, _)| sig.clone())
        }

        fn compile(&mut self, _target: &TargetTriple) -> CompileOutcome {
            CompileOutcome {
                has_obj: true,
                compilation_failed: false,
                paths: vec!["aB3k9Xyz".to_string()],
            }
        }

        fn has_tag(&self, tag: &str) -> bool {
            self.symbols.iter().any(|(_, t)| *t == tag)
        }

        fn symbols_for_tag(&self, tag: &str) -> Vec<Signature> {
            self.symbols
                .iter()
                .filter(|(_, t)| *t == tag)
                .map(|(sig, _)| sig.clone())
                .collect()
        }
    }

    fn fn_sig(name: &str) -> Signature {
        Signature::Function(FnSig {
            name: name.to_string(),
            args: vec![Type::primitive(PrimitiveKind::I32, false)],
            rets: vec![],
        })
    }

    async fn write_frame<W: tokio::io::AsyncWrite + Unpin>(w: &mut W, msg: &Message) {
        let mut buf = [0u8; FIP_MSG_SIZE];
        let total = encode_frame(msg, &mut buf).unwrap();
        write_message(w, &buf[..total]).await.unwrap();
    }

    #[tokio::test]
    async fn sends_connect_request_then_answers_symbol_lookup() {
        let mut handler = FakeModule {
            name: "fip-c".to_string(),
            symbols: vec![(fn_sig("add"), "ext")],
        };

        let (mut to_slave_w, to_slave_r) = tokio::io::duplex(4096);
        let (from_slave_w, mut from_slave_r) = tokio::io::duplex(4096);

        let run_handle = tokio::spawn(async move {
            run(&mut handler, (1, 0, 0), to_slave_r, from_slave_w).await
        });

        let connect = read_frame(&mut from_slave_r).await.unwrap().unwrap();
        assert_eq!(
            decode_frame(&connect),
            Message::ConnectRequest {
                setup_ok: true,
                version: (1, 0, 0),
                module_name: "fip-c".to_string(),
            }
        );

        write_frame(
            &mut to_slave_w,
            &Message::SymbolRequest {
                signature: fn_sig("add"),
            },
        )
        .await;
        let response = read_frame(&mut from_slave_r).await.unwrap().unwrap();
        assert_eq!(
            decode_frame(&response),
            Message::SymbolResponse {
                found: true,
                module_name: "fip-c".to_string(),
                signature: fn_sig("add"),
            }
        );

        write_frame(
            &mut to_slave_w,
            &Message::Kill {
                reason: KillReason::Finish,
            },
        )
        .await;
        let exit = run_handle.await.unwrap().unwrap();
        assert_eq!(exit, SlaveExit::Finished);
    }

    #[tokio::test]
    async fn tag_request_streams_matches_then_terminates() {
        let mut handler = FakeModule {
            name: "fip-c".to_string(),
            symbols: vec![(fn_sig("add"), "ext"), (fn_sig("sub"), "ext")],
        };

        let (mut to_slave_w, to_slave_r) = tokio::io::duplex(4096);
        let (from_slave_w, mut from_slave_r) = tokio::io::duplex(4096);

        let run_handle = tokio::spawn(async move {
            run(&mut handler, (1, 0, 0), to_slave_r, from_slave_w).await
        });

        let _connect = read_frame(&mut from_slave_r).await.unwrap().unwrap();

        write_frame(
            &mut to_slave_w,
            &Message::TagRequest {
                tag: "ext".to_string(),
            },
        )
        .await;

        let present = read_frame(&mut from_slave_r).await.unwrap().unwrap();
        assert_eq!(
            decode_frame(&present),
            Message::TagPresentResponse { is_present: true }
        );

        let first = read_frame(&mut from_slave_r).await.unwrap().unwrap();
        assert_eq!(
            decode_frame(&first),
            Message::TagSymbolResponse {
                signature: Some(fn_sig("add"))
            }
        );
        let second = read_frame(&mut from_slave_r).await.unwrap().unwrap();
        assert_eq!(
            decode_frame(&second),
            Message::TagSymbolResponse {
                signature: Some(fn_sig("sub"))
            }
        );
        let terminator = read_frame(&mut from_slave_r).await.unwrap().unwrap();
        assert_eq!(
            decode_frame(&terminator),
            Message::TagSymbolResponse { signature: None }
        );

        write_frame(
            &mut to_slave_w,
            &Message::Kill {
                reason: KillReason::Finish,
            },
        )
        .await;
        run_handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn master_hangup_without_kill_is_an_error() {
        let mut handler = FakeModule {
            name: "fip-c".to_string(),
            symbols: vec![],
        };

        let (to_slave_w, to_slave_r) = tokio::io::duplex(4096);
        let (from_slave_w, mut from_slave_r) = tokio::io::duplex(4096);

        let run_handle = tokio::spawn(async move {
            run(&mut handler, (1, 0, 0), to_slave_r, from_slave_w).await
        });

        let _connect = read_frame(&mut from_slave_r).await.unwrap().unwrap();
        drop(to_slave_w);

        let result = run_handle.await.unwrap();
        assert!(matches!(result, Err(SlaveError::MasterHungUp)));
    }
}
