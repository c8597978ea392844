//! Drives a [`SessionState`] through one chat exchange against the relay.

use futures::StreamExt;
use tracing::{debug, warn};

use crate::assembler::StreamAssembler;
use crate::client::RelayClient;
use crate::error::ClientError;
use crate::session::SessionState;

/// Fetch the model list and fold it into `state`.
pub async fn refresh_models(
    client: &RelayClient,
    state: &SessionState,
) -> Result<SessionState, ClientError> {
    let models = client.list_models().await?;
    Ok(state.with_models(models))
}

/// Run one exchange for `input`, returning the final snapshot.
///
/// `observer` sees every intermediate snapshot in order: the optimistic user
/// message, the assistant placeholder, each content update, and the final
/// idle or error state. When the submission is rejected (blank input, no
/// model, or busy) nothing is sent and `state` is returned unchanged.
///
/// There is no timeout: a stalled stream keeps the exchange pending.
pub async fn run_exchange<F>(
    client: &RelayClient,
    state: &SessionState,
    input: &str,
    mut observer: F,
) -> SessionState
where
    F: FnMut(&SessionState),
{
    let Some((sending, request)) = state.submit(input) else {
        debug!("submission ignored");
        return state.clone();
    };
    observer(&sending);

    let mut stream = match client.chat(&request).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "chat request rejected");
            let failed = sending.fail(e.to_string());
            observer(&failed);
            return failed;
        }
    };

    let mut current = sending.begin_streaming();
    observer(&current);

    let mut assembler = StreamAssembler::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                if assembler.feed(&bytes) {
                    current = current.apply_content(assembler.content());
                    observer(&current);
                }
            }
            Err(e) => {
                warn!(error = %e, received = assembler.content().len(), "chat stream broke");
                let failed = current.fail(e.to_string());
                observer(&failed);
                return failed;
            }
        }
    }

    if assembler.finish() {
        current = current.apply_content(assembler.content());
        observer(&current);
    }
    debug!(
        fragments = assembler.fragment_count(),
        skipped = assembler.skipped_lines(),
        saw_done = assembler.saw_done(),
        "chat stream closed"
    );

    let done = current.complete();
    observer(&done);
    done
}
