use super::provider::ByteStream;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use std::io;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed { bytes: u64 },
    /// The client went away; the upstream was dropped.
    Canceled { bytes: u64 },
    /// The upstream failed. With `bytes > 0` the client received a truncated
    /// body and the connection was aborted.
    Failed { bytes: u64, reason: String },
}

pub struct Relay {
    /// Body stream for the response. Dropping it cancels the relay.
    pub body: BoxStream<'static, Result<Bytes, io::Error>>,
    pub outcome: JoinHandle<RelayOutcome>,
}

/// Copies `upstream` into a bounded channel feeding the returned body.
///
/// The upstream is only polled once the channel has room, so a slow client
/// throttles the provider instead of growing a buffer. Failures are never
/// retried.
pub fn spawn_relay(upstream: ByteStream, capacity: usize) -> Relay {
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let outcome = tokio::spawn(pump(upstream, tx, cancel.clone()));

    let state: (mpsc::Receiver<Result<Bytes, io::Error>>, DropGuard) = (rx, cancel.drop_guard());
    let body = futures::stream::unfold(state, |(mut rx, guard)| async move {
        rx.recv().await.map(|item| (item, (rx, guard)))
    })
    .boxed();

    Relay { body, outcome }
}

async fn pump(
    mut upstream: ByteStream,
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
    cancel: CancellationToken,
) -> RelayOutcome {
    let mut bytes = 0u64;

    let outcome = loop {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = tx.reserve() => permit.ok(),
        };
        let Some(permit) = permit else {
            break RelayOutcome::Canceled { bytes };
        };

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next = upstream.next() => Some(next),
        };
        let Some(next) = next else {
            break RelayOutcome::Canceled { bytes };
        };

        match next {
            Some(Ok(chunk)) => {
                bytes += chunk.len() as u64;
                permit.send(Ok(chunk));
            }
            Some(Err(e)) => {
                let reason = e.to_string();
                permit.send(Err(io::Error::other(reason.clone())));
                break RelayOutcome::Failed { bytes, reason };
            }
            None => break RelayOutcome::Completed { bytes },
        }
    };

    // Releases the provider's resources (for yt-dlp, kills the child).
    drop(upstream);
    outcome
}
