use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

use crate::events::NavigationEvent;

/// Forward one navigation event per input line. End of input cancels the
/// frame, matching Ctrl-D on a terminal.
pub async fn run<R>(input: R, events: Sender<NavigationEvent>, cancel: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                let event = NavigationEvent::from_key(&line);
                tracing::debug!(?event, "key received");
                if events.send(event).await.is_err() {
                    return;
                }
                if event == NavigationEvent::Exit {
                    return;
                }
            }
            Ok(None) => {
                tracing::info!("stdin closed; initiating shutdown");
                cancel.cancel();
                return;
            }
            Err(err) => {
                tracing::warn!("key reader failed: {err}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn lines_become_events_and_eof_cancels() {
        let input = BufReader::new(&b"\nb\nr\nn\n"[..]);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        run(input, tx, cancel.clone()).await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                NavigationEvent::Next,
                NavigationEvent::Back,
                NavigationEvent::Reshuffle,
                NavigationEvent::New
            ]
        );
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn exit_key_stops_reading() {
        let input = BufReader::new(&b"q\nb\n"[..]);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        run(input, tx, cancel.clone()).await;
        assert_eq!(rx.try_recv().ok(), Some(NavigationEvent::Exit));
        assert!(rx.try_recv().is_err());
        assert!(!cancel.is_cancelled());
    }
}
