use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Empty text asks for a random sample; anything else needs `min_len` characters
pub fn qualifies(text: &str, min_len: usize) -> bool {
    text.is_empty() || text.chars().count() >= min_len
}

/// Forwards trimmed search text to `output` once it has been stable for
/// `delay` and qualifies as a query.
///
/// Runs until `cancel` fires or either channel closes.
pub async fn debounce_queries(
    mut input: watch::Receiver<String>,
    delay: Duration,
    min_len: usize,
    output: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            changed = input.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        // restart the quiet period on every further change
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => break,
                changed = input.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        let text = input.borrow_and_update().trim().to_string();
        if !qualifies(&text, min_len) {
            log::debug!("Ignoring short query {:?}", text);
            continue;
        }
        if output.send(text).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    fn start() -> (
        watch::Sender<String>,
        mpsc::UnboundedReceiver<String>,
        CancellationToken,
    ) {
        let (text_tx, text_rx) = watch::channel(String::new());
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(debounce_queries(text_rx, DELAY, 3, out_tx, cancel.clone()));
        (text_tx, out_rx, cancel)
    }

    #[test]
    fn test_qualifies() {
        assert!(qualifies("", 3));
        assert!(!qualifies("a", 3));
        assert!(!qualifies("ab", 3));
        assert!(qualifies("abc", 3));
        // characters, not bytes
        assert!(!qualifies("äö", 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_typing_emits_last_text_once() {
        let (text, mut out, _cancel) = start();

        for partial in ["m", "mo", "mou", "moun", "mountain"] {
            text.send(partial.to_string()).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(DELAY).await;

        assert_eq!(out.recv().await.as_deref(), Some("mountain"));
        assert!(out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_text_is_dropped() {
        let (text, mut out, _cancel) = start();

        text.send("ab".to_string()).unwrap();
        tokio::time::sleep(DELAY * 2).await;
        assert!(out.try_recv().is_err());

        text.send(String::new()).unwrap();
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(out.try_recv().ok().as_deref(), Some(""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_padding_does_not_count_towards_length() {
        let (text, mut out, _cancel) = start();

        text.send("ab ".to_string()).unwrap();
        tokio::time::sleep(DELAY * 2).await;
        assert!(out.try_recv().is_err());

        text.send("  cat ".to_string()).unwrap();
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(out.try_recv().ok().as_deref(), Some("cat"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_before_quiet_period() {
        let (text, mut out, _cancel) = start();

        text.send("cats".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(out.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(out.try_recv().ok().as_deref(), Some("cats"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_stage() {
        let (text, mut out, cancel) = start();

        cancel.cancel();
        tokio::task::yield_now().await;
        let _ = text.send("cats".to_string());
        tokio::time::sleep(DELAY * 2).await;

        assert!(out.recv().await.is_none());
    }
}
