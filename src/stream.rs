use async_trait::async_trait;
use futures::{ Stream, StreamExt };

use crate::error::StreamFailure;

pub const IN_PROGRESS_MARKER: &str = "▌";

/// The whole answer received so far. Each snapshot extends the previous one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub text: String,
    pub in_progress: bool,
}

impl Snapshot {
    pub fn display(&self) -> String {
        if self.in_progress {
            format!("{}{}", self.text, IN_PROGRESS_MARKER)
        } else {
            self.text.clone()
        }
    }
}

#[async_trait]
pub trait SnapshotSink: Send {
    async fn publish(&mut self, snapshot: &Snapshot);
}

#[derive(Debug, Default)]
pub struct StreamAssembler {
    buffer: String,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment. Empty fragments produce no snapshot.
    pub fn push(&mut self, fragment: &str) -> Option<Snapshot> {
        if fragment.is_empty() {
            return None;
        }
        self.buffer.push_str(fragment);
        Some(Snapshot { text: self.buffer.clone(), in_progress: true })
    }

    pub fn finish(self) -> Snapshot {
        Snapshot { text: self.buffer, in_progress: false }
    }
}

/// Drains `fragments`, publishing every growing snapshot and then the final one.
///
/// On failure the partial text is dropped and only the failure is returned.
pub async fn assemble<S>(mut fragments: S, sink: &mut dyn SnapshotSink) -> Result<String, StreamFailure>
    where S: Stream<Item = Result<String, StreamFailure>> + Unpin
{
    let mut assembler = StreamAssembler::new();
    while let Some(item) = fragments.next().await {
        let fragment = item?;
        if let Some(snapshot) = assembler.push(&fragment) {
            sink.publish(&snapshot).await;
        }
    }
    let done = assembler.finish();
    sink.publish(&done).await;
    Ok(done.text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::StreamFailureKind;
    use futures::stream;

    #[derive(Default)]
    pub(crate) struct CollectingSink {
        pub snapshots: Vec<Snapshot>,
    }

    #[async_trait]
    impl SnapshotSink for CollectingSink {
        async fn publish(&mut self, snapshot: &Snapshot) {
            self.snapshots.push(snapshot.clone());
        }
    }

    #[tokio::test]
    async fn snapshots_grow_and_end_with_full_text() {
        let fragments = stream::iter(
            vec![Ok("Try ".to_string()), Ok(String::new()), Ok("turning it ".to_string()), Ok("off.".to_string())]
        );
        let mut sink = CollectingSink::default();

        let text = assemble(fragments, &mut sink).await.unwrap();

        assert_eq!(text, "Try turning it off.");
        let lengths: Vec<usize> = sink.snapshots.iter().map(|s| s.text.len()).collect();
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(sink.snapshots.len(), 4);
        assert!(sink.snapshots[..3].iter().all(|s| s.in_progress));
        assert_eq!(sink.snapshots[1].display(), "Try turning it ▌");
        let last = sink.snapshots.last().unwrap();
        assert!(!last.in_progress);
        assert_eq!(last.display(), "Try turning it off.");
    }

    #[tokio::test]
    async fn failure_discards_partial_text() {
        let fragments = stream::iter(
            vec![
                Ok("half an ans".to_string()),
                Err(StreamFailure::new(StreamFailureKind::Network, "connection reset"))
            ]
        );
        let mut sink = CollectingSink::default();

        let err = assemble(fragments, &mut sink).await.unwrap_err();

        assert_eq!(err.kind, StreamFailureKind::Network);
        assert_eq!(sink.snapshots.len(), 1);
        assert!(sink.snapshots.iter().all(|s| s.in_progress));
    }

    #[tokio::test]
    async fn empty_stream_finishes_with_empty_text() {
        let mut sink = CollectingSink::default();
        let text = assemble(stream::iter(Vec::<Result<String, StreamFailure>>::new()), &mut sink).await.unwrap();
        assert_eq!(text, "");
        assert_eq!(sink.snapshots, vec![Snapshot { text: String::new(), in_progress: false }]);
    }
}
