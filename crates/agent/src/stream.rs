use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub const STREAM_BUFFER: usize = 16;

/// One piece of a streamed reply. Partial chunks carry consecutive
/// fragments; the closing chunk repeats the whole reply with `done` set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyChunk {
    pub text: String,
    pub partial: bool,
    pub done: bool,
}

impl ReplyChunk {
    pub fn fragment(text: impl Into<String>) -> Self {
        Self { text: text.into(), partial: true, done: false }
    }

    pub fn complete(text: impl Into<String>) -> Self {
        Self { text: text.into(), partial: false, done: true }
    }
}

/// Splits a reply into fragments of `words_per_chunk` words. Whitespace
/// (including newlines) stays attached to the preceding word, so the
/// fragments concatenate back to the reply.
pub fn chunk_reply(reply: &str, words_per_chunk: usize) -> Vec<ReplyChunk> {
    let words_per_chunk = words_per_chunk.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut words = 0;
    let mut in_word = false;

    for character in reply.chars() {
        if character.is_whitespace() {
            if in_word {
                words += 1;
                in_word = false;
            }
        } else {
            if !in_word && words == words_per_chunk {
                chunks.push(ReplyChunk::fragment(std::mem::take(&mut current)));
                words = 0;
            }
            in_word = true;
        }
        current.push(character);
    }
    if !current.is_empty() {
        chunks.push(ReplyChunk::fragment(current));
    }

    chunks.push(ReplyChunk::complete(reply));
    chunks
}

/// Delivers the reply over a bounded channel from a background task. The
/// task stops as soon as the receiver is dropped.
pub fn stream_reply(
    reply: String,
    words_per_chunk: usize,
) -> (mpsc::Receiver<ReplyChunk>, JoinHandle<usize>) {
    let (sender, receiver) = mpsc::channel(STREAM_BUFFER);

    let handle = tokio::spawn(async move {
        let mut delivered = 0;
        for chunk in chunk_reply(&reply, words_per_chunk) {
            if sender.send(chunk).await.is_err() {
                debug!(event_name = "reply.stream_cancelled", delivered, "receiver dropped");
                break;
            }
            delivered += 1;
        }
        delivered
    });

    (receiver, handle)
}

#[cfg(test)]
mod tests {
    use super::{chunk_reply, stream_reply, ReplyChunk};

    #[test]
    fn fragments_rebuild_the_reply_and_close_with_full_text() {
        let reply = "Got it: Budget: 500,000 USD.\nHow much space do you need?";
        let chunks = chunk_reply(reply, 3);

        let (last, fragments) = chunks.split_last().expect("closing chunk");
        assert_eq!(last, &ReplyChunk::complete(reply));
        assert!(fragments.iter().all(|chunk| chunk.partial && !chunk.done));
        assert_eq!(fragments.iter().map(|chunk| chunk.text.as_str()).collect::<String>(), reply);
        assert_eq!(fragments[0].text, "Got it: Budget: ");
        assert_eq!(fragments.len(), 4);
    }

    #[test]
    fn empty_reply_only_closes() {
        assert_eq!(chunk_reply("", 4), vec![ReplyChunk::complete("")]);
    }

    #[tokio::test]
    async fn stream_delivers_every_chunk_in_order() {
        let reply = "one two three four five".to_string();
        let (mut receiver, handle) = stream_reply(reply.clone(), 2);

        let mut received = Vec::new();
        while let Some(chunk) = receiver.recv().await {
            received.push(chunk);
        }

        assert_eq!(received, chunk_reply(&reply, 2));
        assert_eq!(handle.await.expect("producer"), received.len());
    }

    #[tokio::test]
    async fn dropping_the_receiver_stops_the_producer() {
        let reply = "word ".repeat(500);
        let (mut receiver, handle) = stream_reply(reply, 1);

        let first = receiver.recv().await.expect("first chunk");
        assert!(first.partial);
        drop(receiver);

        let delivered = handle.await.expect("producer");
        assert!(delivered < 501);
    }
}
