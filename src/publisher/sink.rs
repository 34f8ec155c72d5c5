//! Delivery endpoints for query results.

use crate::error::{QueryError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Destination for delivered values.
///
/// `push` fails with `PipeBroken` once the sink is closed. `close` is
/// idempotent and the first reason given is the one consumers observe.
pub trait Sink<T>: Send + Sync {
    fn push(&self, value: T) -> Result<()>;

    fn close(&self, reason: Option<QueryError>);

    fn is_closed(&self) -> bool;
}

/// Configuration for a channel-backed sink.
#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Max buffered values before the sink is closed with `PipeBroken`.
    /// `None` means unbounded.
    /// Default: Some(1000)
    pub buffer_size: Option<usize>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            buffer_size: Some(1000),
        }
    }
}

struct SinkState<T> {
    sender: Mutex<Option<Sender<T>>>,
    reason: Mutex<Option<QueryError>>,
}

impl<T> SinkState<T> {
    fn close(&self, reason: Option<QueryError>) {
        let mut sender = self.sender.lock();
        if sender.take().is_some() {
            *self.reason.lock() = reason;
        }
    }

    fn close_reason(&self) -> QueryError {
        self.reason.lock().clone().unwrap_or(QueryError::PipeBroken)
    }
}

/// Writing half of a channel sink. Clones share the same channel.
pub struct ChannelSink<T> {
    state: Arc<SinkState<T>>,
}

impl<T> Clone for ChannelSink<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

/// Reading half of a channel sink.
pub struct SinkReceiver<T> {
    receiver: Receiver<T>,
    state: Arc<SinkState<T>>,
}

/// Creates a connected sink and receiver.
pub fn channel_sink<T>(config: &SinkConfig) -> (ChannelSink<T>, SinkReceiver<T>) {
    let (sender, receiver) = match config.buffer_size {
        Some(size) => bounded(size),
        None => unbounded(),
    };
    let state = Arc::new(SinkState {
        sender: Mutex::new(Some(sender)),
        reason: Mutex::new(None),
    });
    (
        ChannelSink {
            state: Arc::clone(&state),
        },
        SinkReceiver { receiver, state },
    )
}

impl<T: Send> Sink<T> for ChannelSink<T> {
    fn push(&self, value: T) -> Result<()> {
        let result = match self.state.sender.lock().as_ref() {
            Some(sender) => sender.try_send(value),
            None => return Err(QueryError::PipeBroken),
        };
        match result {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("sink buffer full, closing");
                self.state.close(Some(QueryError::PipeBroken));
                Err(QueryError::PipeBroken)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.state.close(Some(QueryError::PipeBroken));
                Err(QueryError::PipeBroken)
            }
        }
    }

    fn close(&self, reason: Option<QueryError>) {
        self.state.close(reason);
    }

    fn is_closed(&self) -> bool {
        self.state.sender.lock().is_none()
    }
}

impl<T> SinkReceiver<T> {
    /// Blocks for the next value. Once the sink is closed and drained,
    /// returns the close reason (`PipeBroken` if none was given).
    pub fn recv(&self) -> Result<T> {
        self.receiver.recv().map_err(|_| self.state.close_reason())
    }

    /// Returns the next value if one is ready.
    pub fn try_recv(&self) -> Result<Option<T>> {
        match self.receiver.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.state.close_reason()),
        }
    }

    /// Takes every value currently buffered.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Whether the writing side has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.sender.lock().is_none()
    }

    /// The reason the sink was closed, if it was closed with one.
    pub fn close_reason(&self) -> Option<QueryError> {
        self.state.reason.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_receive() {
        let (sink, receiver) = channel_sink(&SinkConfig::default());
        sink.push(1).unwrap();
        sink.push(2).unwrap();
        assert_eq!(receiver.drain(), vec![1, 2]);
        assert_eq!(receiver.try_recv().unwrap(), None);
    }

    #[test]
    fn test_push_after_close_is_broken() {
        let (sink, receiver) = channel_sink::<i32>(&SinkConfig::default());
        sink.close(None);
        assert_eq!(sink.push(1), Err(QueryError::PipeBroken));
        assert!(receiver.is_closed());
        assert_eq!(receiver.recv(), Err(QueryError::PipeBroken));
    }

    #[test]
    fn test_first_close_reason_wins() {
        let (sink, receiver) = channel_sink::<i32>(&SinkConfig::default());
        let other = sink.clone();
        sink.push(7).unwrap();
        sink.close(Some(QueryError::QueryInterrupted));
        other.close(None);
        assert_eq!(receiver.recv(), Ok(7));
        assert_eq!(receiver.recv(), Err(QueryError::QueryInterrupted));
    }

    #[test]
    fn test_overflow_closes_sink() {
        let (sink, receiver) = channel_sink(&SinkConfig {
            buffer_size: Some(2),
        });
        sink.push(1).unwrap();
        sink.push(2).unwrap();
        assert_eq!(sink.push(3), Err(QueryError::PipeBroken));
        assert!(sink.is_closed());
        assert_eq!(receiver.drain(), vec![1, 2]);
        assert_eq!(receiver.close_reason(), Some(QueryError::PipeBroken));
    }

    #[test]
    fn test_dropped_receiver_breaks_pipe() {
        let (sink, receiver) = channel_sink(&SinkConfig { buffer_size: None });
        drop(receiver);
        assert_eq!(sink.push(1), Err(QueryError::PipeBroken));
    }
}
