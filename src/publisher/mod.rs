//! Per-query delivery to consumers.
//!
//! A [`SequencedValuePublisher`] sits between a query's producers and its
//! [`Sink`]. It buffers while the historical snapshot loads, then delivers
//! snapshot and live values under one monotonic sequence gate, and handles
//! recovery according to the query's interruption policy.
//!
//! # Example
//!
//! ```ignore
//! let (sink, receiver) = channel_sink(&SinkConfig::default());
//! let publisher = SequencedValuePublisher::from_query(query, sink)?;
//! publisher.begin_snapshot();
//! publisher.push_snapshot(store.load(publisher.query())?)?;
//! publisher.end_snapshot(id)?;
//!
//! while let Ok(value) = receiver.recv() {
//!     println!("{:?}", value);
//! }
//! ```

mod sequenced;
mod sink;

pub use sequenced::SequencedValuePublisher;
pub use sink::{channel_sink, ChannelSink, Sink, SinkConfig, SinkReceiver};
