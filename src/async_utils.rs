//! Asynchronous utilities shared by the batch pipeline.

use std::pin::Pin;

use futures::Stream;

/// A type alias for a boxed stream, to keep complex signatures readable.
pub type BoxedStream<Item> = Pin<Box<dyn Stream<Item = Item> + Send>>;
