pub mod enqueuer;
pub mod error;
pub mod source;

pub use enqueuer::{EnqueuerConfig, EnqueuerConfigBuilder, GeneratorEnqueuer, OrderedEnqueuer};
pub use enqueuer::ItemStream;
pub use error::{EnqueuerError, FetchError};
pub use source::{Generator, Sequence, SharedGenerator};
