pub mod loaders;
mod multi_stream;
mod stream;

pub use loaders::{InMemoryLoader, JsonlLoader, Loader};
pub use multi_stream::MultiStream;
pub use stream::{InstanceIter, Stream};
