pub mod pages;
pub mod queue;

pub use pages::PageStore;
pub use queue::QueueStore;
