pub mod combine;
pub mod discover;
pub mod validate;
mod threadcount;

pub use threadcount::determine_thread_counts_1;
pub use threadcount::DEFAULT_WORKER_THREADS;

pub use combine::CombineCMD;
pub use combine::CombineParams;
pub use combine::CombineTargets;

pub use discover::DiscoverCMD;
pub use validate::ValidateCMD;
