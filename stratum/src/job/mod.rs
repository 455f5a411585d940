mod cache;
mod state;

pub use cache::JobCache;
pub use state::Job;
