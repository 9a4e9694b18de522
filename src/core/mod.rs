pub mod clock;
pub mod delivery;
pub mod digest;
pub mod recovery;
pub mod scheduler;
pub mod sink;
pub mod store;
