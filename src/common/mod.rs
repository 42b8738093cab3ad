#[cfg(feature = "cpuset")]
pub mod cpuset;
pub mod types;
