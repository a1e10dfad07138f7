pub mod metrics;
pub mod transform;
pub mod worker;
