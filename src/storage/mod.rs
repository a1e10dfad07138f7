pub mod postgres;
pub mod writer;
