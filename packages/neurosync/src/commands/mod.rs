pub mod analyze;
pub mod simulate;
pub mod stream;
