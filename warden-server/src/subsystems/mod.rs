pub mod analyze;
pub mod infer;
pub mod sensitive;
pub mod sweep;
