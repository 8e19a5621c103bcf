pub mod normalizer;
pub mod units;

pub use normalizer::{normalize, NormalizedBatch, TransactionNormalizer};
pub use units::plain_decimal;
