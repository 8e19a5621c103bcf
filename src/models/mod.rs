pub mod address;
pub mod raw;
pub mod result;
pub mod transaction;

pub use address::Address;
pub use raw::{
    Erc1155TransferRecord, Erc20TransferRecord, Erc721TransferRecord, InternalTransactionRecord,
    NormalTransactionRecord, RawPage, RawTransactionRecord,
};
pub use result::{CategoryReport, CategoryStatus, FetchCursor, PipelineResult, RecordWarning};
pub use transaction::{AmountUnit, DedupKey, NormalizedTransaction, TransactionCategory};
