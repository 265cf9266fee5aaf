//! Domain model (ids, names, entries, errors).

pub mod entry;
pub mod errors;
pub mod ids;
pub mod name;

pub use self::entry::{Entry, PutReceipt};
pub use self::errors::{ConfigError, StorageOp, StoreError};
pub use self::ids::{PublicId, Token};
pub use self::name::{FileFormat, derive_public_id, sanitize_file_name};
