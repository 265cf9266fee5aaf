//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **LocalBlobStore**: 本番用。ローカルディレクトリに 1 ファイル = 1 Blob
//! - **InMemoryBlobStore**: 開発用・テスト用

pub mod inmem_blob;
pub mod local_blob;

// 主要な型を再エクスポート
pub use self::inmem_blob::InMemoryBlobStore;
pub use self::local_blob::LocalBlobStore;
