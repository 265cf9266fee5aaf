//! ferry-core
//!
//! Ephemeral, TTL-indexed file store behind short-lived download links.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（Token, PublicId, Entry, FileFormat, errors）
//! - **ports**: 抽象化レイヤー（Clock, TokenGenerator, BlobStore）
//! - **impls**: ports の実装（LocalBlobStore, InMemoryBlobStore）
//! - **store**: EphemeralStore 本体（put / resolve / get / open / sweep）
//! - **app**: SweepLoop, LinkBuilder
//! - **config**: StoreConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod store;

pub use crate::config::StoreConfig;
pub use crate::domain::{Entry, FileFormat, PublicId, PutReceipt, StoreError, Token};
pub use crate::store::{Download, EphemeralStore, StoreStats, SweepReport};
