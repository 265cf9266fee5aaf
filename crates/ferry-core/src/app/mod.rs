//! App - アプリケーション層
//!
//! # 主要コンポーネント
//! - **SweepLoop**: 期限切れファイルの定期回収
//! - **LinkBuilder**: 公開ダウンロード URL の組み立て

pub mod link;
pub mod sweep_loop;

// 主要な型を再エクスポート
pub use self::link::LinkBuilder;
pub use self::sweep_loop::SweepLoop;
