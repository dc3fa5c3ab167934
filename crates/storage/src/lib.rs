//! # Storage
//!
//! 存储后端模块。
//!
//! 负责：
//! - 按 app scope 打开数据库句柄
//! - 表存在性检查与建表
//! - 逐行写入传感器数据

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::{MemoryHandle, MemoryStats, MemoryStorage};
pub use schema::{column_affinity, create_table_sql, insert_sql, quote_identifier};
pub use sqlite::{SqliteHandle, SqliteStorage};
