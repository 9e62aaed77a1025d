//! 正方形グリッド上の熱拡散を緩和法で解き、
//! シングルスレッド・フリーラン4スレッド・バリア同期4スレッドの3方式を比較する。

pub mod bench;
pub mod config;
pub mod error;
pub mod grid;
pub mod implementations;
pub mod partition;

pub use config::RunConfig;
pub use error::{RelaxError, Result};
pub use grid::{BoundaryTemps, Grid};
pub use implementations::controller::{Controller, Mode, RunReport};
pub use partition::{Partition, RowBand, WORKER_COUNT};
