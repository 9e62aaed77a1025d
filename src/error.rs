//! 緩和計算のエラー型

use std::time::Duration;
use thiserror::Error;

/// 緩和計算の Result 型
pub type Result<T> = std::result::Result<T, RelaxError>;

/// 緩和計算で発生しうるエラー
///
/// バリア待機中のキャンセルやバリア破棄はエラーではない（ワーカーは正常終了する）。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelaxError {
    /// 内部セルが存在しないグリッドサイズ
    #[error("グリッドサイズが不正です: {size} (3以上が必要)")]
    InvalidGridSize { size: usize },

    /// 正方形でない入力
    #[error("グリッドが正方形ではありません: 行 {row} の長さ {len} (期待値 {expected})")]
    NonSquareGrid { row: usize, len: usize, expected: usize },

    /// 空・逆転・重複・隙間のある行帯
    #[error("行帯 {band} が不正です: [{start}, {end})")]
    MalformedPartition { band: usize, start: usize, end: usize },

    /// 収束判定値が正の有限値でない
    #[error("収束判定値が不正です: {0}")]
    InvalidThreshold(f64),

    /// 停止指示の前にワーカーが終了した
    #[error("ワーカー {worker} が停止指示前に終了しました: {reason}")]
    WorkerFault { worker: usize, reason: String },

    /// ワーカースレッドが panic した
    #[error("ワーカー {worker} が panic しました")]
    WorkerPanicked { worker: usize },

    /// 監視時間の上限を超えた
    #[error("収束前に制限時間 {0:?} を超えました")]
    Timeout(Duration),
}

impl RelaxError {
    /// WorkerFault を作る
    pub fn worker_fault(worker: usize, reason: impl Into<String>) -> Self {
        Self::WorkerFault {
            worker,
            reason: reason.into(),
        }
    }
}
