use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{RelaxError, Result};
use crate::grid::BandWriter;
use crate::implementations::monitor::ErrorBoard;
use crate::implementations::rendezvous::Rendezvous;
use crate::implementations::step::RelaxationStep;

/// 反復ごとの同期方法
#[derive(Clone, Debug)]
pub enum IterationSync {
    /// 他ワーカーと同期しない（フリーラン）
    None,
    /// 反復ごとに全ワーカーがバリアで揃う
    Rendezvous(Arc<Rendezvous>),
}

/// ワーカーが止まった理由
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// 停止フラグを反復の境界で確認した
    Stopped,
    /// バリア待機中に abort された
    BarrierBroken,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkerReport {
    pub id: usize,
    pub iterations: u64,
    pub last_error: f64,
    pub exit: ExitReason,
}

/// どの経路で抜けても（panic 含む）終了を掲示板に記録する
struct ExitGuard<'b> {
    board: &'b ErrorBoard,
    id: usize,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.board.mark_exited(self.id);
    }
}

/// 1つの行帯を担当するワーカー
///
/// フリーラン: 停止確認 → 緩和 → 公開 → 繰り返し
/// バリア同期: 停止確認 → 緩和 → 公開 → (停止フラグが立っていれば抜ける) → バリア待機
pub struct Worker<'a> {
    id: usize,
    writer: BandWriter<'a>,
    sync: IterationSync,
    board: Arc<ErrorBoard>,
    step: RelaxationStep,
}

impl<'a> Worker<'a> {
    pub fn new(writer: BandWriter<'a>, sync: IterationSync, board: Arc<ErrorBoard>) -> Self {
        Worker {
            id: writer.band().index,
            writer,
            sync,
            board,
            step: RelaxationStep::new(),
        }
    }

    pub fn run(mut self) -> Result<WorkerReport> {
        let board = self.board.clone();
        let _guard = ExitGuard { board: &board, id: self.id };
        debug!(worker = self.id, rows = ?self.writer.band().rows(), "ワーカー開始");

        let exit = loop {
            if board.should_stop(self.id) {
                break ExitReason::Stopped;
            }

            let error = self.step.run(&self.writer);
            if !error.is_finite() {
                warn!(worker = self.id, error, "局所誤差が有限値ではありません");
                return Err(RelaxError::worker_fault(
                    self.id,
                    format!("局所誤差が有限値ではありません: {}", error),
                ));
            }
            board.publish(self.id, error);

            if let IterationSync::Rendezvous(rendezvous) = &self.sync {
                // 停止指示済みなら来ない相手を待たない
                if board.should_stop(self.id) {
                    break ExitReason::Stopped;
                }
                if rendezvous.wait().is_broken() {
                    debug!(worker = self.id, "バリアが中断されました");
                    break ExitReason::BarrierBroken;
                }
            }
        };

        let report = WorkerReport {
            id: self.id,
            iterations: board.iterations(self.id),
            last_error: board.last_error(self.id),
            exit,
        };
        debug!(worker = self.id, iterations = report.iterations, ?exit, "ワーカー終了");
        Ok(report)
    }
}
