use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::config::RunConfig;
use crate::error::{RelaxError, Result};
use crate::grid::Grid;
use crate::implementations::monitor::{ErrorBoard, Progress};
use crate::implementations::rendezvous::Rendezvous;
use crate::implementations::single;
use crate::implementations::worker::{IterationSync, Worker, WorkerReport};
use crate::partition::{Partition, WORKER_COUNT};

/// 実行モード
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Single,
    FreeRunning,
    Barrier,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Single => "Single thread",
            Mode::FreeRunning => "Multithread (no barrier)",
            Mode::Barrier => "Multithread (with barrier)",
        }
    }
}

/// 1回の実行結果
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub mode: Mode,
    pub size: usize,
    pub average: f64,
    pub total_error: f64,
    pub elapsed: Duration,
    /// ワーカーごとの反復回数（シングルスレッドは1要素）
    pub iterations: Vec<u64>,
    pub converged: bool,
    /// バリア同期時、全員が揃った周回の数
    pub rounds: u64,
    /// バリア同期時、全員到着ごとの誤差総和（直近の周回のみ）
    pub round_errors: Vec<f64>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Type: {}; Size={}; Average Grid Value={:.6}; Total Error={:.6}",
            self.mode.label(),
            self.size,
            self.average,
            self.total_error
        )?;
        write!(f, "Execution Time: {:?}", self.elapsed)?;
        if self.mode == Mode::Single {
            write!(f, "\nIterations: {}", self.iterations[0])?;
        } else {
            write!(f, "\nIterations per thread:")?;
            for (i, n) in self.iterations.iter().enumerate() {
                write!(f, "\n  Thread {}: {}", i + 1, n)?;
            }
        }
        if !self.converged {
            write!(f, "\n(収束前に打ち切り)")?;
        }
        Ok(())
    }
}

/// 収束候補を確定するまでに全ワーカーが追加で回す反復数
///
/// 2回目の反復は候補を取った後に始まっているので、他の帯の最新値を読んでいる。
pub const CONFIRM_ITERATIONS: u64 = 2;

// 監視ループの終わり方
#[derive(Debug)]
enum Watch {
    /// 確定時点の最新誤差の総和
    Converged(f64),
    WorkerExited(usize),
    TimedOut(Duration),
}

/// 4ワーカーを起動し、誤差の総和を監視して収束したら停止させる
#[derive(Clone, Debug)]
pub struct Controller {
    config: RunConfig,
}

impl Controller {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Controller { config })
    }

    /// 境界を初期化したグリッドで実行する
    pub fn run(&self, mode: Mode) -> Result<RunReport> {
        let mut grid = Grid::new(self.config.size, self.config.boundary)?;
        self.run_on(&mut grid, mode)
    }

    /// 与えられたグリッドで実行する。終了後の値は grid に残る
    pub fn run_on(&self, grid: &mut Grid, mode: Mode) -> Result<RunReport> {
        info!(mode = mode.label(), size = grid.size(), threshold = self.config.threshold, "実行開始");
        let report = match mode {
            Mode::Single => self.run_single(grid),
            Mode::FreeRunning | Mode::Barrier => self.run_threaded(grid, mode),
        }?;
        info!(
            mode = mode.label(),
            elapsed = ?report.elapsed,
            total_error = report.total_error,
            "実行完了"
        );
        Ok(report)
    }

    fn run_single(&self, grid: &mut Grid) -> Result<RunReport> {
        let start = Instant::now();
        let outcome = single::relax_to_convergence(grid, self.config.threshold, self.config.max_iterations);
        let elapsed = start.elapsed();

        Ok(RunReport {
            mode: Mode::Single,
            size: grid.size(),
            average: grid.average_temperature(),
            total_error: outcome.total_error,
            elapsed,
            iterations: vec![outcome.iterations],
            converged: outcome.converged,
            rounds: 0,
            round_errors: Vec::new(),
        })
    }

    fn run_threaded(&self, grid: &mut Grid, mode: Mode) -> Result<RunReport> {
        // ワーカー起動前に分割を検証する
        let partition = Partition::new(grid.size())?;
        debug!(bands = ?partition.bands(), "行帯に分割");

        let board = Arc::new(ErrorBoard::new());
        let rendezvous = (mode == Mode::Barrier).then(|| {
            let board = board.clone();
            Arc::new(Rendezvous::with_action(WORKER_COUNT, move || board.record_round()))
        });

        let start = Instant::now();
        let (watch, results) = {
            let writers = grid.split_bands(&partition)?;

            thread::scope(|scope| {
                let handles: Vec<_> = writers
                    .into_iter()
                    .map(|writer| {
                        let sync = match &rendezvous {
                            Some(r) => IterationSync::Rendezvous(r.clone()),
                            None => IterationSync::None,
                        };
                        let worker = Worker::new(writer, sync, board.clone());
                        scope.spawn(move || worker.run())
                    })
                    .collect();

                let watch = self.watch(&board, start);
                shutdown(&board, rendezvous.as_deref());

                let results: Vec<Result<WorkerReport>> = handles
                    .into_iter()
                    .enumerate()
                    .map(|(id, h)| h.join().unwrap_or(Err(RelaxError::WorkerPanicked { worker: id })))
                    .collect();
                (watch, results)
            })
        };
        let elapsed = start.elapsed();

        let mut reports = Vec::with_capacity(WORKER_COUNT);
        for result in results {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(%e, "ワーカー異常終了");
                    return Err(e);
                }
            }
        }

        let total_error = match watch {
            Watch::Converged(total) => total,
            Watch::WorkerExited(id) => {
                return Err(RelaxError::worker_fault(id, "停止指示の前に終了しました"));
            }
            Watch::TimedOut(limit) => return Err(RelaxError::Timeout(limit)),
        };

        Ok(RunReport {
            mode,
            size: grid.size(),
            average: grid.average_temperature(),
            total_error,
            elapsed,
            iterations: reports.iter().map(|r| r.iterations).collect(),
            converged: true,
            rounds: board.rounds_completed(),
            round_errors: board.round_errors(),
        })
    }

    /*
      誤差の総和が閾値を下回るまで待つ。公開通知か poll_interval で起きる

      フリーランでは各ワーカーの最新誤差が別々の時点のものなので、
      1つのワーカーが止まった隣の帯に対して局所的に収束し 0 を公開し続けることがある。
      閾値を下回った時点は候補とし、全ワーカーが CONFIRM_ITERATIONS 回進むまでの
      書き換え量の合計も閾値未満なら確定する。ワーカー同士は同期させない。
    */
    fn watch(&self, board: &ErrorBoard, start: Instant) -> Watch {
        let threshold = self.config.threshold;
        let mut candidate: Option<Progress> = None;
        loop {
            match candidate {
                None => {
                    let total = board.total_error();
                    if total < threshold {
                        debug!(total, "収束候補");
                        candidate = Some(board.progress());
                    }
                }
                Some(since) => {
                    if board.advanced_since(&since, CONFIRM_ITERATIONS) {
                        let total = board.total_error();
                        let change = board.change_since(&since);
                        if change < threshold && total < threshold {
                            debug!(total, change, "収束を確定");
                            return Watch::Converged(total);
                        }
                        debug!(total, change, "収束候補を破棄");
                        candidate = (total < threshold).then(|| board.progress());
                    }
                }
            }
            if let Some(id) = board.unexpected_exit() {
                return Watch::WorkerExited(id);
            }
            if let Some(limit) = self.config.max_duration {
                if start.elapsed() >= limit {
                    return Watch::TimedOut(limit);
                }
            }
            board.wait_for_progress(self.config.poll_interval);
        }
    }
}

// 停止フラグ → キャンセル → バリア中断の順。フラグが先でないとバリア前で止まれない
fn shutdown(board: &ErrorBoard, rendezvous: Option<&Rendezvous>) {
    board.request_stop_all();
    board.cancel();
    if let Some(r) = rendezvous {
        r.abort();
    }
    debug!("全ワーカーに停止を通知");
}
