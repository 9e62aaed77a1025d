use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::partition::WORKER_COUNT;

/// 保持するバリア周回ごとの誤差の件数（古いものから捨てる）
pub const ROUND_HISTORY: usize = 4096;

/// 1ワーカーの公開状態
#[derive(Debug)]
struct WorkerSlot {
    last_error: AtomicU64, // f64 のビット列
    accumulated: AtomicU64, // 全反復の誤差の累計（f64 のビット列）
    iterations: AtomicU64,
    stop: AtomicBool,
    exited: AtomicBool,
}

impl WorkerSlot {
    fn new() -> Self {
        WorkerSlot {
            // 初回の反復を終えるまでは収束扱いにしない
            last_error: AtomicU64::new(f64::INFINITY.to_bits()),
            accumulated: AtomicU64::new(0.0f64.to_bits()),
            iterations: AtomicU64::new(0),
            stop: AtomicBool::new(false),
            exited: AtomicBool::new(false),
        }
    }
}

/// ある時点での全ワーカーの反復回数と誤差累計
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub iterations: [u64; WORKER_COUNT],
    pub accumulated: [f64; WORKER_COUNT],
}

#[derive(Debug, Default)]
struct Rounds {
    recent: VecDeque<f64>,
    count: u64,
}

/// ワーカーが誤差を公開し、コントローラーが集計する掲示板
///
/// 誤差と反復回数は Release/Acquire で公開するので、コントローラーは
/// 最新の反復結果を待たずに読める。公開のたびに条件変数を叩くので、
/// コントローラーはポーリング間隔を上限として即座に起きる。
#[derive(Debug)]
pub struct ErrorBoard {
    slots: [WorkerSlot; WORKER_COUNT],
    cancelled: AtomicBool,
    rounds: Mutex<Rounds>,
    lock: Mutex<()>,
    progress: Condvar,
}

impl Default for ErrorBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorBoard {
    pub fn new() -> Self {
        ErrorBoard {
            slots: std::array::from_fn(|_| WorkerSlot::new()),
            cancelled: AtomicBool::new(false),
            rounds: Mutex::new(Rounds::default()),
            lock: Mutex::new(()),
            progress: Condvar::new(),
        }
    }

    /// 1反復の結果を公開する。書き込むのは担当ワーカーだけ
    ///
    /// 反復回数は最後に Release で進めるので、回数を Acquire で読んだ側は
    /// その回までの誤差と累計を必ず見る。
    pub fn publish(&self, worker: usize, error: f64) {
        let slot = &self.slots[worker];
        let accumulated = f64::from_bits(slot.accumulated.load(Ordering::Relaxed)) + error;
        slot.accumulated.store(accumulated.to_bits(), Ordering::Relaxed);
        slot.last_error.store(error.to_bits(), Ordering::Relaxed);
        slot.iterations.fetch_add(1, Ordering::Release);
        self.progress.notify_one();
    }

    pub fn last_error(&self, worker: usize) -> f64 {
        f64::from_bits(self.slots[worker].last_error.load(Ordering::Acquire))
    }

    pub fn iterations(&self, worker: usize) -> u64 {
        self.slots[worker].iterations.load(Ordering::Acquire)
    }

    /// 各ワーカーの最新誤差の総和（ワーカー間で同時点とは限らない）
    pub fn total_error(&self) -> f64 {
        (0..WORKER_COUNT).map(|w| self.last_error(w)).sum()
    }

    pub fn accumulated(&self, worker: usize) -> f64 {
        f64::from_bits(self.slots[worker].accumulated.load(Ordering::Acquire))
    }

    /// 現時点の反復回数と誤差累計。累計を先に読むので、区間の変化量は多めに出る
    pub fn progress(&self) -> Progress {
        let accumulated = std::array::from_fn(|w| self.accumulated(w));
        let iterations = std::array::from_fn(|w| self.iterations(w));
        Progress { iterations, accumulated }
    }

    /// 全ワーカーが since から少なくとも steps 回反復したか
    pub fn advanced_since(&self, since: &Progress, steps: u64) -> bool {
        (0..WORKER_COUNT).all(|w| self.iterations(w) >= since.iterations[w] + steps)
    }

    /// since 以降に全ワーカーが書き換えた量（誤差の累計の増分）
    pub fn change_since(&self, since: &Progress) -> f64 {
        (0..WORKER_COUNT).map(|w| self.accumulated(w) - since.accumulated[w]).sum()
    }

    pub fn request_stop(&self, worker: usize) {
        self.slots[worker].stop.store(true, Ordering::Release);
    }

    pub fn request_stop_all(&self) {
        for w in 0..WORKER_COUNT {
            self.request_stop(w);
        }
    }

    pub fn stop_requested(&self, worker: usize) -> bool {
        self.slots[worker].stop.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.progress.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// 反復の境界で確認する停止条件
    pub fn should_stop(&self, worker: usize) -> bool {
        self.stop_requested(worker) || self.is_cancelled()
    }

    pub fn mark_exited(&self, worker: usize) {
        self.slots[worker].exited.store(true, Ordering::Release);
        self.progress.notify_all();
    }

    pub fn has_exited(&self, worker: usize) -> bool {
        self.slots[worker].exited.load(Ordering::Acquire)
    }

    /// 停止指示なしに終了したワーカー
    pub fn unexpected_exit(&self) -> Option<usize> {
        (0..WORKER_COUNT).find(|&w| self.has_exited(w) && !self.should_stop(w))
    }

    /// バリアの全員到着時点の誤差総和を記録する
    pub fn record_round(&self) {
        let total = self.total_error();
        let mut rounds = self.rounds.lock();
        if rounds.recent.len() == ROUND_HISTORY {
            rounds.recent.pop_front();
        }
        rounds.recent.push_back(total);
        rounds.count += 1;
    }

    /// 直近 ROUND_HISTORY 周分の誤差総和（古い順）
    pub fn round_errors(&self) -> Vec<f64> {
        self.rounds.lock().recent.iter().copied().collect()
    }

    /// これまでに揃った周回の総数
    pub fn rounds_completed(&self) -> u64 {
        self.rounds.lock().count
    }

    /// 次の公開（または timeout）まで待つ
    pub fn wait_for_progress(&self, timeout: Duration) {
        let mut guard = self.lock.lock();
        let _ = self.progress.wait_for(&mut guard, timeout);
    }
}
