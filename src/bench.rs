//! 3方式の実行時間比較（`test` モード）

use std::thread;
use std::time::Duration;

use tracing::info;

use crate::config::RunConfig;
use crate::error::Result;
use crate::implementations::controller::{Controller, Mode};

pub const SWEEP_SIZES: [usize; 4] = [100, 250, 500, 1000];
pub const SWEEP_RUNS: usize = 3;
const RUN_PAUSE: Duration = Duration::from_millis(100); // 試行間の待ち

/// 1つのグリッドサイズでの平均実行時間
#[derive(Clone, Debug, PartialEq)]
pub struct SweepRow {
    pub size: usize,
    pub runs: usize,
    pub single: Duration,
    pub free_running: Duration,
    pub barrier: Duration,
}

impl SweepRow {
    pub fn speedup_free_running(&self) -> f64 {
        self.single.as_secs_f64() / self.free_running.as_secs_f64()
    }

    pub fn speedup_barrier(&self) -> f64 {
        self.single.as_secs_f64() / self.barrier.as_secs_f64()
    }

    pub fn print(&self) {
        println!("\n結果（{}回の平均）:", self.runs);
        println!("  Single Thread:               {:?}", self.single);
        println!("  Multi-thread (no barrier):   {:?}", self.free_running);
        println!("  Multi-thread (with barrier): {:?}", self.barrier);
        println!("\nシングルスレッド比の高速化率:");
        println!("  No barrier:   {:.2}x", self.speedup_free_running());
        println!("  With barrier: {:.2}x", self.speedup_barrier());
        println!();
    }
}

/// 1サイズを runs 回ずつ測定して平均を返す
pub fn measure(base: &RunConfig, size: usize, runs: usize) -> Result<SweepRow> {
    let controller = Controller::new(base.clone().with_size(size))?;
    let runs = runs.max(1);
    let mut totals = [Duration::ZERO; 3];

    for run in 0..runs {
        for (slot, mode) in [Mode::Single, Mode::FreeRunning, Mode::Barrier].into_iter().enumerate() {
            let report = controller.run(mode)?;
            totals[slot] += report.elapsed;
        }
        if run + 1 < runs {
            thread::sleep(RUN_PAUSE);
        }
    }

    let n = runs as u32;
    Ok(SweepRow {
        size,
        runs,
        single: totals[0] / n,
        free_running: totals[1] / n,
        barrier: totals[2] / n,
    })
}

/// 複数サイズでの比較を実行して表示する
pub fn run_sweep(base: &RunConfig, sizes: &[usize], runs: usize) -> Result<Vec<SweepRow>> {
    let rule = "=".repeat(80);
    let thin = "-".repeat(80);

    println!("{}", rule);
    println!("=== Jacobi法 2D熱方程式 実行方式比較 ===");
    println!("{}\n", rule);

    let mut rows = Vec::with_capacity(sizes.len());
    for &size in sizes {
        println!("{}", thin);
        println!("グリッドサイズ: {}", size);
        println!("{}", thin);

        let row = measure(base, size, runs)?;
        info!(size, single = ?row.single, free_running = ?row.free_running, barrier = ?row.barrier, "測定完了");
        row.print();
        rows.push(row);
    }

    println!("{}", rule);
    println!("=== 比較完了 ===");
    Ok(rows)
}
