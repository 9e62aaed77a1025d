use crate::grid::Grid;

/// シングルスレッド版の結果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SingleOutcome {
    pub iterations: u64,
    pub total_error: f64,
    pub converged: bool,
}

// 厳密な Jacobi 法の1反復。全内部セルを直前スナップショットから計算し、誤差の総和を返す
pub fn jacobi_step(grid: &mut Grid) -> f64 {
    grid.save_previous();
    let n = grid.size();

    for i in 1..n - 1 {
        for j in 1..n - 1 {
            let new_value = grid.relax_previous(i, j);
            grid.set(i, j, new_value);
        }
    }

    grid.change_since_previous()
}

/// 誤差が threshold 未満になるまで反復する（最低1回は実行）
pub fn relax_to_convergence(grid: &mut Grid, threshold: f64, max_iterations: Option<u64>) -> SingleOutcome {
    let mut iterations = 0;
    loop {
        let total_error = jacobi_step(grid);
        iterations += 1;

        if total_error < threshold {
            return SingleOutcome { iterations, total_error, converged: true };
        }
        if max_iterations.is_some_and(|limit| iterations >= limit) {
            return SingleOutcome { iterations, total_error, converged: false };
        }
    }
}
