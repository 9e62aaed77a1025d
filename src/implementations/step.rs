use crate::grid::BandWriter;

/*
  1行帯ぶんの緩和ステップ（全モード共通）

  1. 行帯の現在値を作業バッファへコピー（誤差計算の基準）
  2. 内部セルを4近傍平均で更新。近傍は共有グリッドの最新値を読む
     （隣の行帯が今回の反復で更新済みのこともある: Gauss-Seidel 的）
  3. 新しい値をすぐ共有グリッドへ書き戻す
  4. |新 - 旧| を積算して返す

  作業バッファを使わないと、同じパス内で更新済みの隣接セルとの差を取ってしまい
  誤差を過小評価する。
*/
#[derive(Debug, Default)]
pub struct RelaxationStep {
    previous: Vec<f64>, // ループ外で1回だけ割り当て
}

impl RelaxationStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1パス実行し、局所誤差（絶対差の総和）を返す
    pub fn run(&mut self, writer: &BandWriter<'_>) -> f64 {
        let grid = writer.grid();
        let n = grid.size();
        let band = writer.band();

        grid.copy_rows_into(band.rows(), &mut self.previous);

        let mut error = 0.0;
        for i in band.rows() {
            // 最上行・最下行は固定
            if i == 0 || i == n - 1 {
                continue;
            }
            let base = (i - band.start) * n;
            for j in 1..n - 1 {
                let new_value = grid.relax(i, j);
                let old_value = self.previous[base + j];
                writer.set(i, j, new_value);
                error += (new_value - old_value).abs();
            }
        }
        error
    }
}
