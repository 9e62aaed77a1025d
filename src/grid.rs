use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::error::{RelaxError, Result};
use crate::partition::{Partition, RowBand};

pub const DEFAULT_SIZE: usize = 500; // 1辺のセル数
pub const MIN_SIZE: usize = 3; // 内部セルを1つ持つ最小サイズ
pub const TOP_TEMP: f64 = 30.0; // 上端の熱源
pub const BOTTOM_TEMP: f64 = 75.0; // 下端の熱源
pub const LEFT_TEMP: f64 = 15.0; // 左端の熱源
pub const RIGHT_TEMP: f64 = 72.0; // 右端の熱源

/// 境界（固定熱源）の温度
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryTemps {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for BoundaryTemps {
    fn default() -> Self {
        BoundaryTemps {
            top: TOP_TEMP,
            bottom: BOTTOM_TEMP,
            left: LEFT_TEMP,
            right: RIGHT_TEMP,
        }
    }
}

#[inline]
fn load(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Relaxed))
}

/// N×N の温度グリッド
///
/// セルは行優先の1次元配列に f64 のビット列として保持する。
/// 複数スレッドからの読み書きは `Relaxed` のアトミック操作なので、
/// 他の行帯の隣接セルをロックなしで読んでもデータ競合にはならない。
/// 書き込みは `&mut self` 経由か、[`Grid::split_bands`] が返す [`BandWriter`] 経由のみ。
#[derive(Debug)]
pub struct Grid {
    n: usize,
    data: Vec<AtomicU64>,
    previous: Vec<f64>,
}

impl Clone for Grid {
    fn clone(&self) -> Self {
        Grid {
            n: self.n,
            data: self.data.iter().map(|c| AtomicU64::new(c.load(Ordering::Relaxed))).collect(),
            previous: self.previous.clone(),
        }
    }
}

impl Grid {
    /// 境界に熱源を設定し、内部を0で初期化したグリッドを作る
    ///
    /// 角のセルは左右の列の値になる（列を行の後に書き込むため）。
    pub fn new(size: usize, boundary: BoundaryTemps) -> Result<Self> {
        if size < MIN_SIZE {
            return Err(RelaxError::InvalidGridSize { size });
        }

        let mut grid = Grid {
            n: size,
            data: (0..size * size).map(|_| AtomicU64::new(0.0f64.to_bits())).collect(),
            previous: Vec::new(),
        };

        for j in 0..size {
            grid.set(0, j, boundary.top);
            grid.set(size - 1, j, boundary.bottom);
        }
        for i in 0..size {
            grid.set(i, 0, boundary.left);
            grid.set(i, size - 1, boundary.right);
        }

        grid.save_previous();
        Ok(grid)
    }

    /// 行ごとの値からグリッドを作る
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if n < MIN_SIZE {
            return Err(RelaxError::InvalidGridSize { size: n });
        }
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(RelaxError::NonSquareGrid {
                row,
                len: r.len(),
                expected: n,
            });
        }

        let mut grid = Grid {
            n,
            data: rows
                .iter()
                .flatten()
                .map(|v| AtomicU64::new(v.to_bits()))
                .collect(),
            previous: Vec::new(),
        };
        grid.save_previous();
        Ok(grid)
    }

    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.n && col < self.n,
            "セル ({}, {}) はグリッド {}x{} の範囲外です",
            row,
            col,
            self.n,
            self.n
        );
        row * self.n + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        load(&self.data[self.index(row, col)])
    }

    /// 排他アクセスでの書き込み（初期化用）
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        let idx = self.index(row, col);
        *self.data[idx].get_mut() = value.to_bits();
    }

    #[inline]
    pub fn is_boundary(&self, row: usize, col: usize) -> bool {
        row == 0 || row == self.n - 1 || col == 0 || col == self.n - 1
    }

    /// 上下左右4セルの平均。境界セルは自身の値を返す
    #[inline]
    pub fn relax(&self, row: usize, col: usize) -> f64 {
        if self.is_boundary(row, col) {
            return self.get(row, col);
        }
        let idx = self.index(row, col);
        let n = self.n;
        (load(&self.data[idx - n])
            + load(&self.data[idx + n])
            + load(&self.data[idx - 1])
            + load(&self.data[idx + 1]))
            / 4.0
    }

    /// 直前スナップショットに対する4近傍平均（厳密な Jacobi 用）
    #[inline]
    pub fn relax_previous(&self, row: usize, col: usize) -> f64 {
        let idx = self.index(row, col);
        if self.is_boundary(row, col) {
            return self.previous[idx];
        }
        let n = self.n;
        let p = &self.previous;
        (p[idx - n] + p[idx + n] + p[idx - 1] + p[idx + 1]) / 4.0
    }

    /// 全セルの平均温度
    ///
    /// ワーカー停止後に呼ぶこと。行単位で rayon により並列に集計する。
    pub fn average_temperature(&self) -> f64 {
        let sum: f64 = self
            .data
            .par_chunks(self.n)
            .map(|row| row.iter().map(load).sum::<f64>())
            .sum();
        sum / (self.n * self.n) as f64
    }

    /// 現在の値を直前スナップショットへ一括コピー
    pub fn save_previous(&mut self) {
        self.previous.clear();
        self.previous.extend(self.data.iter().map(load));
    }

    /// Σ|現在値 - スナップショット|
    pub fn change_since_previous(&self) -> f64 {
        self.data
            .iter()
            .zip(&self.previous)
            .map(|(c, p)| (load(c) - p).abs())
            .sum()
    }

    /// 指定した行範囲を buf にコピーする（buf は上書き）
    pub fn copy_rows_into(&self, rows: Range<usize>, buf: &mut Vec<f64>) {
        assert!(rows.end <= self.n, "行範囲 {:?} がグリッド外です", rows);
        buf.clear();
        buf.extend(self.data[rows.start * self.n..rows.end * self.n].iter().map(load));
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().map(load).collect()
    }

    /// 行帯ごとの書き込み口に分割する
    ///
    /// `&mut self` を借用するので、返された [`BandWriter`] が生きている間は
    /// 他の書き込み口を作れない。各 BandWriter は自分の行帯しか書けない。
    pub fn split_bands(&mut self, partition: &Partition) -> Result<Vec<BandWriter<'_>>> {
        if partition.size() != self.n {
            let last = partition.bands()[partition.bands().len() - 1];
            return Err(RelaxError::MalformedPartition {
                band: last.index,
                start: last.start,
                end: partition.size(),
            });
        }
        let grid: &Grid = self;
        Ok(partition
            .bands()
            .iter()
            .map(|&band| BandWriter { grid, band })
            .collect())
    }
}

/// 1つの行帯への書き込み口
#[derive(Debug)]
pub struct BandWriter<'a> {
    grid: &'a Grid,
    band: RowBand,
}

impl<'a> BandWriter<'a> {
    pub fn band(&self) -> RowBand {
        self.band
    }

    /// 共有グリッド（読み取り専用）
    pub fn grid(&self) -> &'a Grid {
        self.grid
    }

    /// 自分の行帯のセルを書き換える
    #[inline]
    pub fn set(&self, row: usize, col: usize, value: f64) {
        assert!(
            self.band.contains(row),
            "行 {} は行帯 {:?} の外です",
            row,
            self.band.rows()
        );
        debug_assert!(!self.grid.is_boundary(row, col), "境界セル ({}, {}) は書き換え不可", row, col);
        let idx = self.grid.index(row, col);
        self.grid.data[idx].store(value.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn boundary_values_are_set() {
        let grid = Grid::new(6, BoundaryTemps::default()).unwrap();
        assert_eq!(grid.get(0, 2), TOP_TEMP);
        assert_eq!(grid.get(5, 3), BOTTOM_TEMP);
        assert_eq!(grid.get(2, 0), LEFT_TEMP);
        assert_eq!(grid.get(3, 5), RIGHT_TEMP);
        // 角は列の値
        assert_eq!(grid.get(0, 0), LEFT_TEMP);
        assert_eq!(grid.get(5, 5), RIGHT_TEMP);
        assert_eq!(grid.get(2, 2), 0.0);
    }

    #[test]
    fn rejects_too_small() {
        assert_eq!(
            Grid::new(2, BoundaryTemps::default()).unwrap_err(),
            RelaxError::InvalidGridSize { size: 2 }
        );
    }

    #[test]
    fn rejects_non_square_rows() {
        let rows = vec![vec![0.0; 3], vec![0.0; 2], vec![0.0; 3]];
        assert!(matches!(
            Grid::from_rows(&rows),
            Err(RelaxError::NonSquareGrid { row: 1, len: 2, expected: 3 })
        ));
    }

    #[test]
    #[should_panic]
    fn get_out_of_range_panics() {
        let grid = Grid::new(4, BoundaryTemps::default()).unwrap();
        grid.get(1, 4);
    }

    #[test]
    fn relax_interior_and_boundary() {
        let rows = vec![
            vec![0.0, 10.0, 0.0],
            vec![20.0, 5.0, 30.0],
            vec![0.0, 40.0, 0.0],
        ];
        let grid = Grid::from_rows(&rows).unwrap();
        assert_relative_eq!(grid.relax(1, 1), 25.0);
        assert_eq!(grid.relax(0, 1), 10.0);
        assert_eq!(grid.relax(2, 2), 0.0);
    }

    #[test]
    fn average_temperature_matches_plain_sum() {
        let grid = Grid::new(10, BoundaryTemps::default()).unwrap();
        let expected = grid.to_vec().iter().sum::<f64>() / 100.0;
        assert_relative_eq!(grid.average_temperature(), expected, epsilon = 1e-12);
    }

    #[test]
    fn previous_snapshot_tracks_changes() {
        let mut grid = Grid::new(5, BoundaryTemps::default()).unwrap();
        assert_eq!(grid.change_since_previous(), 0.0);
        grid.set(2, 2, 4.0);
        grid.set(1, 3, -1.0);
        assert_relative_eq!(grid.change_since_previous(), 5.0);
        // 境界セルはスナップショットの値のまま
        assert_eq!(grid.relax_previous(0, 2), TOP_TEMP);
        grid.save_previous();
        assert_eq!(grid.change_since_previous(), 0.0);
    }

    #[test]
    fn copy_rows_into_overwrites_buffer() {
        let grid = Grid::new(4, BoundaryTemps::default()).unwrap();
        let mut buf = vec![99.0; 100];
        grid.copy_rows_into(3..4, &mut buf);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf[1], BOTTOM_TEMP);
    }

    #[test]
    fn band_writer_writes_own_rows() {
        let mut grid = Grid::new(8, BoundaryTemps::default()).unwrap();
        let partition = Partition::new(8).unwrap();
        {
            let writers = grid.split_bands(&partition).unwrap();
            writers[1].set(2, 3, 7.5);
            assert_eq!(writers[0].grid().get(2, 3), 7.5);
        }
        assert_eq!(grid.get(2, 3), 7.5);
    }

    #[test]
    #[should_panic]
    fn band_writer_rejects_foreign_row() {
        let mut grid = Grid::new(8, BoundaryTemps::default()).unwrap();
        let partition = Partition::new(8).unwrap();
        let writers = grid.split_bands(&partition).unwrap();
        writers[0].set(5, 3, 1.0);
    }

    #[test]
    fn split_bands_rejects_size_mismatch() {
        let mut grid = Grid::new(8, BoundaryTemps::default()).unwrap();
        let partition = Partition::new(12).unwrap();
        assert!(matches!(
            grid.split_bands(&partition),
            Err(RelaxError::MalformedPartition { .. })
        ));
    }
}
