//! 行帯への分割
//!
//! グリッドの行 `[0, N)` を4つの連続した半開区間に分ける。
//! 各行帯はちょうど1つのワーカーだけが書き換える。

use std::ops::Range;

use crate::error::{RelaxError, Result};

/// ワーカー数（固定）
pub const WORKER_COUNT: usize = 4;

/// 1ワーカーが担当する行の半開区間 `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowBand {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl RowBand {
    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn contains(&self, row: usize) -> bool {
        self.start <= row && row < self.end
    }
}

/// 検証済みの4分割
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    size: usize,
    bands: [RowBand; WORKER_COUNT],
}

impl Partition {
    /// N/4 行ずつに分割し、余りは最後の行帯に入れる
    pub fn new(size: usize) -> Result<Self> {
        let quarter = size / WORKER_COUNT;
        let mut bounds = [(0, 0); WORKER_COUNT];
        for (k, b) in bounds.iter_mut().enumerate() {
            let end = if k == WORKER_COUNT - 1 { size } else { (k + 1) * quarter };
            *b = (k * quarter, end);
        }
        Self::from_bounds(size, bounds)
    }

    /// 任意の境界から分割を作る。空の行帯・隙間・重複は拒否する
    pub fn from_bounds(size: usize, bounds: [(usize, usize); WORKER_COUNT]) -> Result<Self> {
        let mut expected_start = 0;
        let mut bands = [RowBand { index: 0, start: 0, end: 0 }; WORKER_COUNT];

        for (index, &(start, end)) in bounds.iter().enumerate() {
            let band = RowBand { index, start, end };
            if start != expected_start || end <= start || end > size {
                return Err(RelaxError::MalformedPartition { band: index, start, end });
            }
            bands[index] = band;
            expected_start = end;
        }

        if expected_start != size {
            let last = bands[WORKER_COUNT - 1];
            return Err(RelaxError::MalformedPartition {
                band: last.index,
                start: last.start,
                end: last.end,
            });
        }

        Ok(Partition { size, bands })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bands(&self) -> &[RowBand; WORKER_COUNT] {
        &self.bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(p: &Partition) {
        let mut seen = vec![0u32; p.size()];
        for band in p.bands() {
            assert!(!band.is_empty());
            for row in band.rows() {
                seen[row] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1), "行の重複または欠落: {:?}", seen);
    }

    #[test]
    fn covers_all_rows_exactly_once() {
        for n in 4..=257 {
            assert_covers(&Partition::new(n).unwrap());
        }
    }

    #[test]
    fn remainder_goes_to_last_band() {
        let p = Partition::new(10).unwrap();
        let lens: Vec<usize> = p.bands().iter().map(RowBand::len).collect();
        assert_eq!(lens, vec![2, 2, 2, 4]);
        assert_eq!(p.bands()[3].rows(), 6..10);
    }

    #[test]
    fn too_few_rows_give_empty_band() {
        assert_eq!(
            Partition::new(3).unwrap_err(),
            RelaxError::MalformedPartition { band: 0, start: 0, end: 0 }
        );
    }

    #[test]
    fn rejects_gap_and_overlap() {
        assert!(Partition::from_bounds(10, [(0, 2), (3, 5), (5, 7), (7, 10)]).is_err());
        assert!(Partition::from_bounds(10, [(0, 3), (2, 5), (5, 7), (7, 10)]).is_err());
        assert!(Partition::from_bounds(10, [(0, 2), (2, 5), (5, 7), (7, 9)]).is_err());
        assert!(Partition::from_bounds(10, [(0, 2), (2, 5), (5, 5), (5, 10)]).is_err());
        assert!(Partition::from_bounds(10, [(0, 1), (1, 2), (2, 3), (3, 10)]).is_ok());
    }
}
