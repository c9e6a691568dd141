//! Compressed sparse row matrices over local node indices.

/// Compressed Sparse Row (CSR) matrix.
///
/// Rows are a partition's owned nodes; columns are its local nodes (owned
/// then halo), so a row product needs halo values to be current.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i+1]` indexes row `i`'s entries.
    row_ptr: Vec<usize>,
    col_idx: Vec<u32>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Build from `(row, col, value)` triplets; duplicates are summed and
    /// each row is sorted by column.
    ///
    /// # Panics
    ///
    /// Panics if a triplet is out of range.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(u32, u32, f64)]) -> Self {
        let mut row_counts = vec![0usize; rows];
        for &(r, c, _) in triplets {
            assert!((c as usize) < cols, "column {c} out of range {cols}");
            row_counts[r as usize] += 1;
        }
        let mut row_ptr = vec![0usize; rows + 1];
        for i in 0..rows {
            row_ptr[i + 1] = row_ptr[i] + row_counts[i];
        }
        let mut entries = vec![(0u32, 0.0f64); row_ptr[rows]];
        let mut cursor = row_ptr[..rows].to_vec();
        for &(r, c, v) in triplets {
            entries[cursor[r as usize]] = (c, v);
            cursor[r as usize] += 1;
        }

        let mut out_ptr = Vec::with_capacity(rows + 1);
        let mut col_idx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        out_ptr.push(0);
        for i in 0..rows {
            let row = &mut entries[row_ptr[i]..row_ptr[i + 1]];
            // Stable, so duplicates are summed in insertion order.
            row.sort_by_key(|&(c, _)| c);
            for &(c, v) in row.iter() {
                if col_idx.len() > out_ptr[i] && col_idx.last() == Some(&c) {
                    if let Some(last) = values.last_mut() {
                        *last += v;
                    }
                } else {
                    col_idx.push(c);
                    values.push(v);
                }
            }
            out_ptr.push(col_idx.len());
        }

        Self {
            rows,
            cols,
            row_ptr: out_ptr,
            col_idx,
            values,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Entries of row `i` as `(column, value)` pairs.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (u32, f64)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Mutable entries of row `i`.
    pub fn row_mut(&mut self, i: usize) -> (&[u32], &mut [f64]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &mut self.values[range])
    }

    /// Stored value at `(i, j)`, zero if absent.
    pub fn get(&self, i: usize, j: u32) -> f64 {
        self.row(i).find(|&(c, _)| c == j).map_or(0.0, |(_, v)| v)
    }

    /// `y = A x`; `x` spans columns, `y` spans rows.
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        for (i, yi) in y.iter_mut().enumerate().take(self.rows) {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k] as usize];
            }
            *yi = sum;
        }
    }

    /// Diagonal entries of the square leading block.
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows).map(|i| self.get(i, i as u32)).collect()
    }

    /// `a * self + b * other` for matrices with identical sparsity.
    ///
    /// Returns `None` if the patterns differ.
    pub fn combine(&self, a: f64, other: &Self, b: f64) -> Option<Self> {
        if self.row_ptr != other.row_ptr || self.col_idx != other.col_idx {
            return None;
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(x, y)| a * x + b * y)
            .collect();
        Some(Self {
            values,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn duplicates_are_summed_and_rows_sorted() {
        let m = CsrMatrix::from_triplets(2, 3, &[(0, 2, 1.0), (0, 0, 2.0), (0, 2, 3.0), (1, 1, 5.0)]);
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.row(0).collect::<Vec<_>>(), vec![(0, 2.0), (2, 4.0)]);
        assert_eq!(m.get(1, 1), 5.0);
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.diagonal(), vec![2.0, 5.0]);
    }

    #[test]
    fn combine_requires_same_pattern() {
        let a = CsrMatrix::from_triplets(1, 2, &[(0, 0, 1.0), (0, 1, 2.0)]);
        let b = CsrMatrix::from_triplets(1, 2, &[(0, 0, 3.0), (0, 1, 4.0)]);
        let c = a.combine(2.0, &b, 1.0).unwrap();
        assert_eq!(c.row(0).collect::<Vec<_>>(), vec![(0, 5.0), (1, 8.0)]);
        let d = CsrMatrix::from_triplets(1, 2, &[(0, 0, 1.0)]);
        assert!(a.combine(1.0, &d, 1.0).is_none());
    }

    proptest! {
        #[test]
        fn mul_vec_matches_dense(
            triplets in proptest::collection::vec((0u32..5, 0u32..7, -10.0f64..10.0), 0..40),
            x in proptest::collection::vec(-5.0f64..5.0, 7),
        ) {
            let m = CsrMatrix::from_triplets(5, 7, &triplets);
            let mut dense = [[0.0f64; 7]; 5];
            for &(r, c, v) in &triplets {
                dense[r as usize][c as usize] += v;
            }
            let mut y = vec![0.0; 5];
            m.mul_vec(&x, &mut y);
            for r in 0..5 {
                let expect: f64 = (0..7).map(|c| dense[r][c] * x[c]).sum();
                prop_assert!((y[r] - expect).abs() < 1e-9);
            }
        }
    }
}
