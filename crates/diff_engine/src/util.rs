//! Small shared algorithms

/// Longest common subsequence of `xs` and `ys` under a caller-supplied
/// equality relation.
///
/// Returns the paired elements in order. The result is a subsequence of
/// both inputs and no longer common subsequence exists; ties between equal
/// length solutions are broken arbitrarily.
pub fn longest_common_subsequence<T: Clone>(
    xs: &[T],
    ys: &[T],
    eq: impl Fn(&T, &T) -> bool,
) -> Vec<(T, T)> {
    let m = xs.len();
    let n = ys.len();
    if m == 0 || n == 0 {
        return Vec::new();
    }

    let mut lengths = vec![vec![0usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            lengths[i][j] = if eq(&xs[i - 1], &ys[j - 1]) {
                lengths[i - 1][j - 1] + 1
            } else {
                lengths[i - 1][j].max(lengths[i][j - 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(lengths[m][n]);
    let (mut i, mut j) = (m, n);
    while i > 0 && j > 0 {
        if eq(&xs[i - 1], &ys[j - 1]) && lengths[i][j] == lengths[i - 1][j - 1] + 1 {
            pairs.push((xs[i - 1].clone(), ys[j - 1].clone()));
            i -= 1;
            j -= 1;
        } else if lengths[i - 1][j] >= lengths[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}
