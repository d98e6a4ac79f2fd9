/// All `k`-subsets of `0..total` in ascending lexicographic order.
///
/// `k == 0` yields a single empty set, `k > total` yields nothing.
pub fn exclusion_combinations(total: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k > total {
        return out;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        // rightmost slot that still has room to advance
        let Some(i) = (0..k).rev().find(|&i| idx[i] < total - k + i) else {
            break;
        };
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
    out
}
