//! Merkle roots over dual digests

use crate::dual_hash;

/// Merkle root of a list of dual digests.
///
/// Empty input hashes the literal `empty`; odd levels duplicate the last node.
pub fn merkle_root(leaves: &[String]) -> String {
    if leaves.is_empty() {
        return dual_hash(b"empty");
    }

    let mut level: Vec<String> = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                dual_hash(format!("{left}{right}").as_bytes())
            })
            .collect();
    }

    level.remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<String> {
        (0..n).map(|i| dual_hash(&[i as u8])).collect()
    }

    #[test]
    fn test_empty_root() {
        assert_eq!(merkle_root(&[]), dual_hash(b"empty"));
    }

    #[test]
    fn test_single_leaf_is_root() {
        let l = leaves(1);
        assert_eq!(merkle_root(&l), l[0]);
    }

    #[test]
    fn test_odd_count_duplicates_last() {
        let three = leaves(3);
        let mut four = three.clone();
        four.push(three[2].clone());
        assert_eq!(merkle_root(&three), merkle_root(&four));
    }

    #[test]
    fn test_order_matters() {
        let l = leaves(4);
        let mut r = l.clone();
        r.swap(0, 1);
        assert_ne!(merkle_root(&l), merkle_root(&r));
    }
}
