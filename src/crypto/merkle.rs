//! Merkle tree over transaction hashes. Internal nodes are combined with
//! `hash_join`, which orders its two inputs before hashing, so a proof is
//! simply the list of sibling hashes along the path to the root — there is
//! no left/right bit to carry, since `hash_join(a, b) == hash_join(b, a)`.

use super::hash::hash_join;

#[derive(Debug, thiserror::Error)]
pub enum MerkleError {
    #[error("cannot build a Merkle tree from zero items")]
    EmptyInput,
    #[error("target hash not found among leaves")]
    TargetNotFound,
    #[error("invalid base58 hash: {0}")]
    InvalidBase58(#[from] bs58::decode::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MerkleProof {
    pub leaf: String,
    pub siblings: Vec<String>,
    pub root: String,
}

/// Builds every layer of the tree, leaves first, root last.
pub fn merkle_build(items: &[String]) -> Result<Vec<Vec<String>>, MerkleError> {
    if items.is_empty() {
        return Err(MerkleError::EmptyInput);
    }
    let mut layers = vec![items.to_vec()];
    while layers.last().unwrap().len() > 1 {
        let current = layers.last().unwrap();
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        let mut i = 0;
        while i < current.len() {
            let left = &current[i];
            let right = if i + 1 < current.len() {
                &current[i + 1]
            } else {
                left
            };
            next.push(hash_join(left, right)?);
            i += 2;
        }
        layers.push(next);
    }
    Ok(layers)
}

/// Convenience wrapper returning only the root hash.
pub fn merkle_root(items: &[String]) -> Result<String, MerkleError> {
    let layers = merkle_build(items)?;
    Ok(layers.last().unwrap()[0].clone())
}

/// Produces an inclusion proof for `target` within `items`.
pub fn merkle_proof(items: &[String], target: &str) -> Result<MerkleProof, MerkleError> {
    let layers = merkle_build(items)?;
    let mut index = layers[0]
        .iter()
        .position(|h| h == target)
        .ok_or(MerkleError::TargetNotFound)?;

    let mut siblings = Vec::new();
    for layer in &layers[..layers.len() - 1] {
        let sibling_index = if index % 2 == 0 {
            if index + 1 < layer.len() {
                index + 1
            } else {
                index
            }
        } else {
            index - 1
        };
        siblings.push(layer[sibling_index].clone());
        index /= 2;
    }

    Ok(MerkleProof {
        leaf: target.to_string(),
        siblings,
        root: layers.last().unwrap()[0].clone(),
    })
}

/// Recomputes the root from `leaf` and `proof.siblings` and compares to `root`.
pub fn merkle_verify(leaf: &str, proof: &MerkleProof, root: &str) -> Result<bool, MerkleError> {
    let mut current = leaf.to_string();
    for sibling in &proof.siblings {
        current = hash_join(&current, sibling)?;
    }
    Ok(current == root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::hash_bytes_b58;

    fn leaves(n: usize) -> Vec<String> {
        (0..n).map(|i| hash_bytes_b58(format!("tx{i}").as_bytes())).collect()
    }

    #[test]
    fn single_leaf_tree_is_its_own_root() {
        let items = leaves(1);
        assert_eq!(merkle_root(&items).unwrap(), items[0]);
    }

    #[test]
    fn odd_length_layer_duplicates_last_item() {
        let items = leaves(3);
        let layers = merkle_build(&items).unwrap();
        assert_eq!(layers[0].len(), 3);
        assert_eq!(layers[1].len(), 2);
        assert_eq!(layers[2].len(), 1);
    }

    #[test]
    fn proof_verifies_for_every_leaf() {
        let items = leaves(7);
        let root = merkle_root(&items).unwrap();
        for leaf in &items {
            let proof = merkle_proof(&items, leaf).unwrap();
            assert!(merkle_verify(leaf, &proof, &root).unwrap());
        }
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let items = leaves(4);
        let root = merkle_root(&items).unwrap();
        let proof = merkle_proof(&items, &items[2]).unwrap();
        assert!(!merkle_verify(&items[0], &proof, &root).unwrap());
    }

    #[test]
    fn empty_input_is_rejected() {
        let items: Vec<String> = vec![];
        assert!(merkle_build(&items).is_err());
    }
}
