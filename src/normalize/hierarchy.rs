//! Feature-type hierarchy of a GFF3 file.
//!
//! Types are linked through the `Parent=` attributes of their features: a
//! `mRNA` whose parent is a `gene` makes `gene` a parent type of `mRNA`.
//! Ranks are topological depths: a type with a parentless feature ranks 1
//! and every other type ranks one deeper than its deepest parent type.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeNode {
    /// 0 until ranked.
    pub rank: u32,
    /// Some feature of this type has no parent; the type ranks 1.
    pub seeded: bool,
    pub parents: BTreeSet<String>,
    pub children: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureHierarchy {
    types: BTreeMap<String, TypeNode>,
}

impl FeatureHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a feature of `feature_type` has parents of `parent_types`.
    pub fn register<S: AsRef<str>>(&mut self, feature_type: &str, parent_types: &[S]) {
        let node = self.types.entry(feature_type.to_string()).or_default();
        if parent_types.is_empty() {
            node.seeded = true;
            return;
        }
        for parent in parent_types {
            node.parents.insert(parent.as_ref().to_string());
        }
        for parent in parent_types {
            self.types
                .entry(parent.as_ref().to_string())
                .or_default()
                .children
                .insert(feature_type.to_string());
        }
    }

    /// Assigns every rank by propagating from rank-1 types. Types left
    /// unranked sit on a cycle or below one; they are returned as the error.
    pub fn resolve_ranks(&mut self) -> Result<(), Vec<String>> {
        let mut pending: BTreeMap<String, usize> = BTreeMap::new();
        let mut queue = VecDeque::new();
        for (name, node) in self.types.iter_mut() {
            node.rank = 0;
            if node.seeded || node.parents.is_empty() {
                node.rank = 1;
                queue.push_back(name.clone());
            } else {
                pending.insert(name.clone(), node.parents.len());
            }
        }

        while let Some(name) = queue.pop_front() {
            let (rank, children) = match self.types.get(&name) {
                Some(node) => (node.rank, node.children.clone()),
                None => continue,
            };
            for child in children {
                if let Some(node) = self.types.get_mut(&child) {
                    if !node.seeded {
                        node.rank = node.rank.max(rank + 1);
                    }
                }
                if let Some(remaining) = pending.get_mut(&child) {
                    *remaining -= 1;
                    if *remaining == 0 {
                        pending.remove(&child);
                        queue.push_back(child);
                    }
                }
            }
        }

        if pending.is_empty() {
            return Ok(());
        }
        for name in pending.keys() {
            if let Some(node) = self.types.get_mut(name) {
                node.rank = 0;
            }
        }
        Err(pending.into_keys().collect())
    }

    /// The resolved rank, or `None` for unknown or unranked types.
    pub fn rank_of(&self, feature_type: &str) -> Option<u32> {
        self.types
            .get(feature_type)
            .map(|node| node.rank)
            .filter(|rank| *rank > 0)
    }

    pub fn get(&self, feature_type: &str) -> Option<&TypeNode> {
        self.types.get(feature_type)
    }

    pub fn ranks(&self) -> BTreeMap<String, u32> {
        self.types
            .iter()
            .map(|(name, node)| (name.clone(), node.rank))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn ranks_follow_the_deepest_parent() {
        let mut hierarchy = FeatureHierarchy::new();
        hierarchy.register("gene", NONE);
        hierarchy.register("mRNA", &["gene"]);
        hierarchy.register("exon", &["mRNA"]);
        hierarchy.register("CDS", &["mRNA"]);
        hierarchy.register("protein_match", &["gene", "exon"]);
        hierarchy.resolve_ranks().unwrap();

        assert_eq!(hierarchy.rank_of("gene"), Some(1));
        assert_eq!(hierarchy.rank_of("mRNA"), Some(2));
        assert_eq!(hierarchy.rank_of("exon"), Some(3));
        assert_eq!(hierarchy.rank_of("CDS"), Some(3));
        assert_eq!(hierarchy.rank_of("protein_match"), Some(4));
        assert_eq!(hierarchy.rank_of("tRNA"), None);
    }

    #[test]
    fn every_resolved_rank_is_one_below_its_deepest_parent() {
        let mut hierarchy = FeatureHierarchy::new();
        hierarchy.register("region", NONE);
        hierarchy.register("gene", NONE);
        hierarchy.register("ncRNA", &["gene"]);
        hierarchy.register("mRNA", &["gene"]);
        hierarchy.register("exon", &["mRNA", "ncRNA"]);
        hierarchy.register("five_prime_UTR", &["mRNA"]);
        hierarchy.register("intron", &["exon", "gene"]);
        hierarchy.resolve_ranks().unwrap();

        for (name, rank) in hierarchy.ranks() {
            let node = hierarchy.get(&name).unwrap();
            if node.seeded || node.parents.is_empty() {
                assert_eq!(rank, 1, "{name}");
            } else {
                let deepest = node
                    .parents
                    .iter()
                    .map(|parent| hierarchy.rank_of(parent).unwrap())
                    .max()
                    .unwrap();
                assert_eq!(rank, deepest + 1, "{name}");
            }
        }
    }

    #[test]
    fn parentless_features_seed_their_type() {
        let mut hierarchy = FeatureHierarchy::new();
        hierarchy.register("gene", NONE);
        hierarchy.register("mRNA", &["gene"]);
        hierarchy.register("gene", &["mRNA"]);
        hierarchy.register("exon", &["mRNA"]);
        hierarchy.resolve_ranks().unwrap();

        assert_eq!(hierarchy.rank_of("gene"), Some(1));
        assert_eq!(hierarchy.rank_of("mRNA"), Some(2));
        assert_eq!(hierarchy.rank_of("exon"), Some(3));
    }

    #[test]
    fn cycles_are_reported_not_looped_on() {
        let mut hierarchy = FeatureHierarchy::new();
        hierarchy.register("gene", NONE);
        hierarchy.register("a", &["b"]);
        hierarchy.register("b", &["a"]);
        hierarchy.register("c", &["a"]);
        hierarchy.register("self", &["self"]);

        let unranked = hierarchy.resolve_ranks().unwrap_err();
        assert_eq!(unranked, vec!["a", "b", "c", "self"]);
        assert_eq!(hierarchy.rank_of("gene"), Some(1));
        assert_eq!(hierarchy.rank_of("c"), None);
    }
}
