//! Catalog reconciliation.
//!
//! Diffs a fresh remote listing against the stored catalog by provider file
//! id. Content changes under an unchanged id are not detected; a rename or
//! move keeps its entry.

use crate::adapter::RemoteFile;
use core_library::CatalogEntry;
use std::collections::HashMap;

/// Changes needed to bring a catalog in line with a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Listed files with no stored entry, in listing order
    pub to_add: Vec<RemoteFile>,
    /// Stored entries missing from the listing
    pub to_remove: Vec<CatalogEntry>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the add/remove sets in O(old + new).
///
/// When the listing repeats a file id the later occurrence wins, so each id
/// appears at most once in `to_add`.
pub fn reconcile(old: &[CatalogEntry], new: Vec<RemoteFile>) -> Reconciliation {
    let mut order = Vec::with_capacity(new.len());
    let mut listed: HashMap<String, RemoteFile> = HashMap::with_capacity(new.len());

    for file in new {
        if !listed.contains_key(&file.file_id) {
            order.push(file.file_id.clone());
        }
        listed.insert(file.file_id.clone(), file);
    }

    let mut to_remove = Vec::new();
    for entry in old {
        if listed.remove(&entry.file_id).is_none() {
            to_remove.push(entry.clone());
        }
    }

    let to_add = order
        .into_iter()
        .filter_map(|id| listed.remove(&id))
        .collect();

    Reconciliation { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::ProviderLinkId;
    use std::collections::HashSet;

    fn remote(id: &str) -> RemoteFile {
        RemoteFile {
            file_id: id.to_string(),
            name: format!("{}.mp3", id),
            path: format!("/Music/{}.mp3", id),
            hash: Some(format!("hash-{}", id)),
            size: 100,
        }
    }

    fn catalog(ids: &[&str]) -> Vec<CatalogEntry> {
        let link = ProviderLinkId::new();
        ids.iter().map(|id| remote(id).into_entry(link)).collect()
    }

    fn listing(ids: &[&str]) -> Vec<RemoteFile> {
        ids.iter().map(|id| remote(id)).collect()
    }

    fn added_ids(r: &Reconciliation) -> Vec<&str> {
        r.to_add.iter().map(|f| f.file_id.as_str()).collect()
    }

    fn removed_ids(r: &Reconciliation) -> Vec<&str> {
        r.to_remove.iter().map(|e| e.file_id.as_str()).collect()
    }

    #[test]
    fn test_add_and_remove() {
        let result = reconcile(&catalog(&["a1", "b1"]), listing(&["b1", "c1"]));

        assert_eq!(added_ids(&result), vec!["c1"]);
        assert_eq!(removed_ids(&result), vec!["a1"]);
    }

    #[test]
    fn test_empty_catalog_adds_everything() {
        let result = reconcile(&[], listing(&["a", "b", "c"]));
        assert_eq!(added_ids(&result), vec!["a", "b", "c"]);
        assert!(result.to_remove.is_empty());
    }

    #[test]
    fn test_empty_listing_removes_everything() {
        let result = reconcile(&catalog(&["a", "b"]), Vec::new());
        assert!(result.to_add.is_empty());
        assert_eq!(removed_ids(&result), vec!["a", "b"]);
    }

    #[test]
    fn test_rename_with_same_id_is_untouched() {
        let old = catalog(&["a"]);
        let mut renamed = remote("a");
        renamed.name = "renamed.flac".to_string();
        renamed.path = "/Other/renamed.flac".to_string();

        assert!(reconcile(&old, vec![renamed]).is_empty());
    }

    #[test]
    fn test_duplicate_ids_last_seen_wins() {
        let mut first = remote("dup");
        first.path = "/first.mp3".to_string();
        let mut second = remote("dup");
        second.path = "/second.mp3".to_string();

        let result = reconcile(&[], vec![first, remote("x"), second]);

        assert_eq!(added_ids(&result), vec!["dup", "x"]);
        assert_eq!(result.to_add[0].path, "/second.mp3");
    }

    #[test]
    fn test_set_properties_hold() {
        let cases: &[(&[&str], &[&str])] = &[
            (&[], &[]),
            (&["a"], &["a"]),
            (&["a", "b", "c"], &["c", "d", "e", "a"]),
            (&["x", "y"], &["z", "z", "y"]),
            (&["1", "2", "3", "4"], &["5"]),
        ];

        for (old_ids, new_ids) in cases {
            let old = catalog(old_ids);
            let result = reconcile(&old, listing(new_ids));

            let old_set: HashSet<&str> = old_ids.iter().copied().collect();
            let new_set: HashSet<&str> = new_ids.iter().copied().collect();
            let added: HashSet<&str> = added_ids(&result).into_iter().collect();
            let removed: HashSet<&str> = removed_ids(&result).into_iter().collect();

            assert!(added.is_disjoint(&old_set));
            assert!(removed.is_subset(&old_set));

            let after: HashSet<&str> = old_set
                .difference(&removed)
                .copied()
                .chain(added.iter().copied())
                .collect();
            assert_eq!(after, new_set);

            // Reconciling the resulting catalog against the same listing is a no-op.
            let mut post: Vec<CatalogEntry> = old
                .iter()
                .filter(|e| !removed.contains(e.file_id.as_str()))
                .cloned()
                .collect();
            let link = ProviderLinkId::new();
            post.extend(result.to_add.iter().cloned().map(|f| f.into_entry(link)));
            assert!(reconcile(&post, listing(new_ids)).is_empty());
        }
    }
}
