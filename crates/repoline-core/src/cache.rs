//! Previous-run metadata cache keyed by artifact filename

use std::collections::HashMap;

use crate::checksum::ChecksumKind;
use crate::extract::FileStat;
use crate::package::Package;

/// Read-through cache of packages from a previous run.
///
/// The map is never structurally mutated during a run. Reuse clones the
/// entry and rebinds the location on the clone, so cached packages stay
/// intact even when the new run lays the repository out differently.
pub struct MetadataCache {
    by_filename: HashMap<String, Package>,
    skip_stat: bool,
}

impl MetadataCache {
    /// Build the cache from previously dumped packages. Keys are the
    /// basenames of each package's `location_href`.
    pub fn new(packages: impl IntoIterator<Item = Package>, skip_stat: bool) -> Self {
        let by_filename = packages
            .into_iter()
            .map(|pkg| {
                let filename = pkg
                    .location_href
                    .rsplit('/')
                    .next()
                    .unwrap_or(pkg.location_href.as_str())
                    .to_string();
                (filename, pkg)
            })
            .collect();
        Self {
            by_filename,
            skip_stat,
        }
    }

    pub fn len(&self) -> usize {
        self.by_filename.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_filename.is_empty()
    }

    pub fn lookup(&self, filename: &str) -> Option<&Package> {
        self.by_filename.get(filename)
    }

    /// Freshness: same mtime, same size, and the cached checksum was
    /// produced by the kind this run requests. With `skip_stat` the cache
    /// is trusted unconditionally and no stat info is needed.
    pub fn is_fresh(&self, entry: &Package, stat: Option<&FileStat>, kind: ChecksumKind) -> bool {
        if self.skip_stat {
            return true;
        }
        let Some(stat) = stat else {
            return false;
        };
        entry.time_file == stat.mtime
            && entry.size_package == stat.size
            && entry.checksum_kind == kind.name()
    }

    /// Clone `entry` for reuse under the new layout.
    pub fn reuse(&self, entry: &Package, href: &str, base: Option<&str>) -> Package {
        let mut pkg = entry.clone();
        pkg.rebind_location(href, base);
        pkg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Package {
        Package {
            name: "tree".into(),
            location_href: "sub/tree-2.1.0.rpm".into(),
            time_file: 1000,
            size_package: 512,
            checksum_kind: "sha256".into(),
            ..Default::default()
        }
    }

    #[test]
    fn lookup_by_basename() {
        let cache = MetadataCache::new([entry()], false);
        assert!(cache.lookup("tree-2.1.0.rpm").is_some());
        assert!(cache.lookup("sub/tree-2.1.0.rpm").is_none());
        assert!(cache.lookup("other.rpm").is_none());
    }

    #[test]
    fn freshness_requires_all_three() {
        let cache = MetadataCache::new([], false);
        let e = entry();
        let good = FileStat {
            mtime: 1000,
            size: 512,
        };
        assert!(cache.is_fresh(&e, Some(&good), ChecksumKind::Sha256));
        assert!(!cache.is_fresh(
            &e,
            Some(&FileStat {
                mtime: 1001,
                size: 512
            }),
            ChecksumKind::Sha256
        ));
        assert!(!cache.is_fresh(
            &e,
            Some(&FileStat {
                mtime: 1000,
                size: 513
            }),
            ChecksumKind::Sha256
        ));
        assert!(!cache.is_fresh(&e, Some(&good), ChecksumKind::Sha1));
        assert!(!cache.is_fresh(&e, None, ChecksumKind::Sha256));
    }

    #[test]
    fn skip_stat_trusts_cache() {
        let cache = MetadataCache::new([], true);
        assert!(cache.is_fresh(&entry(), None, ChecksumKind::Md5));
    }

    #[test]
    fn reuse_clones_and_rebinds() {
        let cache = MetadataCache::new([entry()], false);
        let cached = cache.lookup("tree-2.1.0.rpm").unwrap();
        let reused = cache.reuse(cached, "new/tree-2.1.0.rpm", Some("http://mirror"));
        assert_eq!(reused.location_href, "new/tree-2.1.0.rpm");
        assert_eq!(reused.location_base.as_deref(), Some("http://mirror"));
        // the cache entry itself is untouched
        assert_eq!(
            cache.lookup("tree-2.1.0.rpm").unwrap().location_href,
            "sub/tree-2.1.0.rpm"
        );
    }
}
