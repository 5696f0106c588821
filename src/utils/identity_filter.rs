use std::sync::RwLock;

use autoscale_cuckoo_filter::CuckooFilter;

use super::identity::IdentityKind;

/// Expected capacity and false-positive rate per identity kind.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Probabilistic "seen before" set for usernames and e-mails.
///
/// A negative answer is definite; a positive one must be confirmed elsewhere.
pub struct IdentityFilter {
    usernames: RwLock<CuckooFilter<String>>,
    emails: RwLock<CuckooFilter<String>>,
}

impl Default for IdentityFilter {
    fn default() -> Self {
        Self {
            usernames: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
            emails: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
        }
    }
}

impl IdentityFilter {
    fn slot(&self, kind: IdentityKind) -> &RwLock<CuckooFilter<String>> {
        match kind {
            IdentityKind::Username => &self.usernames,
            IdentityKind::Email => &self.emails,
        }
    }

    pub fn might_exist(&self, kind: IdentityKind, normalized: &str) -> bool {
        let filter = self
            .slot(kind)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        filter.contains(&normalized.to_string())
    }

    pub fn insert(&self, kind: IdentityKind, normalized: &str) {
        self.insert_batch(kind, std::slice::from_ref(&normalized.to_string()));
    }

    pub fn remove(&self, kind: IdentityKind, normalized: &str) {
        let mut filter = self
            .slot(kind)
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        filter.remove(&normalized.to_string());
    }

    pub fn insert_batch(&self, kind: IdentityKind, values: &[String]) {
        let mut filter = self
            .slot(kind)
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for value in values {
            filter.add(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_values_are_reported_per_kind() {
        let filter = IdentityFilter::default();
        filter.insert(IdentityKind::Username, "budi");

        assert!(filter.might_exist(IdentityKind::Username, "budi"));
        assert!(!filter.might_exist(IdentityKind::Email, "budi"));
    }

    #[test]
    fn removed_values_disappear() {
        let filter = IdentityFilter::default();
        filter.insert_batch(
            IdentityKind::Email,
            &["a@x.io".to_string(), "b@x.io".to_string()],
        );
        filter.remove(IdentityKind::Email, "a@x.io");

        assert!(!filter.might_exist(IdentityKind::Email, "a@x.io"));
        assert!(filter.might_exist(IdentityKind::Email, "b@x.io"));
    }
}
