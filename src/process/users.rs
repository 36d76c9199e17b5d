//! Uid to user name resolution with a shared cache.

use dashmap::DashMap;
use nix::unistd::{Uid, User};
use tracing::debug;

/// Resolves numeric uids through the system user database.
///
/// Lookups are cached per uid and shared across the rayon workers of a pass.
/// A uid without an entry resolves to its decimal form.
#[derive(Default)]
pub struct UserCache {
    names: DashMap<u32, String>,
}

impl UserCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, uid: u32) -> String {
        if let Some(name) = self.names.get(&uid) {
            return name.clone();
        }

        let name = match User::from_uid(Uid::from_raw(uid)) {
            Ok(Some(user)) => user.name,
            Ok(None) => uid.to_string(),
            Err(e) => {
                debug!("User lookup for uid {} failed: {}", uid, e);
                uid.to_string()
            }
        };
        self.names.insert(uid, name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_root() {
        let cache = UserCache::new();
        assert_eq!(cache.resolve(0), "root");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_uid_falls_back_to_number() {
        let cache = UserCache::new();
        assert_eq!(cache.resolve(3_999_999_999), "3999999999");
        // cached
        assert_eq!(cache.resolve(3_999_999_999), "3999999999");
        assert_eq!(cache.len(), 1);
    }
}
