//! Epoch marker registry.
//!
//! Each epoch upgrade has a well-known link marker and a designated signer.
//! A state block whose link equals a registered marker (and whose balance is
//! unchanged) is an epoch block and must be signed by that epoch's signer.

use std::collections::HashMap;
use strand_types::{Account, Epoch, Link};

#[derive(Clone, Debug)]
struct EpochEntry {
    link: Link,
    signer: Account,
}

/// Registered epoch upgrades.
#[derive(Clone, Debug, Default)]
pub struct Epochs {
    entries: HashMap<Epoch, EpochEntry>,
}

impl Epochs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, epoch: Epoch, link: Link, signer: Account) {
        self.entries.insert(epoch, EpochEntry { link, signer });
    }

    pub fn is_epoch_link(&self, link: &Link) -> bool {
        self.entries.values().any(|entry| entry.link == *link)
    }

    /// The epoch an upgrade link refers to.
    pub fn epoch(&self, link: &Link) -> Option<Epoch> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.link == *link)
            .map(|(epoch, _)| *epoch)
    }

    /// The account allowed to sign blocks carrying this link.
    pub fn signer(&self, link: &Link) -> Option<Account> {
        self.entries
            .values()
            .find(|entry| entry.link == *link)
            .map(|entry| entry.signer)
    }

    pub fn link(&self, epoch: Epoch) -> Option<Link> {
        self.entries.get(&epoch).map(|entry| entry.link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Epochs {
        let mut epochs = Epochs::new();
        epochs.add(Epoch::Epoch1, Link::new([0xE1; 32]), Account::new([0xAA; 32]));
        epochs.add(Epoch::Epoch2, Link::new([0xE2; 32]), Account::new([0xBB; 32]));
        epochs
    }

    #[test]
    fn recognizes_registered_links() {
        let epochs = registry();
        assert!(epochs.is_epoch_link(&Link::new([0xE1; 32])));
        assert!(epochs.is_epoch_link(&Link::new([0xE2; 32])));
        assert!(!epochs.is_epoch_link(&Link::new([0xE3; 32])));
    }

    #[test]
    fn resolves_epoch_and_signer() {
        let epochs = registry();
        let link = Link::new([0xE2; 32]);
        assert_eq!(epochs.epoch(&link), Some(Epoch::Epoch2));
        assert_eq!(epochs.signer(&link), Some(Account::new([0xBB; 32])));
        assert_eq!(epochs.link(Epoch::Epoch2), Some(link));
    }

    #[test]
    fn unknown_link_resolves_to_nothing() {
        let epochs = registry();
        let link = Link::new([0x00; 32]);
        assert_eq!(epochs.epoch(&link), None);
        assert_eq!(epochs.signer(&link), None);
    }
}
