/// Ticket for one asynchronous geography load.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadToken {
    pub epoch: u64,
    pub seq: u64,
}

/// Monotonic issuer of load tokens.
///
/// Only the most recently issued token in the current epoch is current;
/// `bump_epoch` invalidates everything issued before it (dispose, remount).
#[derive(Debug, Default, Clone)]
pub struct LoadEpoch {
    epoch: u64,
    seq: u64,
}

impl LoadEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn issue(&mut self) -> LoadToken {
        self.seq += 1;
        LoadToken {
            epoch: self.epoch,
            seq: self.seq,
        }
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        token.epoch == self.epoch && token.seq == self.seq
    }

    pub fn bump_epoch(&mut self) {
        self.epoch += 1;
        self.seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::LoadEpoch;

    #[test]
    fn newer_tokens_supersede_older_ones() {
        let mut epoch = LoadEpoch::new();
        let a = epoch.issue();
        assert!(epoch.is_current(a));
        let b = epoch.issue();
        assert!(!epoch.is_current(a));
        assert!(epoch.is_current(b));
    }

    #[test]
    fn bumping_the_epoch_invalidates_everything() {
        let mut epoch = LoadEpoch::new();
        let a = epoch.issue();
        epoch.bump_epoch();
        assert!(!epoch.is_current(a));
        let b = epoch.issue();
        assert_eq!(b.seq, 1);
        assert_ne!(a, b);
        assert!(epoch.is_current(b));
    }
}
