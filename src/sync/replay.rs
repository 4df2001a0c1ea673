use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::state::ChainId;

/// Per-source high-water marks of accepted sequence numbers
#[derive(Debug, Default)]
pub struct ReplayGuard {
    high_water: DashMap<ChainId, u64>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `sequence` from `source` if it is above the high-water mark.
    ///
    /// On rejection returns the last accepted sequence.
    pub fn accept(&self, source: &ChainId, sequence: u64) -> Result<(), u64> {
        match self.high_water.entry(source.clone()) {
            Entry::Occupied(mut last) => {
                if sequence <= *last.get() {
                    return Err(*last.get());
                }
                *last.get_mut() = sequence;
                Ok(())
            }
            Entry::Vacant(vacant) => {
                vacant.insert(sequence);
                Ok(())
            }
        }
    }

    pub fn high_water(&self, source: &ChainId) -> Option<u64> {
        self.high_water.get(source).map(|s| *s)
    }
}
