//! Best-known result per MultiPV line within one search episode.

use engine::ParsedScore;
use smallvec::SmallVec;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineSlot {
    /// Score as the engine reported it (side to move's view).
    pub score: Option<ParsedScore>,
    pub depth: u32,
    pub principal_variation: String,
}

impl LineSlot {
    pub fn is_empty(&self) -> bool {
        self.score.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: SmallVec<[LineSlot; 4]>,
    explicit_multipv_seen: bool,
}

impl SlotTable {
    pub fn new(multipv: u32) -> Self {
        let mut table = Self {
            slots: SmallVec::new(),
            explicit_multipv_seen: false,
        };
        table.reset(multipv);
        table
    }

    /// Start a new episode with `multipv` empty slots.
    pub fn reset(&mut self, multipv: u32) {
        self.slots.clear();
        self.slots
            .resize(multipv.max(1) as usize, LineSlot::default());
        self.explicit_multipv_seen = false;
    }

    pub fn len(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn explicit_multipv_seen(&self) -> bool {
        self.explicit_multipv_seen
    }

    /// 1-based slot lookup.
    pub fn slot(&self, k: u32) -> Option<&LineSlot> {
        self.slots.get(k.checked_sub(1)? as usize)
    }

    /// The slot an info line belongs to. Lines without `multipv` go to slot 1.
    pub fn resolve_slot(&mut self, parsed: Option<u32>) -> u32 {
        match parsed {
            Some(k) => {
                self.explicit_multipv_seen = true;
                k
            }
            None => 1,
        }
    }

    /// Offer a result for slot `k`. Returns whether it improved the slot and
    /// was stored: the slot was empty, the depth went up, or the depth is
    /// unchanged and the score moved. Results at a lower depth are dropped,
    /// as are slots outside the table. A line without a depth counts as the
    /// slot's current depth.
    pub fn offer(&mut self, k: u32, depth: Option<u32>, score: ParsedScore, pv: String) -> bool {
        let Some(slot) = k
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i as usize))
        else {
            return false;
        };

        let depth = depth.unwrap_or(slot.depth);
        let improved = match slot.score {
            None => depth >= slot.depth,
            Some(current) => {
                depth > slot.depth || (depth == slot.depth && score_changed(current, score))
            }
        };
        if !improved {
            return false;
        }

        slot.depth = depth;
        slot.score = Some(score);
        slot.principal_variation = pv;
        true
    }
}

fn score_changed(a: ParsedScore, b: ParsedScore) -> bool {
    a.is_mate != b.is_mate
        || a.mate_distance != b.mate_distance
        || (a.centipawns - b.centipawns).abs() > f64::EPSILON
}
