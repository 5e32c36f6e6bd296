//! Completion set of part numbers.

/// Set of acknowledged part numbers `1..=part_count`, one bit per part
/// (LSB of byte 0 = part 1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartSet {
    bytes: Vec<u8>,
    part_count: u32,
    len: u32,
}

impl PartSet {
    /// Empty set for an upload of `part_count` parts.
    pub fn new(part_count: u32) -> Self {
        let len = (part_count as usize).div_ceil(8);
        PartSet {
            bytes: vec![0u8; len],
            part_count,
            len: 0,
        }
    }

    fn slot(&self, part_number: u32) -> Option<(usize, u8)> {
        if part_number == 0 || part_number > self.part_count {
            return None;
        }
        let index = (part_number - 1) as usize;
        Some((index / 8, 1u8 << (index % 8)))
    }

    /// Mark `part_number` acknowledged. Returns false when it was already
    /// present or is outside `1..=part_count`.
    pub fn insert(&mut self, part_number: u32) -> bool {
        let Some((byte, mask)) = self.slot(part_number) else {
            return false;
        };
        if self.bytes[byte] & mask != 0 {
            return false;
        }
        self.bytes[byte] |= mask;
        self.len += 1;
        true
    }

    pub fn contains(&self, part_number: u32) -> bool {
        self.slot(part_number)
            .map(|(byte, mask)| self.bytes[byte] & mask != 0)
            .unwrap_or(false)
    }

    /// Number of acknowledged parts.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn part_count(&self) -> u32 {
        self.part_count
    }

    /// True when every part `1..=part_count` is present.
    pub fn is_complete(&self) -> bool {
        self.len == self.part_count
    }

    /// Part numbers not yet acknowledged, ascending.
    pub fn missing(&self) -> impl Iterator<Item = u32> + '_ {
        (1..=self.part_count).filter(move |&n| !self.contains(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_contains() {
        let mut s = PartSet::new(10);
        assert!(!s.is_complete());
        assert!(s.insert(1));
        assert!(s.insert(4));
        assert!(s.insert(10));
        assert!(s.contains(1));
        assert!(!s.contains(2));
        assert!(s.contains(4));
        assert!(s.contains(10));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn duplicates_and_out_of_range_rejected() {
        let mut s = PartSet::new(3);
        assert!(s.insert(2));
        assert!(!s.insert(2));
        assert!(!s.insert(0));
        assert!(!s.insert(4));
        assert_eq!(s.len(), 1);
        assert!(!s.contains(0));
        assert!(!s.contains(99));
    }

    #[test]
    fn complete_in_any_order() {
        let mut s = PartSet::new(9);
        for n in [9, 3, 1, 7, 5, 2, 8, 6] {
            assert!(s.insert(n));
            assert!(!s.is_complete());
        }
        assert_eq!(s.missing().collect::<Vec<_>>(), vec![4]);
        s.insert(4);
        assert!(s.is_complete());
        assert_eq!(s.missing().count(), 0);
    }

    #[test]
    fn empty_upload_is_trivially_complete() {
        let s = PartSet::new(0);
        assert!(s.is_complete());
        assert!(s.is_empty());
    }
}
