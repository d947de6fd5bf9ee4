//! Half-open intervals over course distance and ordered collections of them.

use serde::{Deserialize, Serialize};

/// `[start, end)` in course distance. `Region::EMPTY` is the `(-1, -1)` sentinel for "no overlap".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub start: f64,
    pub end: f64,
}

impl Region {
    pub const EMPTY: Region = Region {
        start: -1.0,
        end: -1.0,
    };

    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start < 0.0 || self.end <= self.start
    }

    pub fn len(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.end - self.start
        }
    }

    pub fn intersect(&self, other: &Region) -> Region {
        if self.is_empty() || other.is_empty() {
            return Region::EMPTY;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Region::new(start, end)
        } else {
            Region::EMPTY
        }
    }

    pub fn fully_contains(&self, other: &Region) -> bool {
        !other.is_empty() && self.start <= other.start && self.end >= other.end
    }

    pub fn contains(&self, pos: f64) -> bool {
        self.start <= pos && pos < self.end
    }
}

/// What an [RegionList::rmap] transform may return for one input region.
pub enum Mapped {
    One(Region),
    Many(Vec<Region>),
}

impl From<Region> for Mapped {
    fn from(region: Region) -> Self {
        Mapped::One(region)
    }
}

impl From<Vec<Region>> for Mapped {
    fn from(regions: Vec<Region>) -> Self {
        Mapped::Many(regions)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionList {
    regions: Vec<Region>,
}

impl RegionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(region: Region) -> Self {
        let mut list = Self::new();
        list.push(region);
        list
    }

    /// Empty regions are dropped on insertion.
    pub fn push(&mut self, region: Region) {
        if !region.is_empty() {
            self.regions.push(region);
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn first(&self) -> Option<&Region> {
        self.regions.first()
    }

    pub fn last(&self) -> Option<&Region> {
        self.regions.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }

    pub fn total_len(&self) -> f64 {
        self.regions.iter().map(Region::len).sum()
    }

    /// Regions sorted by start, without merging.
    pub fn sorted(&self) -> Vec<Region> {
        let mut out = self.regions.clone();
        out.sort_by(|a, b| a.start.total_cmp(&b.start));
        out
    }

    /// Applies `f` to every region and keeps the non-empty results in order.
    pub fn rmap<F, M>(&self, mut f: F) -> RegionList
    where
        F: FnMut(&Region) -> M,
        M: Into<Mapped>,
    {
        let mut out = RegionList::new();
        for region in &self.regions {
            match f(region).into() {
                Mapped::One(r) => out.push(r),
                Mapped::Many(rs) => rs.into_iter().for_each(|r| out.push(r)),
            }
        }
        out
    }

    /// Intersects every region with `bounds`.
    pub fn clamp_to(&self, bounds: &Region) -> RegionList {
        self.rmap(|r| r.intersect(bounds))
    }

    /// Intersects every region with every region of `other`.
    pub fn intersect_all(&self, other: &[Region]) -> RegionList {
        self.rmap(|r| other.iter().map(|o| r.intersect(o)).collect::<Vec<_>>())
    }

    /// Sorted minimal cover of both lists; overlapping or touching runs are merged.
    /// Each input is assumed to need no internal merging before the call.
    pub fn union(&self, other: &RegionList) -> RegionList {
        let mut all: Vec<Region> = self
            .regions
            .iter()
            .chain(other.regions.iter())
            .copied()
            .collect();
        all.sort_by(|a, b| a.start.total_cmp(&b.start));
        let merged = all.into_iter().fold(Vec::<Region>::new(), |mut acc, r| {
            match acc.last_mut() {
                Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
                _ => acc.push(r),
            }
            acc
        });
        RegionList { regions: merged }
    }
}

impl FromIterator<Region> for RegionList {
    fn from_iter<I: IntoIterator<Item = Region>>(iter: I) -> Self {
        let mut list = RegionList::new();
        iter.into_iter().for_each(|r| list.push(r));
        list
    }
}

impl<'a> IntoIterator for &'a RegionList {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
