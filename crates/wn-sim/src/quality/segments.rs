//! Water parcels travelling through links.

use std::collections::VecDeque;

/// A parcel of water with uniform concentration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// ft^3
    pub volume: f64,
    pub conc: f64,
}

impl Segment {
    pub fn mass(&self) -> f64 {
        self.volume * self.conc
    }
}

/// Segments of one link, front = downstream end.
///
/// The segment volumes always add up to the link's capacity. Flow volume in
/// excess of the contents passes straight through within the step.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SegmentList {
    segs: VecDeque<Segment>,
    /// ft^3
    capacity: f64,
    /// Concentration of the newest water released into the link.
    inlet_conc: f64,
}

impl SegmentList {
    /// An empty list for a link holding `capacity`.
    pub fn with_capacity(capacity: f64) -> Self {
        Self {
            capacity: capacity.max(0.0),
            ..Self::default()
        }
    }

    /// Replace the contents with one segment of `conc` filling the link.
    pub fn fill(&mut self, conc: f64) {
        self.segs.clear();
        self.inlet_conc = conc;
        if self.capacity > 0.0 {
            self.segs.push_back(Segment {
                volume: self.capacity,
                conc,
            });
        }
    }

    pub fn segments(&self) -> &VecDeque<Segment> {
        &self.segs
    }

    pub fn volume(&self) -> f64 {
        self.segs.iter().map(|s| s.volume).sum()
    }

    pub fn mass(&self) -> f64 {
        self.segs.iter().map(Segment::mass).sum()
    }

    pub fn front(&self) -> Option<&Segment> {
        self.segs.front()
    }

    pub fn back(&self) -> Option<&Segment> {
        self.segs.back()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.segs.iter_mut()
    }

    /// Volume-weighted mean concentration, `None` when empty.
    pub fn mean_conc(&self) -> Option<f64> {
        let v = self.volume();
        (v > 0.0).then(|| self.mass() / v)
    }

    /// Add a parcel at the upstream end, up to the room left in the link.
    ///
    /// It is merged into the last segment when their concentrations differ
    /// by less than `tol`. Returns the volume that did not fit.
    pub fn release(&mut self, volume: f64, conc: f64, tol: f64) -> f64 {
        if volume <= 0.0 {
            return 0.0;
        }
        self.inlet_conc = conc;
        let stored = volume.min((self.capacity - self.volume()).max(0.0));
        if stored > 0.0 {
            self.push(stored, conc, tol);
        }
        volume - stored
    }

    fn push(&mut self, volume: f64, conc: f64, tol: f64) {
        if let Some(last) = self.segs.back_mut()
            && (last.conc - conc).abs() < tol
        {
            let total = last.volume + volume;
            last.conc = (last.mass() + volume * conc) / total;
            last.volume = total;
            return;
        }
        self.segs.push_back(Segment { volume, conc });
    }

    /// Remove `volume` from the downstream end; segments used up are dropped.
    ///
    /// Volume beyond the contents passes through at the concentration of the
    /// newest water. Returns the total mass drained and the part of it that
    /// passed through.
    pub fn drain(&mut self, volume: f64) -> (f64, f64) {
        let mut remaining = volume;
        let mut mass = 0.0;
        let mut newest = self.back().map_or(self.inlet_conc, |s| s.conc);
        while remaining > 0.0 {
            let Some(front) = self.segs.front_mut() else {
                break;
            };
            newest = front.conc;
            if front.volume <= remaining {
                remaining -= front.volume;
                mass += front.mass();
                self.segs.pop_front();
            } else {
                front.volume -= remaining;
                mass += remaining * front.conc;
                remaining = 0.0;
            }
        }
        let passed = remaining.max(0.0) * newest;
        (mass + passed, passed)
    }

    /// Flip the list after the link's flow changed direction.
    pub fn reverse(&mut self) {
        self.segs.make_contiguous().reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_releases_merge_into_one_segment() {
        let mut list = SegmentList::with_capacity(20.0);
        for _ in 0..10 {
            list.release(2.0, 1.5, 0.01);
        }
        assert_eq!(list.segments().len(), 1);
        assert_eq!(list.volume(), 20.0);
        assert_eq!(list.front().map(|s| s.conc), Some(1.5));
    }

    #[test]
    fn merge_keeps_mass() {
        let mut list = SegmentList::with_capacity(10.0);
        list.release(1.0, 1.0, 0.1);
        list.release(3.0, 1.05, 0.1);
        assert_eq!(list.segments().len(), 1);
        assert!((list.mass() - 4.15).abs() < 1e-12);
    }

    #[test]
    fn distinct_releases_stack_upstream() {
        let mut list = SegmentList::with_capacity(10.0);
        list.release(1.0, 1.0, 0.01);
        list.release(1.0, 2.0, 0.01);
        assert_eq!(list.front().map(|s| s.conc), Some(1.0));
        assert_eq!(list.back().map(|s| s.conc), Some(2.0));
    }

    #[test]
    fn drain_consumes_leading_segments() {
        let mut list = SegmentList::with_capacity(10.0);
        list.release(1.0, 1.0, 0.01);
        list.release(2.0, 2.0, 0.01);
        let (m, passed) = list.drain(1.5);
        assert_eq!(m, 2.0);
        assert_eq!(passed, 0.0);
        assert_eq!(list.segments().len(), 1);
        assert_eq!(list.volume(), 1.5);
        assert!(list.segments().iter().all(|s| s.volume > 0.0));
    }

    #[test]
    fn flow_beyond_contents_passes_through() {
        let mut list = SegmentList::with_capacity(2.0);
        list.fill(1.0);
        assert_eq!(list.drain(1.0), (1.0, 0.0));
        assert_eq!(list.release(1.0, 3.0, 0.01), 0.0);
        let (m, passed) = list.drain(5.0);
        assert!(list.segments().is_empty());
        // 1 ft^3 at 1, 1 ft^3 at 3, then 3 ft^3 more of the newest water.
        assert_eq!(passed, 9.0);
        assert_eq!(m, 13.0);

        let spill = list.release(5.0, 2.0, 0.01);
        assert_eq!(spill, 3.0);
        assert_eq!(list.volume(), 2.0);
    }

    #[test]
    fn empty_link_passes_its_inlet_water() {
        let mut list = SegmentList::with_capacity(0.0);
        list.fill(1.0);
        assert_eq!(list.release(4.0, 2.5, 0.01), 4.0);
        assert_eq!(list.drain(4.0), (10.0, 10.0));
        assert!(list.segments().is_empty());
    }

    #[test]
    fn reverse_swaps_ends() {
        let mut list = SegmentList::with_capacity(10.0);
        list.release(1.0, 1.0, 0.01);
        list.release(1.0, 2.0, 0.01);
        list.reverse();
        assert_eq!(list.front().map(|s| s.conc), Some(2.0));
    }
}
