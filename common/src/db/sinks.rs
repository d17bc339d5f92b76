use crate::db::indices::NetId;
use std::ops::{Index, IndexMut};

/// Net pin 0 is the driver; per-connection data starts at pin 1.
pub const SOURCE_PIN: usize = 0;

/// Flat per-connection storage addressed by `(net, pin)` with `pin >= 1`.
#[derive(Clone, Debug)]
pub struct NetSinkTable<T> {
    offsets: Vec<usize>,
    data: Vec<T>,
}

impl<T: Clone> NetSinkTable<T> {
    pub fn from_sink_counts(counts: impl IntoIterator<Item = usize>, init: T) -> Self {
        let mut offsets = vec![0];
        let mut total = 0;
        for c in counts {
            total += c;
            offsets.push(total);
        }
        Self {
            offsets,
            data: vec![init; total],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value.clone());
    }
}

impl<T> NetSinkTable<T> {
    pub fn num_nets(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn num_sinks(&self, net: NetId) -> usize {
        self.offsets[net.index() + 1] - self.offsets[net.index()]
    }

    /// Sink values of `net`; slice position `i` holds pin `i + 1`.
    pub fn sinks(&self, net: NetId) -> &[T] {
        &self.data[self.offsets[net.index()]..self.offsets[net.index() + 1]]
    }

    pub fn sinks_mut(&mut self, net: NetId) -> &mut [T] {
        let (lo, hi) = (self.offsets[net.index()], self.offsets[net.index() + 1]);
        &mut self.data[lo..hi]
    }

    #[inline]
    fn slot(&self, net: NetId, pin: usize) -> usize {
        debug_assert!(pin > SOURCE_PIN, "pin 0 is the net source");
        debug_assert!(pin <= self.num_sinks(net));
        self.offsets[net.index()] + pin - 1
    }
}

impl<T> Index<(NetId, usize)> for NetSinkTable<T> {
    type Output = T;

    fn index(&self, (net, pin): (NetId, usize)) -> &T {
        &self.data[self.slot(net, pin)]
    }
}

impl<T> IndexMut<(NetId, usize)> for NetSinkTable<T> {
    fn index_mut(&mut self, (net, pin): (NetId, usize)) -> &mut T {
        let slot = self.slot(net, pin);
        &mut self.data[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_sinks_from_one() {
        let mut table = NetSinkTable::from_sink_counts([2, 0, 3], 0.0);
        table[(NetId::new(0), 2)] = 1.5;
        table[(NetId::new(2), 1)] = 4.0;
        assert_eq!(table.sinks(NetId::new(0)), &[0.0, 1.5]);
        assert!(table.sinks(NetId::new(1)).is_empty());
        assert_eq!(table.sinks(NetId::new(2))[0], 4.0);
        assert_eq!(table.num_nets(), 3);
    }
}
