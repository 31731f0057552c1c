//! Batch accumulation for device-scale operations.
//!
//! Many operations against the managed system are per-device (attach this
//! device to that template). Issuing one request per device does not scale,
//! and the backend caps request sizes. The accumulator sits between: work
//! units stream in as `(primary key, secondary key, unit)` triples and come
//! out as bounded sections, one outbound request per distinct primary key
//! within each section.

use serde_json::Value;

/// One outbound request: all units of one primary key within a section.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    /// Grouping key (e.g. the device template id).
    pub primary_key: String,
    /// `(secondary key, unit)` pairs destined for this key.
    pub entries: Vec<(String, Value)>,
}

impl BatchRequest {
    /// Number of work units in the request.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the request carries no units.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A sealed section: at most `chunk_size` units across its requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSection {
    /// One request per distinct primary key in the section.
    pub requests: Vec<BatchRequest>,
}

impl BatchSection {
    /// Total work units across the section's requests.
    pub fn unit_count(&self) -> usize {
        self.requests.iter().map(BatchRequest::len).sum()
    }
}

/// Explicit stateful accumulator: feed triples with [`add`], collect
/// sections with [`flush`].
///
/// A section seals as soon as it holds `chunk_size` units; whatever remains
/// at flush time seals into one final section. Insertion order is preserved
/// within each request and across requests of a section.
///
/// [`add`]: BatchAccumulator::add
/// [`flush`]: BatchAccumulator::flush
#[derive(Debug)]
pub struct BatchAccumulator {
    chunk_size: usize,
    current: Vec<BatchRequest>,
    current_units: usize,
    sealed: Vec<BatchSection>,
}

impl BatchAccumulator {
    /// Creates an accumulator sealing sections at `chunk_size` units.
    ///
    /// A zero chunk size is treated as one: every unit seals a section.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            current: Vec::new(),
            current_units: 0,
            sealed: Vec::new(),
        }
    }

    /// Adds one work unit.
    pub fn add(
        &mut self,
        primary_key: impl Into<String>,
        secondary_key: impl Into<String>,
        unit: Value,
    ) {
        let primary_key = primary_key.into();

        match self
            .current
            .iter_mut()
            .find(|request| request.primary_key == primary_key)
        {
            Some(request) => request.entries.push((secondary_key.into(), unit)),
            None => self.current.push(BatchRequest {
                primary_key,
                entries: vec![(secondary_key.into(), unit)],
            }),
        }

        self.current_units += 1;
        if self.current_units >= self.chunk_size {
            self.seal();
        }
    }

    /// Seals whatever is pending and returns all sections accumulated so
    /// far, leaving the accumulator empty.
    pub fn flush(&mut self) -> Vec<BatchSection> {
        if self.current_units > 0 {
            self.seal();
        }
        std::mem::take(&mut self.sealed)
    }

    fn seal(&mut self) {
        self.sealed.push(BatchSection {
            requests: std::mem::take(&mut self.current),
        });
        self.current_units = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn single_key_chunking() {
        let mut acc = BatchAccumulator::new(200);
        for n in 0..450 {
            acc.add("template-1", format!("device-{n}"), json!({"n": n}));
        }

        let sections = acc.flush();
        assert_eq!(sections.len(), 3);

        let sizes: Vec<usize> = sections.iter().map(BatchSection::unit_count).collect();
        assert_eq!(sizes, vec![200, 200, 50]);
        // One request per section for a single grouping key.
        assert!(sections.iter().all(|s| s.requests.len() == 1));
    }

    #[test]
    fn multiple_keys_share_a_section() {
        let mut acc = BatchAccumulator::new(10);
        acc.add("t1", "d1", json!(1));
        acc.add("t2", "d2", json!(2));
        acc.add("t1", "d3", json!(3));

        let sections = acc.flush();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].requests.len(), 2);

        let t1 = &sections[0].requests[0];
        assert_eq!(t1.primary_key, "t1");
        assert_eq!(t1.len(), 2);
    }

    #[test]
    fn seal_splits_a_key_across_sections() {
        let mut acc = BatchAccumulator::new(2);
        acc.add("t1", "d1", json!(1));
        acc.add("t1", "d2", json!(2));
        acc.add("t1", "d3", json!(3));

        let sections = acc.flush();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].unit_count(), 2);
        assert_eq!(sections[1].unit_count(), 1);
    }

    #[test]
    fn empty_flush_produces_nothing() {
        let mut acc = BatchAccumulator::new(5);
        assert!(acc.flush().is_empty());
    }

    #[test]
    fn flush_resets_the_accumulator() {
        let mut acc = BatchAccumulator::new(5);
        acc.add("t1", "d1", json!(1));
        assert_eq!(acc.flush().len(), 1);
        assert!(acc.flush().is_empty());
    }

    proptest! {
        // Every unit comes out exactly once and no section exceeds the
        // chunk size.
        #[test]
        fn units_are_conserved(
            units in prop::collection::vec((0u8..4, 0u16..500), 0..600),
            chunk in 1usize..250,
        ) {
            let mut acc = BatchAccumulator::new(chunk);
            for (key, n) in &units {
                acc.add(format!("t{key}"), format!("d{n}"), json!(n));
            }

            let sections = acc.flush();
            let total: usize = sections.iter().map(BatchSection::unit_count).sum();
            prop_assert_eq!(total, units.len());

            for section in &sections {
                prop_assert!(section.unit_count() <= chunk);
            }
        }
    }
}
