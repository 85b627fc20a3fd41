//! Collapses an ordered row stream into `(lead, related...)` groups.
//!
//! The aggregator never sorts: a new group starts whenever the lead key differs from the
//! previous row, so rows must already arrive grouped by lead.

use crate::entity::{EntityId, EntityRecord};
use std::sync::Arc;

pub trait Lead {
    type Key: PartialEq;
    fn lead_key(&self) -> Self::Key;
}

impl Lead for EntityId {
    type Key = EntityId;
    fn lead_key(&self) -> EntityId {
        *self
    }
}

impl Lead for Arc<EntityRecord> {
    type Key = EntityId;
    fn lead_key(&self) -> EntityId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group<L, R> {
    pub lead: L,
    pub related: Vec<R>,
}

pub struct Grouped<I, L, R> {
    rows: I,
    pending: Option<Group<L, R>>,
    done: bool,
}

impl<I, L, R> Grouped<I, L, R> {
    pub fn new(rows: I) -> Self {
        Grouped { rows, pending: None, done: false }
    }
}

impl<I, L, R, E> Iterator for Grouped<I, L, R>
where
    I: Iterator<Item = Result<(L, R), E>>,
    L: Lead,
{
    type Item = Result<Group<L, R>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.rows.next() {
                Some(Ok((lead, related))) => {
                    let same = matches!(&self.pending, Some(group) if group.lead.lead_key() == lead.lead_key());
                    if same {
                        if let Some(group) = self.pending.as_mut() {
                            group.related.push(related);
                        }
                    } else if let Some(flushed) = self.pending.replace(Group { lead, related: vec![related] }) {
                        return Some(Ok(flushed));
                    }
                }
                Some(Err(err)) => {
                    self.done = true;
                    self.pending = None;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    return self.pending.take().map(Ok);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(pairs: &[(u64, &'static str)]) -> Vec<Result<(EntityId, &'static str), String>> {
        pairs.iter().map(|(lead, related)| Ok((EntityId(*lead), *related))).collect()
    }

    fn collect(input: Vec<Result<(EntityId, &'static str), String>>) -> Vec<(u64, Vec<&'static str>)> {
        Grouped::<_, EntityId, &str>::new(input.into_iter()).map(|g| g.unwrap()).map(|g| (g.lead.0, g.related)).collect()
    }

    #[test]
    fn groups_consecutive_leads_in_delivery_order() {
        let groups = collect(rows(&[(1, "a"), (1, "b"), (2, "c"), (3, "d"), (3, "e")]));
        assert_eq!(groups, vec![(1, vec!["a", "b"]), (2, vec!["c"]), (3, vec!["d", "e"])]);
    }

    #[test]
    fn tail_group_is_flushed() {
        let groups = collect(rows(&[(7, "x"), (7, "y")]));
        assert_eq!(groups, vec![(7, vec!["x", "y"])]);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(collect(Vec::new()).is_empty());
    }

    #[test]
    fn unordered_input_splits_groups() {
        let groups = collect(rows(&[(1, "a"), (2, "b"), (1, "c")]));
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn error_stops_the_stream_and_drops_pending() {
        let mut input = rows(&[(1, "a"), (2, "b")]);
        input.push(Err("lost connection".to_string()));
        input.extend(rows(&[(3, "c")]));
        let out: Vec<_> = Grouped::<_, EntityId, &str>::new(input.into_iter()).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().lead, EntityId(1));
        assert_eq!(out[1].as_ref().unwrap_err(), "lost connection");
    }
}
