//! Per-event-kind callback lists
//!
//! Insertion order is invocation order. Duplicates are kept; each
//! registration is invoked once.

use emuscript_core::EventKind;

pub struct CallbackTable<C> {
    lists: [Vec<C>; EventKind::COUNT],
}

impl<C> CallbackTable<C> {
    pub fn new() -> Self {
        Self {
            lists: std::array::from_fn(|_| Vec::new()),
        }
    }

    pub fn add(&mut self, kind: EventKind, callback: C) {
        self.lists[kind.index()].push(callback);
    }

    /// Remove the first registration matching `is_match`.
    ///
    /// Returns whether anything was removed; removing an unknown callback
    /// is not an error.
    pub fn remove_first<F>(&mut self, kind: EventKind, mut is_match: F) -> bool
    where
        F: FnMut(&C) -> bool,
    {
        let list = &mut self.lists[kind.index()];
        match list.iter().position(|callback| is_match(callback)) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self, kind: EventKind) -> usize {
        self.lists[kind.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
    }
}

impl<C: Clone> CallbackTable<C> {
    /// Copy of the list for `kind`, taken before dispatch so callbacks may
    /// add or remove registrations while the event is being delivered.
    pub fn snapshot(&self, kind: EventKind) -> Vec<C> {
        self.lists[kind.index()].clone()
    }
}

impl<C> Default for CallbackTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order_is_preserved() {
        let mut table = CallbackTable::new();
        table.add(EventKind::StartFrame, 3);
        table.add(EventKind::StartFrame, 1);
        table.add(EventKind::StartFrame, 2);
        table.add(EventKind::EndFrame, 9);

        assert_eq!(table.snapshot(EventKind::StartFrame), vec![3, 1, 2]);
        assert_eq!(table.snapshot(EventKind::EndFrame), vec![9]);
        assert!(table.snapshot(EventKind::Nmi).is_empty());
    }

    #[test]
    fn test_duplicates_are_kept_and_removed_one_at_a_time() {
        let mut table = CallbackTable::new();
        table.add(EventKind::Irq, 7);
        table.add(EventKind::Irq, 8);
        table.add(EventKind::Irq, 7);
        assert_eq!(table.len(EventKind::Irq), 3);

        assert!(table.remove_first(EventKind::Irq, |cb| *cb == 7));
        assert_eq!(table.snapshot(EventKind::Irq), vec![8, 7]);
    }

    #[test]
    fn test_removing_unknown_callback_is_noop() {
        let mut table = CallbackTable::new();
        table.add(EventKind::Reset, 1);
        assert!(!table.remove_first(EventKind::Reset, |cb| *cb == 2));
        assert!(!table.remove_first(EventKind::StartFrame, |cb| *cb == 1));
        assert_eq!(table.snapshot(EventKind::Reset), vec![1]);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_removal() {
        let mut table = CallbackTable::new();
        table.add(EventKind::StartFrame, 1);
        table.add(EventKind::StartFrame, 2);

        let dispatched = table.snapshot(EventKind::StartFrame);
        table.remove_first(EventKind::StartFrame, |cb| *cb == 1);

        assert_eq!(dispatched, vec![1, 2]);
        assert_eq!(table.snapshot(EventKind::StartFrame), vec![2]);
    }

    #[test]
    fn test_clear_empties_every_kind() {
        let mut table = CallbackTable::new();
        for kind in EventKind::ALL {
            table.add(kind, kind.index());
        }
        assert!(!table.is_empty());
        table.clear();
        assert!(table.is_empty());
    }
}
