//! Refresh notifications for state changes that happen outside the
//! scroll/resize path (pages arriving, edits, resizes).

use tracing::{debug, trace};

/// Why the model asked its observers to refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshReason {
    RowResized { index: usize },
    ColumnResized { index: usize },
    CellEdited { column: usize, row: usize },
    SchemaConfigured,
    RowsAppended { count: usize },
    Loaded,
    LoadFailed,
}

/// Handle returned by [`RefreshNotifier::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type RefreshCallback = Box<dyn FnMut(&RefreshReason)>;

/// Observer list. Callbacks run synchronously, in subscription order, on
/// the thread that mutates the model.
#[derive(Default)]
pub struct RefreshNotifier {
    subscribers: Vec<(SubscriptionId, RefreshCallback)>,
    next_id: u64,
}

impl RefreshNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&RefreshReason) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        debug!("Refresh subscriber {:?} added ({} total)", id, self.subscribers.len());
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    /// Drop every subscriber and register `callback` as the only one
    pub fn replace_all(&mut self, callback: impl FnMut(&RefreshReason) + 'static) -> SubscriptionId {
        self.subscribers.clear();
        self.subscribe(callback)
    }

    pub fn notify(&mut self, reason: &RefreshReason) {
        trace!("Refresh: {:?} -> {} subscribers", reason, self.subscribers.len());
        for (_, callback) in self.subscribers.iter_mut() {
            callback(reason);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for RefreshNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshNotifier")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
