pub mod table;

use crate::monitor::snapshot::TickSnapshot;

/// Receives one snapshot per tick. Rendering is synchronous and must not
/// fail outward; implementations log their own errors.
pub trait SnapshotSink: Send {
    fn render(&mut self, snapshot: &TickSnapshot);
}

impl<S: SnapshotSink + ?Sized> SnapshotSink for Box<S> {
    fn render(&mut self, snapshot: &TickSnapshot) {
        (**self).render(snapshot)
    }
}
