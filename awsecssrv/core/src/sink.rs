use crate::AddressSet;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Receives the full replacement address list whenever a resolver observes a
/// change.
///
/// Each update is a complete snapshot, never a delta. A sink that can no
/// longer deliver updates (e.g. because every receiver was dropped) returns
/// [`SinkClosed`] and the resolver feeding it stops.
pub trait NotificationSink: Send + Sync {
    fn update(&self, addrs: AddressSet) -> Result<(), SinkClosed>;
}

#[derive(Copy, Clone, Debug, Default, Error, PartialEq, Eq)]
#[error("notification sink closed")]
pub struct SinkClosed(());

/// A sink that invokes a function for each update.
#[derive(Clone, Debug)]
pub struct FnSink<F>(F);

pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(AddressSet) + Send + Sync,
{
    FnSink(f)
}

impl<F> NotificationSink for FnSink<F>
where
    F: Fn(AddressSet) + Send + Sync,
{
    fn update(&self, addrs: AddressSet) -> Result<(), SinkClosed> {
        (self.0)(addrs);
        Ok(())
    }
}

impl NotificationSink for watch::Sender<AddressSet> {
    fn update(&self, addrs: AddressSet) -> Result<(), SinkClosed> {
        self.send(addrs).map_err(|_| SinkClosed(()))
    }
}

impl NotificationSink for mpsc::UnboundedSender<AddressSet> {
    fn update(&self, addrs: AddressSet) -> Result<(), SinkClosed> {
        self.send(addrs).map_err(|_| SinkClosed(()))
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<S> {
    fn update(&self, addrs: AddressSet) -> Result<(), SinkClosed> {
        (**self).update(addrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs() -> AddressSet {
        AddressSet::new(vec!["10.0.0.1:80".parse().unwrap()])
    }

    #[test]
    fn watch_sink_closes_with_receivers() {
        let (tx, rx) = watch::channel(AddressSet::default());
        assert!(tx.update(addrs()).is_ok());
        assert_eq!(*rx.borrow(), addrs());
        drop(rx);
        assert_eq!(tx.update(addrs()), Err(SinkClosed(())));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn mpsc_sink_delivers_snapshots() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.update(addrs()).unwrap();
        tx.update(AddressSet::default()).unwrap();
        assert_eq!(rx.recv().await, Some(addrs()));
        assert_eq!(rx.recv().await, Some(AddressSet::default()));
    }

    #[test]
    fn fn_sink_never_closes() {
        let sink = from_fn(|addrs: AddressSet| assert_eq!(addrs.len(), 1));
        assert!(sink.update(addrs()).is_ok());
    }
}
