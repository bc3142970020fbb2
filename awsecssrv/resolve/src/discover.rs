use awsecssrv_core::{AddressSet, Endpoint};
use futures::{ready, Stream};
use indexmap::IndexSet;
use pin_project::pin_project;
use std::{
    collections::VecDeque,
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tower::discover::Change;

/// Turns a stream of address snapshots into `tower` discovery changes.
///
/// Resolvers publish whole replacement sets; balancers consume per-endpoint
/// insertions and removals. Removals for a snapshot are yielded before its
/// insertions.
#[pin_project]
#[derive(Debug)]
pub struct Discover<S> {
    #[pin]
    snapshots: S,
    active: IndexSet<Endpoint>,
    pending: VecDeque<Change<Endpoint, ()>>,
}

// === impl Discover ===

impl<S> Discover<S>
where
    S: Stream<Item = AddressSet>,
{
    pub fn new(snapshots: S) -> Self {
        Self {
            snapshots,
            active: IndexSet::default(),
            pending: VecDeque::new(),
        }
    }
}

impl Discover<WatchStream<AddressSet>> {
    /// Discovers from the receiving half of a `watch`-channel sink.
    pub fn from_watch(rx: watch::Receiver<AddressSet>) -> Self {
        Self::new(WatchStream::new(rx))
    }
}

impl<S> Stream for Discover<S>
where
    S: Stream<Item = AddressSet>,
{
    type Item = Result<Change<Endpoint, ()>, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let this = self.as_mut().project();
            if let Some(change) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(change)));
            }

            let Some(addrs) = ready!(this.snapshots.poll_next(cx)) else {
                return Poll::Ready(None);
            };
            let next = addrs.into_iter().collect::<IndexSet<_>>();
            this.pending.extend(
                this.active
                    .difference(&next)
                    .cloned()
                    .map(Change::Remove),
            );
            this.pending.extend(
                next.difference(&*this.active)
                    .cloned()
                    .map(|ep| Change::Insert(ep, ())),
            );
            *this.active = next;
        }
    }
}
