// Observable state container
// Latest-value channel over an immutable Arc snapshot; writes are serialized by the
// channel and observers always read the newest snapshot.

use std::sync::Arc;
use tokio::sync::watch;

pub type Subscription<T> = watch::Receiver<Arc<T>>;

pub struct Observable<T> {
    sender: watch::Sender<Arc<T>>,
}

impl<T> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(Arc::new(initial));
        Observable { sender }
    }

    /// Current snapshot
    pub fn get(&self) -> Arc<T> {
        self.sender.borrow().clone()
    }

    pub fn set(&self, value: T) {
        self.sender.send_replace(Arc::new(value));
    }

    /// Derive the next snapshot from the current one
    ///
    /// Returning `None` leaves the state untouched and wakes nobody.
    pub fn update<F>(&self, f: F) -> Option<Arc<T>>
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let mut published = None;
        self.sender.send_if_modified(|current| match f(&**current) {
            Some(next) => {
                let next = Arc::new(next);
                *current = next.clone();
                published = Some(next);
                true
            }
            None => false,
        });
        published
    }

    /// Receiver that sees every later write; the current value counts as seen
    pub fn subscribe(&self) -> Subscription<T> {
        self.sender.subscribe()
    }
}
