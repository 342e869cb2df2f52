//! Deferred result handles.
//!
//! A [`Deferred`] is handed out when an operation is queued in a batch. It is
//! resolved exactly once, when the batch commits or aborts, and every read
//! after that returns the same cached value.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{ErrorCode, SdkError, SdkResult};

/// Observable state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// The owning batch has not executed yet.
    Pending,
    Fulfilled,
    Failed,
}

type Slot<T> = Arc<OnceLock<SdkResult<T>>>;

/// A lazily resolved result of a batched operation.
pub struct Deferred<T> {
    slot: Slot<T>,
}

impl<T> Deferred<T> {
    /// Creates an unresolved handle together with its resolver.
    pub(crate) fn pending() -> (Self, Resolver<T>) {
        let slot: Slot<T> = Arc::new(OnceLock::new());
        (
            Self { slot: slot.clone() },
            Resolver { slot: Some(slot) },
        )
    }

    /// Creates a handle that is already resolved.
    pub fn fulfilled(value: T) -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(Ok(value));
        Self {
            slot: Arc::new(slot),
        }
    }

    pub fn state(&self) -> HandleState {
        match self.slot.get() {
            None => HandleState::Pending,
            Some(Ok(_)) => HandleState::Fulfilled,
            Some(Err(_)) => HandleState::Failed,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == HandleState::Pending
    }

    pub fn is_fulfilled(&self) -> bool {
        self.state() == HandleState::Fulfilled
    }

    pub fn is_failed(&self) -> bool {
        self.state() == HandleState::Failed
    }

    /// Returns the resolved value.
    ///
    /// Fails with [`ErrorCode::HandlePending`] before the owning batch has
    /// executed, and with the operation's error if it failed.
    pub fn get(&self) -> SdkResult<&T> {
        match self.slot.get() {
            None => Err(SdkError::new(
                ErrorCode::HandlePending,
                "Result is not available before the batch is committed",
            )),
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(error.clone()),
        }
    }

    /// Returns a clone of the resolved value.
    pub fn cloned(&self) -> SdkResult<T>
    where
        T: Clone,
    {
        self.get().cloned()
    }
}

impl<T> Deferred<Vec<T>> {
    /// Iterates over a resolved list. Each call starts a fresh iteration.
    pub fn iter(&self) -> SdkResult<std::slice::Iter<'_, T>> {
        Ok(self.get()?.iter())
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.state())
            .field("value", &self.slot.get())
            .finish()
    }
}

/// Write side of a [`Deferred`].
///
/// Dropping an unused resolver fails the handle, so a handle never stays
/// pending once its batch is gone.
pub(crate) struct Resolver<T> {
    slot: Option<Slot<T>>,
}

impl<T> Resolver<T> {
    pub(crate) fn settle(mut self, result: SdkResult<T>) {
        if let Some(slot) = self.slot.take() {
            let _ = slot.set(result);
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            let _ = slot.set(Err(aborted()));
        }
    }
}

pub(crate) fn aborted() -> SdkError {
    SdkError::new(
        ErrorCode::BatchAborted,
        "Batch was aborted before execution",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_handle_cannot_be_read() {
        let (deferred, _resolver) = Deferred::<u64>::pending();
        assert_eq!(deferred.state(), HandleState::Pending);
        assert_eq!(deferred.get().unwrap_err().code, ErrorCode::HandlePending);
    }

    #[test]
    fn test_settled_value_is_cached() {
        let (deferred, resolver) = Deferred::pending();
        resolver.settle(Ok(vec![1, 2, 3]));

        assert!(deferred.is_fulfilled());
        assert_eq!(deferred.iter().unwrap().sum::<i32>(), 6);
        assert_eq!(deferred.iter().unwrap().count(), 3);
        assert_eq!(deferred.clone().get().unwrap(), &vec![1, 2, 3]);
    }

    #[test]
    fn test_failed_handle_returns_its_error() {
        let (deferred, resolver) = Deferred::<u64>::pending();
        resolver.settle(Err(SdkError::not_found("Record")));

        assert!(deferred.is_failed());
        assert_eq!(deferred.get().unwrap_err().code, ErrorCode::NotFound);
    }

    #[test]
    fn test_dropped_resolver_fails_handle() {
        let (deferred, resolver) = Deferred::<u64>::pending();
        drop(resolver);
        assert_eq!(deferred.get().unwrap_err().code, ErrorCode::BatchAborted);
    }

    #[test]
    fn test_fulfilled_constructor() {
        let deferred = Deferred::fulfilled("done");
        assert_eq!(deferred.cloned().unwrap(), "done");
    }
}
