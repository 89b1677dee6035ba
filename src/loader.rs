//! At-most-one cooperative model load
//!
//! The host starts a load by handing over a future and then polls the slot
//! once per frame. Starting a new load drops the previous future, which
//! cancels it.

use crate::error::{Result, RetargetError};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

pub type LoadFuture<T> = Pin<Box<dyn Future<Output = Result<T>>>>;

/// Outcome of polling a [`LoadSlot`]
#[derive(Debug)]
pub enum LoadStatus<T> {
    /// Nothing is loading
    Idle,
    /// The load is still in flight
    Pending,
    Ready(T),
    Failed(RetargetError),
}

pub struct LoadSlot<T> {
    task: Option<(String, LoadFuture<T>)>,
}

impl<T> Default for LoadSlot<T> {
    fn default() -> Self {
        Self { task: None }
    }
}

impl<T> std::fmt::Debug for LoadSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadSlot")
            .field("loading", &self.label())
            .finish()
    }
}

impl<T> LoadSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load, cancelling the one in flight
    pub fn start(
        &mut self,
        label: impl Into<String>,
        future: impl Future<Output = Result<T>> + 'static,
    ) {
        let label = label.into();
        if let Some((previous, _)) = self.task.take() {
            log::info!("Cancelled loading {} in favor of {}", previous, label);
        }
        self.task = Some((label, Box::pin(future)));
    }

    /// Drop the in-flight load, if any
    pub fn cancel(&mut self) -> bool {
        self.task.take().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.task.is_some()
    }

    /// Label of the in-flight load
    pub fn label(&self) -> Option<&str> {
        self.task.as_ref().map(|(label, _)| label.as_str())
    }

    /// Poll the in-flight load once. A finished load leaves the slot empty.
    pub fn poll(&mut self) -> LoadStatus<T> {
        let Some((_, future)) = self.task.as_mut() else {
            return LoadStatus::Idle;
        };

        let mut cx = Context::from_waker(Waker::noop());
        match future.as_mut().poll(&mut cx) {
            Poll::Pending => LoadStatus::Pending,
            Poll::Ready(result) => {
                self.task = None;
                match result {
                    Ok(value) => LoadStatus::Ready(value),
                    Err(e) => LoadStatus::Failed(e),
                }
            }
        }
    }
}
