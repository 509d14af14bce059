//! Desktop lifecycle observer

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState},
};

/// Desktop apps are treated as permanently in the foreground.
///
/// The initial subscription yields a single `Foreground` transition so that
/// activation-driven work (such as the token validity check) runs once at
/// startup, then the stream stays open without emitting.
#[derive(Debug, Default, Clone)]
pub struct DesktopLifecycleObserver;

impl DesktopLifecycleObserver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LifecycleObserver for DesktopLifecycleObserver {
    async fn get_state(&self) -> Result<LifecycleState> {
        Ok(LifecycleState::Foreground)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>> {
        Ok(Box::new(DesktopLifecycleChangeStream { announced: false }))
    }
}

struct DesktopLifecycleChangeStream {
    announced: bool,
}

#[async_trait]
impl LifecycleChangeStream for DesktopLifecycleChangeStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        if !self.announced {
            self.announced = true;
            return Some(LifecycleState::Foreground);
        }
        std::future::pending::<()>().await;
        None
    }
}
