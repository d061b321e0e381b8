use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use shared::CacheError;

use crate::{controller::CacheController, platform::Platform};

pub type HandlerFuture<T> = LocalBoxFuture<'static, Result<T, CacheError>>;
pub type LifecycleHandler = Box<dyn Fn() -> HandlerFuture<()>>;
pub type FetchHandler<Req, Resp> = Box<dyn Fn(Req) -> HandlerFuture<Resp>>;
pub type MessageHandler = Box<dyn Fn(Option<String>) -> HandlerFuture<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Install,
    Activate,
    Fetch,
    Message,
}

impl LifecycleEvent {
    /// The event type the worker scope dispatches
    pub const fn name(&self) -> &'static str {
        use LifecycleEvent::*;
        match self {
            Install => "install",
            Activate => "activate",
            Fetch => "fetch",
            Message => "message",
        }
    }
}

/// Somewhere lifecycle handlers can be bound. The host is responsible for
/// keeping the event alive until the handler's future settles
pub trait EventRegistry<Req, Resp> {
    fn on_install(&mut self, handler: LifecycleHandler) -> Result<(), CacheError>;
    fn on_activate(&mut self, handler: LifecycleHandler) -> Result<(), CacheError>;
    fn on_fetch(&mut self, handler: FetchHandler<Req, Resp>) -> Result<(), CacheError>;
    fn on_message(&mut self, handler: MessageHandler) -> Result<(), CacheError>;
}

impl<P: Platform + 'static> CacheController<P> {
    /// Binds every handler. Each one holds a clone of the controller
    pub fn register<R>(self: Rc<Self>, registry: &mut R) -> Result<(), CacheError>
    where
        R: EventRegistry<P::Request, P::Response>,
    {
        let controller = self.clone();
        registry.on_install(Box::new(move || {
            let controller = controller.clone();
            async move { controller.install().await }.boxed_local()
        }))?;

        let controller = self.clone();
        registry.on_activate(Box::new(move || {
            let controller = controller.clone();
            async move { controller.activate().await.map(|_| ()) }.boxed_local()
        }))?;

        let controller = self.clone();
        registry.on_fetch(Box::new(move |request: P::Request| {
            let controller = controller.clone();
            async move { controller.fetch(request).await }.boxed_local()
        }))?;

        let controller = self;
        registry.on_message(Box::new(move |data: Option<String>| {
            let controller = controller.clone();
            async move { controller.message(data).await }.boxed_local()
        }))?;

        Ok(())
    }
}
