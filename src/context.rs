//! Ambient, per-logical-call key/value context.
//!
//! Values set here are visible to everything running in the same logical
//! thread of control: plain synchronous code on the current thread, or the
//! current future when it is wrapped with [`ContextExt::with_context`].
//! Every boundary that sets a value must also clear it when the boundary
//! call ends; [`scope`] and [`WithContext`] do that automatically.

use std::{
    cell::RefCell,
    collections::HashMap,
    future::Future,
    mem,
    pin::Pin,
    task::{Context, Poll},
};

use pin_project_lite::pin_project;

/// Key/value pairs visible to one logical call.
pub type ContextMap = HashMap<String, String>;

thread_local! {
    static CONTEXT: RefCell<ContextMap> = RefCell::new(ContextMap::new());
}

/// Set `key` to `value` in the current context.
pub fn set(key: impl Into<String>, value: impl Into<String>) {
    CONTEXT.with(|ctx| {
        ctx.borrow_mut().insert(key.into(), value.into());
    });
}

/// Value stored under `key`, or `None` if it was never set or was cleared.
///
/// An empty string is a value, not an absence.
pub fn get(key: &str) -> Option<String> {
    CONTEXT.with(|ctx| ctx.borrow().get(key).cloned())
}

/// Remove `key` from the current context.
pub fn clear(key: &str) {
    CONTEXT.with(|ctx| {
        ctx.borrow_mut().remove(key);
    });
}

/// Copy of everything currently set.
pub fn snapshot() -> ContextMap {
    CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Set `key` for as long as the returned guard lives.
///
/// Dropping the guard restores whatever `key` held before, including
/// absence, so nested scopes unwind correctly.
#[must_use = "the value is cleared as soon as the guard is dropped"]
pub fn scope(key: impl Into<String>, value: impl Into<String>) -> ContextGuard {
    let key = key.into();
    let previous = CONTEXT.with(|ctx| ctx.borrow_mut().insert(key.clone(), value.into()));
    ContextGuard { key, previous }
}

/// Restores a context key when dropped. Created by [`scope`].
#[derive(Debug)]
pub struct ContextGuard {
    key: String,
    previous: Option<String>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // The thread-local may already be gone during thread teardown.
        let _ = CONTEXT.try_with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            match previous {
                Some(value) => ctx.insert(mem::take(&mut self.key), value),
                None => ctx.remove(&self.key),
            };
        });
    }
}

/// Swaps a map into the thread-local slot and back out again on drop, even
/// when the code in between unwinds.
struct Installed<'a> {
    map: &'a mut ContextMap,
}

impl<'a> Installed<'a> {
    fn new(map: &'a mut ContextMap) -> Self {
        CONTEXT.with(|ctx| mem::swap(&mut *ctx.borrow_mut(), map));
        Installed { map }
    }
}

impl Drop for Installed<'_> {
    fn drop(&mut self) {
        let _ = CONTEXT.try_with(|ctx| mem::swap(&mut *ctx.borrow_mut(), self.map));
    }
}

/// Run `f` with `map` as the whole current context.
///
/// Whatever context was active before is hidden from `f` and restored
/// afterwards. Changes `f` makes are written back into `map`.
pub fn with_context<R>(map: &mut ContextMap, f: impl FnOnce() -> R) -> R {
    let _installed = Installed::new(map);
    f()
}

pin_project! {
    /// Future that owns its own context map and installs it around every
    /// poll of the inner future.
    ///
    /// Interleaved futures on one worker thread each see only their own
    /// values. The map is dropped together with the future.
    pub struct WithContext<F> {
        #[pin]
        fut: F,
        map: ContextMap,
    }
}

impl<F> WithContext<F> {
    pub fn new(fut: F, map: ContextMap) -> Self {
        WithContext { fut, map }
    }
}

impl<F: Future> Future for WithContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _installed = Installed::new(this.map);
        this.fut.poll(cx)
    }
}

/// Attach an ambient context to any future.
pub trait ContextExt: Future + Sized {
    fn with_context(self, map: ContextMap) -> WithContext<Self> {
        WithContext::new(self, map)
    }
}

impl<F: Future> ContextExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Barrier, sync::Arc, thread};

    #[test]
    fn test_set_get_clear() {
        assert_eq!(get("ctx-test-key"), None);

        set("ctx-test-key", "");
        assert_eq!(get("ctx-test-key"), Some(String::new()));

        set("ctx-test-key", "value");
        assert_eq!(get("ctx-test-key"), Some("value".to_string()));

        clear("ctx-test-key");
        assert_eq!(get("ctx-test-key"), None);
    }

    #[test]
    fn test_scope_restores_previous_value() {
        {
            let _outer = scope("scope-key", "outer");
            {
                let _inner = scope("scope-key", "inner");
                assert_eq!(get("scope-key"), Some("inner".to_string()));
            }
            assert_eq!(get("scope-key"), Some("outer".to_string()));
        }
        assert_eq!(get("scope-key"), None);
    }

    #[test]
    fn test_scope_clears_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _guard = scope("panic-key", "value");
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(get("panic-key"), None);
    }

    #[test]
    fn test_with_context_hides_and_writes_back() {
        set("outer-key", "outer");

        let mut map = ContextMap::new();
        map.insert("inner-key".to_string(), "inner".to_string());

        with_context(&mut map, || {
            assert_eq!(get("outer-key"), None);
            assert_eq!(get("inner-key"), Some("inner".to_string()));
            set("added", "yes");
        });

        assert_eq!(get("outer-key"), Some("outer".to_string()));
        assert_eq!(get("inner-key"), None);
        assert_eq!(map.get("added"), Some(&"yes".to_string()));
        clear("outer-key");
    }

    #[test]
    fn test_threads_are_isolated() {
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["thread-a", "thread-b"]
            .into_iter()
            .map(|id| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let _guard = scope("correlationId", id);
                    barrier.wait();
                    get("correlationId")
                })
            })
            .collect();

        let seen: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(
            seen,
            vec![Some("thread-a".to_string()), Some("thread-b".to_string())]
        );
    }

    #[tokio::test]
    async fn test_interleaved_futures_are_isolated() {
        async fn observe(id: &'static str) -> (Option<String>, Option<String>) {
            set("task-key", id);
            let before = get("task-key");
            tokio::task::yield_now().await;
            let after = get("task-key");
            (before, after)
        }

        let (a, b) = tokio::join!(
            observe("a").with_context(ContextMap::new()),
            observe("b").with_context(ContextMap::new()),
        );

        assert_eq!(a, (Some("a".to_string()), Some("a".to_string())));
        assert_eq!(b, (Some("b".to_string()), Some("b".to_string())));
        assert_eq!(get("task-key"), None);
    }
}
