//! Pluggable accounting for the dispatcher's own heap traffic
//!
//! Each registry captures the calling thread's binding when it is created.

use std::{cell::RefCell, sync::Arc};

use crate::errors::RpcError;

pub trait MemoryHooks: Send + Sync {
    fn allocate(&self, size: usize) -> bool;

    fn release(&self, size: usize);

    fn duplicate(&self, value: &str) -> Option<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHooks;

impl MemoryHooks for SystemHooks {
    fn allocate(&self, _size: usize) -> bool {
        true
    }

    fn release(&self, _size: usize) {}

    fn duplicate(&self, value: &str) -> Option<String> {
        Some(value.to_owned())
    }
}

pub type AllocateFn = fn(usize) -> bool;
pub type ReleaseFn = fn(usize);
pub type DuplicateFn = fn(&str) -> Option<String>;

#[derive(Debug, Clone, Copy)]
struct FnHooks {
    allocate: AllocateFn,
    release: ReleaseFn,
    duplicate: DuplicateFn,
}

impl MemoryHooks for FnHooks {
    fn allocate(&self, size: usize) -> bool {
        (self.allocate)(size)
    }

    fn release(&self, size: usize) {
        (self.release)(size)
    }

    fn duplicate(&self, value: &str) -> Option<String> {
        (self.duplicate)(value)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn MemoryHooks>>> = const { RefCell::new(None) };
}

pub fn current() -> Arc<dyn MemoryHooks> {
    CURRENT.with(|slot| {
        slot.borrow_mut()
            .get_or_insert_with(|| Arc::new(SystemHooks) as Arc<dyn MemoryHooks>)
            .clone()
    })
}

pub fn install(hooks: Arc<dyn MemoryHooks>) {
    CURRENT.with(|slot| *slot.borrow_mut() = Some(hooks));
}

pub fn reset() {
    install(Arc::new(SystemHooks));
}

/// Replace all three functions at once. Passing none of them restores the
/// defaults; passing only some is rejected and leaves the binding untouched.
pub fn set_memory_hooks(
    allocate: Option<AllocateFn>,
    release: Option<ReleaseFn>,
    duplicate: Option<DuplicateFn>,
) -> Result<(), RpcError> {
    match (allocate, release, duplicate) {
        (None, None, None) => {
            reset();
            Ok(())
        }
        (Some(allocate), Some(release), Some(duplicate)) => {
            install(Arc::new(FnHooks {
                allocate,
                release,
                duplicate,
            }));
            Ok(())
        }
        _ => Err(RpcError::InvalidArgument(
            "memory hooks must be set all together or not at all",
        )),
    }
}

pub(crate) fn duplicate(hooks: &dyn MemoryHooks, value: &str) -> Result<String, RpcError> {
    hooks.duplicate(value).ok_or_else(|| {
        crate::logging::report_error("string duplication failed");
        RpcError::AllocationFailed
    })
}

pub(crate) fn release_string(hooks: &dyn MemoryHooks, value: String) {
    hooks.release(value.len());
    drop(value);
}
