#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::{
    atomic::{fence, AtomicUsize, Ordering},
    Arc, Condvar, Mutex, MutexGuard,
};

#[cfg(feature = "loom")]
pub(crate) use loom::sync::{
    atomic::{fence, AtomicUsize, Ordering},
    Arc, Condvar, Mutex, MutexGuard,
};
