//! Mock implementations for testing.
//!
//! Provides a scripted HTTP transport, a fixed-token auth provider and an
//! in-memory directory gateway so the client and navigator can be exercised
//! without a network.

mod auth;
mod gateway;
mod transport;

pub use auth::MockAuthProvider;
pub use gateway::{GatewayCall, MockGateway};
pub use transport::{MockResponse, MockTransport};

use std::sync::{Mutex, MutexGuard};

/// Locks a mock's state, ignoring poisoning from a panicked test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
