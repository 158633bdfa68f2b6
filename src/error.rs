// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2024-2026 The typebus Authors. All rights reserved.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Error kinds and the error-handler collaborator.
//!
//! No error is allowed to escape `publish`: every failure is routed to the
//! configured [`ErrorHandler`] and dispatch continues with the next
//! listener or subscription.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// The error kinds a publish can produce.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// A handler invocation returned or panicked with an error.
    #[error("handler '{handler_id}' on listener of type '{listener_type}' failed: {message}")]
    HandlerInvocationFailure {
        handler_id: String,
        listener_type: &'static str,
        message: String,
    },

    /// `publish_dyn` was called with no message.
    #[error("publish called with a null message")]
    NullMessage,

    /// `Describe::describe` failed or panicked for a listener class.
    ///
    /// The class is recorded as a non-listener for the remainder of the
    /// manager's lifetime, and this variant is reported once at the point
    /// of failure.
    #[error("failed to build handler descriptors for listener type '{listener_type}': {message}")]
    ReflectionFailure {
        listener_type: &'static str,
        message: String,
    },

    /// `publish` was called after `shutdown`.
    #[error("publish called after shutdown")]
    ShutdownInProgress,
}

/// Context handed to an [`ErrorHandler`] alongside a [`BusError`].
///
/// Carries the handler id, the listener's declaring type, and the type
/// names of everything that was being published when the failure occurred.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub handler_id: String,
    pub listener_type: &'static str,
    pub published_type_names: Vec<&'static str>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler={} listener={} published={:?}",
            self.handler_id, self.listener_type, self.published_type_names
        )
    }
}

/// The error-handler collaborator.
///
/// Implementations must be non-blocking in practice: the core reports and
/// continues, it does not wait on the handler.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &BusError, context: &ErrorContext);
}

/// Default error handler installed when none is configured.
///
/// Logs via the `log` facade and, on first use, emits a one-time
/// informational notice so callers know a handler was never installed.
#[derive(Debug, Default)]
pub struct ConsoleErrorHandler {
    notice_emitted: AtomicBool,
}

impl ConsoleErrorHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn emit_notice_once(&self) {
        if self
            .notice_emitted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            log::info!(
                "No ErrorHandler configured for SubscriptionManager; falling back to ConsoleErrorHandler"
            );
        }
    }
}

impl ErrorHandler for ConsoleErrorHandler {
    fn handle(&self, error: &BusError, context: &ErrorContext) {
        self.emit_notice_once();
        match error {
            BusError::HandlerInvocationFailure { .. } => {
                log::error!("{error} ({context})");
            }
            BusError::ReflectionFailure { .. } => {
                log::error!("{error}");
            }
            BusError::NullMessage | BusError::ShutdownInProgress => {
                log::warn!("{error}");
            }
        }
    }
}
