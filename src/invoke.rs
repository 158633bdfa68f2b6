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

//! The invocation collaborator: `invoke(listener, descriptor, args...)`.
//!
//! Modelled as a boxed closure rather than a trait-object hierarchy with
//! separate reflective and method-handle variants: a Rust closure captured
//! at descriptor construction already erases any such distinction into one
//! representation, chosen once, at the point `HandlerDescriptor` is built.

use crate::error::BusError;
use crate::listener::Listener;
use crate::message::Message;

/// The arguments a single dispatch passes to a handler.
///
/// `Array` is the var-arg fan-out bundle: N scalar messages of a common
/// type, delivered as one call.
///
/// `Copy` because every variant only ever holds shared references: the same
/// `Dispatch` value is handed to every listener in a `Subscription`'s
/// snapshot without needing to be re-borrowed per iteration.
#[derive(Clone, Copy)]
pub enum Dispatch<'a> {
    One(&'a dyn Message),
    Two(&'a dyn Message, &'a dyn Message),
    Three(&'a dyn Message, &'a dyn Message, &'a dyn Message),
    Array(&'a [&'a dyn Message]),
}

/// A type-erased, `Send + Sync` invocation strategy bound to one
/// `HandlerDescriptor` at construction time.
pub type InvokeFn = Box<dyn Fn(&dyn Listener, Dispatch<'_>) -> Result<(), BusError> + Send + Sync>;
