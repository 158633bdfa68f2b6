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

//! The `Listener` and `Describe` collaborators.

use std::any::Any;

use crate::descriptor::HandlerDescriptor;

/// A registered listener instance.
///
/// `Listener` is intentionally minimal: it only needs to be down-castable
/// (so a [`HandlerDescriptor`]'s invocation closure can recover the
/// concrete type it was built for) and shareable across threads.
pub trait Listener: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync> Listener for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The annotation-scanning collaborator, modelled as a trait a listener
/// type implements once rather than discovered through reflection.
///
/// `describe()` stands in for reflecting over a class's annotated
/// handlers: it must be deterministic and order-stable for a given type
/// definition, and must omit any handler marked `enabled = false` (they
/// should never be indexed, not merely filtered at dispatch time).
pub trait Describe: 'static {
    fn describe() -> Vec<HandlerDescriptor>;
}
