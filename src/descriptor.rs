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

//! `HandlerDescriptor`: an immutable record of one annotated handler.
//!
//! # Why handlers receive `&dyn Message`, not `&T`
//!
//! A handler declared over `T` with `accepts_subtypes = true` must also be
//! invokable with an instance of some subtype `U` of `T`. Rust has no
//! nominal subtyping between otherwise-unrelated concrete types, so a `U`
//! instance can never be downcast to `T`: there is no safe cast that turns
//! a `U` into a `T`. The same `HandlerDescriptor` is
//! used for both the exact-match call (runtime type equals `T`) and the
//! supertype-match call (runtime type is some subtype `U`), so its
//! invocation closure is written once against the one signature that is
//! valid in both cases: the type-erased `&dyn Message`. `T` is still
//! captured generically at construction time, and that is the one place a
//! concrete type is known statically, so it is what seeds the type's
//! identity and `Message::supertypes()` declaration into the index.

use std::any::TypeId;

use smallvec::SmallVec;

use crate::error::BusError;
use crate::invoke::{Dispatch, InvokeFn};
use crate::listener::Listener;
use crate::message::{Message, MessageTypeId};

/// A message type as declared by one `HandlerDescriptor` slot, carrying the
/// supertype list `Message::supertypes` returned at construction time so
/// `SubscriberIndex` can feed it straight into `TypeHierarchyCache`
/// without needing a second, generic round-trip through `T`.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredType {
    pub id: MessageTypeId,
    pub direct_supertypes: &'static [TypeId],
}

/// Immutable record describing one annotated handler.
///
/// Built once, by `Describe::describe`, and never mutated afterwards.
/// `enabled = false` descriptors are filtered out before indexing by
/// `SubscriberIndex`.
pub struct HandlerDescriptor {
    pub declaring_type: &'static str,
    pub handler_id: String,
    pub(crate) message_types: SmallVec<[DeclaredType; 3]>,
    pub accepts_subtypes: bool,
    pub enabled: bool,
    pub synchronized: bool,
    pub is_vararg: bool,
    /// Reserved: not read by any index traversal.
    pub priority: i32,
    pub(crate) vararg_array_type: Option<TypeId>,
    pub(crate) invoke: InvokeFn,
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("declaring_type", &self.declaring_type)
            .field("handler_id", &self.handler_id)
            .field(
                "message_types",
                &self
                    .message_types
                    .iter()
                    .map(|d| d.id.type_name)
                    .collect::<Vec<_>>(),
            )
            .field("accepts_subtypes", &self.accepts_subtypes)
            .field("enabled", &self.enabled)
            .field("synchronized", &self.synchronized)
            .field("is_vararg", &self.is_vararg)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl HandlerDescriptor {
    #[must_use]
    pub fn message_types(&self) -> &[DeclaredType] {
        &self.message_types
    }

    /// A single-argument handler over `T`.
    pub fn single<L, T, F>(handler_id: impl Into<String>, handler: F) -> HandlerDescriptorBuilder
    where
        L: Listener,
        T: Message,
        F: Fn(&L, &dyn Message) -> Result<(), BusError> + Send + Sync + 'static,
    {
        let declared = declared_type::<T>();
        let invoke: InvokeFn = Box::new(move |listener, dispatch| {
            let concrete = downcast_listener::<L>(listener)?;
            match dispatch {
                Dispatch::One(m) => handler(concrete, m),
                other => {
                    panic!("descriptor for single-arg handler dispatched with {other:?} arity")
                }
            }
        });
        HandlerDescriptorBuilder::new(
            std::any::type_name::<L>(),
            handler_id.into(),
            smallvec::smallvec![declared],
            false,
            None,
            invoke,
        )
    }

    /// A two-argument handler over `(T1, T2)`.
    pub fn pair<L, T1, T2, F>(handler_id: impl Into<String>, handler: F) -> HandlerDescriptorBuilder
    where
        L: Listener,
        T1: Message,
        T2: Message,
        F: Fn(&L, &dyn Message, &dyn Message) -> Result<(), BusError> + Send + Sync + 'static,
    {
        let declared = smallvec::smallvec![declared_type::<T1>(), declared_type::<T2>()];
        let invoke: InvokeFn = Box::new(move |listener, dispatch| {
            let concrete = downcast_listener::<L>(listener)?;
            match dispatch {
                Dispatch::Two(m1, m2) => handler(concrete, m1, m2),
                other => panic!("descriptor for 2-arg handler dispatched with {other:?} arity"),
            }
        });
        HandlerDescriptorBuilder::new(
            std::any::type_name::<L>(),
            handler_id.into(),
            declared,
            false,
            None,
            invoke,
        )
    }

    /// A three-argument handler over `(T1, T2, T3)`.
    pub fn triple<L, T1, T2, T3, F>(
        handler_id: impl Into<String>,
        handler: F,
    ) -> HandlerDescriptorBuilder
    where
        L: Listener,
        T1: Message,
        T2: Message,
        T3: Message,
        F: Fn(&L, &dyn Message, &dyn Message, &dyn Message) -> Result<(), BusError>
            + Send
            + Sync
            + 'static,
    {
        let declared = smallvec::smallvec![
            declared_type::<T1>(),
            declared_type::<T2>(),
            declared_type::<T3>()
        ];
        let invoke: InvokeFn = Box::new(move |listener, dispatch| {
            let concrete = downcast_listener::<L>(listener)?;
            match dispatch {
                Dispatch::Three(m1, m2, m3) => handler(concrete, m1, m2, m3),
                other => panic!("descriptor for 3-arg handler dispatched with {other:?} arity"),
            }
        });
        HandlerDescriptorBuilder::new(
            std::any::type_name::<L>(),
            handler_id.into(),
            declared,
            false,
            None,
            invoke,
        )
    }

    /// A var-arg handler over `T[]`, receiving a bundled fan-out call. The
    /// bundle is erased the same way scalar dispatch is, since a
    /// var-arg-super fan-out bundles instances of possibly different
    /// subtypes of the common supertype `T`.
    pub fn vararg<L, T, F>(handler_id: impl Into<String>, handler: F) -> HandlerDescriptorBuilder
    where
        L: Listener,
        T: Message,
        F: Fn(&L, &[&dyn Message]) -> Result<(), BusError> + Send + Sync + 'static,
    {
        let declared = declared_type::<T>();
        let array_type_id = TypeId::of::<Vec<T>>();
        let invoke: InvokeFn = Box::new(move |listener, dispatch| {
            let concrete = downcast_listener::<L>(listener)?;
            match dispatch {
                Dispatch::Array(messages) => handler(concrete, messages),
                other => panic!("descriptor for var-arg handler dispatched with {other:?} arity"),
            }
        });
        HandlerDescriptorBuilder::new(
            std::any::type_name::<L>(),
            handler_id.into(),
            smallvec::smallvec![declared],
            true,
            Some(array_type_id),
            invoke,
        )
    }
}

fn declared_type<T: Message>() -> DeclaredType {
    DeclaredType {
        id: MessageTypeId::of::<T>(),
        direct_supertypes: T::supertypes(),
    }
}

fn downcast_listener<'a, L: Listener>(listener: &'a dyn Listener) -> Result<&'a L, BusError> {
    listener
        .as_any()
        .downcast_ref::<L>()
        .ok_or_else(|| BusError::ReflectionFailure {
            listener_type: std::any::type_name::<L>(),
            message: "invocation closure called against a mismatched listener type".to_owned(),
        })
}

/// Fluent builder for the handler marker's flags
/// (`acceptsSubtypes`, `enabled`, `synchronized`).
pub struct HandlerDescriptorBuilder {
    declaring_type: &'static str,
    handler_id: String,
    message_types: SmallVec<[DeclaredType; 3]>,
    is_vararg: bool,
    vararg_array_type: Option<TypeId>,
    invoke: InvokeFn,
    accepts_subtypes: bool,
    enabled: bool,
    synchronized: bool,
    priority: i32,
}

impl HandlerDescriptorBuilder {
    fn new(
        declaring_type: &'static str,
        handler_id: String,
        message_types: SmallVec<[DeclaredType; 3]>,
        is_vararg: bool,
        vararg_array_type: Option<TypeId>,
        invoke: InvokeFn,
    ) -> Self {
        Self {
            declaring_type,
            handler_id,
            message_types,
            is_vararg,
            vararg_array_type,
            invoke,
            accepts_subtypes: true,
            enabled: true,
            synchronized: false,
            priority: 0,
        }
    }

    #[must_use]
    pub fn accepts_subtypes(mut self, value: bool) -> Self {
        self.accepts_subtypes = value;
        self
    }

    #[must_use]
    pub fn enabled(mut self, value: bool) -> Self {
        self.enabled = value;
        self
    }

    #[must_use]
    pub fn synchronized(mut self, value: bool) -> Self {
        self.synchronized = value;
        self
    }

    #[must_use]
    pub fn priority(mut self, value: i32) -> Self {
        self.priority = value;
        self
    }

    #[must_use]
    pub fn build(self) -> HandlerDescriptor {
        HandlerDescriptor {
            declaring_type: self.declaring_type,
            handler_id: self.handler_id,
            message_types: self.message_types,
            accepts_subtypes: self.accepts_subtypes,
            enabled: self.enabled,
            synchronized: self.synchronized,
            is_vararg: self.is_vararg,
            priority: self.priority,
            vararg_array_type: self.vararg_array_type,
            invoke: self.invoke,
        }
    }
}

impl std::fmt::Debug for Dispatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arity = match self {
            Dispatch::One(_) => "One",
            Dispatch::Two(_, _) => "Two",
            Dispatch::Three(_, _, _) => "Three",
            Dispatch::Array(_) => "Array",
        };
        f.write_str(arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Listener1 {
        seen: std::sync::Mutex<Option<String>>,
    }

    struct MsgA(&'static str);
    impl Message for MsgA {}

    #[test]
    fn single_arg_descriptor_invokes_through_closure() {
        let descriptor = HandlerDescriptor::single::<Listener1, MsgA, _>("on_a", |l, m| {
            let a = crate::message::downcast_ref::<MsgA>(m).expect("downcast");
            *l.seen.lock().unwrap() = Some(a.0.to_owned());
            Ok(())
        })
        .build();

        let listener = Listener1 {
            seen: std::sync::Mutex::new(None),
        };
        let msg = MsgA("hello");
        (descriptor.invoke)(&listener, Dispatch::One(&msg)).unwrap();
        assert_eq!(listener.seen.lock().unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn defaults_match_handler_marker_defaults() {
        let descriptor =
            HandlerDescriptor::single::<Listener1, MsgA, _>("on_a", |_, _| Ok(())).build();
        assert!(descriptor.accepts_subtypes);
        assert!(descriptor.enabled);
        assert!(!descriptor.synchronized);
        assert!(!descriptor.is_vararg);
    }

    #[test]
    fn vararg_descriptor_records_array_type() {
        let descriptor =
            HandlerDescriptor::vararg::<Listener1, MsgA, _>("on_many", |_, _| Ok(())).build();
        assert!(descriptor.is_vararg);
        assert_eq!(
            descriptor.vararg_array_type,
            Some(TypeId::of::<Vec<MsgA>>())
        );
    }
}
