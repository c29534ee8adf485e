// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name-keyed descriptor table with override-on-duplicate semantics.
//!
//! The table is an ordered `Vec` behind a single coarse lock; lookups
//! scan linearly and return descriptor copies. Registries are expected
//! to hold tens of types, so the design favors simplicity over lookup
//! speed.
//!
//! # Hot Reload
//!
//! Registering a name that already exists replaces the prior descriptor
//! in place, so a plugin unload/reload cycle re-registers its types
//! under unchanged names and all later lookups observe the new
//! definitions. Because lookups return copies, an in-flight construction
//! always proceeds against the descriptor that was valid at the moment
//! of lookup, never against one being replaced concurrently.

use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::base::Base;
use crate::buffer::RawBuffer;
use crate::descriptor::TypeDescriptor;
use crate::error::{ConstructError, Result};
use crate::lock::{LocalLock, RegistryLock, SyncLock};

/// Name-to-descriptor registry for one base trait.
///
/// `B` is the base trait-object type, `A` the argument tuple shared by
/// every argument-taking constructor the registry can invoke, and `L`
/// the locking strategy, fixed for the registry's lifetime. The default
/// is the thread-safe mode; [`LocalRegistry`] selects the
/// single-threaded mode with identical call sites.
///
/// ```
/// use typekit::Registry;
///
/// trait Shape {
///     fn area(&self) -> f64;
/// }
/// typekit::impl_base!(Shape);
///
/// #[derive(Default)]
/// struct Square {
///     side: f64,
/// }
/// impl Shape for Square {
///     fn area(&self) -> f64 {
///         self.side * self.side
///     }
/// }
///
/// let registry: Registry<dyn Shape> = Registry::new();
/// registry.register::<Square>("square");
///
/// let shape = registry.alloc_and_construct("square").expect("registered");
/// assert_eq!(shape.area(), 0.0);
/// ```
pub struct Registry<B: ?Sized, A = (), L = SyncLock<Vec<TypeDescriptor<B, A>>>> {
    types: L,
    _base: PhantomData<fn(A) -> NonNull<B>>,
}

/// Single-threaded registry: no lock, statically `!Sync`.
pub type LocalRegistry<B, A = ()> = Registry<B, A, LocalLock<Vec<TypeDescriptor<B, A>>>>;

impl<B, A, L> Registry<B, A, L>
where
    B: ?Sized + 'static,
    A: 'static,
    L: RegistryLock<Vec<TypeDescriptor<B, A>>>,
{
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: L::new(Vec::new()),
            _base: PhantomData,
        }
    }

    /// Register `descriptor`, replacing any prior descriptor with the
    /// same name in place.
    ///
    /// Objects already constructed under a replaced descriptor are
    /// unaffected; they escaped the registry as base handles.
    pub fn register_type(&self, descriptor: TypeDescriptor<B, A>) {
        self.types.with_mut(|types| {
            if let Some(existing) = types.iter_mut().find(|t| t.name() == descriptor.name()) {
                log::debug!(
                    "[Registry::register_type] overriding '{}' (size={}, align={})",
                    descriptor.name(),
                    descriptor.size(),
                    descriptor.alignment()
                );
                *existing = descriptor;
            } else {
                log::debug!(
                    "[Registry::register_type] registered '{}' (size={}, align={})",
                    descriptor.name(),
                    descriptor.size(),
                    descriptor.alignment()
                );
                types.push(descriptor);
            }
        });
    }

    /// Build the default-constructible descriptor for `T` and register
    /// it under `name`.
    pub fn register<T>(&self, name: impl Into<Arc<str>>)
    where
        T: Default + 'static,
        B: Base<T>,
    {
        self.register_type(TypeDescriptor::of::<T>(name));
    }

    /// Copy of the descriptor registered under `name`.
    ///
    /// The copy is a stable snapshot: registration activity after this
    /// returns, including replacement of the same name, cannot affect a
    /// construction that uses it.
    #[must_use]
    pub fn find_type_info(&self, name: &str) -> Option<TypeDescriptor<B, A>> {
        self.types
            .with(|types| types.iter().find(|t| t.name() == name).cloned())
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.with(|types| types.iter().any(|t| t.name() == name))
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.with(Vec::len)
    }

    /// Returns `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.with(Vec::is_empty)
    }

    /// Registered names, in registration order.
    #[must_use]
    pub fn type_names(&self) -> Vec<Arc<str>> {
        self.types
            .with(|types| types.iter().map(|t| t.name_arc()).collect())
    }

    /// Cloned snapshot of the whole table, in registration order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<TypeDescriptor<B, A>> {
        self.types.with(|types| types.to_vec())
    }

    /// Construct `name` into `buf` and return the base handle.
    ///
    /// The placement address is the buffer start rounded up to the next
    /// multiple of the type's alignment; the bounds check requires the
    /// alignment offset plus the type's size to fit the capacity.
    ///
    /// The registry never runs destructors for placement-constructed
    /// values: keep them trivially destructible, or retain concrete-type
    /// knowledge and run `std::ptr::drop_in_place` before reusing the
    /// storage.
    ///
    /// # Errors
    ///
    /// [`ConstructError::UnknownType`] if `name` is not registered,
    /// [`ConstructError::BufferTooSmall`] if the aligned placement does
    /// not fit, [`ConstructError::NotDefaultConstructible`] if the
    /// descriptor carries no default-construction function (nothing is
    /// written in any error case).
    ///
    /// # Safety
    ///
    /// `buf.ptr()` must be valid for writes of `buf.capacity()` bytes
    /// (of the alignment offset plus the descriptor's size when the
    /// capacity is [`RawBuffer::UNBOUNDED`]), and the region must not
    /// overlap a live object. The returned pointer is only valid while
    /// that memory is.
    pub unsafe fn construct_raw(&self, name: &str, buf: RawBuffer) -> Result<NonNull<B>> {
        let info = self.resolve(name)?;
        let dst = placement_address(&info, name, buf)?;
        info.construct_in_place(dst)
            .ok_or_else(|| ConstructError::NotDefaultConstructible {
                name: name.to_string(),
            })
    }

    /// Argument-taking twin of [`construct_raw`](Self::construct_raw).
    ///
    /// # Errors
    ///
    /// As `construct_raw`, with
    /// [`ConstructError::NotConstructible`] when the descriptor carries
    /// no argument-taking construction function.
    ///
    /// # Safety
    ///
    /// Same contract as `construct_raw`.
    pub unsafe fn construct_raw_with(
        &self,
        name: &str,
        buf: RawBuffer,
        args: A,
    ) -> Result<NonNull<B>> {
        let info = self.resolve(name)?;
        let dst = placement_address(&info, name, buf)?;
        info.construct_in_place_with(dst, args)
            .ok_or_else(|| ConstructError::NotConstructible {
                name: name.to_string(),
            })
    }

    /// Safe placement construction into an exclusive uninitialized
    /// slice.
    ///
    /// The returned handle borrows the slice, so the storage cannot be
    /// reused or freed while the handle is alive. The value's destructor
    /// is never run by the registry (see
    /// [`construct_raw`](Self::construct_raw)).
    ///
    /// # Errors
    ///
    /// As [`construct_raw`](Self::construct_raw).
    pub fn construct_in<'buf>(
        &self,
        name: &str,
        storage: &'buf mut [MaybeUninit<u8>],
    ) -> Result<&'buf mut B> {
        let buf = RawBuffer::from_uninit_slice(storage);
        // SAFETY: the buffer covers exactly the exclusive slice, which
        // is valid for writes of its full length for 'buf.
        let ptr = unsafe { self.construct_raw(name, buf) }?;
        // SAFETY: the value was just constructed inside the slice; the
        // returned borrow inherits the slice's exclusive lifetime.
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    /// Argument-taking twin of [`construct_in`](Self::construct_in).
    ///
    /// # Errors
    ///
    /// As [`construct_raw_with`](Self::construct_raw_with).
    pub fn construct_in_with<'buf>(
        &self,
        name: &str,
        storage: &'buf mut [MaybeUninit<u8>],
        args: A,
    ) -> Result<&'buf mut B> {
        let buf = RawBuffer::from_uninit_slice(storage);
        // SAFETY: as in construct_in.
        let ptr = unsafe { self.construct_raw_with(name, buf, args) }?;
        // SAFETY: as in construct_in.
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    /// Heap-allocate and default-construct `name`.
    ///
    /// Ownership of the allocation transfers to the caller; the box
    /// drops normally through the base vtable.
    ///
    /// # Errors
    ///
    /// [`ConstructError::UnknownType`] if `name` is not registered,
    /// [`ConstructError::NotDefaultConstructible`] if the descriptor
    /// carries no default-construction function.
    pub fn alloc_and_construct(&self, name: &str) -> Result<Box<B>> {
        let info = self.resolve(name)?;
        info.alloc_and_construct()
            .ok_or_else(|| ConstructError::NotDefaultConstructible {
                name: name.to_string(),
            })
    }

    /// Heap-allocate and construct `name` from `args`.
    ///
    /// # Errors
    ///
    /// [`ConstructError::UnknownType`] if `name` is not registered,
    /// [`ConstructError::NotConstructible`] if the descriptor carries no
    /// argument-taking construction function.
    pub fn alloc_and_construct_with(&self, name: &str, args: A) -> Result<Box<B>> {
        let info = self.resolve(name)?;
        info.alloc_and_construct_with(args)
            .ok_or_else(|| ConstructError::NotConstructible {
                name: name.to_string(),
            })
    }

    fn resolve(&self, name: &str) -> Result<TypeDescriptor<B, A>> {
        self.find_type_info(name).ok_or_else(|| {
            log::trace!("[Registry::resolve] no type registered under '{name}'");
            ConstructError::UnknownType {
                name: name.to_string(),
            }
        })
    }
}

impl<B, A, L> Default for Registry<B, A, L>
where
    B: ?Sized + 'static,
    A: 'static,
    L: RegistryLock<Vec<TypeDescriptor<B, A>>>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Alignment-adjusted, bounds-checked placement address inside `buf`.
fn placement_address<B: ?Sized + 'static, A: 'static>(
    info: &TypeDescriptor<B, A>,
    name: &str,
    buf: RawBuffer,
) -> Result<NonNull<u8>> {
    let offset = info.bytes_to_align(buf.ptr().as_ptr());
    let needed = offset
        .checked_add(info.size())
        .ok_or(ConstructError::BufferTooSmall {
            needed: usize::MAX,
            capacity: buf.capacity(),
        })?;
    if needed > buf.capacity() {
        log::trace!(
            "[Registry::construct] '{name}' needs {needed} bytes after alignment, buffer has {}",
            buf.capacity()
        );
        return Err(ConstructError::BufferTooSmall {
            needed,
            capacity: buf.capacity(),
        });
    }
    // SAFETY: offset + size fits the declared capacity, so the adjusted
    // address stays inside the caller's region and cannot wrap.
    Ok(unsafe { NonNull::new_unchecked(buf.ptr().as_ptr().add(offset)) })
}
