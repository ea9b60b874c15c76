// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::{cell::Cell, marker::PhantomData};

pub use critical_section::{CriticalSection, Mutex};

/// Foreground (main loop) context.
///
/// Holding a reference to this object proves that the holder
/// is running in foreground context and not inside of an interrupt handler.
/// Foreground code is the only writer of channel commands.
pub struct MainCtx<'a>(PhantomData<&'a *const ()>);

impl MainCtx<'_> {
    /// Create a new foreground context.
    ///
    /// # SAFETY
    ///
    /// This may only be called from foreground code.
    /// A `MainCtx` must never be constructed inside of an interrupt handler.
    #[inline(always)]
    pub unsafe fn new() -> Self {
        fence();
        Self(PhantomData)
    }

    /// Run `f` in a critical section.
    #[inline(always)]
    pub fn with_cs<R>(&self, f: impl FnOnce(CriticalSection<'_>) -> R) -> R {
        critical_section::with(f)
    }
}

impl Drop for MainCtx<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        fence();
    }
}

/// Interrupt context.
///
/// Holding a reference to this object proves that the holder
/// is running inside of an interrupt handler.
/// Handlers enter a critical section only around accesses to shared state.
/// On dual core parts the critical section also excludes the other core,
/// so it must be kept short: long running work such as the capture
/// aggregation runs outside of it.
pub struct IrqCtx<'a>(PhantomData<&'a *const ()>);

impl IrqCtx<'_> {
    /// Create a new interrupt context.
    ///
    /// # SAFETY
    ///
    /// This may only be called from interrupt handlers.
    #[inline(always)]
    pub unsafe fn new() -> Self {
        fence();
        Self(PhantomData)
    }

    /// Run `f` in a critical section.
    #[inline(always)]
    pub fn with_cs<R>(&self, f: impl FnOnce(CriticalSection<'_>) -> R) -> R {
        critical_section::with(f)
    }
}

impl Drop for IrqCtx<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        fence();
    }
}

/// Enter interrupt context and run the handler `f`.
///
/// # SAFETY
///
/// This may only be called from an interrupt handler (GPIO bank, alarm,
/// repeating timer or DMA completion vector).
#[inline(always)]
pub unsafe fn irq_entry<R>(f: impl FnOnce(&IrqCtx<'_>) -> R) -> R {
    // SAFETY: The caller guarantees that we are inside of an interrupt handler.
    let c = unsafe { IrqCtx::new() };
    f(&c)
}

/// Optimization and reordering fence.
#[inline(always)]
pub fn fence() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

pub struct MutexCell<T> {
    inner: Mutex<Cell<T>>,
}

impl<T> MutexCell<T> {
    #[inline]
    pub const fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(Cell::new(inner)),
        }
    }

    #[inline]
    pub fn replace(&self, cs: CriticalSection<'_>, inner: T) -> T {
        self.inner.borrow(cs).replace(inner)
    }
}

impl<T: Copy> MutexCell<T> {
    #[inline]
    pub fn get(&self, cs: CriticalSection<'_>) -> T {
        self.inner.borrow(cs).get()
    }

    #[inline]
    pub fn set(&self, cs: CriticalSection<'_>, inner: T) {
        self.inner.borrow(cs).set(inner);
    }
}


// vim: ts=4 sw=4 expandtab
