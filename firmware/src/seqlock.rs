// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generation counter protected value exchange.
//!
//! The counter is odd while a writer is busy and even when the value is
//! published. Readers never block: they copy the value and check that the
//! counter did not change during the copy. Interrupt handlers use a single
//! attempt ([SeqLock::try_read]) and keep their previous copy on failure.
//! Foreground code retries until it gets a consistent snapshot.

use core::{
    cell::UnsafeCell,
    hint::spin_loop,
    sync::atomic::{AtomicU32, Ordering, fence},
};
use critical_section::CriticalSection;

pub struct SeqLock<T> {
    seq: AtomicU32,
    data: UnsafeCell<T>,
}

// SAFETY: Writers are serialized by the critical section token required by
//         `write`. Readers only ever obtain copies of the value and discard
//         any copy that might have been torn by a concurrent writer.
unsafe impl<T: Copy + Send> Sync for SeqLock<T> {}

impl<T: Copy> SeqLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            seq: AtomicU32::new(0),
            data: UnsafeCell::new(value),
        }
    }

    /// Number of completed writes.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.seq.load(Ordering::Acquire) >> 1
    }

    /// Modify the value and publish it.
    ///
    /// The generation is incremented after all modifications are done.
    pub fn write<R>(&self, _cs: CriticalSection<'_>, f: impl FnOnce(&mut T) -> R) -> R {
        let seq = self.seq.load(Ordering::Relaxed);
        debug_assert!(seq & 1 == 0);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        // SAFETY: The critical section serializes all writers.
        //         Readers never hold a reference into `data`.
        let ret = f(unsafe { &mut *self.data.get() });

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
        ret
    }

    #[inline]
    fn read_begin(&self) -> Option<u32> {
        let seq = self.seq.load(Ordering::Acquire);
        if seq & 1 == 0 { Some(seq) } else { None }
    }

    #[inline]
    fn read_retry(&self, start: u32) -> bool {
        fence(Ordering::Acquire);
        self.seq.load(Ordering::Relaxed) != start
    }

    #[inline]
    fn copy(&self) -> T {
        // SAFETY: The value is plain `Copy` data. A copy made concurrently
        //         with a writer may be torn, but it is validated against the
        //         sequence counter and thrown away in that case.
        unsafe { core::ptr::read_volatile(self.data.get()) }
    }

    /// Single read attempt.
    ///
    /// Returns `None`, if a writer is busy or was busy during the copy.
    pub fn try_read(&self) -> Option<T> {
        let start = self.read_begin()?;
        let value = self.copy();
        if self.read_retry(start) {
            None
        } else {
            Some(value)
        }
    }

    /// Read a consistent snapshot and evaluate `f` on it.
    ///
    /// `f` is evaluated on a private copy and may be called more than once.
    /// Only the result belonging to a consistent snapshot is returned,
    /// together with the snapshot generation.
    pub fn read_with<R>(&self, mut f: impl FnMut(&T) -> R) -> (u32, R) {
        loop {
            if let Some(start) = self.read_begin() {
                let value = self.copy();
                let ret = f(&value);
                if !self.read_retry(start) {
                    return (start >> 1, ret);
                }
            }
            spin_loop();
        }
    }

    /// Read a consistent copy of the value.
    pub fn read(&self) -> T {
        self.read_with(|value| *value).1
    }
}


// vim: ts=4 sw=4 expandtab
