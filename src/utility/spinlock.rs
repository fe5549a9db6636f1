//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::sync::atomic::{AtomicBool, Ordering};

/// A TTAS (test and test-and-set) spin-lock.
///
/// The mutex has the correct acquire/release semantics on lock/unlock, and will try
/// to inform the CPU when inside the spin-loop with [`core::hint::spin_loop`].
///
/// This is intended for uses where the time spent holding the lock is miniscule, e.x.
/// for use with the preserved analyses init guard (in which case the lock is only held to
/// perform a single store). **This is not a general purpose mutex.**
#[repr(transparent)]
pub struct SpinMutex {
    flag: AtomicBool,
}

impl SpinMutex {
    /// Creates a new unlocked [`SpinMutex`].
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Locks the mutex, potentially waiting if it's already locked. This follows
    /// the semantics of `Ordering::Acquire`.
    pub fn lock(&self) {
        // writes need to stay at a bare minimum here, contended locks shouldn't
        // be forcing every waiting core to refresh its cache line constantly
        loop {
            // check first, if the lock isn't taken we get it with one less load
            if !self.flag.swap(true, Ordering::Acquire) {
                break;
            }

            // inner loop only reads, waiting cores spin on their own cache line
            while self.flag.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    /// Unlocks the mutex. This follows the semantics of `Ordering::Release`.
    pub fn unlock(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
