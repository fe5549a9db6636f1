//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::collections::{HashMap, HashSet};

/// Alias for `std::collections::HashMap<K, V, ahash::RandomState>`, a table
/// with a much faster hash function. Every key in this crate is a small
/// integer-like value, and the quality/speed trade-off of `ahash` is the
/// right one for those.
pub type CiHashMap<K, V> = HashMap<K, V, ahash::RandomState>;

/// Alias for `std::collections::HashSet<V, ahash::RandomState>`, see
/// [`CiHashMap`] for the reasoning.
pub type CiHashSet<V> = HashSet<V, ahash::RandomState>;
