// -*- coding: utf-8 -*-
// ------------------------------------------------------------------------------------------------
// Copyright © 2025, tql authors.
// Licensed under either of Apache License, Version 2.0, or MIT license, at your option.
// Please see the LICENSE-APACHE or LICENSE-MIT files in this distribution for license details.
// ------------------------------------------------------------------------------------------------

//! Filter functions that can be called from TQL queries
//!
//! A query can guard an element with `~( … $name … )`, where `$name` refers to a function the
//! caller supplies at match time.  Filter functions see the candidate element and decide whether
//! it is acceptable; they are expected to be pure and fast, since the engine may consult them
//! several times for the same element while backtracking.  Panics from a filter function are not
//! caught and terminate the enumeration.

use std::collections::HashMap;

/// A library of named filter functions.
pub struct Filters<'f, N> {
    filters: HashMap<String, Box<dyn Fn(N) -> bool + 'f>>,
}

impl<'f, N> Filters<'f, N> {
    /// Creates a new, empty library of filter functions.
    pub fn new() -> Filters<'f, N> {
        Filters::default()
    }

    /// Adds a new filter function to this library, replacing any previous one with the same name.
    pub fn add<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(N) -> bool + 'f,
    {
        self.filters.insert(name.into(), Box::new(filter));
    }

    /// Whether a filter function with this name has been added.
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Calls a named filter function on `node`.  Names are validated before enumeration starts,
    /// so a missing name can only mean the caller swapped registries mid-match; it reads as a
    /// rejection rather than a panic.
    pub(crate) fn call(&self, name: &str, node: N) -> bool {
        self.filters.get(name).map_or(false, |filter| filter(node))
    }
}

impl<'f, N> Default for Filters<'f, N> {
    fn default() -> Filters<'f, N> {
        Filters {
            filters: HashMap::new(),
        }
    }
}
