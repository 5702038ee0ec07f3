/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Sets of symbol names preserving insertion order.
//!
//! Two populations share this structure: the whitelist of symbols the user
//! asked for, and the per-module set of symbols exported through
//! `EXPORT_SYMBOL()`. A third instance maps global symbols to the exported
//! weak symbols found at the same address.

use anyhow::{Context, Result};
use itertools::Itertools;
use std::collections::HashMap;
use std::path::Path;

/// One symbol entry.
#[derive(Debug, Clone, Default)]
pub struct Ksym {
    /// Symbol value (address), where relevant.
    pub value: u64,
    /// For alias entries, the name of the linked symbol.
    pub link: Option<String>,
    order: usize,
    mark: bool,
}

impl Ksym {
    /// Whether this symbol was seen while processing modules.
    pub fn marked(&self) -> bool {
        self.mark
    }
}

/// A set of symbols keyed by name, preserving insertion order and carrying
/// a mark bit used to track symbols seen while processing modules.
#[derive(Debug, Clone, Default)]
pub struct Ksymtab {
    syms: HashMap<String, Ksym>,
    mark_count: usize,
}

impl Ksymtab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `name`; re-inserting an existing name is a no-op.
    pub fn add(&mut self, name: &str, value: u64) -> &mut Ksym {
        let order = self.syms.len();
        self.syms.entry(name.to_string()).or_insert(Ksym {
            value,
            link: None,
            order,
            mark: false,
        })
    }

    /// Inserts `name` as an alias of `link`.
    pub fn add_link(&mut self, name: &str, link: &str) {
        self.add(name, 0).link = Some(link.to_string());
    }

    pub fn find(&self, name: &str) -> Option<&Ksym> {
        self.syms.get(name)
    }

    pub fn len(&self) -> usize {
        self.syms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }

    /// Sets the mark bit of `name`, if present.
    pub fn mark(&mut self, name: &str) {
        if let Some(sym) = self.syms.get_mut(name) {
            if !sym.mark {
                sym.mark = true;
                self.mark_count += 1;
            }
        }
    }

    /// Number of entries whose mark bit is set.
    pub fn mark_count(&self) -> usize {
        self.mark_count
    }

    /// Calls `f` on every entry in insertion order.
    pub fn for_each(&self, mut f: impl FnMut(&str, &Ksym)) {
        for (name, sym) in self.syms.iter().sorted_by_key(|(_, sym)| sym.order) {
            f(name, sym);
        }
    }
}

/// Reads the whitelist of symbols of interest: one symbol per line, every
/// whitespace character stripped, blank lines skipped.
pub fn read_symbols(path: impl AsRef<Path>) -> Result<Ksymtab> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open symbol file {}", path.display()))?;
    let mut symbols = Ksymtab::new();
    for line in text.lines() {
        let name: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        if !name.is_empty() {
            symbols.add(&name, 0);
        }
    }
    Ok(symbols)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insertion_order_and_marks() {
        let mut tab = Ksymtab::new();
        tab.add("zebra", 0);
        tab.add("alpha", 0);
        tab.add("mike", 0);
        tab.mark("alpha");
        tab.mark("alpha");
        assert_eq!(tab.mark_count(), 1);
        let mut seen = Vec::new();
        tab.for_each(|name, _| seen.push(name.to_string()));
        assert_eq!(seen, vec!["zebra", "alpha", "mike"]);
    }
}
