/*
 * SPDX-FileCopyrightText: 2023 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Reading of kernel objects: ELF validation, the `__ksymtab` sections that
//! mark symbols exported with `EXPORT_SYMBOL()`, weak-alias discovery, and
//! the DWARF section loader.

use crate::ksymtab::Ksymtab;
use anyhow::{bail, Context, Result};
use log::warn;
use object::{Object, ObjectSection, ObjectSymbol, SectionKind};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

const KSYMTAB: &str = "__ksymtab";
const KSYMTAB_GPL: &str = "__ksymtab_gpl";
const KSYMTAB_STRINGS: &str = "__ksymtab_strings";
const KSYMTAB_PREFIX: &str = "__ksymtab_";

/// A parsed 64-bit ELF object and the endianness to read its DWARF with.
pub struct ElfData<'data> {
    pub file: object::File<'data>,
    pub endian: gimli::RunTimeEndian,
}

/// Parses `data` as a 64-bit ELF object.
///
/// Files that are not ELF, or not 64-bit, are skipped with a warning
/// (`Ok(None)`), so a kernel tree may contain stray files; truly malformed
/// ELF content is an error.
pub fn open<'data>(data: &'data [u8], path: &Path) -> Result<Option<ElfData<'data>>> {
    match object::FileKind::parse(data) {
        Ok(object::FileKind::Elf64) => {}
        Ok(kind) => {
            warn!("Unsupported elf class of {}: {:?}", path.display(), kind);
            return Ok(None);
        }
        Err(_) => {
            warn!("Doesn't look like an ELF file, ignoring: {}", path.display());
            return Ok(None);
        }
    }
    let file = object::File::parse(data)
        .with_context(|| format!("Cannot parse ELF file {}", path.display()))?;
    let endian = if file.is_little_endian() {
        gimli::RunTimeEndian::Little
    } else {
        gimli::RunTimeEndian::Big
    };
    Ok(Some(ElfData { file, endian }))
}

/// An address range covered by one `__ksymtab` section.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionRange {
    pub addr: u64,
    pub size: u64,
}

impl SectionRange {
    pub fn contains(&self, addr: u64) -> bool {
        self.size != 0 && addr >= self.addr && addr < self.addr + self.size
    }
}

fn section_range(elf: &ElfData, name: &str) -> Result<Option<SectionRange>> {
    let Some(section) = elf.file.section_by_name(name) else {
        return Ok(None);
    };
    if section.kind() == SectionKind::UninitializedData {
        bail!(
            "The {} section has type SHT_NOBITS. Most likely you're running \
             this tool on modules coming from kernel-debuginfo packages. They \
             don't contain the {} section, you need to use the raw modules \
             before they are stripped",
            name,
            name
        );
    }
    Ok(Some(SectionRange {
        addr: section.address(),
        size: section.size(),
    }))
}

/// The exported name encoded by a `__ksymtab_*` marker symbol, if any.
pub fn exported_name(symbol_name: &str) -> Option<&str> {
    symbol_name.strip_prefix(KSYMTAB_PREFIX)
}

/// Builds the set of symbols this module exports and the table of
/// weak-alias links.
///
/// Returns `None` when the module has no `__ksymtab_strings` section, i.e.
/// exports nothing. The exported set lists the local `__ksymtab_*` marker
/// symbols whose value falls into `__ksymtab` or `__ksymtab_gpl`; the alias
/// table maps each global symbol to the exported weak symbol found at the
/// same address, so the global's debug info can stand in for the weak
/// export.
pub fn exported_symbols(elf: &ElfData, path: &Path) -> Result<Option<(Ksymtab, Ksymtab)>> {
    if section_range(elf, KSYMTAB_STRINGS)
        .with_context(|| format!("Cannot read {}", path.display()))?
        .is_none()
    {
        return Ok(None);
    }
    let ksymtab = section_range(elf, KSYMTAB)?.unwrap_or_default();
    let ksymtab_gpl = section_range(elf, KSYMTAB_GPL)?.unwrap_or_default();

    let mut exported = Ksymtab::new();
    if ksymtab.size != 0 || ksymtab_gpl.size != 0 {
        for symbol in elf.file.symbols() {
            if !symbol.is_local() {
                continue;
            }
            let Ok(name) = symbol.name() else { continue };
            let Some(name) = exported_name(name) else {
                continue;
            };
            let addr = symbol.address();
            if ksymtab.contains(addr) || ksymtab_gpl.contains(addr) {
                exported.add(name, addr);
            }
        }
    }

    let aliases = find_aliases(elf, &exported);
    Ok(Some((exported, aliases)))
}

/// One pass over the symbol table: collect the address of every strictly
/// global symbol and every exported weak symbol, then link each weak export
/// to the global sharing its address.
fn find_aliases(elf: &ElfData, exported: &Ksymtab) -> Ksymtab {
    let mut globals: HashMap<u64, String> = HashMap::new();
    let mut weaks: Vec<(String, u64)> = Vec::new();
    for symbol in elf.file.symbols() {
        if symbol.is_local() {
            continue;
        }
        let Ok(name) = symbol.name() else { continue };
        if name.is_empty() {
            continue;
        }
        if symbol.is_weak() {
            if exported.find(name).is_some() {
                weaks.push((name.to_string(), symbol.address()));
            }
        } else {
            globals.entry(symbol.address()).or_insert_with(|| name.to_string());
        }
    }

    let mut aliases = Ksymtab::new();
    for (weak_name, addr) in weaks {
        // No global alias means the weak symbol stands on its own.
        if let Some(global_name) = globals.get(&addr) {
            aliases.add_link(global_name, &weak_name);
        }
    }
    aliases
}

/// Loads the DWARF sections of `file`, decompressing where needed.
pub fn load_dwarf_sections<'data>(
    file: &object::File<'data>,
) -> Result<gimli::DwarfSections<Cow<'data, [u8]>>> {
    gimli::DwarfSections::load(|id| {
        Ok(match file.section_by_name(id.name()) {
            Some(section) => section
                .uncompressed_data()
                .with_context(|| format!("Cannot read section {}", id.name()))?,
            None => Cow::Borrowed(&[][..]),
        })
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn marker_symbol_names() {
        assert_eq!(exported_name("__ksymtab_snd_register"), Some("snd_register"));
        assert_eq!(exported_name("snd_register"), None);
    }

    #[test]
    fn section_range_containment() {
        let range = SectionRange {
            addr: 0x100,
            size: 0x20,
        };
        assert!(range.contains(0x100));
        assert!(range.contains(0x11f));
        assert!(!range.contains(0x120));
        assert!(!SectionRange::default().contains(0));
    }
}
