/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Extraction of kABI type information from the DWARF data of kernel
//! objects.
//!
//! For every compilation unit we walk the top-level DIEs, decide which ones
//! describe exported symbols worth emitting, and materialize their type
//! graphs. Named types are promoted into records of their own and referred
//! to through reference nodes; anonymous composites are inlined into the
//! record being built.

mod record;
pub use record::*;

use crate::elf;
use crate::ksymtab::{read_symbols, Ksymtab};
use crate::objects::Obj;
use crate::utils::{path_normalize, walk_dir, MmapHelper};
use crate::{
    BUILTIN_PATH, DECLARATION_PATH, ENUM_FILE, FUNC_FILE, STRUCT_FILE, TEMP_PATH, TYPEDEF_FILE,
    UNION_FILE, VAR_FILE,
};
use anyhow::{bail, Context, Result};
use dsi_progress_logger::*;
use gimli::AttributeValue;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

type Reader<'d> = gimli::EndianSlice<'d, gimli::RunTimeEndian>;
type Die<'a, 'd> = gimli::DebuggingInformationEntry<'a, 'a, Reader<'d>>;

/// Types built into the C compiler, with no source file of their own.
const BUILTIN_TYPES: &[&str] = &["__va_list_tag", "__builtin_strlen", "__builtin_strcpy"];

fn is_builtin(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// Configuration of one `generate` run.
#[derive(Debug, Clone)]
pub struct GenerateOpts {
    /// Directory of kernel objects (or a single object file) to process.
    pub kernel_dir: PathBuf,
    /// Where the record files go.
    pub kabi_dir: PathBuf,
    /// Optional whitelist restricting the symbols of interest.
    pub symbols: Option<PathBuf>,
    /// Absolute path prefix to strip from recorded source locations.
    pub replace_path: Option<String>,
    /// Record compilation-unit and containment-stack provenance.
    pub gen_extra: bool,
}

/// Runs symbol extraction over the configured kernel tree and dumps the
/// resulting record database under the output directory.
pub fn generate(opts: &GenerateOpts) -> Result<()> {
    let whitelist = match &opts.symbols {
        Some(path) => {
            let whitelist = read_symbols(path)?;
            debug!("Loaded {} symbols", whitelist.len());
            Some(whitelist)
        }
        None => None,
    };

    std::fs::create_dir_all(&opts.kabi_dir)
        .with_context(|| format!("Cannot create {}", opts.kabi_dir.display()))?;
    let temp_dir = opts.kabi_dir.join(TEMP_PATH);
    std::fs::create_dir_all(&temp_dir)
        .with_context(|| format!("Cannot create {}", temp_dir.display()))?;

    println!(
        "Generating symbol defs from {}...",
        opts.kernel_dir.display()
    );

    let mut job = GenerateJob {
        opts,
        whitelist,
        db: RecordDb::new(),
    };
    let meta = std::fs::metadata(&opts.kernel_dir)
        .with_context(|| format!("Failed to stat {}", opts.kernel_dir.display()))?;
    let mut pl = ProgressLogger::default();
    pl.display_memory(true).item_name("module");
    pl.start("Processing kernel objects...");
    if meta.is_dir() {
        walk_dir(&opts.kernel_dir, &mut |path| {
            let proceed = job.process_module(path)?;
            pl.light_update();
            Ok(proceed)
        })?;
    } else if meta.is_file() {
        job.process_module(&opts.kernel_dir)?;
    } else {
        bail!("Not a file or directory: {}", opts.kernel_dir.display());
    }
    pl.done();

    if let Some(whitelist) = &job.whitelist {
        whitelist.for_each(|name, sym| {
            if !sym.marked() {
                println!("{} not found!", name);
            }
        });
    }

    job.db.dump_all(&opts.kabi_dir)?;

    if let Err(error) = std::fs::remove_dir(&temp_dir) {
        warn!("Failed to delete {}: {}", temp_dir.display(), error);
    }
    Ok(())
}

/// Which whitelist entries a top-level DIE satisfies and, for alias
/// matches, the weak symbol the DIE's type stands in for.
struct SymbolMatch {
    weak: Option<String>,
    marks: Vec<String>,
    prefix: &'static str,
}

struct GenerateJob<'a> {
    opts: &'a GenerateOpts,
    whitelist: Option<Ksymtab>,
    db: RecordDb,
}

impl GenerateJob<'_> {
    fn all_done(&self) -> bool {
        self.whitelist
            .as_ref()
            .is_some_and(|wl| wl.mark_count() == wl.len())
    }

    /// Processes one kernel object; returns whether the walk should go on.
    fn process_module(&mut self, path: &Path) -> Result<bool> {
        let mmap = MmapHelper::load(path)?;
        let Some(elf) = elf::open(mmap.as_ref(), path)? else {
            return Ok(!self.all_done());
        };
        let Some((exported, aliases)) = elf::exported_symbols(&elf, path)? else {
            info!("Skip {} (no exported symbols)", path.display());
            return Ok(!self.all_done());
        };
        if exported.is_empty() {
            info!("Skip {} (no exported symbols)", path.display());
            return Ok(!self.all_done());
        }
        info!("Processing {}", path.display());

        let sections = elf::load_dwarf_sections(&elf.file)
            .with_context(|| format!("Cannot load DWARF of {}", path.display()))?;
        let dwarf = sections.borrow(|section| gimli::EndianSlice::new(section, elf.endian));

        let mut units = dwarf.units();
        while let Some(header) = units.next()? {
            if !(2..=4).contains(&header.version()) {
                bail!("Unsupported dwarf version: {}", header.version());
            }
            let unit = dwarf.unit(header)?;
            self.process_cu(&dwarf, &unit, &exported, &aliases)
                .with_context(|| format!("Cannot process {}", path.display()))?;
        }
        Ok(!self.all_done())
    }

    /// Walks the top-level DIEs of one compilation unit.
    fn process_cu(
        &mut self,
        dwarf: &gimli::Dwarf<Reader<'_>>,
        unit: &gimli::Unit<Reader<'_>>,
        exported: &Ksymtab,
        aliases: &Ksymtab,
    ) -> Result<()> {
        let cu_name = match &unit.name {
            Some(name) => Some(name.to_string_lossy().into_owned()),
            None => None,
        };
        let mut cu_logged = false;

        let mut tree = unit.entries_tree(None)?;
        let root = tree.root()?;
        let mut children = root.children();
        while let Some(node) = children.next()? {
            let die = node.entry();
            let Some(matched) = self.match_symbol(dwarf, unit, die, exported, aliases)? else {
                continue;
            };
            if !cu_logged {
                debug!("Processing CU {}", cu_name.as_deref().unwrap_or("?"));
                cu_logged = true;
            }

            let name = die_name(dwarf, unit, die)?;
            let opts = self.opts;
            let mut ctx = EmitCtx {
                opts,
                db: &mut self.db,
                dwarf,
                unit,
                cu_name: cu_name.clone(),
                stack: Vec::new(),
                processed: HashSet::new(),
            };
            let origin = match matched.weak {
                Some(_) => Some(ctx.origin(die)?),
                None => None,
            };
            let reference = ctx.emit_die(die.offset())?;

            // The DWARF of a global standing at the address of an exported
            // weak symbol also documents the weak symbol: file a weak
            // record under the exported name.
            if let (Some(weak_name), Some(origin), Some(ref_path), Some(global)) =
                (&matched.weak, origin, &reference.base_type, &name)
            {
                let record = Record::new(
                    format!("{}{}.txt", matched.prefix, weak_name),
                    opts.gen_extra.then(|| cu_name.clone()).flatten(),
                    origin,
                    Vec::new(),
                    Obj::weak_reffile(ref_path.clone(), global.clone()),
                );
                ctx.db.insert(record);
            }
            drop(ctx);

            if let Some(whitelist) = &mut self.whitelist {
                for mark in &matched.marks {
                    whitelist.mark(mark);
                }
            }
        }
        Ok(())
    }

    /// Validates that this is a symbol we should emit.
    fn match_symbol(
        &self,
        dwarf: &gimli::Dwarf<Reader<'_>>,
        unit: &gimli::Unit<Reader<'_>>,
        die: &Die<'_, '_>,
        exported: &Ksymtab,
        aliases: &Ksymtab,
    ) -> Result<Option<SymbolMatch>> {
        let Some(name) = die_name(dwarf, unit, die)? else {
            return Ok(None);
        };
        let weak = aliases.find(&name).and_then(|sym| sym.link.clone());

        // If a symbol file was provided, is the symbol on the list?
        let mut marks = Vec::new();
        if let Some(whitelist) = &self.whitelist {
            if whitelist.find(&name).is_some() {
                marks.push(name.clone());
            }
            if let Some(weak_name) = &weak {
                if whitelist.find(weak_name).is_some() {
                    marks.push(weak_name.clone());
                }
            }
            if marks.is_empty() {
                return Ok(None);
            }
        }

        // We don't care about declarations.
        if attr_flag(die, gimli::DW_AT_declaration)? {
            return Ok(None);
        }

        // Is this symbol exported in this module with EXPORT_SYMBOL?
        if exported.find(&name).is_none() && weak.is_none() {
            return Ok(None);
        }

        // Anything except inlined functions should be external.
        if !is_inline(die)? && !attr_flag(die, gimli::DW_AT_external)? {
            return Ok(None);
        }

        let prefix = match die.tag() {
            gimli::DW_TAG_subprogram => FUNC_FILE,
            gimli::DW_TAG_variable => VAR_FILE,
            gimli::DW_TAG_structure_type => STRUCT_FILE,
            tag => bail!("Symbol {} has unexpected tag: {}!", name, tag),
        };

        Ok(Some(SymbolMatch {
            weak,
            marks,
            prefix,
        }))
    }
}

fn die_name(
    dwarf: &gimli::Dwarf<Reader<'_>>,
    unit: &gimli::Unit<Reader<'_>>,
    die: &Die<'_, '_>,
) -> Result<Option<String>> {
    match die.attr_value(gimli::DW_AT_name)? {
        None => Ok(None),
        Some(value) => Ok(Some(
            dwarf
                .attr_string(unit, value)?
                .to_string_lossy()
                .into_owned(),
        )),
    }
}

fn attr_flag(die: &Die<'_, '_>, at: gimli::DwAt) -> Result<bool> {
    Ok(matches!(
        die.attr_value(at)?,
        Some(AttributeValue::Flag(true))
    ))
}

fn attr_udata(die: &Die<'_, '_>, at: gimli::DwAt) -> Result<Option<u64>> {
    match die.attr_value(at)? {
        None => Ok(None),
        Some(value) => value
            .udata_value()
            .map(Some)
            .with_context(|| format!("Unexpected form of {}", at)),
    }
}

/// Whether the DIE was declared inline (`DW_INL_declared_not_inlined` or
/// stronger).
fn is_inline(die: &Die<'_, '_>) -> Result<bool> {
    match die.attr_value(gimli::DW_AT_inline)? {
        None => Ok(false),
        Some(value) => Ok(value.udata_value().unwrap_or(0)
            >= u64::from(gimli::DW_INL_declared_not_inlined.0)),
    }
}

/// State of one top-level DIE walk: the containment stack and the set of
/// record keys already emitted or referenced during this walk.
struct EmitCtx<'a, 'd> {
    opts: &'a GenerateOpts,
    db: &'a mut RecordDb,
    dwarf: &'d gimli::Dwarf<Reader<'d>>,
    unit: &'d gimli::Unit<Reader<'d>>,
    cu_name: Option<String>,
    stack: Vec<String>,
    processed: HashSet<String>,
}

impl<'d> EmitCtx<'_, 'd> {
    fn die_name(&self, die: &Die<'_, 'd>) -> Result<Option<String>> {
        die_name(self.dwarf, self.unit, die)
    }

    /// The record file this DIE's type belongs to, or `None` when the type
    /// is inlined into the record being built.
    fn symbol_file(&self, die: &Die<'_, 'd>) -> Result<Option<String>> {
        let prefix = match die.tag() {
            gimli::DW_TAG_subprogram => FUNC_FILE,
            gimli::DW_TAG_typedef => TYPEDEF_FILE,
            gimli::DW_TAG_variable => VAR_FILE,
            gimli::DW_TAG_enumeration_type => ENUM_FILE,
            gimli::DW_TAG_structure_type => STRUCT_FILE,
            gimli::DW_TAG_union_type => UNION_FILE,
            // No need to redirect output for this type.
            _ => return Ok(None),
        };
        let name = self.die_name(die)?;

        // Declarations have no DW_AT_decl_file; pretend they live in a
        // directory of their own.
        if attr_flag(die, gimli::DW_AT_declaration)? {
            let Some(name) = name else {
                return Ok(None);
            };
            return Ok(Some(format!(
                "{}/{}{}.txt",
                DECLARATION_PATH, prefix, name
            )));
        }

        // Anonymous composites are embedded into the current record.
        if matches!(
            die.tag(),
            gimli::DW_TAG_enumeration_type | gimli::DW_TAG_structure_type | gimli::DW_TAG_union_type
        ) && name.is_none()
        {
            return Ok(None);
        }

        let Some(name) = name else {
            bail!("Anonymous DIE of tag {} cannot be promoted", die.tag());
        };
        Ok(Some(format!("{}{}.txt", prefix, name)))
    }

    fn origin(&self, die: &Die<'_, 'd>) -> Result<Origin> {
        Ok(Origin {
            file: self.get_file(die)?,
            line: self.get_line(die)?,
        })
    }

    /// Source file the DIE was declared in, after path replacement and
    /// normalization.
    fn get_file(&self, die: &Die<'_, 'd>) -> Result<String> {
        let name = self.die_name(die)?;
        if name.as_deref().is_some_and(is_builtin) {
            return Ok(BUILTIN_PATH.to_string());
        }
        let Some(value) = die.attr_value(gimli::DW_AT_decl_file)? else {
            bail!(
                "DIE missing file information: {}",
                name.as_deref().unwrap_or("?")
            );
        };
        let index = value
            .udata_value()
            .context("Unexpected form of DW_AT_decl_file")?;
        let unit = self.unit;
        let Some(program) = &unit.line_program else {
            bail!(
                "Cannot get files for CU {}",
                self.cu_name.as_deref().unwrap_or("?")
            );
        };
        let header = program.header();
        let Some(file) = header.file(index) else {
            bail!("File index {} out of range", index);
        };
        let file_name = self
            .dwarf
            .attr_string(unit, file.path_name())?
            .to_string_lossy()
            .into_owned();

        let mut path = if file_name.starts_with('/') {
            file_name
        } else {
            let dir = match file.directory(header) {
                Some(value) => Some(
                    self.dwarf
                        .attr_string(unit, value)?
                        .to_string_lossy()
                        .into_owned(),
                ),
                None => None,
            };
            let mut parts: Vec<String> = Vec::new();
            match dir {
                Some(dir) if dir.starts_with('/') => parts.push(dir),
                dir => {
                    if let Some(comp_dir) = &unit.comp_dir {
                        parts.push(comp_dir.to_string_lossy().into_owned());
                    }
                    if let Some(dir) = dir {
                        parts.push(dir);
                    }
                }
            }
            parts.push(file_name);
            parts.join("/")
        };

        if let Some(replace) = &self.opts.replace_path {
            if let Some(stripped) = path.strip_prefix(replace.as_str()) {
                path = stripped.trim_start_matches('/').to_string();
            }
        }
        Ok(path_normalize(&path))
    }

    fn get_line(&self, die: &Die<'_, 'd>) -> Result<u64> {
        if self.die_name(die)?.as_deref().is_some_and(is_builtin) {
            return Ok(0);
        }
        match attr_udata(die, gimli::DW_AT_decl_line)? {
            Some(line) => Ok(line),
            None => bail!(
                "DIE missing file or line information: {}",
                self.die_name(die)?.as_deref().unwrap_or("?")
            ),
        }
    }

    /// Resolves the `DW_AT_type` reference of a DIE to a unit-local offset.
    fn type_offset(&self, die: &Die<'_, 'd>) -> Result<Option<gimli::UnitOffset<usize>>> {
        match die.attr_value(gimli::DW_AT_type)? {
            None => Ok(None),
            Some(AttributeValue::UnitRef(offset)) => Ok(Some(offset)),
            Some(AttributeValue::DebugInfoRef(offset)) => {
                match offset.to_unit_offset(&self.unit.header) {
                    Some(offset) => Ok(Some(offset)),
                    None => bail!("Cross-unit type reference is not supported"),
                }
            }
            Some(value) => bail!("Unexpected form of DW_AT_type: {:?}", value),
        }
    }

    /// Emits the type a DIE refers to, or `void` if it refers to none.
    fn emit_type(&mut self, die: &Die<'_, 'd>) -> Result<Obj> {
        match self.type_offset(die)? {
            None => Ok(Obj::base("void".to_string())),
            Some(offset) => self.emit_die(offset),
        }
    }

    /// Emits the DIE at `offset`: promotes it into a record of its own and
    /// returns a reference node, or returns the inlined node tree.
    ///
    /// The per-walk processed set short-circuits types this walk has seen;
    /// re-references return the unbumped candidate key.
    fn emit_die(&mut self, offset: gimli::UnitOffset<usize>) -> Result<Obj> {
        let unit = self.unit;
        let die = unit.entry(offset)?;
        let Some(key) = self.symbol_file(&die)? else {
            return self.emit_tag(&die);
        };

        if !self.processed.contains(&key) {
            self.processed.insert(key.clone());
            if attr_flag(&die, gimli::DW_AT_declaration)? {
                debug!("Skipping {} (declaration only)", key);
            } else {
                debug!("Generating {}", key);
                let origin = self.origin(&die)?;
                let cu = self.opts.gen_extra.then(|| self.cu_name.clone()).flatten();
                let stack = self.stack.clone();
                if self.opts.gen_extra {
                    self.stack.push(key.clone());
                }
                let obj = self.emit_tag(&die)?;
                if self.opts.gen_extra {
                    self.stack.pop();
                }
                let record = Record::new(key, cu, origin, stack, obj);
                let final_key = self.db.insert(record);
                return Ok(Obj::reffile(final_key));
            }
        }
        Ok(Obj::reffile(key))
    }

    /// Translates one DIE into a node tree.
    fn emit_tag(&mut self, die: &Die<'_, 'd>) -> Result<Obj> {
        let name = self.die_name(die)?;
        match die.tag() {
            gimli::DW_TAG_subprogram | gimli::DW_TAG_subroutine_type => self.emit_subprogram(die),
            gimli::DW_TAG_variable => {
                let inner = self.emit_type(die)?;
                Ok(Obj::var(name, inner))
            }
            gimli::DW_TAG_base_type => {
                let Some(name) = name else {
                    bail!("Base type without a name");
                };
                Ok(Obj::base(name))
            }
            gimli::DW_TAG_pointer_type => Ok(Obj::ptr(self.emit_type(die)?)),
            gimli::DW_TAG_structure_type => self.emit_composite(die, gimli::DW_TAG_structure_type),
            gimli::DW_TAG_union_type => self.emit_composite(die, gimli::DW_TAG_union_type),
            gimli::DW_TAG_enumeration_type => self.emit_enumeration(die),
            gimli::DW_TAG_typedef => {
                let Some(name) = name else {
                    bail!("typedef without a name");
                };
                let inner = self.emit_type(die)?;
                Ok(Obj::typedef(name, inner))
            }
            gimli::DW_TAG_volatile_type => Ok(Obj::qualifier("volatile", self.emit_type(die)?)),
            gimli::DW_TAG_const_type => Ok(Obj::qualifier("const", self.emit_type(die)?)),
            gimli::DW_TAG_array_type => self.emit_array(die),
            tag => bail!(
                "Unexpected tag for symbol {}: {}",
                name.as_deref().unwrap_or("?"),
                tag
            ),
        }
    }

    /// Structs and unions: children must be members; struct members carry
    /// their byte offset and optional bitfield position.
    fn emit_composite(&mut self, die: &Die<'_, 'd>, tag: gimli::DwTag) -> Result<Obj> {
        let name = self.die_name(die)?;
        let mut obj = if tag == gimli::DW_TAG_structure_type {
            Obj::struct_(name)
        } else {
            Obj::union_(name)
        };
        obj.byte_size = attr_udata(die, gimli::DW_AT_byte_size)?.unwrap_or(0);
        obj.alignment = attr_udata(die, gimli::DW_AT_alignment)?.unwrap_or(0) as u32;

        let unit = self.unit;
        let mut tree = unit.entries_tree(Some(die.offset()))?;
        let mut children = tree.root()?.children();
        while let Some(node) = children.next()? {
            let child = node.entry();
            if child.tag() != gimli::DW_TAG_member {
                bail!(
                    "Unexpected tag for {} type children: {}",
                    if tag == gimli::DW_TAG_structure_type {
                        "structure"
                    } else {
                        "union"
                    },
                    child.tag()
                );
            }
            let member_name = self.die_name(child)?;
            let member = if tag == gimli::DW_TAG_structure_type {
                let Some(offset) = attr_udata(child, gimli::DW_AT_data_member_location)? else {
                    bail!(
                        "Offset of member {} missing!",
                        member_name.as_deref().unwrap_or("?")
                    );
                };
                let inner = self.emit_type(child)?;
                let mut member = Obj::struct_member(member_name.clone(), offset, inner);
                if let Some(first) = attr_udata(child, gimli::DW_AT_bit_offset)? {
                    let Some(size) = attr_udata(child, gimli::DW_AT_bit_size)? else {
                        bail!(
                            "Missing expected bit size attribute in {}!",
                            member_name.as_deref().unwrap_or("?")
                        );
                    };
                    member.bitfield = Some((first as u32, (first + size - 1) as u32));
                }
                member
            } else {
                let inner = self.emit_type(child)?;
                Obj::var(member_name, inner)
            };
            obj.add_member(member);
        }
        Ok(obj)
    }

    fn emit_enumeration(&mut self, die: &Die<'_, 'd>) -> Result<Obj> {
        let mut obj = Obj::enum_(self.die_name(die)?);
        obj.byte_size = attr_udata(die, gimli::DW_AT_byte_size)?.unwrap_or(0);
        obj.alignment = attr_udata(die, gimli::DW_AT_alignment)?.unwrap_or(0) as u32;

        let unit = self.unit;
        let mut tree = unit.entries_tree(Some(die.offset()))?;
        let mut children = tree.root()?.children();
        while let Some(node) = children.next()? {
            let child = node.entry();
            let Some(name) = self.die_name(child)? else {
                bail!("Enumerator without a name");
            };
            let value = match child.attr_value(gimli::DW_AT_const_value)? {
                Some(AttributeValue::Sdata(value)) => value as u64,
                Some(value) => value
                    .udata_value()
                    .with_context(|| format!("Unexpected value form of enumerator {}", name))?,
                None => bail!("Value of enumerator {} missing!", name),
            };
            obj.add_member(Obj::constant(name, value));
        }
        Ok(obj)
    }

    /// Functions and function types: formals become `var` members, with a
    /// trailing `"..."` for unspecified parameters; the return type becomes
    /// the pointee.
    fn emit_subprogram(&mut self, die: &Die<'_, 'd>) -> Result<Obj> {
        let name = self.die_name(die)?;
        let mut formals = Vec::new();
        let unit = self.unit;
        let mut tree = unit.entries_tree(Some(die.offset()))?;
        let mut children = tree.root()?.children();
        // Walk all arguments until we run into the function body.
        while let Some(node) = children.next()? {
            let child = node.entry();
            match child.tag() {
                gimli::DW_TAG_formal_parameter => {
                    let arg_name = self.die_name(child)?;
                    let inner = self.emit_type(child)?;
                    formals.push(Obj::var(arg_name, inner));
                }
                gimli::DW_TAG_unspecified_parameters => {
                    formals.push(Obj::var(None, Obj::base("...".to_string())));
                }
                _ => break,
            }
        }
        let ret = self.emit_type(die)?;
        let mut func = Obj::func(name, ret);
        func.members = formals;
        Ok(func)
    }

    /// Multi-dimensional arrays right-associate over the element type.
    fn emit_array(&mut self, die: &Die<'_, 'd>) -> Result<Obj> {
        let unit = self.unit;
        let mut indices = Vec::new();
        let mut tree = unit.entries_tree(Some(die.offset()))?;
        let mut children = tree.root()?.children();
        while let Some(node) = children.next()? {
            let child = node.entry();
            if child.tag() != gimli::DW_TAG_subrange_type {
                bail!("Unexpected tag for array type children: {}", child.tag());
            }
            let index = if let Some(value) = child.attr_value(gimli::DW_AT_upper_bound)? {
                match value {
                    // A flexible array member encodes an unknown bound.
                    AttributeValue::Sdata(bound) if bound < 0 => 0,
                    value => value.udata_value().map(|v| v + 1).unwrap_or(0),
                }
            } else if let Some(value) = child.attr_value(gimli::DW_AT_count)? {
                value.udata_value().unwrap_or(0)
            } else {
                0
            };
            indices.push(index);
        }
        if indices.is_empty() {
            bail!("Array type missing children!");
        }
        let element = self.emit_type(die)?;
        Ok(indices
            .into_iter()
            .rev()
            .fold(element, |element, index| Obj::array(index, element)))
    }
}
