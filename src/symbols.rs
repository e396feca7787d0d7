use std::collections::HashMap;

use tracing::debug;

use crate::{
    ast::{ConstVal, NodeId},
    types::{ScalarType, Type, SLOT_SIZE},
    util::intern::Name,
};

/// Offset from the frame pointer of the first local slot. The two slots above
/// it hold the return address and the caller's frame pointer.
pub const FIRST_LOCAL_OFFSET: i32 = -12;

const FRAME_ALIGN: u32 = 16;

/// Largest object, and largest activation record, that the generated code
/// can address: the largest aligned size a signed 32-bit offset reaches.
pub const MAX_STORAGE_SIZE: u32 = 0x7fff_fff0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Program,
    Function,
    Parameter,
    Variable,
    LoopVar,
    Constant,
}

impl SymbolKind {
    pub const fn name(self) -> &'static str {
        match self {
            SymbolKind::Program => "program",
            SymbolKind::Function => "function",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Variable => "variable",
            SymbolKind::LoopVar => "loop_var",
            SymbolKind::Constant => "constant",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Attribute {
    None,
    Constant(ConstVal),
    Parameters(Vec<Type>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymbolEntry {
    pub name: Name,
    pub kind: SymbolKind,
    pub level: usize,
    pub ty: Type,
    pub attribute: Attribute,
    /// Set when the declaration itself was erroneous. References to such a
    /// symbol resolve to an unknown type without further diagnostics.
    pub decl_err: bool,
    /// Frame-pointer relative offset for locals. Zero for globals.
    pub offset: i32,
}

impl SymbolEntry {
    pub fn is_global(&self) -> bool {
        self.level == 0
    }

    pub fn parameters(&self) -> &[Type] {
        match &self.attribute {
            Attribute::Parameters(types) => types,
            _ => &[],
        }
    }
}

/// Symbols declared in one scope, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    pub fn find(&self, name: Name) -> Option<&SymbolEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn starts_with_loop_var(&self) -> bool {
        self.entries
            .first()
            .is_some_and(|entry| entry.kind == SymbolKind::LoopVar)
    }
}

/// Tables produced by analysis, keyed by the node that opened each scope, along
/// with the frame size of every activation.
#[derive(Debug, Default)]
pub struct ScopeMap {
    tables: HashMap<NodeId, SymbolTable>,
    frames: HashMap<NodeId, u32>,
}

impl ScopeMap {
    pub fn archive(&mut self, id: NodeId, table: SymbolTable) {
        debug!(?id, entries = table.len(), "archived scope");
        let prev = self.tables.insert(id, table);
        debug_assert!(prev.is_none(), "scope {id:?} archived twice");
    }

    pub fn get(&self, id: NodeId) -> Option<&SymbolTable> {
        self.tables.get(&id)
    }

    /// Removes the table so it can be re-entered. Panics if it was never
    /// archived.
    pub fn take(&mut self, id: NodeId) -> SymbolTable {
        self.tables
            .remove(&id)
            .unwrap_or_else(|| panic!("no symbol table archived for {id:?}"))
    }

    pub fn record_frame(&mut self, id: NodeId, size: u32) {
        self.frames.insert(id, size);
    }

    pub fn frame_size(&self, id: NodeId) -> u32 {
        *self
            .frames
            .get(&id)
            .unwrap_or_else(|| panic!("no frame recorded for {id:?}"))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Tracks the next free slot of one activation record.
#[derive(Debug)]
struct Frame {
    next: i64,
}

impl Frame {
    fn new() -> Frame {
        Frame {
            next: i64::from(FIRST_LOCAL_OFFSET),
        }
    }

    /// Reserves `width` bytes, returning the offset of the lowest address, or
    /// `None` if the frame would grow past [`MAX_STORAGE_SIZE`].
    fn allocate(&mut self, width: u32) -> Option<i32> {
        let offset = self.next - (i64::from(width) - i64::from(SLOT_SIZE));
        let next = offset - i64::from(SLOT_SIZE);
        if aligned_frame_size(next) > u64::from(MAX_STORAGE_SIZE) {
            return None;
        }
        self.next = next;
        i32::try_from(offset).ok()
    }

    /// Bytes used below the frame pointer, including the saved registers,
    /// rounded up to the stack alignment.
    fn size(&self) -> u32 {
        u32::try_from(aligned_frame_size(self.next)).expect("frame size checked on allocation")
    }
}

fn aligned_frame_size(next: i64) -> u64 {
    let used = u64::try_from(-next - i64::from(SLOT_SIZE)).unwrap_or(0);
    let align = u64::from(FRAME_ALIGN);
    used.next_multiple_of(align).max(align)
}

/// Stack of open scopes, innermost last.
#[derive(Debug, Default)]
pub struct SymbolManager {
    tables: Vec<SymbolTable>,
    return_types: Vec<ScalarType>,
    frames: Vec<Frame>,
}

impl SymbolManager {
    /// Nesting level of the innermost scope. The global scope is level 0.
    ///
    /// Panics if no scope is open.
    pub fn level(&self) -> usize {
        self.tables.len().checked_sub(1).expect("no open scope")
    }

    pub fn push_scope(&mut self, table: SymbolTable) {
        self.tables.push(table);
        debug!(level = self.level(), entries = self.current().len(), "entered scope");
    }

    pub fn pop_scope(&mut self) -> SymbolTable {
        let level = self.level();
        let table = self.tables.pop().expect("no open scope");
        debug!(level, entries = table.len(), "left scope");
        table
    }

    pub fn current(&self) -> &SymbolTable {
        self.tables.last().expect("no open scope")
    }

    fn current_mut(&mut self) -> &mut SymbolTable {
        self.tables.last_mut().expect("no open scope")
    }

    /// Looks the name up from the innermost scope outwards.
    pub fn find(&self, name: Name) -> Option<&SymbolEntry> {
        self.tables.iter().rev().find_map(|table| table.find(name))
    }

    /// Whether declaring `name` in the current scope would clash. A name
    /// clashes with the current scope and with any enclosing loop variable.
    pub fn is_redeclared(&self, name: Name) -> bool {
        let Some((current, outer)) = self.tables.split_last() else {
            return false;
        };
        current.find(name).is_some()
            || outer
                .iter()
                .any(|table| table.starts_with_loop_var() && table.find(name).is_some())
    }

    /// Appends a symbol to the current scope, reserving stack space for it
    /// when it is local.
    ///
    /// Fails when the symbol's storage would exceed [`MAX_STORAGE_SIZE`]. The
    /// entry is still declared, but marked as erroneous.
    ///
    /// Panics if a local is declared outside of any activation.
    pub fn push_entry(
        &mut self,
        name: Name,
        kind: SymbolKind,
        ty: Type,
        attribute: Attribute,
    ) -> Result<(), ()> {
        let level = self.level();
        let size = ty.byte_size().filter(|&size| size <= MAX_STORAGE_SIZE);
        let offset = if level == 0 || matches!(kind, SymbolKind::Program | SymbolKind::Function) {
            Some(0)
        } else {
            // Array parameters are passed by reference.
            let by_reference = kind == SymbolKind::Parameter && ty.is_array();
            let width = size.map(|size| if by_reference { SLOT_SIZE } else { size });
            let frame = self.frames.last_mut().expect("local declared outside of a frame");
            width.and_then(|width| frame.allocate(width))
        };
        let fits = size.is_some() && offset.is_some();
        let offset = offset.unwrap_or(0);

        debug!(level, ?kind, offset, fits, "declared symbol");
        self.current_mut().entries.push(SymbolEntry {
            name,
            kind,
            level,
            ty,
            attribute,
            decl_err: !fits,
            offset,
        });
        if fits {
            Ok(())
        } else {
            Err(())
        }
    }

    /// Marks the most recently declared symbol as erroneous.
    pub fn set_current_entry_decl_err(&mut self) {
        if let Some(entry) = self.current_mut().entries.last_mut() {
            entry.decl_err = true;
        }
    }

    pub fn push_return_type(&mut self, ty: ScalarType) {
        self.return_types.push(ty);
    }

    pub fn pop_return_type(&mut self) {
        self.return_types.pop();
    }

    /// Return type expected by the innermost routine.
    pub fn return_type(&self) -> ScalarType {
        self.return_types.last().copied().unwrap_or(ScalarType::Void)
    }

    /// Opens a new activation record.
    pub fn enter_frame(&mut self) {
        self.frames.push(Frame::new());
    }

    /// Closes the innermost activation record, returning its size in bytes.
    pub fn exit_frame(&mut self) -> u32 {
        let size = self.frames.pop().expect("no open frame").size();
        debug!(size, "frame closed");
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::intern::Interner;
    use pretty_assertions::assert_eq;

    fn declare(m: &mut SymbolManager, name: Name, kind: SymbolKind, ty: Type) -> Result<(), ()> {
        m.push_entry(name, kind, ty, Attribute::None)
    }

    #[test]
    fn lookup_prefers_innermost_scope() {
        let mut names = Interner::default();
        let (x, y) = (names.intern("x"), names.intern("y"));
        let mut m = SymbolManager::default();

        m.push_scope(SymbolTable::default());
        declare(&mut m, x, SymbolKind::Variable, Type::INTEGER).unwrap();
        m.enter_frame();
        m.push_scope(SymbolTable::default());
        declare(&mut m, x, SymbolKind::Variable, Type::REAL).unwrap();
        declare(&mut m, y, SymbolKind::Variable, Type::BOOLEAN).unwrap();

        assert_eq!(m.find(x).unwrap().ty, Type::REAL);
        assert_eq!(m.find(x).unwrap().level, 1);
        let inner = m.pop_scope();
        assert_eq!(inner.len(), 2);

        assert_eq!(m.find(x).unwrap().ty, Type::INTEGER);
        assert!(m.find(y).is_none());
        assert!(m.find(x).unwrap().is_global());
    }

    #[test]
    fn loop_variables_clash_with_inner_declarations() {
        let mut names = Interner::default();
        let (i, j) = (names.intern("i"), names.intern("j"));
        let mut m = SymbolManager::default();
        m.push_scope(SymbolTable::default());
        m.enter_frame();
        m.push_scope(SymbolTable::default());
        declare(&mut m, j, SymbolKind::Variable, Type::INTEGER).unwrap();
        m.push_scope(SymbolTable::default());
        declare(&mut m, i, SymbolKind::LoopVar, Type::INTEGER).unwrap();
        m.push_scope(SymbolTable::default());

        assert!(m.is_redeclared(i));
        // Ordinary outer variables may be shadowed.
        assert!(!m.is_redeclared(j));
    }

    #[test]
    fn offsets_account_for_array_sizes() {
        let mut names = Interner::default();
        let (a, b, c, p) = (
            names.intern("a"),
            names.intern("b"),
            names.intern("c"),
            names.intern("p"),
        );
        let mut m = SymbolManager::default();
        m.push_scope(SymbolTable::default());
        m.enter_frame();
        m.push_scope(SymbolTable::default());
        let vector = Type::array(ScalarType::Integer, [5]);
        let matrix = Type::array(ScalarType::Real, [2, 3]);
        declare(&mut m, p, SymbolKind::Parameter, vector).unwrap();
        declare(&mut m, a, SymbolKind::Variable, Type::INTEGER).unwrap();
        declare(&mut m, b, SymbolKind::Variable, matrix).unwrap();
        declare(&mut m, c, SymbolKind::Variable, Type::INTEGER).unwrap();

        let offsets: Vec<_> = m.current().entries().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, [-12, -16, -40, -44]);
        m.pop_scope();
        assert_eq!(m.exit_frame(), 48);
    }

    #[test]
    fn empty_frame_is_sixteen_bytes() {
        let mut m = SymbolManager::default();
        m.enter_frame();
        assert_eq!(m.exit_frame(), 16);
    }

    #[test]
    fn storage_beyond_the_addressable_limit_is_refused() {
        let mut names = Interner::default();
        let (g, l, a, b, c, x) = (
            names.intern("g"),
            names.intern("l"),
            names.intern("a"),
            names.intern("b"),
            names.intern("c"),
            names.intern("x"),
        );
        let huge = Type::array(ScalarType::Integer, [70_000, 70_000]);
        let large = Type::array(ScalarType::Integer, [200_000_000]);
        let mut m = SymbolManager::default();

        m.push_scope(SymbolTable::default());
        assert_eq!(declare(&mut m, g, SymbolKind::Variable, huge.clone()), Err(()));
        assert!(m.find(g).unwrap().decl_err);

        m.enter_frame();
        m.push_scope(SymbolTable::default());
        assert_eq!(declare(&mut m, l, SymbolKind::Variable, huge.clone()), Err(()));
        assert_eq!(m.find(l).unwrap().offset, 0);
        // Each array fits on its own, but the third overflows the frame.
        declare(&mut m, a, SymbolKind::Variable, large.clone()).unwrap();
        declare(&mut m, b, SymbolKind::Variable, large.clone()).unwrap();
        assert_eq!(declare(&mut m, c, SymbolKind::Variable, large), Err(()));
        // A refused allocation leaves the frame untouched.
        declare(&mut m, x, SymbolKind::Variable, Type::INTEGER).unwrap();
        assert_eq!(m.find(x).unwrap().offset, -1_600_000_012);
        // Array parameters only hold an address, but their type must still fit.
        assert_eq!(declare(&mut m, x, SymbolKind::Parameter, huge), Err(()));

        m.pop_scope();
        assert_eq!(m.exit_frame(), 1_600_000_016);
    }

    #[test]
    fn scope_map_round_trips_tables() {
        let mut names = Interner::default();
        let mut m = SymbolManager::default();
        m.push_scope(SymbolTable::default());
        declare(&mut m, names.intern("g"), SymbolKind::Variable, Type::INTEGER).unwrap();
        let table = m.pop_scope();

        let mut scopes = ScopeMap::default();
        scopes.archive(NodeId(7), table.clone());
        scopes.record_frame(NodeId(7), 32);
        assert_eq!(scopes.get(NodeId(7)), Some(&table));
        assert_eq!(scopes.frame_size(NodeId(7)), 32);
        assert_eq!(scopes.take(NodeId(7)), table);
        assert!(scopes.is_empty());
    }
}
