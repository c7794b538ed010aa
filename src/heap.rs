use log::debug;

use crate::builtin::Builtin;
use crate::error::Error;
use crate::value::{Tag, Value};

/// Sizes of the three fixed tables.
#[derive(Debug, Clone, Copy)]
pub struct HeapConfig {
    /// Atom table slots
    pub atoms: usize,
    /// Number table slots
    pub numbers: usize,
    /// List area cells (cell 0 is reserved)
    pub cells: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            atoms: 1000,
            numbers: 1000,
            cells: 6000,
        }
    }
}

/// An atom table slot. A slot is free iff its name is empty.
struct AtomSlot {
    name: String,
    /// Current (shallow) value
    value: Value,
    /// Bind list: saved prior values, most recently shadowed first
    bind: Value,
    /// Property list
    plist: Value,
}

/// A number table slot: a stored number, or a link in the free list.
#[derive(Clone, Copy)]
enum NumSlot {
    Free { next: Option<u32> },
    Used(f64),
}

#[derive(Clone, Copy)]
struct Cell {
    car: Value,
    cdr: Value,
}

/// The three fixed heaps and the collector over them.
///
/// The atom table is the sole root set: every live cell and number is
/// reachable by chasing value, bind list or property list from some atom.
/// Callers that hold a value across a possible allocation publish it through
/// one of the root-holder atoms (`currentin`, `eaL`, `sreadlist`) or pass it
/// as an extra root to [`Heap::collect`].
pub struct Heap {
    atoms: Box<[AtomSlot]>,

    numbers: Box<[NumSlot]>,
    /// Open-addressed hash index over `numbers`
    nx: Box<[Option<u32>]>,
    nmark: Box<[bool]>,
    /// Occupied number slots
    nnums: usize,
    /// Number free-list head
    nf: Option<u32>,

    cells: Box<[Cell]>,
    cell_marks: Box<[bool]>,
    /// Cell free-list head; 0 is the reserved cell and doubles as "empty"
    fp: usize,
    /// Free cell count
    numf: usize,

    pub nil: Value,
    pub t: Value,
    pub quote: Value,
    currentin: usize,
    eal: usize,
    sread_root: usize,
}

impl Heap {
    pub fn new(config: HeapConfig) -> Result<Self, Error> {
        // floors keep the seed atoms installable and the hashes well-defined
        let m = config.atoms.max(64);
        let n = config.numbers.max(16);
        let l = config.cells.max(16);

        let placeholder = Value::undef(0);
        let atoms = (0..m)
            .map(|_| AtomSlot {
                name: String::new(),
                value: placeholder,
                bind: placeholder,
                plist: placeholder,
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let mut heap = Self {
            atoms,
            numbers: vec![NumSlot::Free { next: None }; n].into_boxed_slice(),
            nx: vec![None; n].into_boxed_slice(),
            nmark: vec![false; n].into_boxed_slice(),
            nnums: 0,
            nf: None,
            cells: vec![Cell { car: placeholder, cdr: placeholder }; l].into_boxed_slice(),
            cell_marks: vec![false; l].into_boxed_slice(),
            fp: 0,
            numf: 0,
            nil: placeholder,
            t: placeholder,
            quote: placeholder,
            currentin: 0,
            eal: 0,
            sread_root: 0,
        };

        for i in 0..n {
            heap.numbers[i] = NumSlot::Free { next: heap.nf };
            heap.nf = Some(i as u32);
        }
        for i in 1..l {
            heap.cells[i].cdr = Value::pair(heap.fp as u32);
            heap.fp = i;
        }
        heap.numf = l - 1;

        let nil = heap.intern("NIL")?;
        heap.nil = nil;
        let slot = &mut heap.atoms[nil.index()];
        slot.value = nil;
        slot.bind = nil;
        slot.plist = nil;

        let t = heap.intern("T")?;
        heap.t = t;
        heap.atoms[t.index()].value = t;

        heap.quote = heap.intern("QUOTE")?;

        for b in Builtin::ALL {
            let a = heap.intern(b.name())?;
            heap.atoms[a.index()].value = Value::new(b.tag(), b as u32);
        }

        // lowercase names keep the root holders out of the user's namespace
        heap.currentin = heap.intern("currentin")?.index();
        heap.atoms[heap.currentin].value = nil;
        heap.eal = heap.intern("eaL")?.index();
        heap.atoms[heap.eal].value = nil;
        heap.sread_root = heap.intern("sreadlist")?.index();
        heap.atoms[heap.sread_root].value = nil;

        debug!("heap: {m} atom slots, {n} number slots, {l} cells");
        Ok(heap)
    }

    // ---- atom table ----

    fn hash_name(name: &str, m: usize) -> usize {
        let b = name.as_bytes();
        let key = ((b[0] as usize) << 16) + ((b[b.len() - 1] as usize) << 8) + b.len();
        key % m
    }

    /// Look up or install an ordinary atom; fresh atoms start undefined.
    pub fn intern(&mut self, name: &str) -> Result<Value, Error> {
        debug_assert!(!name.is_empty());
        let m = self.atoms.len();
        let start = Self::hash_name(name, m);
        let mut j = start;
        while !self.atoms[j].name.is_empty() {
            if self.atoms[j].name == name {
                return Ok(Value::atom(j as u32));
            }
            j += 1;
            if j == m {
                j = 0;
            }
            if j == start {
                return Err(Error::AtomTableFull);
            }
        }
        let slot = &mut self.atoms[j];
        slot.name = name.to_owned();
        slot.value = Value::undef(j as u32);
        slot.bind = self.nil;
        slot.plist = self.nil;
        Ok(Value::atom(j as u32))
    }

    #[must_use]
    pub fn atom_name(&self, j: usize) -> &str {
        &self.atoms[j].name
    }

    #[must_use]
    pub fn atom_value(&self, j: usize) -> Value {
        self.atoms[j].value
    }

    pub fn set_atom_value(&mut self, j: usize, v: Value) {
        self.atoms[j].value = v;
    }

    #[must_use]
    pub fn atom_bind(&self, j: usize) -> Value {
        self.atoms[j].bind
    }

    #[must_use]
    pub fn plist(&self, j: usize) -> Value {
        self.atoms[j].plist
    }

    pub fn set_plist(&mut self, j: usize, v: Value) {
        self.atoms[j].plist = v;
    }

    /// Push the current value on the bind list and install `v`.
    pub fn shadow(&mut self, j: usize, v: Value) -> Result<(), Error> {
        let old = self.atoms[j].value;
        let bind = self.atoms[j].bind;
        let cell = self.cons(old, bind)?;
        self.atoms[j].bind = cell;
        self.atoms[j].value = v;
        Ok(())
    }

    /// Pop the bind list head back into the value.
    pub fn unshadow(&mut self, j: usize) {
        let bind = self.atoms[j].bind;
        debug_assert_ne!(bind, self.nil);
        self.atoms[j].value = self.car(bind);
        self.atoms[j].bind = self.cdr(bind);
    }

    // ---- number table ----

    fn hash_num(x: f64, n: usize) -> usize {
        // high word of the IEEE-754 representation, sign masked
        (((x.to_bits() >> 32) as u32 & 0x7fff_ffff) as usize) % n
    }

    /// Look up or install a number atom. Numbers compare by bit pattern
    /// (NaN is canonicalized first, so it interns to a single slot).
    pub fn number(&mut self, x: f64) -> Result<Value, Error> {
        let x = if x.is_nan() { f64::NAN } else { x };
        let n = self.numbers.len();
        if self.nnums * 5 >= n * 4 {
            self.collect(&[]);
        }
        let start = Self::hash_num(x, n);
        let mut j = start;
        while let Some(s) = self.nx[j] {
            if let NumSlot::Used(y) = self.numbers[s as usize] {
                if y.to_bits() == x.to_bits() {
                    return Ok(Value::number(s));
                }
            }
            j += 1;
            if j == n {
                j = 0;
            }
            if j == start {
                return Err(Error::NumberTableFull);
            }
        }
        let Some(s) = self.nf else {
            return Err(Error::NumberTableFull);
        };
        if let NumSlot::Free { next } = self.numbers[s as usize] {
            self.nf = next;
        }
        self.nx[j] = Some(s);
        self.numbers[s as usize] = NumSlot::Used(x);
        self.nnums += 1;
        Ok(Value::number(s))
    }

    #[must_use]
    pub fn num(&self, v: Value) -> f64 {
        debug_assert_eq!(v.tag(), Tag::Number);
        match self.numbers[v.index()] {
            NumSlot::Used(x) => x,
            NumSlot::Free { .. } => 0.0,
        }
    }

    // ---- list area ----

    /// Allocate a cell. Exhaustion collects with `x` and `y` as extra roots
    /// and retries once.
    pub fn cons(&mut self, x: Value, y: Value) -> Result<Value, Error> {
        if self.fp == 0 {
            self.collect(&[x, y]);
            if self.fp == 0 {
                return Err(Error::OutOfSpace);
            }
        }
        let j = self.fp;
        self.fp = self.cells[j].cdr.index();
        self.cells[j] = Cell { car: x, cdr: y };
        self.numf -= 1;
        Ok(Value::pair(j as u32))
    }

    #[must_use]
    pub fn car(&self, v: Value) -> Value {
        debug_assert!(v.tag().carries_cell());
        self.cells[v.index()].car
    }

    #[must_use]
    pub fn cdr(&self, v: Value) -> Value {
        debug_assert!(v.tag().carries_cell());
        self.cells[v.index()].cdr
    }

    pub fn rplaca(&mut self, v: Value, x: Value) {
        debug_assert_eq!(v.tag(), Tag::Pair);
        self.cells[v.index()].car = x;
    }

    pub fn rplacd(&mut self, v: Value, y: Value) {
        debug_assert_eq!(v.tag(), Tag::Pair);
        self.cells[v.index()].cdr = y;
    }

    // ---- root-holder atoms ----

    fn push_root(&mut self, j: usize, v: Value) -> Result<(), Error> {
        let head = self.atoms[j].value;
        let cell = self.cons(v, head)?;
        self.atoms[j].value = cell;
        Ok(())
    }

    fn pop_root(&mut self, j: usize) {
        let head = self.atoms[j].value;
        self.atoms[j].value = self.cdr(head);
    }

    fn root_head(&self, j: usize) -> Value {
        self.car(self.atoms[j].value)
    }

    fn set_root_head(&mut self, j: usize, v: Value) {
        let head = self.atoms[j].value;
        self.rplaca(head, v);
    }

    pub fn push_current(&mut self, v: Value) -> Result<(), Error> {
        self.push_root(self.currentin, v)
    }

    pub fn set_current_head(&mut self, v: Value) {
        self.set_root_head(self.currentin, v);
    }

    pub fn pop_current(&mut self) {
        self.pop_root(self.currentin);
    }

    pub fn push_ea(&mut self) -> Result<(), Error> {
        self.push_root(self.eal, self.nil)
    }

    #[must_use]
    pub fn ea_head(&self) -> Value {
        self.root_head(self.eal)
    }

    pub fn set_ea_head(&mut self, v: Value) {
        self.set_root_head(self.eal, v);
    }

    pub fn pop_ea(&mut self) {
        self.pop_root(self.eal);
    }

    pub fn push_sread(&mut self) -> Result<(), Error> {
        self.push_root(self.sread_root, self.nil)
    }

    pub fn set_sread_head(&mut self, v: Value) {
        self.set_root_head(self.sread_root, v);
    }

    pub fn pop_sread(&mut self) {
        self.pop_root(self.sread_root);
    }

    /// Reset the root holders and unwind every bind list back to its
    /// original global value. Called by top-level error recovery.
    pub fn reset_bindings(&mut self) {
        self.atoms[self.currentin].value = self.nil;
        self.atoms[self.eal].value = self.nil;
        self.atoms[self.sread_root].value = self.nil;
        for j in 0..self.atoms.len() {
            if self.atoms[j].name.is_empty() {
                continue;
            }
            let mut bind = self.atoms[j].bind;
            if bind == self.nil {
                continue;
            }
            loop {
                let next = self.cdr(bind);
                if next == self.nil {
                    break;
                }
                bind = next;
            }
            self.atoms[j].value = self.car(bind);
            self.atoms[j].bind = self.nil;
        }
    }

    // ---- collector ----

    /// Mark-sweep over both heaps from the atom table, with `extra` as
    /// additional roots for values not yet published anywhere.
    pub fn collect(&mut self, extra: &[Value]) {
        let free_cells_before = self.numf;
        let live_numbers_before = self.nnums;

        let mut pending = Vec::with_capacity(64);
        for &v in extra {
            self.mark(v, &mut pending);
        }
        for j in 0..self.atoms.len() {
            if self.atoms[j].name.is_empty() {
                continue;
            }
            let (value, bind, plist) =
                (self.atoms[j].value, self.atoms[j].bind, self.atoms[j].plist);
            self.mark(value, &mut pending);
            self.mark(bind, &mut pending);
            self.mark(plist, &mut pending);
        }

        // numbers: rebuild the hash index over the marked slots, free the rest
        let n = self.numbers.len();
        self.nx.fill(None);
        self.nnums = 0;
        self.nf = None;
        for i in 0..n {
            if std::mem::take(&mut self.nmark[i]) {
                if let NumSlot::Used(x) = self.numbers[i] {
                    let mut t = Self::hash_num(x, n);
                    while self.nx[t].is_some() {
                        t += 1;
                        if t == n {
                            t = 0;
                        }
                    }
                    self.nx[t] = Some(i as u32);
                    self.nnums += 1;
                }
            } else {
                self.numbers[i] = NumSlot::Free { next: self.nf };
                self.nf = Some(i as u32);
            }
        }

        // cells: relink the unmarked ones
        self.fp = 0;
        self.numf = 0;
        for i in 1..self.cells.len() {
            if std::mem::take(&mut self.cell_marks[i]) {
                continue;
            }
            self.cells[i].cdr = Value::pair(self.fp as u32);
            self.fp = i;
            self.numf += 1;
        }

        debug!(
            "collect: reclaimed {} cells, {} numbers ({} cells free, {} numbers live)",
            self.numf - free_cells_before,
            live_numbers_before - self.nnums,
            self.numf,
            self.nnums,
        );
    }

    fn mark(&mut self, root: Value, pending: &mut Vec<Value>) {
        pending.push(root);
        while let Some(v) = pending.pop() {
            if v.tag() == Tag::Number {
                self.nmark[v.index()] = true;
            } else if v.tag().carries_cell() {
                let Some(flag) = self.cell_marks.get_mut(v.index()) else {
                    continue;
                };
                if !*flag {
                    *flag = true;
                    let cell = self.cells[v.index()];
                    pending.push(cell.car);
                    pending.push(cell.cdr);
                }
            }
        }
    }

    // ---- implementation-detail accessors, for debugging and invariant tests ----

    /// Free cell count as maintained by allocation and sweep.
    #[must_use]
    pub fn debug_free_cells(&self) -> usize {
        self.numf
    }

    /// Length of the cell free-list chain, walked; bounded by the area size
    /// so a cycle shows up as a mismatch with [`Self::debug_free_cells`].
    #[must_use]
    pub fn debug_free_chain_len(&self) -> usize {
        let mut count = 0;
        let mut p = self.fp;
        while p != 0 && count <= self.cells.len() {
            count += 1;
            p = self.cells[p].cdr.index();
        }
        count
    }

    /// Occupied number slots.
    #[must_use]
    pub fn debug_live_numbers(&self) -> usize {
        self.nnums
    }

    /// Length of the number free-list chain, walked.
    #[must_use]
    pub fn debug_free_numbers(&self) -> usize {
        let mut count = 0;
        let mut p = self.nf;
        while let Some(i) = p {
            if count > self.numbers.len() {
                break;
            }
            count += 1;
            p = match self.numbers[i as usize] {
                NumSlot::Free { next } => next,
                NumSlot::Used(_) => None,
            };
        }
        count
    }

    /// True when no atom has a shadowed binding.
    #[must_use]
    pub fn debug_bindings_clean(&self) -> bool {
        self.atoms
            .iter()
            .all(|a| a.name.is_empty() || a.bind == self.nil)
    }
}

#[cfg(test)]
fn small_heap() -> Heap {
    Heap::new(HeapConfig {
        atoms: 200,
        numbers: 32,
        cells: 64,
    })
    .unwrap()
}

#[test]
fn test_intern_idempotent() {
    let mut heap = small_heap();
    let a = heap.intern("ABC").unwrap();
    let b = heap.intern("ABC").unwrap();
    assert_eq!(a, b);
    assert_eq!(heap.atom_name(a.index()), "ABC");
    assert_eq!(heap.atom_value(a.index()), Value::undef(a.index() as u32));
    assert_ne!(heap.intern("ABD").unwrap(), a);
}

#[test]
fn test_special_atoms() {
    let heap = small_heap();
    assert_eq!(heap.atom_value(heap.nil.index()), heap.nil);
    assert_eq!(heap.atom_value(heap.t.index()), heap.t);
    // QUOTE carries its builtin special-form value
    let quote = heap.atom_value(heap.quote.index());
    assert_eq!(quote, Value::new(Tag::BuiltinForm, Builtin::Quote as u32));
}

#[test]
fn test_number_dedupe() {
    let mut heap = small_heap();
    let before = heap.debug_live_numbers();
    let a = heap.number(3.25).unwrap();
    assert_eq!(heap.debug_live_numbers(), before + 1);
    let b = heap.number(3.25).unwrap();
    assert_eq!(a, b);
    assert_eq!(heap.debug_live_numbers(), before + 1);
    assert_eq!(heap.num(a), 3.25);
}

#[test]
fn test_signed_zero_slots() {
    let mut heap = small_heap();
    let pos = heap.number(0.0).unwrap();
    let neg = heap.number(-0.0).unwrap();
    assert_ne!(pos, neg);
    assert_eq!(heap.debug_live_numbers(), 2);
}

#[test]
fn test_nan_single_slot() {
    let mut heap = small_heap();
    let a = heap.number(f64::NAN).unwrap();
    let b = heap.number(0.0f64 / 0.0f64).unwrap();
    assert_eq!(a, b);
    assert_eq!(heap.debug_live_numbers(), 1);
}

#[test]
fn test_cons_and_free_count() {
    let mut heap = small_heap();
    let free = heap.debug_free_cells();
    let nil = heap.nil;
    let p = heap.cons(nil, nil).unwrap();
    assert_eq!(heap.debug_free_cells(), free - 1);
    heap.rplaca(p, heap.t);
    assert_eq!(heap.car(p), heap.t);
    assert_eq!(heap.cdr(p), nil);
    assert_eq!(heap.debug_free_chain_len(), heap.debug_free_cells());
}

#[test]
fn test_collect_reclaims_garbage() {
    let mut heap = small_heap();
    let nil = heap.nil;
    let free = heap.debug_free_cells();
    for _ in 0..10 {
        heap.cons(nil, nil).unwrap();
    }
    assert_eq!(heap.debug_free_cells(), free - 10);
    heap.collect(&[]);
    assert_eq!(heap.debug_free_cells(), free);
    assert_eq!(heap.debug_free_chain_len(), free);
}

#[test]
fn test_collect_keeps_rooted_cells() {
    let mut heap = small_heap();
    let nil = heap.nil;
    let t = heap.t;
    let x = heap.intern("X").unwrap();
    let inner = heap.cons(t, nil).unwrap();
    let outer = heap.cons(inner, nil).unwrap();
    heap.set_atom_value(x.index(), outer);
    heap.collect(&[]);
    assert_eq!(heap.car(heap.car(heap.atom_value(x.index()))), t);
    // alloc after collect still works and the chain stays consistent
    heap.cons(nil, nil).unwrap();
    assert_eq!(heap.debug_free_chain_len(), heap.debug_free_cells());
}

#[test]
fn test_collect_rehashes_numbers() {
    let mut heap = small_heap();
    let x = heap.intern("X").unwrap();
    let kept = heap.number(42.0).unwrap();
    heap.set_atom_value(x.index(), kept);
    heap.number(7.5).unwrap();
    heap.number(8.5).unwrap();
    assert_eq!(heap.debug_live_numbers(), 3);
    heap.collect(&[]);
    assert_eq!(heap.debug_live_numbers(), 1);
    // the survivor is found again at its old slot through the rebuilt index
    assert_eq!(heap.number(42.0).unwrap(), kept);
    assert_eq!(heap.debug_live_numbers(), 1);
    assert_eq!(
        heap.debug_free_numbers(),
        heap.numbers.len() - heap.debug_live_numbers()
    );
}

#[test]
fn test_number_pressure_triggers_collect() {
    let mut heap = small_heap();
    // none of these are reachable, so the 80% trigger keeps reclaiming them
    for i in 0..200 {
        heap.number(i as f64 + 0.25).unwrap();
    }
}

#[test]
fn test_cons_pressure_collects_with_extra_roots() {
    let mut heap = small_heap();
    let nil = heap.nil;
    // unreachable pairs; allocation pressure must recycle them instead of failing
    for _ in 0..500 {
        heap.cons(nil, nil).unwrap();
    }
    // extra roots survive the collection that cons itself triggers
    let mut kept = heap.cons(heap.t, nil).unwrap();
    for _ in 0..40 {
        kept = heap.cons(kept, nil).unwrap();
    }
    let mut walk = kept;
    while heap.car(walk).tag() == Tag::Pair {
        walk = heap.car(walk);
    }
    assert_eq!(heap.car(walk), heap.t);
}

#[test]
fn test_shadow_unshadow() {
    let mut heap = small_heap();
    let x = heap.intern("X").unwrap();
    let j = x.index();
    let five = heap.number(5.0).unwrap();
    let six = heap.number(6.0).unwrap();
    heap.set_atom_value(j, five);
    heap.shadow(j, six).unwrap();
    assert_eq!(heap.atom_value(j), six);
    assert!(!heap.debug_bindings_clean());
    heap.unshadow(j);
    assert_eq!(heap.atom_value(j), five);
    assert!(heap.debug_bindings_clean());
}

#[test]
fn test_reset_bindings_restores_global() {
    let mut heap = small_heap();
    let x = heap.intern("X").unwrap();
    let j = x.index();
    let global = heap.number(1.0).unwrap();
    heap.set_atom_value(j, global);
    for i in 2..5 {
        let v = heap.number(i as f64).unwrap();
        heap.shadow(j, v).unwrap();
    }
    let p = heap.cons(heap.t, heap.nil).unwrap();
    heap.push_current(p).unwrap();
    heap.reset_bindings();
    assert_eq!(heap.atom_value(j), global);
    assert!(heap.debug_bindings_clean());
}

#[test]
fn test_root_holder_stack() {
    let mut heap = small_heap();
    let t = heap.t;
    heap.push_ea().unwrap();
    let cell = heap.cons(t, heap.nil).unwrap();
    heap.set_ea_head(cell);
    assert_eq!(heap.ea_head(), cell);
    heap.collect(&[]);
    assert_eq!(heap.car(heap.ea_head()), t);
    heap.pop_ea();
}
