use crate::console::Console;
use crate::error::Error;
use crate::heap::{Heap, HeapConfig};
use crate::reader::Reader;
use crate::value::Value;

/// The interpreter: heaps, reader state, console and trace switches.
///
/// [`Interp::repl`] is the top level; [`Interp::sread`] and
/// [`Interp::seval`] are usable directly for embedding.
pub struct Interp<C: Console> {
    pub(crate) heap: Heap,
    pub(crate) reader: Reader,
    pub(crate) console: C,
    /// Tracing is on while positive; inner evaluations decrement it so
    /// their own traffic stays quiet
    pub(crate) trace_switch: i32,
    pub(crate) trace_depth: i32,
}

impl<C: Console> Interp<C> {
    pub fn new(console: C) -> Result<Self, Error> {
        Self::with_config(console, HeapConfig::default())
    }

    pub fn with_config(console: C, config: HeapConfig) -> Result<Self, Error> {
        Ok(Self {
            heap: Heap::new(config)?,
            reader: Reader::new(),
            console,
            trace_switch: 0,
            trace_depth: 0,
        })
    }

    /// Seed the reader with `@path ` so a LISP-level library loads through
    /// the ordinary stream-switch machinery before the first prompt.
    pub fn boot(&mut self, path: &str) {
        self.reader.seed(&format!("@{path} "));
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[must_use]
    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn into_console(self) -> C {
        self.console
    }

    /// The read–eval–print loop. Returns cleanly on EXIT or end of input;
    /// everything else unwinds to here, resets the binding state and prints
    /// one `::` line.
    pub fn repl(&mut self) {
        loop {
            self.console.print("\n");
            self.reader.set_prompt(Some('*'));
            match self.rep() {
                Ok(()) => {}
                Err(Error::Eof | Error::Exit) => return,
                Err(Error::TopLevel) => self.recover(),
                Err(e) => {
                    self.recover();
                    self.console.print(&format!("::{e}\n"));
                }
            }
        }
    }

    fn rep(&mut self) -> Result<(), Error> {
        let expr = self.sread()?;
        let v = self.seval(expr)?;
        self.print_value(v);
        Ok(())
    }

    /// Put the interpreter back into a known-good top-level state: root
    /// holders emptied, every bind list unwound to its original value,
    /// trace depth cleared. The reader keeps its buffer and stream stack.
    pub(crate) fn recover(&mut self) {
        self.heap.reset_bindings();
        self.trace_depth = 0;
    }

    pub(crate) fn print_value(&mut self, v: Value) {
        let text = self.heap.swrite(v);
        self.console.print(&text);
    }
}
