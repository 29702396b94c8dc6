//! Allocation event tracing.
//!
//! Writes one whitespace-separated line per event:
//!
//! ```text
//! m <addr> <len>    page region mapped
//! u <addr> <len>    page region unmapped
//! a <addr> <size>   object allocated
//! f <addr> <size>   object freed
//! ```
//!
//! Addresses are printed as unsigned integers. The writer is shared between
//! the page provider (`m`/`u` events) and the workload harness (`a`/`f`
//! events); the model is single-threaded, so an `Rc<RefCell<_>>` handle is
//! enough.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write as _};
use std::path::Path;
use std::rc::Rc;

/// Shared handle to a trace writer.
pub type TraceHandle = Rc<RefCell<TraceWriter>>;

/// Buffered writer for allocation event traces.
#[derive(Debug)]
pub struct TraceWriter {
    out: BufWriter<File>,
}

impl TraceWriter {
    /// Creates a trace file at `path`, truncating any existing file.
    pub fn create(path: &Path) -> io::Result<TraceHandle> {
        let file = File::create(path)?;
        Ok(Rc::new(RefCell::new(Self {
            out: BufWriter::new(file),
        })))
    }

    /// Records a page region mapped from the system.
    pub fn mapped(&mut self, addr: usize, len: usize) {
        self.event('m', addr, len);
    }

    /// Records a page region unmapped to the system.
    pub fn unmapped(&mut self, addr: usize, len: usize) {
        self.event('u', addr, len);
    }

    /// Records an object allocation.
    pub fn allocated(&mut self, addr: usize, size: usize) {
        self.event('a', addr, size);
    }

    /// Records an object free.
    pub fn freed(&mut self, addr: usize, size: usize) {
        self.event('f', addr, size);
    }

    fn event(&mut self, kind: char, addr: usize, len: usize) {
        // Trace output is best effort; a full disk must not alter the
        // benchmark control flow.
        let _ = writeln!(self.out, "{kind} {addr} {len}");
    }
}
