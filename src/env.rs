//! Environments: chains of frames whose variables live in shared binding cells.
//!
//! A frame maps names to cells (`Rc<RefCell<Value>>`). Frames are reference counted and
//! shared by every closure and active evaluation that captured them, so updating a cell
//! through one holder is visible through all others. Every chain ends in a global frame.
//! The global frame is the only one that gains names after creation (through [`Env::define`]);
//! all other frames are created fully populated by [`Env::extend`] and keep the same names
//! for their whole life, only their cells' contents change.

use crate::Error;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// A binding cell: one mutable, independently addressable storage location
pub type Cell = Rc<RefCell<Value>>;

enum Frame {
    Global {
        cells: RefCell<HashMap<String, Cell>>,
    },
    Extended {
        names: Vec<String>,
        cells: Vec<Cell>,
        parent: Env,
    },
}

/// Handle on an environment chain, innermost frame first
///
/// Cloning an `Env` shares the frames; it never copies bindings.
#[derive(Clone)]
pub struct Env(Rc<Frame>);

impl Env {
    /// Create a new, empty global frame
    pub fn global() -> Self {
        Env(Rc::new(Frame::Global {
            cells: RefCell::new(HashMap::new()),
        }))
    }

    /// Create one new frame on top of this environment binding `names` to `values` positionally
    pub fn extend(&self, names: &[String], values: Vec<Value>) -> Result<Env, Error> {
        if names.len() != values.len() {
            return Err(Error::arity_mismatch(names.len(), values.len()));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(Error::DuplicateBinding(name.clone()));
            }
        }

        Ok(Env(Rc::new(Frame::Extended {
            names: names.to_vec(),
            cells: values
                .into_iter()
                .map(|value| Rc::new(RefCell::new(value)))
                .collect(),
            parent: self.clone(),
        })))
    }

    /// Find the cell bound to `name`, walking outward from the innermost frame
    pub fn lookup_cell(&self, name: &str) -> Result<Cell, Error> {
        let mut env = self;
        loop {
            match env.0.as_ref() {
                Frame::Extended {
                    names,
                    cells,
                    parent,
                } => {
                    if let Some(pos) = names.iter().position(|n| n == name) {
                        return Ok(Rc::clone(&cells[pos]));
                    }
                    env = parent;
                }
                Frame::Global { cells } => {
                    return cells
                        .borrow()
                        .get(name)
                        .cloned()
                        .ok_or_else(|| Error::UnboundVariable(name.to_owned()));
                }
            }
        }
    }

    /// Current value of `name`
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        let cell = self.lookup_cell(name)?;
        let value = cell.borrow().clone();
        Ok(value)
    }

    /// Overwrite the value in the existing cell for `name`, wherever in the chain it lives
    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let cell = self.lookup_cell(name)?;
        *cell.borrow_mut() = value;
        Ok(())
    }

    /// Insert `name` into the global frame at the root of this chain, or overwrite its cell
    /// in place when it is already defined there
    pub fn define(&self, name: &str, value: Value) {
        let Frame::Global { cells } = self.root().0.as_ref() else {
            unreachable!("environment chains always end in a global frame");
        };
        let mut cells = cells.borrow_mut();
        if let Some(cell) = cells.get(name) {
            *cell.borrow_mut() = value;
        } else {
            cells.insert(name.to_owned(), Rc::new(RefCell::new(value)));
        }
    }

    /// The global frame this chain is rooted in
    pub fn root(&self) -> &Env {
        let mut env = self;
        while let Frame::Extended { parent, .. } = env.0.as_ref() {
            env = parent;
        }
        env
    }

    /// Cells of the innermost frame, in binding order (global frame: sorted by name)
    pub fn frame_cells(&self) -> Vec<Cell> {
        match self.0.as_ref() {
            Frame::Extended { cells, .. } => cells.clone(),
            Frame::Global { cells } => {
                let cells = cells.borrow();
                let mut entries: Vec<_> = cells.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                entries.into_iter().map(|(_, cell)| Rc::clone(cell)).collect()
            }
        }
    }

    /// Names bound by the innermost frame, in binding order (global frame: sorted)
    pub fn frame_names(&self) -> Vec<String> {
        match self.0.as_ref() {
            Frame::Extended { names, .. } => names.clone(),
            Frame::Global { cells } => {
                let mut names: Vec<String> = cells.borrow().keys().cloned().collect();
                names.sort();
                names
            }
        }
    }

    /// Get all visible bindings, inner frames shadowing outer ones
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();
        let mut env = self;
        loop {
            match env.0.as_ref() {
                Frame::Extended {
                    names,
                    cells,
                    parent,
                } => {
                    for (name, cell) in names.iter().zip(cells) {
                        bindings
                            .entry(name.clone())
                            .or_insert_with(|| cell.borrow().clone());
                    }
                    env = parent;
                }
                Frame::Global { cells } => {
                    for (name, cell) in cells.borrow().iter() {
                        bindings
                            .entry(name.clone())
                            .or_insert_with(|| cell.borrow().clone());
                    }
                    break;
                }
            }
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Drop every binding of the global frame at the root of this chain.
    ///
    /// Closures stored in the global frame capture the global frame itself; clearing it
    /// breaks that reference cycle when a run ends.
    pub(crate) fn clear_global(&self) {
        if let Frame::Global { cells } = self.root().0.as_ref() {
            let drained: Vec<Cell> = cells.borrow_mut().drain().map(|(_, cell)| cell).collect();
            // Values are dropped after the frame borrow ends; they may reach this frame again.
            drop(drained);
        }
    }

    /// Reset every cell of the innermost frame to [`Value::Undefined`]
    pub(crate) fn clear_frame(&self) {
        let released: Vec<Value> = self
            .frame_cells()
            .iter()
            .map(|cell| cell.replace(Value::Undefined))
            .collect();
        drop(released);
    }

    /// A handle that does not keep the innermost frame alive
    pub fn downgrade(&self) -> WeakEnv {
        WeakEnv(Rc::downgrade(&self.0))
    }

    /// Whether both handles share the same innermost frame
    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of frames in the chain, the global frame included
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut env = self;
        while let Frame::Extended { parent, .. } = env.0.as_ref() {
            depth += 1;
            env = parent;
        }
        depth
    }
}

/// Non-owning handle on a frame
#[derive(Clone)]
pub struct WeakEnv(Weak<Frame>);

impl WeakEnv {
    pub fn upgrade(&self) -> Option<Env> {
        self.0.upgrade().map(Env)
    }

    /// Whether some closure or evaluation still holds the frame
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEnv")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl PartialEq for Env {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// Values in cells are not printed: they can refer back to this very frame
impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("frame", &self.frame_names())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::value::val;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_lookup_walks_outward_and_inner_shadows() {
        let global = Env::global();
        global.define("x", val(1));
        global.define("y", val(2));

        let inner = global.extend(&names(&["x"]), vec![val(10)]).unwrap();
        assert_eq!(inner.lookup("x").unwrap(), val(10));
        assert_eq!(inner.lookup("y").unwrap(), val(2));
        assert_eq!(global.lookup("x").unwrap(), val(1));
        assert_eq!(
            inner.lookup("z"),
            Err(Error::UnboundVariable("z".to_owned()))
        );
    }

    #[test]
    fn test_extend_rejects_mismatched_lengths_and_duplicates() {
        let global = Env::global();
        assert_eq!(
            global.extend(&names(&["a", "b"]), vec![val(1)]).unwrap_err(),
            Error::arity_mismatch(2, 1)
        );
        assert_eq!(
            global
                .extend(&names(&["a", "a"]), vec![val(1), val(2)])
                .unwrap_err(),
            Error::DuplicateBinding("a".to_owned())
        );
        assert!(global.extend(&[], vec![]).is_ok());
    }

    #[test]
    fn test_set_mutates_the_cell_it_finds() {
        let global = Env::global();
        global.define("counter", val(0));
        let outer = global.extend(&names(&["n"]), vec![val(1)]).unwrap();
        let inner = outer.extend(&names(&["m"]), vec![val(2)]).unwrap();

        let cell_before = inner.lookup_cell("n").unwrap();
        inner.set("n", val(5)).unwrap();
        inner.set("counter", val(7)).unwrap();

        // Same cell, updated in place; no new local binding appeared
        assert!(Rc::ptr_eq(&cell_before, &outer.lookup_cell("n").unwrap()));
        assert_eq!(outer.lookup("n").unwrap(), val(5));
        assert_eq!(global.lookup("counter").unwrap(), val(7));
        assert_eq!(inner.frame_names(), names(&["m"]));

        assert_eq!(
            inner.set("missing", val(1)),
            Err(Error::UnboundVariable("missing".to_owned()))
        );
    }

    #[test]
    fn test_define_targets_the_global_frame_and_keeps_the_cell() {
        let global = Env::global();
        let inner = global.extend(&names(&["a"]), vec![val(1)]).unwrap();

        inner.define("late", val(1));
        assert_eq!(global.lookup("late").unwrap(), val(1));
        assert_eq!(inner.frame_names(), names(&["a"]));

        let cell = global.lookup_cell("late").unwrap();
        global.define("late", val(2));
        assert!(Rc::ptr_eq(&cell, &global.lookup_cell("late").unwrap()));
        assert_eq!(*cell.borrow(), val(2));
    }

    #[test]
    fn test_shared_frames_observe_each_others_mutations() {
        let global = Env::global();
        let frame = global.extend(&names(&["x"]), vec![val(1)]).unwrap();
        let alias = frame.clone();
        alias.set("x", val(2)).unwrap();
        assert_eq!(frame.lookup("x").unwrap(), val(2));
        assert_eq!(frame, alias);
        assert!(frame.root().ptr_eq(&global));
        assert_eq!(frame.depth(), 2);
    }

    #[test]
    fn test_get_all_bindings_and_clear() {
        let global = Env::global();
        global.define("b", val(2));
        global.define("a", val(1));
        let inner = global.extend(&names(&["a"]), vec![val(10)]).unwrap();

        assert_eq!(
            inner.get_all_bindings(),
            vec![("a".to_owned(), val(10)), ("b".to_owned(), val(2))]
        );
        assert_eq!(global.frame_names(), names(&["a", "b"]));

        inner.clear_global();
        assert!(global.frame_names().is_empty());
        assert_eq!(inner.lookup("a").unwrap(), val(10));
    }

    #[test]
    fn test_clear_frame_keeps_names_and_releases_values() {
        let global = Env::global();
        let frame = global
            .extend(&names(&["f", "g"]), vec![val(1), val(2)])
            .unwrap();
        let weak = frame.downgrade();
        assert!(weak.upgrade().is_some_and(|env| env.ptr_eq(&frame)));

        frame.clear_frame();
        assert_eq!(frame.frame_names(), names(&["f", "g"]));
        assert_eq!(frame.lookup("g").unwrap(), Value::Undefined);

        drop(frame);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }
}
