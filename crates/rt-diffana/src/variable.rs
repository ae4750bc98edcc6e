//! Live fill variables.
//!
//! The event loop owns a [`Variable`] and updates it per event; contexts keep
//! a non-owning [`VariableRef`] that is read when a factory proceeds.

use std::cell::Cell;
use std::rc::{Rc, Weak};

/// A shared `f64` cell written by the event loop.
#[derive(Debug, Clone, Default)]
pub struct Variable(Rc<Cell<f64>>);

impl Variable {
    /// New variable holding `value`.
    pub fn new(value: f64) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    /// Current value.
    pub fn get(&self) -> f64 {
        self.0.get()
    }

    /// Store a new value.
    pub fn set(&self, value: f64) {
        self.0.set(value);
    }

    /// Non-owning binding to this variable.
    pub fn bind(&self) -> VariableRef {
        VariableRef(Rc::downgrade(&self.0))
    }
}

/// Non-owning binding to a [`Variable`].
#[derive(Debug, Clone, Default)]
pub struct VariableRef(Weak<Cell<f64>>);

impl VariableRef {
    /// Current value, `None` once the variable has been dropped.
    pub fn get(&self) -> Option<f64> {
        self.0.upgrade().map(|c| c.get())
    }

    /// `true` while the bound variable is alive.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_reads_live_value() {
        let v = Variable::new(1.0);
        let r = v.bind();
        v.set(2.5);
        assert_eq!(r.get(), Some(2.5));
        drop(v);
        assert_eq!(r.get(), None);
        assert!(!r.is_alive());
        assert_eq!(VariableRef::default().get(), None);
    }
}
