// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A latched signal.
//!
//! A value written to a [`Signal`] during the evaluate phase of a cycle is only
//! visible to readers once the signal has been committed. This models a wire
//! driven by a register: consumers always see the value from the previous
//! cycle.

#[derive(Clone, Debug)]
pub struct Signal<T> {
    current: T,
    staged: Option<T>,
    event: bool,
}

impl<T> Signal<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            current: initial,
            staged: None,
            event: false,
        }
    }

    /// Stage a value. A later write in the same cycle replaces it.
    pub fn write(&mut self, value: T) {
        self.staged = Some(value);
    }

    /// The value that was committed most recently.
    #[must_use]
    pub fn read(&self) -> &T {
        &self.current
    }

    /// Whether the last commit carried a write, even of an unchanged value.
    #[must_use]
    pub fn event(&self) -> bool {
        self.event
    }

    /// Whether a value is staged for the next commit.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.staged.is_some()
    }

    pub fn commit(&mut self) {
        match self.staged.take() {
            Some(value) => {
                self.current = value;
                self.event = true;
            }
            None => self.event = false,
        }
    }
}

impl<T: Default> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
