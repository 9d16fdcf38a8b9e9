//! Working sets scheduling the nodes of fixpoint computations.

use crate::error::WorkingSetEmpty;
use crate::prelude::*;
use std::collections::VecDeque;

/// The pending set of elements scheduled for (re)analysis.
///
/// Implementations are not thread-safe: a single driver owns the working
/// set and advances it to completion.
pub trait WorkingSet<E> {
    /// Schedule an element.
    fn push(&mut self, element: E);

    /// Remove and return the next element.
    fn pop(&mut self) -> Result<E, WorkingSetEmpty>;

    /// The next element, without removing it.
    fn peek(&self) -> Result<&E, WorkingSetEmpty>;

    /// The number of scheduled elements.
    fn len(&self) -> usize;

    /// Returns whether no elements are scheduled.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A first-in, first-out working set.
#[derive(Debug, Clone, Default)]
pub struct FifoWorkingSet<E> {
    elements: VecDeque<E>,
}

impl<E> FifoWorkingSet<E> {
    /// Create an empty working set.
    pub fn new() -> FifoWorkingSet<E> {
        FifoWorkingSet {
            elements: VecDeque::new(),
        }
    }
}

impl<E> WorkingSet<E> for FifoWorkingSet<E> {
    fn push(&mut self, element: E) {
        self.elements.push_back(element);
    }

    fn pop(&mut self) -> Result<E, WorkingSetEmpty> {
        self.elements.pop_front().ok_or(WorkingSetEmpty)
    }

    fn peek(&self) -> Result<&E, WorkingSetEmpty> {
        self.elements.front().ok_or(WorkingSetEmpty)
    }

    fn len(&self) -> usize {
        self.elements.len()
    }
}

/// A last-in, first-out working set.
#[derive(Debug, Clone, Default)]
pub struct LifoWorkingSet<E> {
    elements: Vec<E>,
}

impl<E> LifoWorkingSet<E> {
    /// Create an empty working set.
    pub fn new() -> LifoWorkingSet<E> {
        LifoWorkingSet {
            elements: Vec::new(),
        }
    }
}

impl<E> WorkingSet<E> for LifoWorkingSet<E> {
    fn push(&mut self, element: E) {
        self.elements.push(element);
    }

    fn pop(&mut self) -> Result<E, WorkingSetEmpty> {
        self.elements.pop().ok_or(WorkingSetEmpty)
    }

    fn peek(&self) -> Result<&E, WorkingSetEmpty> {
        self.elements.last().ok_or(WorkingSetEmpty)
    }

    fn len(&self) -> usize {
        self.elements.len()
    }
}

/// A working set that rejects `push` of elements already scheduled.
///
/// Wraps any other working set; membership is checked with a linear scan,
/// which is adequate for the small node counts of CFG fixpoints.
#[derive(Debug, Clone)]
pub struct DuplicateFreeWorkingSet<E, W> {
    inner: W,
    contents: Vec<E>,
}

impl<E: PartialEq + Clone, W: WorkingSet<E>> DuplicateFreeWorkingSet<E, W> {
    /// Wrap the given working set.
    pub fn new(inner: W) -> DuplicateFreeWorkingSet<E, W> {
        DuplicateFreeWorkingSet {
            inner,
            contents: Vec::new(),
        }
    }
}

impl<E: PartialEq + Clone, W: WorkingSet<E>> WorkingSet<E> for DuplicateFreeWorkingSet<E, W> {
    fn push(&mut self, element: E) {
        if !self.contents.contains(&element) {
            self.contents.push(element.clone());
            self.inner.push(element);
        }
    }

    fn pop(&mut self) -> Result<E, WorkingSetEmpty> {
        let element = self.inner.pop()?;
        self.contents.retain(|candidate| candidate != &element);
        Ok(element)
    }

    fn peek(&self) -> Result<&E, WorkingSetEmpty> {
        self.inner.peek()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// The working-set flavors selectable through the analysis configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum FixpointWorkingSet {
    /// First-in, first-out.
    Fifo,
    /// Last-in, first-out.
    Lifo,
    /// First-in, first-out, rejecting duplicates.
    #[default]
    DuplicateFreeFifo,
    /// Last-in, first-out, rejecting duplicates.
    DuplicateFreeLifo,
}

impl FixpointWorkingSet {
    /// Instantiate an empty working set of the selected flavor.
    pub fn make<E: PartialEq + Clone + 'static>(&self) -> Box<dyn WorkingSet<E>> {
        match self {
            FixpointWorkingSet::Fifo => Box::new(FifoWorkingSet::new()),
            FixpointWorkingSet::Lifo => Box::new(LifoWorkingSet::new()),
            FixpointWorkingSet::DuplicateFreeFifo => {
                Box::new(DuplicateFreeWorkingSet::new(FifoWorkingSet::new()))
            }
            FixpointWorkingSet::DuplicateFreeLifo => {
                Box::new(DuplicateFreeWorkingSet::new(LifoWorkingSet::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut ws = FifoWorkingSet::new();
        ws.push(1);
        ws.push(2);
        ws.push(3);
        assert_eq!(ws.pop(), Ok(1));
        assert_eq!(ws.pop(), Ok(2));
        assert_eq!(ws.pop(), Ok(3));
        assert_eq!(ws.pop(), Err(WorkingSetEmpty));
    }

    #[test]
    fn lifo_order() {
        let mut ws = LifoWorkingSet::new();
        ws.push(1);
        ws.push(2);
        assert_eq!(ws.peek(), Ok(&2));
        assert_eq!(ws.pop(), Ok(2));
        assert_eq!(ws.pop(), Ok(1));
    }

    #[test]
    fn duplicate_free_rejects_scheduled_elements() {
        let mut ws = DuplicateFreeWorkingSet::new(FifoWorkingSet::new());
        ws.push(7);
        ws.push(7);
        assert_eq!(ws.len(), 1);
        assert_eq!(ws.pop(), Ok(7));
        // once popped, the element can be scheduled again
        ws.push(7);
        assert_eq!(ws.len(), 1);
    }

    #[test]
    fn factory_produces_requested_flavor() {
        let mut fifo = FixpointWorkingSet::Fifo.make::<u32>();
        fifo.push(1);
        fifo.push(2);
        assert_eq!(fifo.pop(), Ok(1));
        let mut lifo = FixpointWorkingSet::DuplicateFreeLifo.make::<u32>();
        lifo.push(1);
        lifo.push(2);
        lifo.push(1);
        assert_eq!(lifo.pop(), Ok(2));
        assert_eq!(lifo.pop(), Ok(1));
        assert_eq!(lifo.pop(), Err(WorkingSetEmpty));
    }
}
