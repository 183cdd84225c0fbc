// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! open/closed upvalues (spec section 4.6), grounded on the reference
//! implementation's `findUpvalue`/`closeUpvalues` pair.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

/// while the frame that owns the captured slot is still on the stack, the
/// upvalue just names a stack level; once that frame returns, the value is
/// copied out and the upvalue becomes self-contained.
#[derive(Debug)]
pub enum Upvalue {
    Open { level: usize },
    Closed(Value),
}

pub type UpvalueHandle = Rc<RefCell<Upvalue>>;

/// the open-upvalue list is sorted by descending stack level, matching the
/// reference implementation, so a linear scan from the front finds (or
/// correctly positions a new entry for) any given level in the common case
/// where new opens happen near the top of the stack.
#[derive(Debug, Default)]
pub struct OpenUpvalues {
    list: Vec<UpvalueHandle>,
}

impl OpenUpvalues {
    pub fn new() -> Self {
        OpenUpvalues { list: Vec::new() }
    }

    /// find an existing open upvalue at `level`, or create and insert one
    /// in sorted position. closures capturing the same local always get
    /// the same handle this way.
    pub fn find_or_create(&mut self, level: usize) -> UpvalueHandle {
        let mut insert_at = self.list.len();
        for (i, uv) in self.list.iter().enumerate() {
            if let Upvalue::Open { level: l } = *uv.borrow() {
                if l == level {
                    return self.list[i].clone();
                }
                if l < level {
                    insert_at = i;
                    break;
                }
            }
        }
        let handle: UpvalueHandle = Rc::new(RefCell::new(Upvalue::Open { level }));
        self.list.insert(insert_at, handle.clone());
        handle
    }

    /// close every open upvalue at or above `level`, copying the
    /// referenced stack slot's current value into the upvalue itself. the
    /// caller supplies the stack read since this type does not own the
    /// stack.
    pub fn close_from(&mut self, level: usize, mut read_slot: impl FnMut(usize) -> Value) {
        self.list.retain(|uv| {
            let should_close = matches!(*uv.borrow(), Upvalue::Open { level: l } if l >= level);
            if should_close {
                let current_level = match *uv.borrow() {
                    Upvalue::Open { level: l } => l,
                    Upvalue::Closed(_) => unreachable!(),
                };
                let value = read_slot(current_level);
                *uv.borrow_mut() = Upvalue::Closed(value);
                false
            } else {
                true
            }
        });
    }
}

pub fn get(handle: &UpvalueHandle, mut read_slot: impl FnMut(usize) -> Value) -> Value {
    match &*handle.borrow() {
        Upvalue::Open { level } => read_slot(*level),
        Upvalue::Closed(v) => v.clone(),
    }
}

pub fn set(handle: &UpvalueHandle, value: Value, mut write_slot: impl FnMut(usize, Value)) {
    let level = match &*handle.borrow() {
        Upvalue::Open { level } => Some(*level),
        Upvalue::Closed(_) => None,
    };
    match level {
        Some(level) => write_slot(level, value),
        None => *handle.borrow_mut() = Upvalue::Closed(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_level_returns_the_same_handle() {
        let mut list = OpenUpvalues::new();
        let a = list.find_or_create(5);
        let b = list.find_or_create(5);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn closing_copies_current_stack_value_and_detaches() {
        let mut list = OpenUpvalues::new();
        let handle = list.find_or_create(3);
        list.close_from(0, |level| Value::Integer(level as i64 * 10));
        match &*handle.borrow() {
            Upvalue::Closed(Value::Integer(30)) => {}
            other => panic!("expected closed(30), got {:?}", other),
        }
    }

    #[test]
    fn closing_leaves_lower_levels_open() {
        let mut list = OpenUpvalues::new();
        let low = list.find_or_create(1);
        let high = list.find_or_create(5);
        list.close_from(3, |_| Value::Nil);
        assert!(matches!(&*low.borrow(), Upvalue::Open { level: 1 }));
        assert!(matches!(&*high.borrow(), Upvalue::Closed(_)));
    }
}
