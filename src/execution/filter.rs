//! Child-driven selection: pulls from the child until the predicate accepts
//! a record or the child is exhausted. The predicate is a plain Rust
//! closure over a record rather than an expression tree — expression
//! evaluation is out of scope here, so callers build whatever closure their
//! own planner would have compiled.

use std::rc::Rc;

use crate::errors::Error;
use crate::record::{Record, Schema};

use super::Executor;

pub type Predicate = Rc<dyn Fn(&Record) -> bool>;

pub struct FilterExecutor {
    child: Box<dyn Executor>,
    predicate: Predicate,
}

impl FilterExecutor {
    pub fn new(child: Box<dyn Executor>, predicate: Predicate) -> Self {
        Self { child, predicate }
    }

    fn skip_to_match(&mut self) -> Result<(), Error> {
        while !self.child.is_end() && !(self.predicate)(self.child.get_record()) {
            self.child.next()?;
        }
        Ok(())
    }
}

impl Executor for FilterExecutor {
    fn init(&mut self) -> Result<(), Error> {
        self.child.init()?;
        self.skip_to_match()
    }

    fn next(&mut self) -> Result<(), Error> {
        self.child.next()?;
        self.skip_to_match()
    }

    fn is_end(&self) -> bool {
        self.child.is_end()
    }

    fn get_out_schema(&self) -> &Schema {
        self.child.get_out_schema()
    }

    fn get_record(&self) -> &Record {
        self.child.get_record()
    }
}
