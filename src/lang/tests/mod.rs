/**
 * lang/tests
 *
 * Tests that take members from syntax all the way to execution. Syntax is
 * built by hand through the helpers in `utils`, there is no parser to feed
 * source text to.
 */

mod utils;
mod binder;
mod eval_objects;

pub(crate) use utils::*; // the testing harness and syntax builders
pub(crate) use crate::lang::ast::{BinaryOperator as BO, UnaryOperator as UO};
pub(crate) use crate::lang::eval::{Argument, PrimitiveValue as PV, RuntimeFault};
