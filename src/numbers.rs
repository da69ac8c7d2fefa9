// CLCore Numbers - Integer Dispatch
//
// Binary integer operations over the two representations: a fixnum fast path
// and a bignum fallback. Results are normalized back to fixnums when they fit.

use crate::types::Value;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use thiserror::Error;

/// An integer operand, borrowed out of a `Value`
#[derive(Debug, Clone, Copy)]
pub enum Integer<'a> {
    Fixnum(i64),
    Bignum(&'a BigInt),
}

/// The operand that was not an integer
#[derive(Debug, Clone, Error)]
#[error("expected an integer, got a {}", .0.type_name())]
pub struct NotAnInteger(pub Value);

pub type NumResult = Result<Value, NotAnInteger>;

impl<'a> Integer<'a> {
    pub fn from_value(value: &'a Value) -> Result<Self, NotAnInteger> {
        match value {
            Value::Fixnum(n) => Ok(Integer::Fixnum(*n)),
            Value::Bignum(n) => Ok(Integer::Bignum(n)),
            other => Err(NotAnInteger(other.clone())),
        }
    }
}

/// Bignum result, demoted to a fixnum if it fits
pub fn normalize(n: BigInt) -> Value {
    match n.to_i64() {
        Some(small) => Value::Fixnum(small),
        None => Value::Bignum(n),
    }
}

/// Run `fast` when both operands are fixnums. Otherwise promote the fixnum
/// side and run `big`. `fast` returns `None` to request the bignum path.
fn dispatch2<F, B>(a: &Value, b: &Value, fast: F, big: B) -> NumResult
where
    F: FnOnce(i64, i64) -> Option<i64>,
    B: FnOnce(&BigInt, &BigInt) -> BigInt,
{
    let x = Integer::from_value(a)?;
    let y = Integer::from_value(b)?;
    let result = match (x, y) {
        (Integer::Fixnum(x), Integer::Fixnum(y)) => match fast(x, y) {
            Some(n) => return Ok(Value::Fixnum(n)),
            None => big(&BigInt::from(x), &BigInt::from(y)),
        },
        (Integer::Fixnum(x), Integer::Bignum(y)) => big(&BigInt::from(x), y),
        (Integer::Bignum(x), Integer::Fixnum(y)) => big(x, &BigInt::from(y)),
        (Integer::Bignum(x), Integer::Bignum(y)) => big(x, y),
    };
    Ok(normalize(result))
}

pub fn add(a: &Value, b: &Value) -> NumResult {
    dispatch2(a, b, i64::checked_add, |x, y| x + y)
}

pub fn sub(a: &Value, b: &Value) -> NumResult {
    dispatch2(a, b, i64::checked_sub, |x, y| x - y)
}

pub fn mul(a: &Value, b: &Value) -> NumResult {
    dispatch2(a, b, i64::checked_mul, |x, y| x * y)
}

pub fn negate(a: &Value) -> NumResult {
    sub(&Value::Fixnum(0), a)
}

pub fn logand(a: &Value, b: &Value) -> NumResult {
    dispatch2(a, b, |x, y| Some(x & y), |x, y| x & y)
}

pub fn logior(a: &Value, b: &Value) -> NumResult {
    dispatch2(a, b, |x, y| Some(x | y), |x, y| x | y)
}

pub fn logxor(a: &Value, b: &Value) -> NumResult {
    dispatch2(a, b, |x, y| Some(x ^ y), |x, y| x ^ y)
}

/// (logand (lognot a) b)
pub fn logandc1(a: &Value, b: &Value) -> NumResult {
    dispatch2(a, b, |x, y| Some(!x & y), |x, y| !x & y)
}

/// (logand a (lognot b))
pub fn logandc2(a: &Value, b: &Value) -> NumResult {
    dispatch2(a, b, |x, y| Some(x & !y), |x, y| x & !y)
}
