// CLCore Primitives - Built-in Functions
//
// Registered as the function cells of exported COMMON-LISP symbols.

use crate::conditions::{LispError, LispResult};
use crate::context::GlobalContext;
use crate::eval::Interpreter;
use crate::numbers::{self, NotAnInteger, NumResult};
use crate::types::Value;

/// Register all standard primitives
pub fn register_primitives(globals: &GlobalContext) {
    // Arithmetic
    globals.register_primitive("+", prim_add);
    globals.register_primitive("-", prim_sub);
    globals.register_primitive("*", prim_mul);

    // Bitwise
    globals.register_primitive("LOGAND", prim_logand);
    globals.register_primitive("LOGIOR", prim_logior);
    globals.register_primitive("LOGXOR", prim_logxor);
    globals.register_primitive("LOGANDC1", prim_logandc1);
    globals.register_primitive("LOGANDC2", prim_logandc2);

    // List operations
    globals.register_primitive("LIST", prim_list);
    globals.register_primitive("CONS", prim_cons);
    globals.register_primitive("CAR", prim_car);
    globals.register_primitive("CDR", prim_cdr);

    // Predicates and calls
    globals.register_primitive("EQ", prim_eq);
    globals.register_primitive("FUNCALL", prim_funcall);
}

fn integer_error(interp: &Interpreter<'_>, err: NotAnInteger) -> LispError {
    let rendered = interp.globals.render(&err.0);
    LispError::type_error(err.0, rendered, "integer")
}

fn arg_count(name: &str, got: usize) -> LispError {
    LispError::WrongNumberOfArguments {
        function: name.to_string(),
        got,
    }
}

fn exactly<'v, const N: usize>(name: &str, args: &'v [Value]) -> LispResult<&'v [Value; N]> {
    args.try_into().map_err(|_| arg_count(name, args.len()))
}

/// Left fold of a binary integer operation, starting from `identity`
fn fold_integers(
    interp: &Interpreter<'_>,
    args: &[Value],
    identity: i64,
    op: fn(&Value, &Value) -> NumResult,
) -> LispResult<Value> {
    args.iter()
        .try_fold(Value::Fixnum(identity), |acc, arg| op(&acc, arg))
        .map_err(|e| integer_error(interp, e))
}

fn prim_add(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    fold_integers(interp, args, 0, numbers::add)
}

fn prim_mul(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    fold_integers(interp, args, 1, numbers::mul)
}

fn prim_sub(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    let result = match args {
        [] => return Err(arg_count("-", 0)),
        [only] => numbers::negate(only),
        [first, rest @ ..] => rest
            .iter()
            .try_fold(first.clone(), |acc, arg| numbers::sub(&acc, arg)),
    };
    result.map_err(|e| integer_error(interp, e))
}

fn prim_logand(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    fold_integers(interp, args, -1, numbers::logand)
}

fn prim_logior(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    fold_integers(interp, args, 0, numbers::logior)
}

fn prim_logxor(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    fold_integers(interp, args, 0, numbers::logxor)
}

fn prim_logandc1(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    let [a, b] = exactly::<2>("LOGANDC1", args)?;
    numbers::logandc1(a, b).map_err(|e| integer_error(interp, e))
}

fn prim_logandc2(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    let [a, b] = exactly::<2>("LOGANDC2", args)?;
    numbers::logandc2(a, b).map_err(|e| integer_error(interp, e))
}

fn prim_list(_interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    Ok(Value::list(args.iter().cloned()))
}

fn prim_cons(_interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    let [car, cdr] = exactly::<2>("CONS", args)?;
    Ok(Value::cons(car.clone(), cdr.clone()))
}

fn list_arg<'v>(interp: &Interpreter<'_>, name: &str, args: &'v [Value]) -> LispResult<&'v Value> {
    let [arg] = exactly::<1>(name, args)?;
    if arg.is_list() {
        Ok(arg)
    } else {
        Err(LispError::type_error(arg.clone(), interp.globals.render(arg), "list"))
    }
}

fn prim_car(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    let list = list_arg(interp, "CAR", args)?;
    Ok(list.car().cloned().unwrap_or(Value::Nil))
}

fn prim_cdr(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    let list = list_arg(interp, "CDR", args)?;
    Ok(list.cdr().cloned().unwrap_or(Value::Nil))
}

fn prim_eq(_interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    let [a, b] = exactly::<2>("EQ", args)?;
    Ok(Value::boolean(a.is_eq(b)))
}

fn prim_funcall(interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
    match args {
        [function, rest @ ..] => interp.apply(function, rest),
        [] => Err(arg_count("FUNCALL", 0)),
    }
}
