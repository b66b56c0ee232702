use crate::{
    ir::{FuncId, Module, Type, Value},
    Result,
};

/// A POSIX critical section on `@m` with `body` opaque instructions between lock and
/// unlock, so the pair distance is `body + 1`.
pub fn critical_section_with_body(body: usize) -> Result<(Module, FuncId)> {
    let mut module = Module::new("body");
    let lock = module.declare("pthread_mutex_lock", Type::I32);
    let unlock = module.declare("pthread_mutex_unlock", Type::I32);

    let mut f = module.build_function("worker", Type::Void);
    f.block("entry");
    f.call(lock, vec![Value::global("m")])?;
    for i in 0..body {
        f.other(&format!("work{i}"), Vec::new(), Type::Void)?;
    }
    f.call(unlock, vec![Value::global("m")])?;
    f.ret(None)?;
    let func = f.finish();
    Ok((module, func))
}

/// Two consecutive POSIX critical sections, on `@a` then on `@b`.
pub fn swappable_sections() -> Result<(Module, FuncId)> {
    let mut module = Module::new("two");
    let lock = module.declare("pthread_mutex_lock", Type::I32);
    let unlock = module.declare("pthread_mutex_unlock", Type::I32);

    let mut f = module.build_function("worker", Type::Void);
    f.block("entry");
    for mutex in ["a", "b"] {
        f.call(lock, vec![Value::global(mutex)])?;
        f.store(Value::global("shared"), Value::int(32, true, 1))?;
        f.call(unlock, vec![Value::global(mutex)])?;
    }
    f.ret(None)?;
    let func = f.finish();
    Ok((module, func))
}
