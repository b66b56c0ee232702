//! Module factories for unit tests.
//!
//! Each factory declares its external functions first, so the first defined function is
//! never at index 0.

use crate::{
    ir::{FuncId, Module, Type, Value},
    Result,
};

mod mutex;

pub use mutex::{critical_section_with_body, swappable_sections};

/// One POSIX critical section:
///
/// ```text
/// 0: pthread_mutex_lock(@m)     c.c:10
/// 1: store 1, @shared            c.c:11
/// 2: pthread_mutex_unlock(@m)   c.c:12
/// 3: ret
/// ```
pub fn posix_critical_section() -> Result<(Module, FuncId)> {
    let mut module = Module::new("posix");
    let lock = module.declare("pthread_mutex_lock", Type::I32);
    let unlock = module.declare("pthread_mutex_unlock", Type::I32);

    let mut f = module.build_function("worker", Type::Void);
    f.block("entry");
    f.at("c.c", 10).call(lock, vec![Value::global("m")])?;
    f.at("c.c", 11)
        .store(Value::global("shared"), Value::int(32, true, 1))?;
    f.at("c.c", 12).call(unlock, vec![Value::global("m")])?;
    f.no_loc().ret(None)?;
    let func = f.finish();
    Ok((module, func))
}

/// One libc++ `std::mutex` critical section where both calls are invokes:
///
/// ```text
/// entry:  invoke std::mutex::lock(@m)    -> body, lpad
/// body:   store 1, @shared
///         invoke std::mutex::unlock(@m)  -> exit, lpad
/// exit:   ret
/// lpad:   unreachable
/// ```
pub fn std_mutex_invoke_section() -> Result<(Module, FuncId)> {
    let mut module = Module::new("cxx");
    let lock = module.declare("_ZNSt3__15mutex4lockEv", Type::Void);
    let unlock = module.declare("_ZNSt3__15mutex6unlockEv", Type::Void);

    let mut f = module.build_function("worker", Type::Void);
    f.block("entry");
    let body = f.create_block("body");
    let exit = f.create_block("exit");
    let lpad = f.create_block("lpad");
    f.at("m.cpp", 5)
        .invoke(lock, vec![Value::global("m")], body, lpad)?;
    f.switch_to(body)
        .at("m.cpp", 6)
        .store(Value::global("shared"), Value::int(32, true, 1))?;
    f.at("m.cpp", 7)
        .invoke(unlock, vec![Value::global("m")], exit, lpad)?;
    f.switch_to(exit).no_loc().ret(None)?;
    f.switch_to(lpad).unreachable()?;
    let func = f.finish();
    Ok((module, func))
}
