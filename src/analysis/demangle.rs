//! Symbol name normalization for call-target matching.
//!
//! Targets are compared by their demangled, parameter-stripped name:
//!
//! ```text
//! _ZNSt3__15mutex4lockEv  ->  std::__1::mutex::lock()  ->  std::__1::mutex::lock
//! pthread_mutex_lock      ->  (not mangled)            ->  pthread_mutex_lock
//! ```

use std::borrow::Cow;

use cpp_demangle::{DemangleOptions, Symbol};

/// Demangles an Itanium C++ symbol, falling back to the raw name.
#[must_use]
pub fn demangle(name: &str) -> Cow<'_, str> {
    if !name.starts_with("_Z") {
        return Cow::Borrowed(name);
    }
    match Symbol::new(name) {
        Ok(symbol) => match symbol.demangle(&DemangleOptions::default()) {
            Ok(demangled) => Cow::Owned(demangled),
            Err(_) => Cow::Borrowed(name),
        },
        Err(_) => Cow::Borrowed(name),
    }
}

/// Drops everything from the first `(`.
#[must_use]
pub fn strip_params(name: &str) -> &str {
    match name.find('(') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

/// Returns the comparison key of a symbol.
///
/// # Arguments
///
/// * `name` - Raw symbol name
/// * `demangled` - Whether to demangle before stripping parameters
#[must_use]
pub fn match_key(name: &str, demangled: bool) -> String {
    if demangled {
        strip_params(&demangle(name)).to_string()
    } else {
        strip_params(name).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demangle_std_mutex() {
        assert_eq!(match_key("_ZNSt3__15mutex4lockEv", true), "std::__1::mutex::lock");
        assert_eq!(
            match_key("_ZNSt3__15mutex6unlockEv", true),
            "std::__1::mutex::unlock"
        );
        assert_eq!(match_key("_ZNSt3__16thread4joinEv", true), "std::__1::thread::join");
    }

    #[test]
    fn test_plain_names_fall_back() {
        assert_eq!(demangle("pthread_mutex_lock"), "pthread_mutex_lock");
        assert_eq!(match_key("pthread_mutex_lock", true), "pthread_mutex_lock");
        // Not a valid mangling: the raw name is the key.
        assert_eq!(match_key("_Z!bad", true), "_Z!bad");
    }

    #[test]
    fn test_strip_params() {
        assert_eq!(strip_params("foo(int, char)"), "foo");
        assert_eq!(strip_params("bar"), "bar");
    }
}
