//! A uniform view over the two call forms.
//!
//! [`CallSite`] captures everything the operators need from a direct call or invoke:
//! target, arguments, result type, attributes and, for invokes, the two continuation
//! blocks. Variant-specific behavior is confined to two places: building replacement
//! instructions ([`CallSite::clone_with`]) and keeping the block terminated when an invoke
//! goes away ([`CallSite::branch_to_normal`]).
//!
//! A `CallSite` is a snapshot. Its [`InstId`] is generation-checked, so
//! [`CallSite::validate`] detects when the underlying instruction was erased by an
//! earlier edit.

use crate::{
    analysis::demangle,
    ir::{
        BlockId, CallAttrs, CallForm, Callee, DebugLoc, FuncId, InstId, Instruction, Module, Op,
        Type, Value,
    },
    Error, Result,
};

/// The form of a call site, with the invoke continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteForm {
    /// Plain call.
    Call,
    /// Call with an exceptional-control-flow edge.
    Invoke {
        /// Continuation when the call returns
        normal: BlockId,
        /// Continuation when the call unwinds
        unwind: BlockId,
    },
}

impl SiteForm {
    /// Returns the call form without the continuations.
    #[must_use]
    pub const fn form(&self) -> CallForm {
        match self {
            SiteForm::Call => CallForm::Call,
            SiteForm::Invoke { .. } => CallForm::Invoke,
        }
    }
}

/// Snapshot of a direct call or invoke.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    id: InstId,
    func: FuncId,
    block: BlockId,
    target: FuncId,
    symbol: String,
    name: String,
    args: Vec<Value>,
    ret: Type,
    attrs: CallAttrs,
    loc: Option<DebugLoc>,
    form: SiteForm,
}

impl CallSite {
    /// Captures the call site at `id`.
    ///
    /// Returns `Ok(None)` for indirect calls, which never take part in matching.
    ///
    /// # Arguments
    ///
    /// * `module` - The module containing the call
    /// * `id` - Handle of a call or invoke instruction
    /// * `demangled` - Whether [`CallSite::name`] is the demangled target name
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotACallSite`] if the instruction is neither a call nor an invoke,
    /// and [`Error::StaleHandle`] if it has been erased.
    pub fn capture(module: &Module, id: InstId, demangled: bool) -> Result<Option<Self>> {
        let inst = module.instruction(id)?;
        let (callee, args, ret, form) = match inst.op() {
            Op::Call { callee, args, ret } => (callee, args, *ret, SiteForm::Call),
            Op::Invoke {
                callee,
                args,
                ret,
                normal,
                unwind,
            } => (
                callee,
                args,
                *ret,
                SiteForm::Invoke {
                    normal: *normal,
                    unwind: *unwind,
                },
            ),
            _ => return Err(Error::NotACallSite(id)),
        };
        let Callee::Direct(target) = callee else {
            return Ok(None);
        };
        let symbol = module
            .function(*target)
            .ok_or(Error::UnknownFunction(target.index()))?
            .name()
            .to_string();
        let (func, block) = module.parent(id)?;

        Ok(Some(Self {
            id,
            func,
            block,
            target: *target,
            name: demangle::match_key(&symbol, demangled),
            symbol,
            args: args.clone(),
            ret,
            attrs: inst.attrs(),
            loc: inst.loc().cloned(),
            form,
        }))
    }

    /// Returns the instruction handle.
    #[must_use]
    pub const fn id(&self) -> InstId {
        self.id
    }

    /// Returns the enclosing function.
    #[must_use]
    pub const fn function(&self) -> FuncId {
        self.func
    }

    /// Returns the enclosing block at capture time.
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    /// Returns the called function.
    #[must_use]
    pub const fn target(&self) -> FuncId {
        self.target
    }

    /// Returns the raw symbol name of the target.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the comparison key of the target (demangled and parameter-stripped if
    /// requested at capture time).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns argument `i`.
    #[must_use]
    pub fn arg(&self, i: usize) -> Option<&Value> {
        self.args.get(i)
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Returns the result type.
    #[must_use]
    pub const fn ret(&self) -> Type {
        self.ret
    }

    /// Returns the call-site attributes.
    #[must_use]
    pub const fn attrs(&self) -> CallAttrs {
        self.attrs
    }

    /// Returns the source location.
    #[must_use]
    pub fn loc(&self) -> Option<&DebugLoc> {
        self.loc.as_ref()
    }

    /// Returns the form with continuations.
    #[must_use]
    pub const fn site_form(&self) -> SiteForm {
        self.form
    }

    /// Returns the call form.
    #[must_use]
    pub const fn form(&self) -> CallForm {
        self.form.form()
    }

    /// Returns true for invokes.
    #[must_use]
    pub const fn is_invoke(&self) -> bool {
        matches!(self.form, SiteForm::Invoke { .. })
    }

    /// Returns the normal continuation of an invoke.
    #[must_use]
    pub const fn normal(&self) -> Option<BlockId> {
        match self.form {
            SiteForm::Invoke { normal, .. } => Some(normal),
            SiteForm::Call => None,
        }
    }

    /// Returns the unwind continuation of an invoke.
    #[must_use]
    pub const fn unwind(&self) -> Option<BlockId> {
        match self.form {
            SiteForm::Invoke { unwind, .. } => Some(unwind),
            SiteForm::Call => None,
        }
    }

    /// Checks that the handle still refers to the same call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the instruction was erased or its target changed.
    pub fn validate(&self, module: &Module) -> Result<()> {
        let inst = module.instruction(self.id)?;
        match inst.op().callee() {
            Some(Callee::Direct(target)) if *target == self.target => Ok(()),
            _ => Err(Error::StaleHandle(self.id)),
        }
    }

    /// Returns true if the call is still present and unchanged.
    #[must_use]
    pub fn is_live(&self, module: &Module) -> bool {
        self.validate(module).is_ok()
    }

    /// Builds a replacement that keeps this site's form, continuations, attributes and
    /// location but calls `target` with `args`.
    #[must_use]
    pub fn clone_with(&self, target: FuncId, args: Vec<Value>, ret: Type) -> Instruction {
        let callee = Callee::Direct(target);
        let op = match self.form {
            SiteForm::Call => Op::Call { callee, args, ret },
            SiteForm::Invoke { normal, unwind } => Op::Invoke {
                callee,
                args,
                ret,
                normal,
                unwind,
            },
        };
        Instruction::new(op)
            .with_attrs(self.attrs)
            .at(self.loc.clone())
    }

    /// Builds a plain call to this site's target with the given arguments.
    #[must_use]
    pub fn as_call(&self, args: Vec<Value>) -> Instruction {
        Instruction::new(Op::Call {
            callee: Callee::Direct(self.target),
            args,
            ret: self.ret,
        })
        .with_attrs(self.attrs)
        .at(self.loc.clone())
    }

    /// Appends a branch to the normal continuation at the end of an invoke's block.
    ///
    /// Must run before an invoke is erased so its block keeps a terminator. Returns the
    /// branch, or `None` for plain calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleHandle`] if the invoke has been erased.
    pub fn branch_to_normal(&self, module: &mut Module) -> Result<Option<InstId>> {
        let SiteForm::Invoke { normal, .. } = self.form else {
            return Ok(None);
        };
        let (func, block) = module.parent(self.id)?;
        let branch = Instruction::new(Op::Br { target: normal }).at(self.loc.clone());
        Ok(Some(module.push(func, block, branch)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_invoke() -> Result<()> {
        let mut module = Module::new("test");
        let lock = module.declare("_ZNSt3__15mutex4lockEv", Type::Void);
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        let normal = f.create_block("cont");
        let unwind = f.create_block("lpad");
        let invoke = f.invoke(lock, vec![Value::global("m")], normal, unwind)?;
        f.switch_to(normal).ret(None)?;
        f.switch_to(unwind).unreachable()?;
        f.finish();

        let site = CallSite::capture(&module, invoke, true)?.unwrap();
        assert_eq!(site.name(), "std::__1::mutex::lock");
        assert_eq!(site.symbol(), "_ZNSt3__15mutex4lockEv");
        assert_eq!(site.form(), CallForm::Invoke);
        assert_eq!(site.normal(), Some(normal));
        assert_eq!(site.arg_count(), 1);
        Ok(())
    }

    #[test]
    fn test_indirect_and_non_call() -> Result<()> {
        let mut module = Module::new("test");
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        let indirect = f.indirect_call(Value::Arg(0), vec![Value::global("m")], Type::I32)?;
        let ret = f.ret(None)?;
        f.finish();

        assert!(CallSite::capture(&module, indirect, false)?.is_none());
        assert!(matches!(
            CallSite::capture(&module, ret, false),
            Err(Error::NotACallSite(_))
        ));
        Ok(())
    }

    #[test]
    fn test_clone_keeps_form_and_attrs() -> Result<()> {
        let mut module = Module::new("test");
        let lock = module.declare("pthread_mutex_lock", Type::I32);
        let unlock = module.declare("pthread_mutex_unlock", Type::I32);
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        let call = f.call_with_attrs(lock, vec![Value::global("a")], CallAttrs::NOUNWIND)?;
        f.ret(None)?;
        f.finish();

        let site = CallSite::capture(&module, call, false)?.unwrap();
        let clone = site.clone_with(unlock, vec![Value::global("b")], Type::I32);
        assert_eq!(clone.attrs(), CallAttrs::NOUNWIND);
        assert_eq!(clone.op().call_form(), Some(CallForm::Call));
        assert_eq!(clone.op().callee(), Some(&Callee::Direct(unlock)));
        Ok(())
    }

    #[test]
    fn test_validate_detects_erasure() -> Result<()> {
        let mut module = Module::new("test");
        let lock = module.declare("pthread_mutex_lock", Type::I32);
        let mut f = module.build_function("f", Type::Void);
        f.block("entry");
        let call = f.call(lock, vec![Value::global("m")])?;
        f.ret(None)?;
        f.finish();

        let site = CallSite::capture(&module, call, false)?.unwrap();
        assert!(site.is_live(&module));
        module.erase(call)?;
        assert!(matches!(site.validate(&module), Err(Error::StaleHandle(_))));
        Ok(())
    }
}
