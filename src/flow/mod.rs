//! Flow analysis: per-variable access modes and return classification.
//!
//! A [`FlowInfo`] maps each binding to an [`AccessMode`] bitset and records how
//! control leaves the analyzed region. Infos are composed bottom-up: statements
//! in sequence merge with [`FlowInfo::merge_sequential`], alternative branches
//! with [`FlowInfo::merge_conditional`].

mod analyzer;

pub use analyzer::{FlowAnalyzer, FlowMode, branch_escapes};

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::scope::BindingId;

/// How a variable is accessed in a region.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessMode(u8);

impl AccessMode {
    pub const UNUSED: Self = Self(0);
    /// Read on every path.
    pub const READ: Self = Self(1);
    /// Read on some paths.
    pub const READ_POTENTIAL: Self = Self(1 << 1);
    /// Written on every path.
    pub const WRITE: Self = Self(1 << 2);
    /// Written on some paths.
    pub const WRITE_POTENTIAL: Self = Self(1 << 3);
    /// Accessed in a way the analysis does not track.
    pub const UNKNOWN: Self = Self(1 << 4);

    pub const ANY_READ: Self = Self(Self::READ.0 | Self::READ_POTENTIAL.0);
    pub const ANY_WRITE: Self = Self(Self::WRITE.0 | Self::WRITE_POTENTIAL.0);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_unused(self) -> bool {
        self.0 == 0
    }

    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Definite accesses become potential ones.
    pub fn to_potential(self) -> Self {
        let mut out = self.without(Self::READ | Self::WRITE);
        if self.contains(Self::READ) {
            out |= Self::READ_POTENTIAL;
        }
        if self.contains(Self::WRITE) {
            out |= Self::WRITE_POTENTIAL;
        }
        out
    }

    /// A definite bit subsumes its potential variant.
    fn normalized(self) -> Self {
        let mut out = self;
        if out.contains(Self::READ) {
            out = out.without(Self::READ_POTENTIAL);
        }
        if out.contains(Self::WRITE) {
            out = out.without(Self::WRITE_POTENTIAL);
        }
        out
    }

    /// `self` followed by `next` on the same path.
    pub fn then(self, next: Self) -> Self {
        // A value written before any read hides later reads from the region's input.
        let shadowed = self.contains(Self::WRITE) && !self.intersects(Self::ANY_READ | Self::UNKNOWN);
        let next = if shadowed { next.without(Self::ANY_READ) } else { next };
        (self | next).normalized()
    }
}

impl BitOr for AccessMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unused() {
            return write!(f, "UNUSED");
        }
        let names = [
            (Self::READ, "READ"),
            (Self::READ_POTENTIAL, "READ_POTENTIAL"),
            (Self::WRITE, "WRITE"),
            (Self::WRITE_POTENTIAL, "WRITE_POTENTIAL"),
            (Self::UNKNOWN, "UNKNOWN"),
        ];
        let parts: Vec<_> = names
            .iter()
            .filter(|(mode, _)| self.contains(*mode))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", parts.join("|"))
    }
}

/// How control leaves a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnKind {
    /// Falls through the end of the region.
    #[default]
    NoReturn,
    /// Every path ends in `return;`.
    VoidReturn,
    /// Every path ends in `return expr;`.
    ValueReturn,
    /// Some paths return, others fall through.
    PartialReturn,
    /// Every path throws.
    Throw,
}

impl ReturnKind {
    /// Control never reaches the code following the region.
    pub fn exits(self) -> bool {
        matches!(
            self,
            ReturnKind::VoidReturn | ReturnKind::ValueReturn | ReturnKind::Throw
        )
    }

    fn then(self, next: Self) -> Self {
        match (self, next) {
            (first, _) if first.exits() => first,
            (ReturnKind::NoReturn, next) => next,
            (ReturnKind::PartialReturn, ReturnKind::VoidReturn | ReturnKind::ValueReturn) => next,
            (ReturnKind::PartialReturn, _) => ReturnKind::PartialReturn,
            (_, next) => next,
        }
    }

    fn join(kinds: &[Self], exhaustive: bool) -> Self {
        let mut kinds: Vec<Self> = kinds.to_vec();
        if !exhaustive {
            kinds.push(ReturnKind::NoReturn);
        }
        let non_throw: Vec<Self> = kinds
            .iter()
            .copied()
            .filter(|k| *k != ReturnKind::Throw)
            .collect();
        if non_throw.is_empty() {
            return if kinds.is_empty() {
                ReturnKind::NoReturn
            } else {
                ReturnKind::Throw
            };
        }
        if non_throw.iter().all(|k| *k == ReturnKind::NoReturn) {
            return ReturnKind::NoReturn;
        }
        if non_throw.contains(&ReturnKind::NoReturn) || non_throw.contains(&ReturnKind::PartialReturn) {
            return ReturnKind::PartialReturn;
        }
        if non_throw.contains(&ReturnKind::ValueReturn) {
            ReturnKind::ValueReturn
        } else {
            ReturnKind::VoidReturn
        }
    }
}

/// Per-variable access summary over a region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowInfo {
    modes: BTreeMap<BindingId, AccessMode>,
    returns: ReturnKind,
    /// The region contains `break` or `continue`.
    branches: bool,
}

impl FlowInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// A region whose only effect is one access.
    pub fn access(binding: BindingId, mode: AccessMode) -> Self {
        let mut info = Self::new();
        if !mode.is_unused() {
            info.modes.insert(binding, mode);
        }
        info
    }

    pub fn with_return(returns: ReturnKind) -> Self {
        Self {
            returns,
            ..Self::default()
        }
    }

    pub fn branch() -> Self {
        Self {
            branches: true,
            ..Self::default()
        }
    }

    pub fn get(&self, binding: BindingId) -> AccessMode {
        self.modes.get(&binding).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BindingId, AccessMode)> + '_ {
        self.modes.iter().map(|(b, m)| (*b, *m))
    }

    /// Bindings whose mode intersects `mask`, in binding order.
    pub fn bindings_with(&self, mask: AccessMode) -> Vec<BindingId> {
        self.modes
            .iter()
            .filter(|(_, m)| m.intersects(mask))
            .map(|(b, _)| *b)
            .collect()
    }

    pub fn return_kind(&self) -> ReturnKind {
        self.returns
    }

    pub fn has_branches(&self) -> bool {
        self.branches
    }

    /// Appends `next`, which runs after `self` on the same path.
    pub fn merge_sequential(&mut self, next: FlowInfo) {
        for (binding, mode) in next.modes {
            let merged = self.get(binding).then(mode);
            self.modes.insert(binding, merged);
        }
        self.returns = self.returns.then(next.returns);
        self.branches |= next.branches;
    }

    /// Joins alternative branches. With `exhaustive` false an implicit empty
    /// branch is assumed (an `if` without `else`).
    pub fn merge_conditional(branches: &[FlowInfo], exhaustive: bool) -> FlowInfo {
        let mut modes: BTreeMap<BindingId, AccessMode> = BTreeMap::new();
        for info in branches {
            for (binding, mode) in &info.modes {
                *modes.entry(*binding).or_default() |= *mode;
            }
        }
        for (binding, mode) in modes.iter_mut() {
            for definite in [AccessMode::READ, AccessMode::WRITE] {
                let everywhere = exhaustive
                    && !branches.is_empty()
                    && branches.iter().all(|b| b.get(*binding).contains(definite));
                if mode.contains(definite) && !everywhere {
                    *mode = mode.without(definite) | definite.to_potential();
                }
            }
            *mode = mode.normalized();
        }
        let kinds: Vec<ReturnKind> = branches.iter().map(|b| b.returns).collect();
        FlowInfo {
            modes,
            returns: ReturnKind::join(&kinds, exhaustive),
            branches: branches.iter().any(|b| b.branches),
        }
    }

    /// The region may execute zero or more times (a loop body).
    pub fn into_repeated(self) -> FlowInfo {
        let mut info = FlowInfo::merge_conditional(&[self], false);
        if info.returns == ReturnKind::Throw {
            info.returns = ReturnKind::NoReturn;
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: BindingId = BindingId(0);
    const Y: BindingId = BindingId(1);

    #[test]
    fn test_write_then_read_hides_read() {
        let mode = AccessMode::WRITE.then(AccessMode::READ);
        assert_eq!(mode, AccessMode::WRITE);
        let mode = AccessMode::READ.then(AccessMode::WRITE);
        assert_eq!(mode, AccessMode::READ | AccessMode::WRITE);
    }

    #[test]
    fn test_one_branch_accesses_become_potential() {
        let then = FlowInfo::access(X, AccessMode::WRITE);
        let otherwise = FlowInfo::access(X, AccessMode::READ);
        let joined = FlowInfo::merge_conditional(&[then, otherwise], true);
        assert_eq!(joined.get(X), AccessMode::READ_POTENTIAL | AccessMode::WRITE_POTENTIAL);
    }

    #[test]
    fn test_both_branches_keep_definite() {
        let a = FlowInfo::access(X, AccessMode::WRITE);
        let b = FlowInfo::access(X, AccessMode::WRITE);
        assert_eq!(FlowInfo::merge_conditional(&[a.clone(), b], true).get(X), AccessMode::WRITE);
        assert_eq!(FlowInfo::merge_conditional(&[a], false).get(X), AccessMode::WRITE_POTENTIAL);
    }

    #[test]
    fn test_conditional_merge_is_commutative() {
        let mut a = FlowInfo::access(X, AccessMode::READ);
        a.merge_sequential(FlowInfo::with_return(ReturnKind::ValueReturn));
        let mut b = FlowInfo::access(Y, AccessMode::WRITE);
        b.merge_sequential(FlowInfo::access(X, AccessMode::READ));
        assert_eq!(
            FlowInfo::merge_conditional(&[a.clone(), b.clone()], true),
            FlowInfo::merge_conditional(&[b, a], true)
        );
    }

    #[test]
    fn test_return_joins() {
        let value = FlowInfo::with_return(ReturnKind::ValueReturn);
        let fall = FlowInfo::new();
        let throw = FlowInfo::with_return(ReturnKind::Throw);
        assert_eq!(
            FlowInfo::merge_conditional(&[value.clone(), fall], true).return_kind(),
            ReturnKind::PartialReturn
        );
        assert_eq!(
            FlowInfo::merge_conditional(&[value.clone(), throw], true).return_kind(),
            ReturnKind::ValueReturn
        );
        assert_eq!(
            FlowInfo::merge_conditional(&[value], false).return_kind(),
            ReturnKind::PartialReturn
        );
    }

    #[test]
    fn test_partial_then_return_is_definite() {
        let mut info = FlowInfo::with_return(ReturnKind::PartialReturn);
        info.merge_sequential(FlowInfo::with_return(ReturnKind::ValueReturn));
        assert_eq!(info.return_kind(), ReturnKind::ValueReturn);
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", AccessMode::READ | AccessMode::UNKNOWN), "READ|UNKNOWN");
        assert_eq!(format!("{:?}", AccessMode::UNUSED), "UNUSED");
    }
}
