use serde::{Deserialize, Serialize};

/// Decides whether a narrowing filter result is too thin to commit.
///
/// Returning `true` means "discard the result and keep the unfiltered set".
pub trait FilterSafety {
    fn should_discard(&self, matched: usize, total: usize) -> bool;
}

impl<F> FilterSafety for F
where
    F: Fn(usize, usize) -> bool,
{
    fn should_discard(&self, matched: usize, total: usize) -> bool {
        self(matched, total)
    }
}

/// `true` allows an empty result, `false` rejects it.
impl FilterSafety for bool {
    fn should_discard(&self, matched: usize, _total: usize) -> bool {
        !*self && matched == 0
    }
}

/// Built-in safety nets.
///
/// Policy files may also write a plain boolean, read the same way as
/// [`From<bool>`](Safety::from).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "SafetyDef")]
pub enum Safety {
    /// Keep the original set when nothing matched.
    #[default]
    RejectEmpty,
    /// Always commit, even to an empty set.
    AllowEmpty,
    /// Keep the original set when fewer than this percentage matched.
    /// Values above 100 behave as 100.
    MinPercent(u32),
}

impl Safety {
    pub fn min_percent(threshold: u32) -> Self {
        Safety::MinPercent(threshold.min(100))
    }
}

/// `true` commits unconditionally; `false` is the reject-if-empty net.
impl From<bool> for Safety {
    fn from(allow_empty: bool) -> Self {
        if allow_empty {
            Safety::AllowEmpty
        } else {
            Safety::RejectEmpty
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum NamedSafety {
    RejectEmpty,
    AllowEmpty,
    MinPercent(u32),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SafetyDef {
    Flag(bool),
    Named(NamedSafety),
}

impl From<SafetyDef> for Safety {
    fn from(def: SafetyDef) -> Self {
        match def {
            SafetyDef::Flag(allow_empty) => Safety::from(allow_empty),
            SafetyDef::Named(NamedSafety::RejectEmpty) => Safety::RejectEmpty,
            SafetyDef::Named(NamedSafety::AllowEmpty) => Safety::AllowEmpty,
            SafetyDef::Named(NamedSafety::MinPercent(threshold)) => Safety::MinPercent(threshold),
        }
    }
}

impl FilterSafety for Safety {
    fn should_discard(&self, matched: usize, total: usize) -> bool {
        match *self {
            Safety::RejectEmpty => matched == 0,
            Safety::AllowEmpty => false,
            Safety::MinPercent(threshold) => {
                let threshold = threshold.min(100) as u128;
                // matched / total * 100 < threshold, kept in integers
                (matched as u128) * 100 < threshold * (total as u128)
            }
        }
    }
}
