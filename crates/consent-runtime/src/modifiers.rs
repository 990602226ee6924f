//! Count-style query modifier guard.
//!
//! An accurate total or a count-only response cannot be produced
//! without filtering every match up front, so both are refused before
//! the operation starts. `_total=estimated` and `_total=none` pass.

use crate::config::ModifiersConfig;
use crate::UnsupportedModifier;
use consent_hook::OperationContext;

/// Refuses count-style modifiers on search operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierGuard {
    reject_accurate_total: bool,
    reject_summary_count: bool,
}

impl ModifierGuard {
    /// Guard refusing both modifiers.
    #[must_use]
    pub fn strict() -> Self {
        Self::from_config(&ModifiersConfig::default())
    }

    /// Guard refusing nothing.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            reject_accurate_total: false,
            reject_summary_count: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &ModifiersConfig) -> Self {
        Self {
            reject_accurate_total: config.reject_accurate_total,
            reject_summary_count: config.reject_summary_count,
        }
    }

    /// Checks the request parameters of `ctx`.
    ///
    /// Only search and page operations are checked.
    ///
    /// # Errors
    ///
    /// Returns the first refused modifier found.
    pub fn check(&self, ctx: &OperationContext) -> Result<(), UnsupportedModifier> {
        if !ctx.kind.is_search() {
            return Ok(());
        }

        if self.reject_accurate_total && has_value(ctx, "_total", "accurate") {
            return Err(UnsupportedModifier::AccurateTotal);
        }
        if self.reject_summary_count && has_value(ctx, "_summary", "count") {
            return Err(UnsupportedModifier::SummaryCount);
        }
        Ok(())
    }
}

impl Default for ModifierGuard {
    fn default() -> Self {
        Self::strict()
    }
}

fn has_value(ctx: &OperationContext, name: &str, value: &str) -> bool {
    ctx.param_values(name)
        .iter()
        .any(|v| v.trim().eq_ignore_ascii_case(value))
}
