//! Engine configuration.

/// What to do when one leg of a transfer is reversed but its sibling leg can
/// no longer be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Refuse the reversal; nothing is deleted or corrected.
    #[default]
    Abort,
    /// Delete the leg that was found and correct its own account only.
    ReverseFoundLeg,
}

/// Settings shared by all engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Warehouse label recorded on movements when a document names none.
    pub warehouse_label: String,

    /// Counterparty name used on inventory-originated transactions.
    pub warehouse_title: String,

    pub orphan_policy: OrphanPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            warehouse_label: "Main warehouse".to_string(),
            warehouse_title: "Warehouse".to_string(),
            orphan_policy: OrphanPolicy::Abort,
        }
    }
}
