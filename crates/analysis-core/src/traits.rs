use crate::{Diagnostics, FinancialTable, StageKind};

/// A pipeline stage: consumes a table and returns it with columns appended.
///
/// Stages never fail on missing inputs; anything they cannot compute is
/// recorded in `diagnostics` and the table passes through.
pub trait TableStage: Send + Sync {
    fn kind(&self) -> StageKind;

    fn apply(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable;
}
