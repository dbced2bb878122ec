use analysis_core::columns::*;
use analysis_core::{Derivation, Diagnostics, FinancialTable, StageKind, TableStage};
use polars::prelude::{col, Expr};
use serde::{Deserialize, Serialize};

/// Ratio families, in the order the engine runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioFamily {
    Liquidity,
    Profitability,
    Leverage,
    Efficiency,
    Market,
}

impl RatioFamily {
    pub const ALL: [RatioFamily; 5] = [
        RatioFamily::Liquidity,
        RatioFamily::Profitability,
        RatioFamily::Leverage,
        RatioFamily::Efficiency,
        RatioFamily::Market,
    ];
}

/// One entry of the ratio table.
///
/// `expr` builds the column expression; it reads only `required`.
#[derive(Debug, Clone, Copy)]
pub struct RatioRule {
    pub name: &'static str,
    pub family: RatioFamily,
    pub output: &'static str,
    pub required: &'static [&'static str],
    pub expr: fn() -> Expr,
}

impl RatioRule {
    fn derivation(&self) -> Derivation<'static> {
        Derivation {
            stage: StageKind::Ratios,
            metric: self.name,
            output: self.output,
            required: self.required,
        }
    }
}

pub const RATIO_RULES: &[RatioRule] = &[
    // Liquidity
    RatioRule {
        name: "Current Ratio",
        family: RatioFamily::Liquidity,
        output: CURRENT_RATIO,
        required: &[CURRENT_ASSETS, CURRENT_LIABILITIES],
        expr: || col(CURRENT_ASSETS) / col(CURRENT_LIABILITIES),
    },
    RatioRule {
        name: "Quick Ratio",
        family: RatioFamily::Liquidity,
        output: QUICK_RATIO,
        required: &[CURRENT_ASSETS, INVENTORY, CURRENT_LIABILITIES],
        expr: || (col(CURRENT_ASSETS) - col(INVENTORY)) / col(CURRENT_LIABILITIES),
    },
    RatioRule {
        name: "Cash Ratio",
        family: RatioFamily::Liquidity,
        output: CASH_RATIO,
        required: &[CASH, CURRENT_LIABILITIES],
        expr: || col(CASH) / col(CURRENT_LIABILITIES),
    },
    // Profitability
    RatioRule {
        name: "Gross Margin",
        family: RatioFamily::Profitability,
        output: GROSS_MARGIN,
        required: &[REVENUE, COGS],
        expr: || (col(REVENUE) - col(COGS)) / col(REVENUE),
    },
    RatioRule {
        name: "Operating Margin",
        family: RatioFamily::Profitability,
        output: OPERATING_MARGIN,
        required: &[OPERATING_INCOME, REVENUE],
        expr: || col(OPERATING_INCOME) / col(REVENUE),
    },
    RatioRule {
        name: "Net Profit Margin",
        family: RatioFamily::Profitability,
        output: NET_PROFIT_MARGIN,
        required: &[NET_INCOME, REVENUE],
        expr: || col(NET_INCOME) / col(REVENUE),
    },
    RatioRule {
        name: "ROA",
        family: RatioFamily::Profitability,
        output: ROA,
        required: &[NET_INCOME, TOTAL_ASSETS],
        expr: || col(NET_INCOME) / col(TOTAL_ASSETS),
    },
    RatioRule {
        name: "ROE",
        family: RatioFamily::Profitability,
        output: ROE,
        required: &[NET_INCOME, EQUITY],
        expr: || col(NET_INCOME) / col(EQUITY),
    },
    // Leverage
    RatioRule {
        name: "Debt to Assets",
        family: RatioFamily::Leverage,
        output: DEBT_TO_ASSETS,
        required: &[TOTAL_LIABILITIES, TOTAL_ASSETS],
        expr: || col(TOTAL_LIABILITIES) / col(TOTAL_ASSETS),
    },
    RatioRule {
        name: "Debt to Equity",
        family: RatioFamily::Leverage,
        output: DEBT_TO_EQUITY,
        required: &[TOTAL_LIABILITIES, EQUITY],
        expr: || col(TOTAL_LIABILITIES) / col(EQUITY),
    },
    RatioRule {
        name: "Debt Ratio",
        family: RatioFamily::Leverage,
        output: DEBT_RATIO,
        required: &[TOTAL_LIABILITIES, EQUITY],
        expr: || col(TOTAL_LIABILITIES) / (col(EQUITY) + col(TOTAL_LIABILITIES)),
    },
    RatioRule {
        name: "Interest Coverage",
        family: RatioFamily::Leverage,
        output: INTEREST_COVERAGE,
        required: &[OPERATING_INCOME, INTEREST_EXPENSE],
        expr: || col(OPERATING_INCOME) / col(INTEREST_EXPENSE),
    },
    // Efficiency
    RatioRule {
        name: "Asset Turnover",
        family: RatioFamily::Efficiency,
        output: ASSET_TURNOVER,
        required: &[REVENUE, TOTAL_ASSETS],
        expr: || col(REVENUE) / col(TOTAL_ASSETS),
    },
    RatioRule {
        name: "Inventory Turnover",
        family: RatioFamily::Efficiency,
        output: INVENTORY_TURNOVER,
        required: &[COGS, INVENTORY],
        expr: || col(COGS) / col(INVENTORY),
    },
    RatioRule {
        name: "Receivables Turnover",
        family: RatioFamily::Efficiency,
        output: RECEIVABLES_TURNOVER,
        required: &[REVENUE, ACCOUNTS_RECEIVABLE],
        expr: || col(REVENUE) / col(ACCOUNTS_RECEIVABLE),
    },
    // Market / valuation
    RatioRule {
        name: "P/E",
        family: RatioFamily::Market,
        output: PE_RATIO,
        required: &[MARKET_PRICE, EPS],
        expr: || col(MARKET_PRICE) / col(EPS),
    },
    RatioRule {
        name: "P/B",
        family: RatioFamily::Market,
        output: PB_RATIO,
        required: &[MARKET_PRICE, BOOK_VALUE_PER_SHARE],
        expr: || col(MARKET_PRICE) / col(BOOK_VALUE_PER_SHARE),
    },
    RatioRule {
        name: "Enterprise Value",
        family: RatioFamily::Market,
        output: ENTERPRISE_VALUE,
        required: &[MARKET_CAP, TOTAL_LIABILITIES, CASH],
        expr: || col(MARKET_CAP) + col(TOTAL_LIABILITIES) - col(CASH),
    },
    RatioRule {
        name: "EV/EBITDA",
        family: RatioFamily::Market,
        output: EV_EBITDA,
        required: &[MARKET_CAP, TOTAL_LIABILITIES, CASH, EBITDA],
        expr: || (col(MARKET_CAP) + col(TOTAL_LIABILITIES) - col(CASH)) / col(EBITDA),
    },
    RatioRule {
        name: "Dividend Yield",
        family: RatioFamily::Market,
        output: DIVIDEND_YIELD,
        required: &[DIVIDEND_PER_SHARE, MARKET_PRICE],
        expr: || col(DIVIDEND_PER_SHARE) / col(MARKET_PRICE),
    },
];

/// Runs the ratio table over a table of financials.
///
/// Each rule is independent: a rule whose inputs are missing is skipped and
/// recorded, the rest still run.
#[derive(Debug, Clone)]
pub struct RatioEngine {
    families: Vec<RatioFamily>,
}

impl RatioEngine {
    pub fn new() -> Self {
        Self {
            families: RatioFamily::ALL.to_vec(),
        }
    }

    pub fn with_families(families: &[RatioFamily]) -> Self {
        Self {
            families: families.to_vec(),
        }
    }

    pub fn rules(family: RatioFamily) -> impl Iterator<Item = &'static RatioRule> {
        RATIO_RULES.iter().filter(move |r| r.family == family)
    }

    pub fn rule(output: &str) -> Option<&'static RatioRule> {
        RATIO_RULES.iter().find(|r| r.output == output)
    }

    pub fn run_family(
        &self,
        family: RatioFamily,
        table: FinancialTable,
        diagnostics: &mut Diagnostics,
    ) -> FinancialTable {
        Self::rules(family).fold(table, |table, rule| {
            table.derive(rule.derivation(), diagnostics, (rule.expr)())
        })
    }
}

impl TableStage for RatioEngine {
    fn kind(&self) -> StageKind {
        StageKind::Ratios
    }

    fn apply(&self, table: FinancialTable, diagnostics: &mut Diagnostics) -> FinancialTable {
        let before = diagnostics.skipped.len();
        let table = self
            .families
            .iter()
            .fold(table, |table, &family| self.run_family(family, table, diagnostics));

        tracing::info!(
            skipped = diagnostics.skipped.len() - before,
            "Ratio engine finished"
        );
        table
    }
}

impl Default for RatioEngine {
    fn default() -> Self {
        Self::new()
    }
}
