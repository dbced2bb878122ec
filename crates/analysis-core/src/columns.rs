//! Column names shared by every stage.
//!
//! Source columns match the headers of the input dataset; derived columns are
//! appended by the stages that compute them.

// Entity label
pub const COMPANY: &str = "Company";

// Balance sheet
pub const CURRENT_ASSETS: &str = "CurrentAssets";
pub const CURRENT_LIABILITIES: &str = "CurrentLiabilities";
pub const INVENTORY: &str = "Inventory";
pub const CASH: &str = "Cash";
pub const TOTAL_ASSETS: &str = "TotalAssets";
pub const TOTAL_LIABILITIES: &str = "TotalLiabilities";
pub const EQUITY: &str = "Equity";
pub const ACCOUNTS_RECEIVABLE: &str = "AccountsReceivable";

// Income statement
pub const REVENUE: &str = "Revenue";
pub const COGS: &str = "COGS";
pub const OPERATING_INCOME: &str = "OperatingIncome";
pub const NET_INCOME: &str = "NetIncome";
pub const INTEREST_EXPENSE: &str = "InterestExpense";
pub const EBITDA: &str = "EBITDA";

// Market data
pub const MARKET_PRICE: &str = "MarketPrice";
pub const EPS: &str = "EPS";
pub const BOOK_VALUE_PER_SHARE: &str = "BookValuePerShare";
pub const MARKET_CAP: &str = "MarketCap";
pub const DIVIDEND_PER_SHARE: &str = "DividendPerShare";
pub const BETA: &str = "Beta";

// Cost of capital and cash flow
pub const COST_OF_DEBT: &str = "CostOfDebt";
pub const TAX_RATE: &str = "TaxRate";
pub const FCF: &str = "FCF";

// Factor returns
pub const EXCESS_RETURN: &str = "ExcessReturn";
pub const MARKET_EXCESS: &str = "MarketExcess";
pub const SMB: &str = "SMB";
pub const HML: &str = "HML";

// Distress inputs (consumed, never derived)
pub const DISTRESS: &str = "Distress";
pub const Z_SCORE: &str = "Z_Score";

// Data-quality flags
pub const DQ_INVALID_ASSETS: &str = "DQ_Invalid_Assets";
pub const DQ_NEGATIVE_EQUITY: &str = "DQ_Negative_Equity";
pub const DQ_INVALID_FCF: &str = "DQ_Invalid_FCF";
pub const DQ_INVALID_WACC: &str = "DQ_Invalid_WACC";

// Liquidity
pub const CURRENT_RATIO: &str = "Current_Ratio";
pub const QUICK_RATIO: &str = "Quick_Ratio";
pub const CASH_RATIO: &str = "Cash_Ratio";

// Profitability
pub const GROSS_MARGIN: &str = "Gross_Margin";
pub const OPERATING_MARGIN: &str = "Operating_Margin";
pub const NET_PROFIT_MARGIN: &str = "Net_Profit_Margin";
pub const ROA: &str = "ROA";
pub const ROE: &str = "ROE";

// Leverage
pub const DEBT_TO_ASSETS: &str = "Debt_to_Assets";
pub const DEBT_TO_EQUITY: &str = "Debt_to_Equity";
pub const DEBT_RATIO: &str = "Debt_Ratio";
pub const INTEREST_COVERAGE: &str = "Interest_Coverage";

// Efficiency
pub const ASSET_TURNOVER: &str = "Asset_Turnover";
pub const INVENTORY_TURNOVER: &str = "Inventory_Turnover";
pub const RECEIVABLES_TURNOVER: &str = "Receivables_Turnover";

// Market / valuation ratios
pub const PE_RATIO: &str = "P_E";
pub const PB_RATIO: &str = "P_B";
pub const ENTERPRISE_VALUE: &str = "Enterprise_Value";
pub const EV_EBITDA: &str = "EV_EBITDA";
pub const DIVIDEND_YIELD: &str = "Dividend_Yield";

// Valuation chain
pub const EXPECTED_RETURN: &str = "Expected_Return";
pub const EQUITY_WEIGHT: &str = "Equity_Weight";
pub const DEBT_WEIGHT: &str = "Debt_Weight";
pub const WACC: &str = "WACC";
pub const DCF_VALUE: &str = "DCF_Value";

// Fama-French loadings
pub const ALPHA: &str = "Alpha";
pub const BETA_MARKET: &str = "Beta_Market";
pub const BETA_SMB: &str = "Beta_SMB";
pub const BETA_HML: &str = "Beta_HML";

// Distress model output
pub const DISTRESS_LOGREG_PRED: &str = "Distress_LogReg_Pred";
pub const DISTRESS_NN_PRED: &str = "Distress_NN_Pred";
