//! Plain-text report: one prose block per company.

use analysis_core::columns::*;
use analysis_core::FinancialTable;
use chrono::NaiveDateTime;

const RULE_WIDTH: usize = 60;

/// How a metric value is printed inside its sentence
#[derive(Clone, Copy)]
enum Format {
    Rounded,
    /// Class labels, printed without decimals
    Integer,
}

struct Line {
    column: &'static str,
    format: Format,
    sentence: fn(&str) -> String,
}

struct Section {
    title: &'static str,
    lines: &'static [Line],
}

const fn rounded(column: &'static str, sentence: fn(&str) -> String) -> Line {
    Line {
        column,
        format: Format::Rounded,
        sentence,
    }
}

const SECTIONS: &[Section] = &[
    Section {
        title: "Liquidity Position",
        lines: &[
            rounded(CURRENT_RATIO, |v| {
                format!("The current ratio is {v}, indicating the firm's ability to meet short-term obligations.")
            }),
            rounded(QUICK_RATIO, |v| {
                format!("The quick ratio of {v} reflects liquidity excluding inventories.")
            }),
            rounded(CASH_RATIO, |v| {
                format!("The cash ratio stands at {v}, representing the most conservative liquidity measure.")
            }),
        ],
    },
    Section {
        title: "Profitability Analysis",
        lines: &[
            rounded(ROA, |v| {
                format!("Return on Assets (ROA) equals {v}, indicating efficiency in using total assets to generate profits.")
            }),
            rounded(ROE, |v| {
                format!("Return on Equity (ROE) of {v} reflects the return generated for shareholders.")
            }),
            rounded(NET_PROFIT_MARGIN, |v| {
                format!("Net profit margin is {v}, showing the proportion of revenue converted into net income.")
            }),
            rounded(GROSS_MARGIN, |v| {
                format!("Gross margin of {v} shows the share of revenue left after the cost of goods sold.")
            }),
            rounded(OPERATING_MARGIN, |v| {
                format!("Operating margin is {v}, measuring profit from core operations per unit of revenue.")
            }),
        ],
    },
    Section {
        title: "Capital Structure and Financial Risk",
        lines: &[
            rounded(DEBT_TO_EQUITY, |v| {
                format!("Debt-to-equity ratio of {v} suggests the degree of financial leverage employed by the firm.")
            }),
            rounded(DEBT_TO_ASSETS, |v| {
                format!("Debt-to-assets ratio equals {v}, indicating the proportion of assets financed through liabilities.")
            }),
            rounded(DEBT_RATIO, |v| {
                format!("Debt ratio of {v} gives the share of liabilities in total capital.")
            }),
            rounded(INTEREST_COVERAGE, |v| {
                format!("Interest coverage of {v} shows how many times operating income covers interest expense.")
            }),
        ],
    },
    Section {
        title: "Operational Efficiency",
        lines: &[
            rounded(ASSET_TURNOVER, |v| {
                format!("Asset turnover of {v} reflects how effectively assets are utilized to generate revenue.")
            }),
            rounded(INVENTORY_TURNOVER, |v| {
                format!("Inventory turnover of {v} indicates the efficiency of inventory management.")
            }),
            rounded(RECEIVABLES_TURNOVER, |v| {
                format!("Receivables turnover of {v} indicates how quickly credit sales are collected.")
            }),
        ],
    },
    Section {
        title: "Valuation Indicators",
        lines: &[
            rounded(EXPECTED_RETURN, |v| {
                format!("The CAPM cost of equity is {v}, given the firm's market beta.")
            }),
            rounded(WACC, |v| {
                format!("The weighted average cost of capital (WACC) is estimated at {v}, representing the firm's average financing cost.")
            }),
            rounded(DCF_VALUE, |v| {
                format!("The discounted cash flow (DCF) valuation yields an estimated firm value of {v}.")
            }),
        ],
    },
    Section {
        title: "Market-Based Indicators",
        lines: &[
            rounded(PE_RATIO, |v| {
                format!("The price-to-earnings (P/E) ratio equals {v}, reflecting market expectations of future earnings.")
            }),
            rounded(PB_RATIO, |v| {
                format!("The price-to-book (P/B) ratio of {v} compares market value to accounting equity.")
            }),
            rounded(DIVIDEND_YIELD, |v| {
                format!("Dividend yield stands at {v}, representing cash return to shareholders.")
            }),
            rounded(EV_EBITDA, |v| {
                format!("Enterprise value to EBITDA is {v}, a capital-structure-neutral valuation multiple.")
            }),
        ],
    },
    Section {
        title: "Financial Distress Assessment",
        lines: &[
            rounded(Z_SCORE, |v| {
                format!("The Altman Z-score is {v}, serving as an early warning indicator of financial distress.")
            }),
            Line {
                column: DISTRESS_LOGREG_PRED,
                format: Format::Integer,
                sentence: |v| format!("Logistic regression model predicts distress status as {v}."),
            },
            Line {
                column: DISTRESS_NN_PRED,
                format: Format::Integer,
                sentence: |v| format!("Neural network model predicts distress status as {v}."),
            },
        ],
    },
];

/// Render the whole report. Metrics that are absent or NaN for a row are
/// left out of that row's block; section headers are always printed.
pub fn render_report(table: &FinancialTable, generated_at: NaiveDateTime, digits: usize) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let separator = "-".repeat(RULE_WIDTH);

    let mut lines = vec![
        "FINANCIAL ANALYSIS REPORT".to_string(),
        rule,
        format!("Generated on: {}", generated_at.format("%Y-%m-%d %H:%M")),
        String::new(),
    ];

    for row in 0..table.len() {
        lines.push(separator.clone());
        lines.push(format!(
            "Company: {}",
            table.entity_name(row).unwrap_or("Unknown Firm")
        ));
        lines.push(separator.clone());

        for (i, section) in SECTIONS.iter().enumerate() {
            if i > 0 {
                lines.push(String::new());
            }
            lines.push(format!("{}:", section.title));

            for line in section.lines {
                let Some(value) = table.number_at(line.column, row) else {
                    continue;
                };
                let text = match line.format {
                    Format::Rounded => format!("{:.*}", digits, value),
                    Format::Integer => format!("{}", value.trunc() as i64),
                };
                lines.push(format!("- {}", (line.sentence)(&text)));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap()
    }

    #[test]
    fn test_header_and_company_block() {
        let table = FinancialTable::new(1)
            .with_text(COMPANY, vec!["Acme".to_string()])
            .unwrap()
            .with_numbers(CURRENT_RATIO, vec![2.0])
            .unwrap()
            .with_numbers(QUICK_RATIO, vec![f64::NAN])
            .unwrap();

        let report = render_report(&table, timestamp(), 2);
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "FINANCIAL ANALYSIS REPORT");
        assert_eq!(lines[1], "=".repeat(60));
        assert_eq!(lines[2], "Generated on: 2024-03-15 09:30");
        assert_eq!(lines[5], "Company: Acme");
        assert_eq!(lines[7], "Liquidity Position:");
        assert_eq!(
            lines[8],
            "- The current ratio is 2.00, indicating the firm's ability to meet short-term obligations."
        );
        assert!(!report.contains("quick ratio"));
    }

    #[test]
    fn test_all_sections_present_without_metrics() {
        let report = render_report(&FinancialTable::new(1), timestamp(), 2);
        for section in SECTIONS {
            assert!(report.contains(&format!("{}:", section.title)));
        }
        assert!(report.contains("Company: Unknown Firm"));
        assert!(!report.contains("- "));
    }

    #[test]
    fn test_predictions_print_as_integers() {
        let table = FinancialTable::new(1)
            .with_numbers(DISTRESS_LOGREG_PRED, vec![1.0])
            .unwrap()
            .with_numbers(WACC, vec![0.08125])
            .unwrap();

        let report = render_report(&table, timestamp(), 3);
        assert!(report.contains("predicts distress status as 1."));
        assert!(report.contains("estimated at 0.081,"));
    }
}
