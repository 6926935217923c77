use anyhow::Result;
use auctionscout_lib::{DbStats, PricePoint, ValidatedRecord};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            "markdown" | "md" => OutputFormat::Markdown,
            _ => OutputFormat::Table,
        }
    }
}

#[derive(Tabled, Serialize)]
struct ValidatedRow {
    #[tabled(rename = "TID")]
    #[serde(rename = "TID")]
    tid: i64,
    #[tabled(rename = "Case")]
    #[serde(rename = "Case")]
    case_number: String,
    #[tabled(rename = "Address")]
    #[serde(rename = "Address")]
    address: String,
    #[tabled(rename = "Appraisal")]
    #[serde(rename = "Appraisal")]
    appraisal: String,
    #[tabled(rename = "Minimum")]
    #[serde(rename = "Minimum")]
    minimum: String,
    #[tabled(rename = "Failures")]
    #[serde(rename = "Failures")]
    failures: String,
    #[tabled(rename = "Pyung")]
    #[serde(rename = "Pyung")]
    pyung: String,
    #[tabled(rename = "Yearly Tx")]
    #[serde(rename = "Yearly Tx")]
    yearly_transactions: i64,
    #[tabled(rename = "Recent Min")]
    #[serde(rename = "Recent Min")]
    recent_min: String,
    #[tabled(rename = "Recent Max")]
    #[serde(rename = "Recent Max")]
    recent_max: String,
    #[tabled(rename = "Recent Avg")]
    #[serde(rename = "Recent Avg")]
    recent_avg: String,
    #[tabled(rename = "AI Price")]
    #[serde(rename = "AI Price")]
    ai_price: String,
    #[tabled(rename = "Public Price")]
    #[serde(rename = "Public Price")]
    public_price: String,
}

#[derive(Tabled, Serialize)]
struct StatRow {
    #[tabled(rename = "Metric")]
    #[serde(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Count")]
    #[serde(rename = "Count")]
    count: i64,
}

// -- Row builders --

fn build_validated_rows(items: &[ValidatedRecord]) -> Vec<ValidatedRow> {
    items
        .iter()
        .map(|r| ValidatedRow {
            tid: r.item.tid,
            case_number: r.item.case_number.clone().unwrap_or_default(),
            address: r.item.address.clone(),
            appraisal: format_amount(r.item.appraisal_amount),
            minimum: format_amount(r.item.minimum_amount),
            failures: r.item.failure_count.map(|n| n.to_string()).unwrap_or_default(),
            pyung: r
                .item
                .building_area_pyung
                .map(|p| format!("{:.2}", p))
                .unwrap_or_default(),
            yearly_transactions: r.item.yearly_transaction_count,
            recent_min: format_point(r.recent_min_price.as_ref()),
            recent_max: format_point(r.recent_max_price.as_ref()),
            recent_avg: format_amount(r.recent_avg_price),
            ai_price: format_amount(r.unit_ai_price),
            public_price: format_amount(r.unit_public_price),
        })
        .collect()
}

fn build_stat_rows(stats: &DbStats) -> Vec<StatRow> {
    let mut rows = vec![
        StatRow {
            metric: "auction items".to_string(),
            count: stats.auction_items,
        },
        StatRow {
            metric: "with case number".to_string(),
            count: stats.with_case_number,
        },
    ];
    rows.extend(stats.per_year.iter().map(|(year, count)| StatRow {
        metric: format!("case year {}", year),
        count: *count,
    }));
    rows.push(StatRow {
        metric: "validated items".to_string(),
        count: stats.validated_items,
    });
    rows.push(StatRow {
        metric: "enriched items".to_string(),
        count: stats.enriched_items,
    });
    rows
}

// -- Printers --

pub fn print_validated(items: &[ValidatedRecord], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&items),
        other => print_rows(build_validated_rows(items), other)?,
    }
    Ok(())
}

pub fn print_stats(stats: &DbStats, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(stats),
        other => print_rows(build_stat_rows(stats), other)?,
    }
    Ok(())
}

fn print_rows<T: Tabled + Serialize>(rows: Vec<T>, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Markdown => {
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);
        }
        _ => println!("{}", Table::new(rows)),
    }
    Ok(())
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

/// Render an amount given in units of 10,000 won, e.g. `8억 5,000만`.
fn format_manwon(value: i64) -> String {
    let eok = value / 10_000;
    let man = value % 10_000;
    match (eok, man) {
        (0, m) => format!("{}만", group_thousands(m)),
        (e, 0) => format!("{}억", group_thousands(e)),
        (e, m) => format!("{}억 {}만", group_thousands(e), group_thousands(m)),
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn format_amount(value: Option<i64>) -> String {
    value.map(format_manwon).unwrap_or_default()
}

fn format_point(point: Option<&PricePoint>) -> String {
    point
        .map(|p| format!("{} ({}, {})", format_manwon(p.price), p.floor, p.date))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use auctionscout_lib::ValidatedItem;
    use chrono::NaiveDate;

    fn record() -> ValidatedRecord {
        ValidatedRecord {
            item: ValidatedItem {
                tid: 7,
                case_number: Some("2024-16379".to_string()),
                address: "서울 강남구 역삼동 101동 1203호".to_string(),
                appraisal_amount: Some(85000),
                minimum_amount: Some(59500),
                failure_count: Some(1),
                building_area_pyung: Some(25.7),
                yearly_transaction_count: 4,
                ..ValidatedItem::default()
            },
            recent_min_price: Some(PricePoint {
                price: 48000,
                floor: "3층".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            }),
            recent_max_price: None,
            recent_avg_price: Some(50000),
            recent_transaction_count: Some(2),
            unit_ai_price: None,
            unit_public_price: Some(41000),
            enriched_at: None,
        }
    }

    #[test]
    fn format_manwon_splits_eok_and_man() {
        assert_eq!(format_manwon(85000), "8억 5,000만");
        assert_eq!(format_manwon(7000), "7,000만");
        assert_eq!(format_manwon(50000), "5억");
        assert_eq!(format_manwon(1_230_000), "123억");
        assert_eq!(format_manwon(0), "0만");
    }

    #[test]
    fn group_thousands_inserts_commas() {
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(-1000), "-1,000");
    }

    #[test]
    fn validated_row_mapping() {
        let rows = build_validated_rows(&[record()]);
        let row = &rows[0];
        assert_eq!(row.tid, 7);
        assert_eq!(row.appraisal, "8억 5,000만");
        assert_eq!(row.pyung, "25.70");
        assert_eq!(row.recent_min, "4억 8,000만 (3층, 2025-03-02)");
        assert_eq!(row.recent_max, "");
        assert_eq!(row.ai_price, "");
        assert_eq!(row.public_price, "4억 1,000만");
    }

    #[test]
    fn csv_headers() {
        let rows = build_validated_rows(&[record()]);
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in &rows {
            wtr.serialize(row).unwrap();
        }
        wtr.flush().unwrap();
        let csv = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(
            csv.lines().next().unwrap(),
            "TID,Case,Address,Appraisal,Minimum,Failures,Pyung,Yearly Tx,Recent Min,Recent Max,Recent Avg,AI Price,Public Price"
        );
    }

    #[test]
    fn stat_rows_include_per_year_counts() {
        let stats = DbStats {
            auction_items: 10,
            with_case_number: 8,
            per_year: vec![("2025".to_string(), 5), ("2024".to_string(), 3)],
            validated_items: 4,
            enriched_items: 2,
        };
        let rows = build_stat_rows(&stats);
        let metrics: Vec<&str> = rows.iter().map(|r| r.metric.as_str()).collect();
        assert_eq!(
            metrics,
            vec![
                "auction items",
                "with case number",
                "case year 2025",
                "case year 2024",
                "validated items",
                "enriched items"
            ]
        );
    }

    #[test]
    fn markdown_table_has_headers() {
        let mut table = Table::new(build_validated_rows(&[record()]));
        table.with(Style::markdown());
        let md = table.to_string();
        assert!(md.contains("| TID"));
        assert!(md.contains("---"));
    }

    #[test]
    fn unknown_format_falls_back_to_table() {
        assert_eq!(OutputFormat::parse("md"), OutputFormat::Markdown);
        assert_eq!(OutputFormat::parse("xml"), OutputFormat::Table);
    }
}
