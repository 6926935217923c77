//! Field extraction from rendered page snapshots.
//!
//! Each field is located by an ordered list of [`Probe`]s, most specific
//! first. The first probe whose text also parses wins; when every probe
//! misses the field is `None` and callers report it as unavailable.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::aggregate::{MonthlyCount, TransactionRecord};
use crate::types::AuctionItem;
use crate::normalize::{
    cached, extract_case_number, parse_failure_count, parse_manwon, parse_price_pair,
    parse_short_date, parse_year_month, second_integer,
};

/// Domain of the property valuation portal.
pub const VALUATION_DOMAIN: &str = "bdsplanet.com";
/// Domain of the national public land price lookup.
pub const LAND_PRICE_DOMAIN: &str = "realtyprice.kr";

static TID: OnceLock<Option<Regex>> = OnceLock::new();
static QUOTED_URL: OnceLock<Option<Regex>> = OnceLock::new();

/// One way of locating a field's text on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// A `th`/`td` whose whole text is the label; the value is the next cell.
    LabelCell(&'static str),
    /// Text of the first element matching a CSS selector.
    Css(&'static str),
    /// Capture group 1 of a pattern applied to the page text.
    TextPattern(&'static str),
}

const CASE_NUMBER: &[Probe] = &[
    Probe::LabelCell("사건번호"),
    Probe::TextPattern(r"(\d{4}\s*(?:타경|-)\s*\d+(?:\(\d+\))?)"),
];
const ADDRESS: &[Probe] = &[
    Probe::LabelCell("소재지"),
    Probe::LabelCell("주소"),
    Probe::Css(".addr"),
];
const APPRAISAL: &[Probe] = &[
    Probe::LabelCell("감정가"),
    Probe::LabelCell("감정가액"),
    Probe::TextPattern(r"감정가액?\s*[:：]?\s*([\d,억\s]+만원)"),
];
const MINIMUM: &[Probe] = &[
    Probe::LabelCell("최저가"),
    Probe::LabelCell("최저매각가격"),
    Probe::LabelCell("최저가격"),
    Probe::TextPattern(r"최저(?:매각)?가격?\s*[:：]?\s*([\d,억\s]+만원)"),
];
const FAILURES: &[Probe] = &[
    Probe::LabelCell("유찰횟수"),
    Probe::LabelCell("유찰"),
    Probe::TextPattern(r"(유찰\s*\d+\s*회)"),
];
const LAND_AREA: &[Probe] = &[Probe::LabelCell("토지면적"), Probe::LabelCell("대지권")];
const BUILDING_AREA: &[Probe] = &[
    Probe::LabelCell("건물면적"),
    Probe::LabelCell("전용면적"),
];
const APPROVAL_DATE: &[Probe] = &[
    Probe::LabelCell("사용승인일"),
    Probe::LabelCell("사용승인"),
    Probe::LabelCell("보존등기일"),
];
const ELEVATORS: &[Probe] = &[Probe::LabelCell("승강기"), Probe::LabelCell("엘리베이터")];
const FLOORS: &[Probe] = &[Probe::LabelCell("층수"), Probe::LabelCell("총층수")];

/// Try each strategy in order and return the first success with its index.
pub fn first_match<S, T>(
    strategies: &[S],
    mut attempt: impl FnMut(&S) -> Option<T>,
) -> Option<(usize, T)> {
    strategies
        .iter()
        .enumerate()
        .find_map(|(i, s)| attempt(s).map(|v| (i, v)))
}

/// Outbound links to the two valuation sites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValuationLinks {
    pub bdsplanet: Option<String>,
    pub land_price: Option<String>,
}

/// Everything read from an auction detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailFields {
    pub case_number: Option<String>,
    pub address: Option<String>,
    pub appraisal_amount: Option<i64>,
    pub minimum_amount: Option<i64>,
    pub failure_count: Option<i64>,
    pub land_area: Option<String>,
    pub building_area: Option<String>,
    pub approval_date: Option<String>,
    pub elevator_count: Option<i64>,
    pub floor_count: Option<i64>,
    pub previous_minimum_amount: Option<i64>,
    pub links: ValuationLinks,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Non-empty text nodes of `el`, trimmed, one per line.
pub(crate) fn element_lines(el: &ElementRef<'_>) -> Vec<String> {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn element_text(el: &ElementRef<'_>) -> String {
    element_lines(el).join(" ")
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches([':', '：'])
        .to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() || s == "-" {
        None
    } else {
        Some(s)
    }
}

fn label_value(doc: &Html, label: &str) -> Option<String> {
    let cells = selector("th, td")?;
    doc.select(&cells)
        .filter(|cell| compact(&element_text(cell)) == label)
        .find_map(|cell| {
            let value = cell.next_siblings().find_map(ElementRef::wrap)?;
            non_empty(element_text(&value))
        })
}

fn page_text(doc: &Html) -> String {
    element_lines(&doc.root_element()).join("\n")
}

/// Text located by a single probe, if any.
pub fn probe(doc: &Html, probe: &Probe) -> Option<String> {
    match probe {
        Probe::LabelCell(label) => label_value(doc, label),
        Probe::Css(css) => {
            let sel = selector(css)?;
            doc.select(&sel)
                .find_map(|el| non_empty(element_text(&el)))
        }
        Probe::TextPattern(pattern) => {
            let re = Regex::new(pattern).ok()?;
            let text = page_text(doc);
            let value = re.captures(&text)?.get(1)?.as_str().trim().to_string();
            non_empty(value)
        }
    }
}

fn field<T>(
    doc: &Html,
    name: &str,
    probes: &[Probe],
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    match first_match(probes, |p| probe(doc, p).and_then(|text| parse(&text))) {
        Some((idx, value)) => {
            tracing::debug!(field = name, strategy = idx, "field located");
            Some(value)
        }
        None => {
            tracing::debug!(field = name, "field unavailable");
            None
        }
    }
}

fn normalized_case_number(text: &str) -> Option<String> {
    let dashed: String = text.replace("타경", "-").split_whitespace().collect();
    extract_case_number(&dashed)
}

/// Read every detail field from an auction detail page.
pub fn extract_detail(doc: &Html) -> DetailFields {
    DetailFields {
        case_number: field(doc, "case_number", CASE_NUMBER, normalized_case_number),
        address: field(doc, "address", ADDRESS, |t| Some(t.to_string())),
        appraisal_amount: field(doc, "appraisal_amount", APPRAISAL, parse_manwon),
        minimum_amount: field(doc, "minimum_amount", MINIMUM, parse_manwon),
        failure_count: field(doc, "failure_count", FAILURES, |t| {
            parse_failure_count(t).or_else(|| t.trim().parse().ok())
        }),
        land_area: field(doc, "land_area", LAND_AREA, |t| Some(t.to_string())),
        building_area: field(doc, "building_area", BUILDING_AREA, |t| Some(t.to_string())),
        approval_date: field(doc, "approval_date", APPROVAL_DATE, |t| Some(t.to_string())),
        elevator_count: field(doc, "elevator_count", ELEVATORS, second_integer),
        floor_count: field(doc, "floor_count", FLOORS, second_integer),
        previous_minimum_amount: previous_round_minimum(doc),
        links: valuation_links(doc),
    }
}

/// Minimum price of the second-to-last round in the bidding history table.
pub fn previous_round_minimum(doc: &Html) -> Option<i64> {
    let tables = selector("table")?;
    let rows = selector("tr")?;
    let headers = selector("th")?;
    let cells = selector("td")?;

    for table in doc.select(&tables) {
        let mut header: Vec<String> = Vec::new();
        let mut data: Vec<Vec<String>> = Vec::new();
        for row in table.select(&rows) {
            let th: Vec<String> = row.select(&headers).map(|c| element_text(&c)).collect();
            if header.is_empty() && !th.is_empty() {
                header = th;
                continue;
            }
            let td: Vec<String> = row.select(&cells).map(|c| element_text(&c)).collect();
            if !td.is_empty() {
                data.push(td);
            }
        }
        let is_history = header.iter().any(|h| h.contains("최저"))
            && header.iter().any(|h| h.contains("회차") || h.contains("기일"));
        if !is_history || data.len() < 2 {
            continue;
        }
        let column = header.iter().position(|h| h.contains("최저")).unwrap_or(2);
        let previous = &data[data.len() - 2];
        return previous.get(column).and_then(|c| parse_manwon(c));
    }
    None
}

/// Links to the valuation sites, pulled from inline click handlers and hrefs.
pub fn valuation_links(doc: &Html) -> ValuationLinks {
    let mut links = ValuationLinks::default();
    let (Some(re), Some(sel)) = (
        cached(&QUOTED_URL, r#"['"](https?://[^'"]+)['"]"#),
        selector("[onclick], a[href]"),
    ) else {
        return links;
    };

    for el in doc.select(&sel) {
        let onclick = el.value().attr("onclick").unwrap_or_default();
        let href = el.value().attr("href").unwrap_or_default();
        let candidates = re
            .captures_iter(onclick)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .chain(href.starts_with("http").then(|| href.to_string()));
        for url in candidates {
            if links.bdsplanet.is_none() && url.contains(VALUATION_DOMAIN) {
                links.bdsplanet = Some(url);
            } else if links.land_price.is_none() && url.contains(LAND_PRICE_DOMAIN) {
                links.land_price = Some(url);
            }
        }
    }
    links
}

/// Rows of the auction listing table (`#tblLst`), skipping rows without a tid.
pub fn listing_rows(doc: &Html) -> Vec<AuctionItem> {
    let (Some(primary), Some(fallback), Some(cells), Some(tid_re)) = (
        selector("#tblLst tr"),
        selector("table tr"),
        selector("td"),
        cached(&TID, r"cntsViewPN\((\d+)"),
    ) else {
        return Vec::new();
    };

    let mut rows: Vec<ElementRef<'_>> = doc.select(&primary).collect();
    if rows.is_empty() {
        rows = doc.select(&fallback).collect();
    }

    rows.into_iter()
        .filter_map(|row| {
            let cols: Vec<ElementRef<'_>> = row.select(&cells).collect();
            if cols.len() < 4 {
                return None;
            }
            let tid: i64 = tid_re.captures(&row.html())?.get(1)?.as_str().parse().ok()?;
            Some(listing_row(tid, &cols))
        })
        .collect()
}

fn listing_row(tid: i64, cols: &[ElementRef<'_>]) -> AuctionItem {
    let info = element_lines(&cols[2]);
    let case_line = info.iter().position(|l| extract_case_number(l).is_some());
    let case_number = case_line.and_then(|i| extract_case_number(&info[i]));
    let address = match case_line {
        Some(i) if i + 1 < info.len() => info[i + 1..].join(" "),
        _ => info.join(" "),
    };

    let price_lines = element_lines(&cols[3]);
    let mut amounts = price_lines.iter().filter_map(|l| parse_manwon(l));
    let appraisal_amount = amounts.next();
    let minimum_amount = amounts.next();

    let status_lines = cols.get(4).map(element_lines).unwrap_or_default();
    let failure_count = status_lines.iter().find_map(|l| parse_failure_count(l));
    let status = status_lines.first().cloned();
    let bid_date = cols
        .get(5)
        .map(element_lines)
        .and_then(|l| l.first().cloned());

    AuctionItem {
        tid,
        case_number,
        address,
        appraisal_amount,
        minimum_amount,
        failure_count,
        status,
        bid_date,
        raw_price: price_lines.join("\n"),
    }
}

/// Sale rows of the valuation site's transaction table. Rows whose date or
/// price does not parse are skipped.
pub fn transaction_rows(doc: &Html) -> Vec<TransactionRecord> {
    let (Some(rows), Some(date), Some(pay), Some(price), Some(floor)) = (
        selector("tbody tr.tr-click-ef"),
        selector("td.td01"),
        selector("td.td03 span.paybold"),
        selector("td.td03"),
        selector("td.td04"),
    ) else {
        return Vec::new();
    };

    doc.select(&rows)
        .filter_map(|row| {
            let date_text = row.select(&date).next().map(|c| element_text(&c))?;
            let Some(date) = parse_short_date(&date_text) else {
                tracing::debug!("skipping transaction row with date {:?}", date_text);
                return None;
            };
            let price_text = row
                .select(&pay)
                .next()
                .or_else(|| row.select(&price).next())
                .map(|c| element_text(&c))?;
            let price = parse_manwon(&price_text)?;
            let floor = row
                .select(&floor)
                .next()
                .map(|c| element_text(&c))
                .unwrap_or_default();
            Some(TransactionRecord { price, floor, date })
        })
        .collect()
}

/// Monthly transaction counts: rows whose first cell is a `YYYYMM` (or
/// `YYYY.MM`) month and whose last cell holds the count.
pub fn monthly_counts(doc: &Html) -> Vec<MonthlyCount> {
    let (Some(rows), Some(cells)) = (selector("tr"), selector("td, th")) else {
        return Vec::new();
    };
    doc.select(&rows)
        .filter_map(|row| {
            let texts: Vec<String> = row.select(&cells).map(|c| element_text(&c)).collect();
            if texts.len() < 2 {
                return None;
            }
            let ym: String = texts[0].chars().filter(char::is_ascii_digit).collect();
            let month = parse_year_month(&ym)?;
            let count_text = texts.last()?;
            let digits: String = count_text.chars().filter(char::is_ascii_digit).collect();
            let count = digits.parse().ok()?;
            Some(MonthlyCount { month, count })
        })
        .collect()
}

/// AI-estimated and public-assessed price of `unit` from the unit price list.
pub fn unit_price(doc: &Html, unit: &str) -> (Option<i64>, Option<i64>) {
    if unit.is_empty() || !unit.chars().all(|c| c.is_ascii_alphanumeric()) {
        return (None, None);
    }
    let (Some(unit_sel), Some(price_sel)) = (
        selector(&format!("span[data-honm='{}']", unit)),
        selector("span.hoPrice"),
    ) else {
        return (None, None);
    };
    let Some(span) = doc.select(&unit_sel).next() else {
        return (None, None);
    };
    let container = span
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().classes().any(|c| c == "clickSpan"));
    let Some(container) = container else {
        return (None, None);
    };
    match container.select(&price_sel).next() {
        Some(price) => parse_price_pair(&element_lines(&price).join("\n")),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn first_match_reports_winning_index() {
        let strategies = ["a", "bb", "ccc"];
        let hit = first_match(&strategies, |s| (s.len() > 1).then(|| s.to_uppercase()));
        assert_eq!(hit, Some((1, "BB".to_string())));
        assert_eq!(first_match(&strategies, |_| None::<()>), None);
    }

    #[test]
    fn label_cell_falls_through_to_next_probe() {
        let doc = Html::parse_document(
            "<table><tr><th>감정가</th><td>-</td></tr>\
             <tr><th>감정가액</th><td>2억 5,000만원</td></tr></table>",
        );
        assert_eq!(extract_detail(&doc).appraisal_amount, Some(25000));
    }

    #[test]
    fn case_number_from_court_format() {
        let doc = Html::parse_document(
            "<table><tr><td>사건번호</td><td>2024타경 16379</td></tr></table>",
        );
        assert_eq!(extract_detail(&doc).case_number.as_deref(), Some("2024-16379"));
    }

    #[test]
    fn compound_building_facts() {
        let doc = Html::parse_document(
            "<table>\
             <tr><th>승강기</th><td>비상용 1대/승용 2대</td></tr>\
             <tr><th>층수</th><td>지하 1층/지상 15층</td></tr>\
             <tr><th>사용승인일</th><td>1998.05.20</td></tr>\
             <tr><th>건물면적</th><td>84.99㎡</td></tr>\
             </table>",
        );
        let d = extract_detail(&doc);
        assert_eq!(d.elevator_count, Some(2));
        assert_eq!(d.floor_count, Some(15));
        assert_eq!(d.approval_date.as_deref(), Some("1998.05.20"));
        assert_eq!(d.building_area.as_deref(), Some("84.99㎡"));
        assert_eq!(d.land_area, None);
    }

    #[test]
    fn previous_round_uses_second_to_last_row() {
        let doc = Html::parse_document(
            "<table class='history'>\
             <tr><th>회차</th><th>매각기일</th><th>최저매각가격</th><th>결과</th></tr>\
             <tr><td>1</td><td>2025.03.01</td><td>10,000만원</td><td>유찰</td></tr>\
             <tr><td>2</td><td>2025.04.05</td><td>8,000만원</td><td>유찰</td></tr>\
             <tr><td>3</td><td>2025.05.10</td><td>6,400만원</td><td>진행</td></tr>\
             </table>",
        );
        assert_eq!(previous_round_minimum(&doc), Some(8000));
    }

    #[test]
    fn previous_round_needs_two_rounds() {
        let doc = Html::parse_document(
            "<table><tr><th>회차</th><th>기일</th><th>최저가</th></tr>\
             <tr><td>1</td><td>2025.03.01</td><td>10,000만원</td></tr></table>",
        );
        assert_eq!(previous_round_minimum(&doc), None);
    }

    #[test]
    fn links_come_from_click_handlers() {
        let doc = Html::parse_document(
            r#"<div>
               <a onclick="window.open('https://www.bdsplanet.com/map/realprice_map/abc/N/A/1/60.ytp', '_blank')">시세</a>
               <span onclick="popUp(&quot;https://www.realtyprice.kr/notice/main/mainBody.htm?pnu=11&quot;)">공시지가</span>
               <a onclick="window.open('https://example.com/other')">기타</a>
               </div>"#,
        );
        let links = valuation_links(&doc);
        assert_eq!(
            links.bdsplanet.as_deref(),
            Some("https://www.bdsplanet.com/map/realprice_map/abc/N/A/1/60.ytp")
        );
        assert_eq!(
            links.land_price.as_deref(),
            Some("https://www.realtyprice.kr/notice/main/mainBody.htm?pnu=11")
        );
    }

    #[test]
    fn listing_rows_parse_cells_and_skip_rows_without_tid() {
        let doc = Html::parse_document(
            r#"<table id="tblLst">
               <tr><th>사진</th><th>선택</th><th>물건</th><th>가격</th><th>상태</th><th>기일</th></tr>
               <tr onclick="cntsViewPN(1733001, 1, 1, 0);">
                 <td></td><td></td>
                 <td>아파트<br>2024-16379<br>서울특별시 노원구 상계동 101동 1203호</td>
                 <td>35,000만원<br>24,500만원</td>
                 <td>유찰 1회</td><td>2025.09.10</td><td>123</td>
               </tr>
               <tr><td></td><td></td><td>광고</td><td>-</td></tr>
               </table>"#,
        );
        let rows = listing_rows(&doc);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.tid, 1733001);
        assert_eq!(row.case_number.as_deref(), Some("2024-16379"));
        assert_eq!(row.address, "서울특별시 노원구 상계동 101동 1203호");
        assert_eq!(row.appraisal_amount, Some(35000));
        assert_eq!(row.minimum_amount, Some(24500));
        assert_eq!(row.failure_count, Some(1));
        assert_eq!(row.bid_date.as_deref(), Some("2025.09.10"));
    }

    #[test]
    fn transaction_rows_skip_unparseable_dates() {
        let doc = Html::parse_document(
            r#"<table><tbody>
               <tr class="tr-click-ef"><td class="td01">25.08.29</td><td class="td02">매매</td>
                 <td class="td03"><span class="paybold">4억 5,000</span>만</td><td class="td04">12층</td></tr>
               <tr class="tr-click-ef"><td class="td01">13.99.99</td><td class="td02">매매</td>
                 <td class="td03"><span class="paybold">40,000</span></td><td class="td04">3층</td></tr>
               <tr class="tr-click-ef"><td class="td01">25.01.10</td><td class="td02">매매</td>
                 <td class="td03">41,000</td><td class="td04">7층</td></tr>
               </tbody></table>"#,
        );
        let rows = transaction_rows(&doc);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 45000);
        assert_eq!(rows[0].floor, "12층");
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 8, 29).unwrap());
        assert_eq!(rows[1].price, 41000);
    }

    #[test]
    fn monthly_counts_read_month_and_count() {
        let doc = Html::parse_document(
            "<table><tr><th>년월</th><th>거래건수</th></tr>\
             <tr><td>202508</td><td>2건</td></tr>\
             <tr><td>2025.01</td><td>3</td></tr>\
             <tr><td>합계</td><td>5</td></tr></table>",
        );
        let months = monthly_counts(&doc);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, NaiveDate::from_ymd_opt(2025, 8, 1).unwrap());
        assert_eq!(months[0].count, 2);
        assert_eq!(months[1].count, 3);
    }

    #[test]
    fn unit_price_reads_price_pair() {
        let doc = Html::parse_document(
            r#"<div class="ho-list">
               <div class="clickSpan on"><span data-honm="1203">1203호</span>
                 <span class="hoPrice">4,825만<br>3,280만</span></div>
               <div class="clickSpan"><span data-honm="1204">1204호</span>
                 <span class="hoPrice">4,900만</span></div>
               </div>"#,
        );
        assert_eq!(unit_price(&doc, "1203"), (Some(4825), Some(3280)));
        assert_eq!(unit_price(&doc, "1204"), (Some(4900), None));
        assert_eq!(unit_price(&doc, "999"), (None, None));
        assert_eq!(unit_price(&doc, "1' or '1"), (None, None));
    }
}
