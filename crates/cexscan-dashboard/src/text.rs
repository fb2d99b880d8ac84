//! Plain-text renderers for frames and full-screen messages.

use cexscan_core::format::{format_number, format_percent, format_price, format_usd};
use cexscan_core::Access;
use std::fmt::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::types::{Frame, Header, PairView, ViewBody, PURCHASE_PROMPT};

/// Columns per treemap cell; emphasized tiles take two.
const TREEMAP_CELL: usize = 24;
/// Columns per grid card.
const GRID_CELL: usize = 30;

/// Render a whole frame for a display `width` columns wide.
pub fn render_frame(frame: &Frame, width: usize) -> String {
    let mut out = render_header(&frame.header);
    out.push('\n');
    match &frame.body {
        ViewBody::Treemap(pairs) => out.push_str(&render_tiles(pairs, width, TREEMAP_CELL)),
        ViewBody::Grid(pairs) => out.push_str(&render_tiles(pairs, width, GRID_CELL)),
        ViewBody::List(pairs) => out.push_str(&render_list(pairs)),
        ViewBody::NoMatches => out.push_str("No pairs match the filters.\n"),
        ViewBody::AccessDenied(access) => out.push_str(&access_prompt(*access)),
    }
    out
}

fn render_header(header: &Header) -> String {
    let mut out = String::new();
    let expiring = if header.license.expiring_soon {
        " [expiring soon]"
    } else {
        ""
    };
    let _ = writeln!(
        out,
        "cexscan | user: {} | license: {}{}",
        header.user, header.license.label, expiring
    );

    let interval = if header.interval_secs == 0 {
        "off".to_string()
    } else {
        format!("{}s", header.interval_secs)
    };
    let updated = header
        .last_update
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(
        out,
        "view: {} | sort: {} {} | interval: {} | updated: {}",
        header.view, header.sort.field, header.sort.order, interval, updated
    );
    let _ = writeln!(
        out,
        "pairs: {} | max spread: {} | volume: {}",
        header.stats.count,
        format_percent(header.stats.max_spread),
        format_usd(header.stats.total_volume)
    );
    out
}

// ============================================================================
// Tiles (treemap and grid)
// ============================================================================

fn render_tiles(pairs: &[PairView], width: usize, cell: usize) -> String {
    let columns = (width / cell).max(1);
    let mut out = String::new();
    let mut row: Vec<(usize, &PairView)> = Vec::new();
    let mut used = 0;

    for (i, view) in pairs.iter().enumerate() {
        let span = usize::from(view.span).clamp(1, columns);
        if used + span > columns {
            push_row(&mut out, &row, cell, columns);
            row.clear();
            used = 0;
        }
        row.push((i + 1, view));
        used += span;
    }
    if !row.is_empty() {
        push_row(&mut out, &row, cell, columns);
    }
    out
}

fn push_row(out: &mut String, row: &[(usize, &PairView)], cell: usize, columns: usize) {
    let tiles: Vec<[String; 3]> = row
        .iter()
        .map(|(position, view)| tile_lines(*position, view))
        .collect();
    for line in 0..3 {
        let mut text = String::new();
        for ((_, view), lines) in row.iter().zip(&tiles) {
            let span = usize::from(view.span).clamp(1, columns);
            text.push_str(&fit(&lines[line], cell * span - 1));
            text.push(' ');
        }
        out.push_str(text.trim_end());
        out.push('\n');
    }
    out.push('\n');
}

fn tile_lines(position: usize, view: &PairView) -> [String; 3] {
    let glyph = view.heat.glyph();
    let pin = if view.pinned { " ^" } else { "" };
    [
        format!("{glyph}{glyph} #{position} {}{pin}", view.coin_pair),
        format!(
            "{} {}>{}",
            format_percent(view.spread),
            view.buy_exchange,
            view.sell_exchange
        ),
        format!("{} | {}", format_usd(view.volume_usd), view.age_label),
    ]
}

/// Truncate or pad to exactly `width` characters.
fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    } else {
        format!("{text}{}", " ".repeat(width - count))
    }
}

// ============================================================================
// List
// ============================================================================

#[derive(Tabled)]
struct ListRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Pair")]
    pair: String,
    #[tabled(rename = "Network")]
    network: String,
    #[tabled(rename = "Buy")]
    buy: String,
    #[tabled(rename = "Sell")]
    sell: String,
    #[tabled(rename = "Spread")]
    spread: String,
    #[tabled(rename = "Volume")]
    volume: String,
    #[tabled(rename = "Profit")]
    profit: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Id")]
    id: String,
}

fn render_list(pairs: &[PairView]) -> String {
    let rows = pairs.iter().enumerate().map(|(i, view)| ListRow {
        position: i + 1,
        pair: if view.pinned {
            format!("{} ^", view.coin_pair)
        } else {
            view.coin_pair.clone()
        },
        network: view.network.clone(),
        buy: format!("{} @ {}", view.buy_exchange, format_price(view.buy_price)),
        sell: format!("{} @ {}", view.sell_exchange, format_price(view.sell_price)),
        spread: format!("{} {}", view.heat.glyph(), format_percent(view.spread)),
        volume: format_usd(view.volume_usd),
        profit: format!("${}", format_number(view.profit_usd)),
        age: view.age_label.clone(),
        id: view.id.clone(),
    });
    let mut table = Table::new(rows);
    table.with(Style::psql());
    format!("{table}\n")
}

// ============================================================================
// Full-screen messages
// ============================================================================

/// Body shown instead of pairs when access is denied.
pub fn access_prompt(access: Access) -> String {
    match access {
        Access::Free => format!(
            "A license is required to view trading pairs.\n\
             Your Free license does not include access to trading pairs.\n\
             {PURCHASE_PROMPT}\n"
        ),
        Access::Inactive => "Your license is inactive.\n\
             Renew your license to restore access to trading pairs.\n"
            .to_string(),
        Access::Missing => "Checking your license...\n".to_string(),
        Access::Granted => String::new(),
    }
}

/// Blocking screen shown when no user could be authenticated.
pub fn render_auth_required(reason: &str) -> String {
    format!(
        "Authentication required\n{reason}\n\
         Type `retry` to try again or `quit` to exit.\n"
    )
}
