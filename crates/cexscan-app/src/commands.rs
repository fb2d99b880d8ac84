//! Line commands read from stdin.

use cexscan_core::{SortCriteria, TagKind, ViewMode};

use crate::error::{AppError, AppResult};

pub const HELP: &str = "\
Commands:
  view <treemap|grid|list>        switch view
  sort <coin|network|spread|profit> <asc|desc>
  interval <secs>                 poll interval, 0 disables polling
  spread <min> <max>              spread range, percent
  volume <min> <max>              volume range, USD
  age <min> <max>                 freshness range, minutes
  coin|buy|sell <SYMBOL|all>      toggle a tag, or select all
  pin <#n|pair-id>                pin or unpin a pair
  details <#n|pair-id>            open the details overlay
  close                           close the details overlay
  width <cols>                    set the display width
  refresh                         fetch pairs now
  reset                           connectivity restored: clear backoff state
  notifications                   show server notifications
  metrics                         print Prometheus metrics
  retry                           retry authentication
  help                            this text
  quit                            save settings and exit
";

/// Slider being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Spread,
    Volume,
    /// Minutes on input, seconds in the filter.
    Age,
}

impl RangeKind {
    /// Debounce key for the settings write.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Spread => "spread",
            Self::Volume => "volume",
            Self::Age => "age",
        }
    }
}

/// Which pair a command refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairRef {
    /// 1-based position in the current frame (`#3` or `3`).
    Position(usize),
    Id(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    View(ViewMode),
    Sort(SortCriteria),
    Interval(u64),
    Range { kind: RangeKind, min: f64, max: f64 },
    /// `None` selects every tag of the kind.
    Tag { kind: TagKind, symbol: Option<String> },
    Pin(PairRef),
    Details(PairRef),
    Close,
    Width(usize),
    Refresh,
    Reset,
    Notifications,
    Metrics,
    Retry,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> AppResult<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "view" => {
            let mode = one(&args, "view <treemap|grid|list>")?;
            Command::View(mode.parse().map_err(invalid)?)
        }
        "sort" => {
            let [field, order] = two(&args, "sort <field> <asc|desc>")?;
            Command::Sort(SortCriteria::new(
                field.parse().map_err(invalid)?,
                order.parse().map_err(invalid)?,
            ))
        }
        "interval" => Command::Interval(number(one(&args, "interval <secs>")?)?),
        "spread" | "volume" | "age" => {
            let kind = match verb.to_ascii_lowercase().as_str() {
                "spread" => RangeKind::Spread,
                "volume" => RangeKind::Volume,
                _ => RangeKind::Age,
            };
            let [min, max] = two(&args, "<spread|volume|age> <min> <max>")?;
            let (min, max): (f64, f64) = (number(min)?, number(max)?);
            if !min.is_finite() || !max.is_finite() {
                return Err(AppError::Command("range bounds must be finite".to_string()));
            }
            Command::Range { kind, min, max }
        }
        "coin" | "buy" | "sell" => {
            let kind = match verb.to_ascii_lowercase().as_str() {
                "coin" => TagKind::Coin,
                "buy" => TagKind::BuyExchange,
                _ => TagKind::SellExchange,
            };
            let symbol = one(&args, "<coin|buy|sell> <SYMBOL|all>")?;
            let symbol = if symbol.eq_ignore_ascii_case("all") {
                None
            } else {
                Some(symbol.to_string())
            };
            Command::Tag { kind, symbol }
        }
        "pin" => Command::Pin(pair_ref(one(&args, "pin <#n|pair-id>")?)),
        "details" => Command::Details(pair_ref(one(&args, "details <#n|pair-id>")?)),
        "close" => Command::Close,
        "width" => Command::Width(number(one(&args, "width <cols>")?)?),
        "refresh" => Command::Refresh,
        "reset" => Command::Reset,
        "notifications" => Command::Notifications,
        "metrics" => Command::Metrics,
        "retry" => Command::Retry,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(AppError::Command(format!("unknown command `{other}`"))),
    };
    Ok(Some(command))
}

fn one<'a>(args: &[&'a str], usage: &str) -> AppResult<&'a str> {
    match args {
        [value] => Ok(*value),
        _ => Err(AppError::Command(format!("usage: {usage}"))),
    }
}

fn two<'a>(args: &[&'a str], usage: &str) -> AppResult<[&'a str; 2]> {
    match args {
        [a, b] => Ok([*a, *b]),
        _ => Err(AppError::Command(format!("usage: {usage}"))),
    }
}

fn number<T: std::str::FromStr>(raw: &str) -> AppResult<T> {
    raw.parse()
        .map_err(|_| AppError::Command(format!("`{raw}` is not a valid number")))
}

fn pair_ref(raw: &str) -> PairRef {
    let digits = raw.strip_prefix('#').unwrap_or(raw);
    match digits.parse::<usize>() {
        Ok(position) if position > 0 => PairRef::Position(position),
        _ => PairRef::Id(raw.to_string()),
    }
}

fn invalid(e: cexscan_core::CoreError) -> AppError {
    AppError::Command(e.to_string())
}
