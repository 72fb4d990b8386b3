use chrono::{Local, NaiveDateTime, TimeZone};

/// Output layout for every datetime literal.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted input layouts, in trial order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatetimeFormat {
    /// `YYYY-MM-DD HH:MM:SS`
    DashSeconds,
    /// `YYYY-MM-DD HH:MM`
    DashMinutes,
    /// `YYYY/MM/DD HH:MM:SS`
    SlashSeconds,
    /// `YYYY-MM-DD AM/PM HH:MM:SS`
    DashMeridiem,
}

impl DatetimeFormat {
    pub const CANDIDATES: [DatetimeFormat; 4] = [
        DatetimeFormat::DashSeconds,
        DatetimeFormat::DashMinutes,
        DatetimeFormat::SlashSeconds,
        DatetimeFormat::DashMeridiem,
    ];

    pub fn pattern(self) -> &'static str {
        match self {
            DatetimeFormat::DashSeconds => "%Y-%m-%d %H:%M:%S",
            DatetimeFormat::DashMinutes => "%Y-%m-%d %H:%M",
            DatetimeFormat::SlashSeconds => "%Y/%m/%d %H:%M:%S",
            DatetimeFormat::DashMeridiem => "%Y-%m-%d %p %I:%M:%S",
        }
    }

    /// First candidate that parses `sample`.
    pub fn infer(sample: &str) -> Option<Self> {
        Self::CANDIDATES
            .into_iter()
            .find(|f| f.parse(sample).is_some())
    }

    /// Parse as a wall-clock time in the local timezone.
    pub fn parse(self, s: &str) -> Option<NaiveDateTime> {
        let naive = NaiveDateTime::parse_from_str(s.trim(), self.pattern()).ok()?;
        Some(in_local(naive))
    }
}

/// Resolve a wall-clock time against the local zone. Ambiguous times take the
/// earlier instant; times inside a DST gap keep their wall-clock value.
fn in_local(naive: NaiveDateTime) -> NaiveDateTime {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.naive_local())
        .unwrap_or(naive)
}

/// `'YYYY-MM-DD HH:MM:SS'`
pub fn to_sql_literal(dt: &NaiveDateTime) -> String {
    format!("'{}'", dt.format(CANONICAL_FORMAT))
}
