//! Время на границе клиент/сервер.
//!
//! Сервер хранит и отдаёт абсолютные метки (UTC). Расписание площадок задано
//! в локальном времени суток. Все преобразования проходят через `LocalClock`
//! и обрезаются до минуты, потому что границы слотов сравниваются на равенство.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Полуоткрытый интервал `[start, end)` в абсолютном времени.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(rename = "startTime")]
    pub start: DateTime<Utc>,
    #[serde(rename = "endTime")]
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Пустые и перевёрнутые интервалы не создаются.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Пересечение с окном. `None`, если пересечение пустое.
    pub fn clip(&self, window: &TimeRange) -> Option<TimeRange> {
        TimeRange::new(self.start.max(window.start), self.end.min(window.end))
    }

    pub fn is_minute_aligned(&self) -> bool {
        is_minute_aligned(&self.start) && is_minute_aligned(&self.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} – {})", self.start.format("%Y-%m-%d %H:%M"), self.end.format("%H:%M"))
    }
}

fn is_minute_aligned(value: &DateTime<Utc>) -> bool {
    value.second() == 0 && value.nanosecond() == 0
}

pub fn truncate_to_minute(value: DateTime<Utc>) -> DateTime<Utc> {
    value
        - Duration::seconds(i64::from(value.second()))
        - Duration::nanoseconds(i64::from(value.nanosecond()))
}

/// Часовой пояс консоли. Фиксированное смещение, без DST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Смещение в минутах к востоку от UTC; `None` вне диапазона ±24ч.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Локальные дата и время суток -> абсолютная метка, с точностью до минуты.
    pub fn to_absolute(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let time = time.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(time);
        let local = date.and_time(time);
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }

    /// Абсолютная метка -> локальное время для отображения.
    pub fn to_local(&self, value: DateTime<Utc>) -> NaiveDateTime {
        truncate_to_minute(value).with_timezone(&self.offset).naive_local()
    }

    pub fn local_date(&self, value: DateTime<Utc>) -> NaiveDate {
        self.to_local(value).date()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// Окно работы площадки на конкретную дату.
    pub fn day_window(&self, date: NaiveDate, open: NaiveTime, close: NaiveTime) -> Option<TimeRange> {
        TimeRange::new(self.to_absolute(date, open), self.to_absolute(date, close))
    }

    pub fn format_range(&self, range: &TimeRange) -> String {
        format!(
            "{}–{}",
            self.to_local(range.start).format("%H:%M"),
            self.to_local(range.end).format("%H:%M")
        )
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::utc()
    }
}

/// `NaiveTime` в формате "HH:MM" (сервер иногда шлёт "HH:MM:SS").
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}
