//! Calendar components used as time-bucket grouping keys.
//!
//! Weekday indices count from Monday = 0 to Sunday = 6. This differs from
//! calendars that start the week on Sunday and is mapped explicitly.

use crate::relation::{field_at, resolve_input, Relation};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use common::{DataType, Field, PizzaError};

/// A component that can be pulled out of a date or time column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarPart {
    /// Month number, 1 to 12.
    Month,
    /// Monday = 0 .. Sunday = 6.
    WeekdayIndex,
    /// English weekday name, e.g. `Monday`.
    WeekdayName,
    /// Day of month, 1 to 31.
    DayOfMonth,
    /// Hour of day, 0 to 23.
    Hour,
}

impl CalendarPart {
    /// Dtype of the extracted value.
    pub fn dtype(&self) -> DataType {
        match self {
            CalendarPart::WeekdayName => DataType::String,
            _ => DataType::Int,
        }
    }

    /// Extract the component from a date or time field.
    pub fn extract(&self, field: &Field) -> Result<Field, PizzaError> {
        match (self, field) {
            (CalendarPart::Month, Field::DateField(d)) => Ok(Field::IntField(month(d))),
            (CalendarPart::WeekdayIndex, Field::DateField(d)) => {
                Ok(Field::IntField(weekday_index(d)))
            }
            (CalendarPart::WeekdayName, Field::DateField(d)) => {
                Ok(Field::StringField(weekday_name(d).to_string()))
            }
            (CalendarPart::DayOfMonth, Field::DateField(d)) => {
                Ok(Field::IntField(day_of_month(d)))
            }
            (CalendarPart::Hour, Field::TimeField(t)) => Ok(Field::IntField(hour(t))),
            (part, other) => Err(PizzaError::InvalidGroupKey(format!(
                "cannot take {:?} of a {:?} value",
                part,
                other.dtype()
            ))),
        }
    }
}

pub fn month(date: &NaiveDate) -> i64 {
    date.month() as i64
}

pub fn weekday_index(date: &NaiveDate) -> i64 {
    date.weekday().num_days_from_monday() as i64
}

pub fn weekday_name(date: &NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn day_of_month(date: &NaiveDate) -> i64 {
    date.day() as i64
}

pub fn hour(time: &NaiveTime) -> i64 {
    time.hour() as i64
}

/// Append a column holding a calendar component of another column.
///
/// # Arguments
///
/// * `rel` - Input relation.
/// * `source` - Date or time column to read.
/// * `part` - Component to extract.
/// * `output` - Name of the new column.
pub fn with_calendar_column(
    rel: Relation,
    source: &str,
    part: CalendarPart,
    output: &str,
) -> Result<Relation, PizzaError> {
    let idx = resolve_input(rel.schema(), source)?;
    let expected = match part {
        CalendarPart::Hour => DataType::Time,
        _ => DataType::Date,
    };
    if let Some(attr) = rel.schema().get_attribute(idx) {
        if *attr.dtype() != expected {
            return Err(PizzaError::InvalidGroupKey(format!(
                "{:?} needs a {:?} column, {} is {:?}",
                part,
                expected,
                source,
                attr.dtype()
            )));
        }
    }
    rel.with_column(output, part.dtype(), |t| part.extract(field_at(t, idx)?))
}
