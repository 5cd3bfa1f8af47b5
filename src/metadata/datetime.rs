use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::{errors::CodesError, gridspec::GridSpec, key_store::DynamicKeyType};

/// Combines a GRIB date (`YYYYMMDD`) and time (`HHMM`) into a datetime.
///
/// # Errors
///
/// Returns [`CodesError::InvalidDateTime`] when the values do not form a valid calendar datetime.
pub fn datetime_from_grib(date: i64, time: i64) -> Result<NaiveDateTime, CodesError> {
    let invalid = || CodesError::InvalidDateTime { date, time };

    let year = i32::try_from(date / 10_000).map_err(|_| invalid())?;
    let month = u32::try_from(date % 10_000 / 100).map_err(|_| invalid())?;
    let day = u32::try_from(date % 100).map_err(|_| invalid())?;
    let hour = u32::try_from(time / 100).map_err(|_| invalid())?;
    let minute = u32::try_from(time % 100).map_err(|_| invalid())?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)?;

    Ok(NaiveDateTime::new(date, time))
}

/// Converts a GRIB step to a duration.
///
/// Integers are hours. Strings are a number with an optional unit suffix:
/// `s`, `m`, `h` (the default) or `d`.
///
/// # Errors
///
/// Returns [`CodesError::InvalidStep`] for any other value.
pub fn to_timedelta(step: &DynamicKeyType) -> Result<Duration, CodesError> {
    let invalid = || CodesError::InvalidStep(step.to_string());

    let (amount, unit_seconds) = match step {
        DynamicKeyType::Int(hours) => (*hours, 3600),
        DynamicKeyType::Str(text) => {
            let text = text.trim();
            let (number, unit) = match text.char_indices().last() {
                Some((idx, c)) if c.is_ascii_alphabetic() => (&text[..idx], c),
                _ => (text, 'h'),
            };
            let unit_seconds = match unit {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86_400,
                _ => return Err(invalid()),
            };
            (number.parse::<i64>().map_err(|_| invalid())?, unit_seconds)
        }
        _ => return Err(invalid()),
    };

    amount
        .checked_mul(unit_seconds)
        .and_then(Duration::try_seconds)
        .ok_or_else(invalid)
}

/// Names resolved by [`GribMetadata::custom()`](crate::GribMetadata::custom)
/// to values computed from several keys.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CustomKey {
    ValidDatetime,
    GridSpec,
    BaseDatetime,
    ReferenceDatetime,
    IndexingDatetime,
    StepTimedelta,
}

impl CustomKey {
    /// Resolves a name or one of its aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "valid_datetime" | "valid_time" => Some(Self::ValidDatetime),
            "gridspec" | "grid_spec" => Some(Self::GridSpec),
            "base_datetime" | "forecast_reference_time" | "base_time" => Some(Self::BaseDatetime),
            "reference_datetime" => Some(Self::ReferenceDatetime),
            "indexing_datetime" | "indexing_time" => Some(Self::IndexingDatetime),
            "step_timedelta" => Some(Self::StepTimedelta),
            _ => None,
        }
    }
}

/// Value of a [`CustomKey`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CustomValue {
    DateTime(NaiveDateTime),
    TimeDelta(#[serde(serialize_with = "serialize_seconds")] Duration),
    GridSpec(GridSpec),
}

fn serialize_seconds<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(value.num_seconds())
}
