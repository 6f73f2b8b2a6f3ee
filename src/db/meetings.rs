//! Meeting records on top of [`DB`].
//!
//! A meeting is an entity whose `weekday` attribute holds the day of week
//! (0..=6) and whose sort key holds the start time in minutes after
//! midnight. Request and response types serialize as camelCase JSON.

use super::DB;
use crate::compute::filter::{Field, Filter};
use crate::compute::validation::{
    validate_point, validate_start_time, validate_weekday, validate_window,
};
use crate::config::Config;
use crate::error::{MeetspotError, Result};
use crate::query::NearestQuery;
use crate::types::{AttributeValue, EntityId, EntityRecord, GeoPoint};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const WEEKDAY_ATTRIBUTE: &str = "weekday";

/// Insert request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeeting {
    pub name: String,
    /// Minutes after midnight, `0..1440`.
    pub start_time: i64,
    /// Day of week, `0..=6`.
    pub weekday: i64,
    pub point: GeoPoint,
}

/// Half-open start time window in minutes after midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFilter {
    pub start: i64,
    pub end: i64,
}

impl TimeFilter {
    /// The whole day.
    pub fn all_day() -> Self {
        Self {
            start: 0,
            end: crate::compute::validation::MINUTES_PER_DAY,
        }
    }
}

/// Proximity query with weekday and start time filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingQuery {
    pub point: GeoPoint,
    /// Search radius in meters; capped at the configured maximum.
    pub distance: f64,
    pub weekdays: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    pub time_filter: TimeFilter,
}

/// One query result, joined with its meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingHit {
    #[serde(rename = "_id", alias = "id")]
    pub id: EntityId,
    pub name: String,
    pub weekday: i64,
    pub start_time: i64,
    pub lat: f64,
    pub lng: f64,
    /// Meters from the query point.
    #[serde(alias = "distanceMeters")]
    pub distance: f64,
}

/// A stored meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub name: String,
    pub start_time: i64,
    pub weekday: i64,
    pub point: GeoPoint,
}

impl TryFrom<EntityRecord> for Meeting {
    type Error = MeetspotError;

    fn try_from(record: EntityRecord) -> Result<Self> {
        let weekday = match record.attribute(WEEKDAY_ATTRIBUTE) {
            Some(AttributeValue::Integer(v)) => *v,
            Some(AttributeValue::Number(v)) if v.fract() == 0.0 => *v as i64,
            _ => {
                return Err(MeetspotError::Consistency(format!(
                    "record {} has no integer weekday",
                    record.id
                )));
            }
        };

        Ok(Self {
            id: record.id,
            name: record.name,
            start_time: record.sort_key as i64,
            weekday,
            point: record.point,
        })
    }
}

/// The four Calgary meetings loaded by [`Meetings::load_sample_data`].
pub fn sample_meetings() -> Vec<NewMeeting> {
    vec![
        NewMeeting {
            name: "Miracles".to_string(),
            start_time: 720,
            weekday: 2,
            point: GeoPoint::new(51.0832877, -114.1278038),
        },
        NewMeeting {
            name: "AMNA".to_string(),
            start_time: 480,
            weekday: 3,
            point: GeoPoint::new(51.02723, -113.9928005),
        },
        NewMeeting {
            name: "Courage".to_string(),
            start_time: 1140,
            weekday: 3,
            point: GeoPoint::new(51.0117555, -114.0837796),
        },
        NewMeeting {
            name: "Stepping".to_string(),
            start_time: 1140,
            weekday: 3,
            point: GeoPoint::new(50.95648, -114.0862),
        },
    ]
}

/// Meeting operations over a shared [`DB`].
///
/// # Examples
///
/// ```rust
/// use meetspot::{GeoPoint, MeetingQuery, Meetings, TimeFilter};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let meetings = Meetings::memory()?;
/// meetings.load_sample_data()?;
///
/// let hits = meetings.query(&MeetingQuery {
///     point: GeoPoint::new(51.05, -114.05),
///     distance: 10_000.0,
///     weekdays: vec![2, 3],
///     limit: Some(10),
///     time_filter: TimeFilter::all_day(),
/// })?;
/// // Stepping is 10.7 km out
/// assert_eq!(hits.len(), 3);
/// assert_eq!(hits[0].name, "AMNA");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Meetings {
    db: Arc<DB>,
}

impl Meetings {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    pub fn memory() -> Result<Self> {
        Ok(Self::new(Arc::new(DB::memory()?)))
    }

    pub fn memory_with_config(config: Config) -> Result<Self> {
        Ok(Self::new(Arc::new(DB::memory_with_config(config)?)))
    }

    pub fn db(&self) -> &Arc<DB> {
        &self.db
    }

    /// Validate and store a meeting under a fresh id.
    pub fn insert(&self, meeting: NewMeeting) -> Result<EntityId> {
        if let Err(e) = validate_meeting(&meeting) {
            log::warn!("Rejected meeting {:?}: {}", meeting.name, e);
            return Err(e);
        }

        let id = EntityId::generate();
        let record = EntityRecord::new(id.clone(), meeting.name, meeting.point)
            .with_attribute(WEEKDAY_ATTRIBUTE, meeting.weekday)
            .with_sort_key(meeting.start_time as f64);
        self.db.insert(record)?;
        Ok(id)
    }

    /// Nearest meetings within `query.distance` whose weekday is listed and
    /// whose start time falls in `[start, end)`, nearest first.
    pub fn query(&self, query: &MeetingQuery) -> Result<Vec<MeetingHit>> {
        validate_point(&query.point)?;
        validate_window(query.time_filter.start, query.time_filter.end)?;

        let filter = Filter::new()
            .range(
                Field::SortKey,
                query.time_filter.start as f64,
                query.time_filter.end as f64,
            )
            .in_set(Field::attribute(WEEKDAY_ATTRIBUTE), query.weekdays.iter().copied());
        let limit = query.limit.unwrap_or(self.db.config().default_limit);

        let nearest = NearestQuery::new(query.point, query.distance)
            .with_limit(limit)
            .with_filter(filter);

        self.db
            .nearest_records(nearest)?
            .into_iter()
            .map(|(neighbor, record)| {
                let meeting = Meeting::try_from(record)?;
                Ok(MeetingHit {
                    id: meeting.id,
                    name: meeting.name,
                    weekday: meeting.weekday,
                    start_time: meeting.start_time,
                    lat: neighbor.point.latitude,
                    lng: neighbor.point.longitude,
                    distance: neighbor.distance_meters,
                })
            })
            .collect()
    }

    pub fn get(&self, id: &EntityId) -> Result<Meeting> {
        Meeting::try_from(self.db.get(id)?)
    }

    pub fn delete(&self, id: &EntityId) -> Result<Meeting> {
        Meeting::try_from(self.db.delete(id)?)
    }

    /// Insert the Calgary sample meetings, returning their ids in order.
    pub fn load_sample_data(&self) -> Result<Vec<EntityId>> {
        let ids = sample_meetings()
            .into_iter()
            .map(|meeting| self.insert(meeting))
            .collect::<Result<Vec<_>>>()?;
        log::info!("Loaded {} sample meetings", ids.len());
        Ok(ids)
    }
}

fn validate_meeting(meeting: &NewMeeting) -> Result<()> {
    validate_point(&meeting.point)?;
    validate_start_time(meeting.start_time)?;
    validate_weekday(meeting.weekday)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calgary_query() -> MeetingQuery {
        MeetingQuery {
            point: GeoPoint::new(51.05, -114.05),
            distance: 10_000.0,
            weekdays: vec![2, 3],
            limit: Some(10),
            time_filter: TimeFilter::all_day(),
        }
    }

    #[test]
    fn test_sample_data_query_order() {
        let meetings = Meetings::memory().unwrap();
        let ids = meetings.load_sample_data().unwrap();
        assert_eq!(ids.len(), 4);

        let hits = meetings.query(&calgary_query()).unwrap();
        let names: Vec<_> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["AMNA", "Courage", "Miracles"]);

        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert!(hits.iter().all(|h| h.distance <= 10_000.0));
    }

    #[test]
    fn test_weekday_and_time_filters() {
        let meetings = Meetings::memory().unwrap();
        meetings.load_sample_data().unwrap();

        let mut query = calgary_query();
        query.weekdays = vec![2];
        let hits = meetings.query(&query).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Miracles");

        let mut query = calgary_query();
        query.time_filter = TimeFilter {
            start: 1140,
            end: 1200,
        };
        let hits = meetings.query(&query).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Courage");

        query.distance = 20_000.0;
        let hits = meetings.query(&query).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.start_time == 1140));

        // end is exclusive
        let mut query = calgary_query();
        query.time_filter = TimeFilter { start: 0, end: 480 };
        assert!(meetings.query(&query).unwrap().is_empty());
    }

    #[test]
    fn test_empty_window_and_empty_weekdays() {
        let meetings = Meetings::memory().unwrap();
        meetings.load_sample_data().unwrap();

        let mut query = calgary_query();
        query.time_filter = TimeFilter {
            start: 720,
            end: 720,
        };
        assert!(meetings.query(&query).unwrap().is_empty());

        let mut query = calgary_query();
        query.weekdays.clear();
        assert!(meetings.query(&query).unwrap().is_empty());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let meetings = Meetings::memory().unwrap();
        let mut query = calgary_query();
        query.time_filter = TimeFilter {
            start: 900,
            end: 100,
        };
        assert!(matches!(
            meetings.query(&query),
            Err(MeetspotError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_insert_validation() {
        let meetings = Meetings::memory().unwrap();
        let base = NewMeeting {
            name: "Late".into(),
            start_time: 1439,
            weekday: 6,
            point: GeoPoint::new(51.0, -114.0),
        };
        assert!(meetings.insert(base.clone()).is_ok());

        let mut bad = base.clone();
        bad.start_time = 1440;
        assert!(meetings.insert(bad).is_err());

        let mut bad = base.clone();
        bad.weekday = 7;
        assert!(meetings.insert(bad).is_err());

        let mut bad = base;
        bad.point = GeoPoint::new(0.0, 181.0);
        assert!(meetings.insert(bad).is_err());

        assert_eq!(meetings.db().len(), 1);
    }

    #[test]
    fn test_get_and_delete() {
        let meetings = Meetings::memory().unwrap();
        let ids = meetings.load_sample_data().unwrap();

        let amna = meetings.get(&ids[1]).unwrap();
        assert_eq!(amna.name, "AMNA");
        assert_eq!(amna.start_time, 480);
        assert_eq!(amna.weekday, 3);

        let removed = meetings.delete(&ids[1]).unwrap();
        assert_eq!(removed, amna);

        let hits = meetings.query(&calgary_query()).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.id != ids[1]));
    }

    #[test]
    fn test_default_limit_from_config() {
        let meetings = Meetings::memory_with_config(Config::default().with_default_limit(2)).unwrap();
        meetings.load_sample_data().unwrap();

        let mut query = calgary_query();
        query.limit = None;
        assert_eq!(meetings.query(&query).unwrap().len(), 2);
    }

    #[test]
    fn test_wire_format() {
        let query: MeetingQuery = serde_json::from_str(
            r#"{
                "point": {"latitude": 51.05, "longitude": -114.05},
                "distance": 5000,
                "weekdays": [3],
                "timeFilter": {"start": 0, "end": 1440}
            }"#,
        )
        .unwrap();
        assert_eq!(query.limit, None);
        assert_eq!(query.time_filter, TimeFilter::all_day());

        let hit = MeetingHit {
            id: "m1".into(),
            name: "AMNA".into(),
            weekday: 3,
            start_time: 480,
            lat: 51.02723,
            lng: -113.9928005,
            distance: 1.5,
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["_id"], "m1");
        assert_eq!(json["startTime"], 480);
        assert_eq!(json["lng"], -113.9928005);

        let aliased: MeetingHit = serde_json::from_str(
            r#"{"id": "m1", "name": "AMNA", "weekday": 3, "startTime": 480,
                "lat": 51.02723, "lng": -113.9928005, "distanceMeters": 1.5}"#,
        )
        .unwrap();
        assert_eq!(aliased, hit);
    }
}
