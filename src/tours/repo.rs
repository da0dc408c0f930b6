use serde_json::Value;
use sqlx::PgPool;
use time::{Date, Month, OffsetDateTime};

use crate::error::{AppError, Result};

/// Tours rated at least this well are counted in the difficulty stats.
pub const STATS_MIN_RATING: f64 = 4.5;

/// Per upper-cased difficulty: count, ratings and price figures, cheapest
/// group first.
pub async fn difficulty_stats(db: &PgPool) -> Result<Vec<Value>> {
    let rows = sqlx::query_scalar::<_, Value>(
        r#"
        SELECT jsonb_build_object(
                   '_id', upper(doc ->> 'difficulty'),
                   'numTours', count(*),
                   'numRatings', coalesce(sum((doc ->> 'ratingsQuantity')::numeric), 0),
                   'averageRating', avg((doc ->> 'ratingsAverage')::numeric),
                   'averagePrice', avg((doc ->> 'price')::numeric),
                   'minPrice', min((doc ->> 'price')::numeric),
                   'maxPrice', max((doc ->> 'price')::numeric))
        FROM tours
        WHERE (doc ->> 'ratingsAverage')::numeric >= $1
        GROUP BY upper(doc ->> 'difficulty')
        ORDER BY avg((doc ->> 'price')::numeric) ASC
        "#,
    )
    .bind(STATS_MIN_RATING)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// `[start of year, start of next year)` in UTC.
pub fn year_bounds(year: i32) -> Result<(OffsetDateTime, OffsetDateTime)> {
    let bad = || AppError::BadRequest(format!("Invalid year: {year}"));
    let start = Date::from_calendar_date(year, Month::January, 1).map_err(|_| bad())?;
    let end = Date::from_calendar_date(year + 1, Month::January, 1).map_err(|_| bad())?;
    Ok((start.midnight().assume_utc(), end.midnight().assume_utc()))
}

/// Tour starts within `year` grouped by month, busiest month first.
pub async fn monthly_plan(db: &PgPool, year: i32) -> Result<Vec<Value>> {
    let (from, until) = year_bounds(year)?;
    let rows = sqlx::query_scalar::<_, Value>(
        r#"
        SELECT jsonb_build_object(
                   'month', plan.month,
                   'numTourStarts', plan.starts,
                   'tours', plan.tours)
        FROM (
            SELECT extract(month FROM s.start_at AT TIME ZONE 'UTC')::int AS month,
                   count(*) AS starts,
                   jsonb_agg(t.doc ->> 'name' ORDER BY s.start_at) AS tours
            FROM tours t
            CROSS JOIN LATERAL (
                SELECT value::timestamptz AS start_at
                FROM jsonb_array_elements_text(coalesce(t.doc -> 'startDates', '[]'::jsonb))
            ) s
            WHERE s.start_at >= $1 AND s.start_at < $2
            GROUP BY 1
        ) plan
        ORDER BY plan.starts DESC, plan.month ASC
        "#,
    )
    .bind(from)
    .bind(until)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_bounds_cover_the_whole_year() {
        let (from, until) = year_bounds(2021).unwrap();
        assert_eq!(from.unix_timestamp(), 1_609_459_200);
        assert_eq!(until.unix_timestamp(), 1_640_995_200);
        assert!(matches!(year_bounds(i32::MAX), Err(AppError::BadRequest(_))));
    }
}
