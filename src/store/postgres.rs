//! Postgres-backed store using sqlx.
//!
//! Runtime-checked queries keep the crate buildable without a live database.
//! `replace_recurring_windows` runs inside a transaction so bulk schedule
//! replacement is all-or-nothing.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{ClinicCoreError, Result};
use crate::models::{
    Appointment, AppointmentStatus, NewAppointment, NewTimeWindow, TimeWindow, WindowScope,
};

use super::ScheduleStore;

/// [`ScheduleStore`] implementation over a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PostgresScheduleStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct WindowRow {
    id: Uuid,
    day_of_week: Option<i16>,
    specific_date: Option<NaiveDate>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    capacity: i32,
    active: bool,
    effective_from: Option<NaiveDate>,
    effective_until: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct AppointmentRow {
    id: Uuid,
    date: NaiveDate,
    start_time: NaiveTime,
    window_id: Option<Uuid>,
    status: String,
    created_at: DateTime<Utc>,
}

fn weekday_to_db(weekday: Weekday) -> i16 {
    weekday.num_days_from_monday() as i16
}

fn weekday_from_db(raw: i16) -> Result<Weekday> {
    match raw {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(ClinicCoreError::StoreError(format!(
            "invalid day_of_week value {other}"
        ))),
    }
}

impl TryFrom<WindowRow> for TimeWindow {
    type Error = ClinicCoreError;

    fn try_from(row: WindowRow) -> Result<TimeWindow> {
        let scope = match (row.day_of_week, row.specific_date) {
            (Some(day), None) => WindowScope::Recurring(weekday_from_db(day)?),
            (None, Some(date)) => WindowScope::SpecificDate(date),
            _ => {
                return Err(ClinicCoreError::StoreError(format!(
                    "time window {} violates the exactly-one-scope invariant",
                    row.id
                )))
            }
        };
        Ok(TimeWindow {
            id: row.id,
            scope,
            start: row.start_time,
            end: row.end_time,
            capacity: row.capacity.max(0) as u32,
            active: row.active,
            effective_from: row.effective_from,
            effective_until: row.effective_until,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = ClinicCoreError;

    fn try_from(row: AppointmentRow) -> Result<Appointment> {
        let status = AppointmentStatus::parse(&row.status).ok_or_else(|| {
            ClinicCoreError::StoreError(format!(
                "appointment {} has unknown status `{}`",
                row.id, row.status
            ))
        })?;
        Ok(Appointment {
            id: row.id,
            date: row.date,
            start_time: row.start_time,
            window_id: row.window_id,
            status,
            created_at: row.created_at,
        })
    }
}

const SELECT_WINDOWS: &str = "SELECT id, day_of_week, specific_date, start_time, end_time, \
     capacity, active, effective_from, effective_until FROM clinic_time_windows";

impl PostgresScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing tables when they do not exist yet.
    pub async fn bootstrap_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clinic_time_windows (
                id UUID PRIMARY KEY,
                day_of_week SMALLINT,
                specific_date DATE,
                start_time TIME NOT NULL,
                end_time TIME NOT NULL,
                capacity INTEGER NOT NULL CHECK (capacity >= 1),
                active BOOLEAN NOT NULL DEFAULT TRUE,
                effective_from DATE,
                effective_until DATE,
                CHECK (start_time < end_time),
                CHECK ((day_of_week IS NULL) <> (specific_date IS NULL))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clinic_appointments (
                id UUID PRIMARY KEY,
                date DATE NOT NULL,
                start_time TIME NOT NULL,
                window_id UUID REFERENCES clinic_time_windows(id) ON DELETE SET NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_clinic_appointments_date \
             ON clinic_appointments (date)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_window_tx(
        tx: &mut Transaction<'_, Postgres>,
        window: &NewTimeWindow,
    ) -> Result<TimeWindow> {
        let id = Uuid::new_v4();
        let (day_of_week, specific_date) = match window.scope {
            WindowScope::Recurring(day) => (Some(weekday_to_db(day)), None),
            WindowScope::SpecificDate(date) => (None, Some(date)),
        };

        let row: WindowRow = sqlx::query_as(
            r#"
            INSERT INTO clinic_time_windows
                (id, day_of_week, specific_date, start_time, end_time,
                 capacity, active, effective_from, effective_until)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, day_of_week, specific_date, start_time, end_time,
                      capacity, active, effective_from, effective_until
            "#,
        )
        .bind(id)
        .bind(day_of_week)
        .bind(specific_date)
        .bind(window.start)
        .bind(window.end)
        .bind(window.capacity as i32)
        .bind(window.active)
        .bind(window.effective_from)
        .bind(window.effective_until)
        .fetch_one(&mut **tx)
        .await?;

        row.try_into()
    }
}

#[async_trait]
impl ScheduleStore for PostgresScheduleStore {
    async fn fetch_active_windows(&self) -> Result<Vec<TimeWindow>> {
        let rows: Vec<WindowRow> =
            sqlx::query_as(&format!("{SELECT_WINDOWS} WHERE active = TRUE"))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn fetch_windows(&self) -> Result<Vec<TimeWindow>> {
        let rows: Vec<WindowRow> = sqlx::query_as(SELECT_WINDOWS)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn fetch_appointments_on(&self, date: NaiveDate) -> Result<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(
            "SELECT id, date, start_time, window_id, status, created_at \
             FROM clinic_appointments WHERE date = $1",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_window(&self, window: NewTimeWindow) -> Result<TimeWindow> {
        window.validate()?;
        let mut tx = self.pool.begin().await?;
        let created = Self::insert_window_tx(&mut tx, &window).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn deactivate_window(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE clinic_time_windows SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ClinicCoreError::StoreError(format!(
                "time window {id} not found"
            )));
        }
        Ok(())
    }

    async fn delete_window(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM clinic_time_windows WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ClinicCoreError::StoreError(format!(
                "time window {id} not found"
            )));
        }
        Ok(())
    }

    async fn replace_recurring_windows(
        &self,
        weekdays: &[Weekday],
        windows: Vec<NewTimeWindow>,
        delete_existing: bool,
    ) -> Result<Vec<TimeWindow>> {
        for window in &windows {
            window.validate()?;
        }

        let mut tx = self.pool.begin().await?;

        if delete_existing {
            let days: Vec<i16> = weekdays.iter().copied().map(weekday_to_db).collect();
            sqlx::query(
                "DELETE FROM clinic_time_windows \
                 WHERE active = TRUE AND day_of_week = ANY($1)",
            )
            .bind(&days)
            .execute(&mut *tx)
            .await?;
        }

        let mut created = Vec::with_capacity(windows.len());
        for window in &windows {
            created.push(Self::insert_window_tx(&mut tx, window).await?);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Appointment> {
        let row: AppointmentRow = sqlx::query_as(
            r#"
            INSERT INTO clinic_appointments (id, date, start_time, window_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, date, start_time, window_id, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(appointment.date)
        .bind(appointment.start_time)
        .bind(appointment.window_id)
        .bind(appointment.status.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment> {
        let row: Option<AppointmentRow> = sqlx::query_as(
            r#"
            UPDATE clinic_appointments SET status = $2 WHERE id = $1
            RETURNING id, date, start_time, window_id, status, created_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(ClinicCoreError::StoreError(format!(
                "appointment {id} not found"
            ))),
        }
    }

    async fn table_counts(&self) -> Result<Vec<(String, i64)>> {
        let (windows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clinic_time_windows")
            .fetch_one(&self.pool)
            .await?;
        let (appointments,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clinic_appointments")
            .fetch_one(&self.pool)
            .await?;
        Ok(vec![
            ("time_windows".to_string(), windows),
            ("appointments".to_string(), appointments),
        ])
    }
}
