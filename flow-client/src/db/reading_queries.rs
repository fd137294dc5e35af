use sqlx::{PgExecutor, Postgres, QueryBuilder};

use crate::domain::{FileRecord, Reading};

/// Whether a flow file with this name has already been ingested.
pub async fn file_record_exists<'e, E>(executor: E, filename: &str) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM flow_file WHERE filename = $1)")
        .bind(filename)
        .fetch_one(executor)
        .await
}

/// Insert a flow file marker. Fails with a unique violation if the filename
/// is already present.
pub async fn insert_file_record<'e, E>(executor: E, filename: &str) -> Result<FileRecord, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, FileRecord>(
        r#"
        INSERT INTO flow_file (filename, ingested_at)
        VALUES ($1, clock_timestamp())
        RETURNING id, filename, ingested_at
        "#,
    )
    .bind(filename)
    .fetch_one(executor)
    .await
}

/// Multi-row insert of `readings`. Callers keep the batch below the Postgres
/// bind parameter limit (five binds per reading).
pub async fn insert_readings<'e, E>(executor: E, readings: &[Reading]) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    if readings.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO meter_reading (mpan_core, meter_serial_number, reading_date, register_reading, flow_file_id) ",
    );
    builder.push_values(readings, |mut b, r| {
        b.push_bind(r.mpan.get())
            .push_bind(r.meter_serial.as_str())
            .push_bind(r.reading_date)
            .push_bind(r.register_reading.value())
            .push_bind(r.file_id);
    });

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}
