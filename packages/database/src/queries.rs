//! Raw SQL query primitives behind the displacement indicators.
//!
//! Each function is one read primitive over the operational tables
//! (`migrants`, `motifs_deplacement`, `geolocalisations`, `alertes`). They
//! all take a half-open [`TimeWindow`] and an [`AreaFilter`], only ever see
//! active, non-deleted migrants, and return small typed row sets.
//!
//! Month truncation in SQL lines up with [`MonthWindow`] labels only in a
//! UTC session; [`crate::db::connect_from_env`] pins the session time zone.

use std::collections::BTreeMap;

use idp_watch_database_models::{
    AlertRow, AreaFilter, CHILD_MAX_AGE_YEARS, DemographicRaw, ELDERLY_MIN_AGE_YEARS, MonthWindow,
    MonthlyBucket, MotiveCount, ProvinceCount, ReturnRouteCount, ShelterCounts, TimeWindow,
    UNKNOWN_ZONE, ZoneAlertCount,
};
use idp_watch_displacement_models::{AlertStatus, MovementType, SeverityLevel, ShelterType};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

/// Accumulates `WHERE` fragments and their positional `$n` parameters.
struct Filters {
    frags: Vec<String>,
    params: Vec<DatabaseValue>,
}

impl Filters {
    const fn new() -> Self {
        Self {
            frags: Vec::new(),
            params: Vec::new(),
        }
    }

    fn raw(&mut self, frag: &str) {
        self.frags.push(frag.to_string());
    }

    /// Pushes a fragment built around the next parameter index.
    fn bind(&mut self, frag: impl FnOnce(usize) -> String, value: DatabaseValue) {
        let idx = self.params.len() + 1;
        self.frags.push(frag(idx));
        self.params.push(value);
    }

    /// Binds a value that is referenced outside the `WHERE` clause (e.g. in
    /// a `FILTER` or `LIMIT`) and returns its index.
    fn bind_extra(&mut self, value: DatabaseValue) -> usize {
        self.params.push(value);
        self.params.len()
    }

    fn active_migrants(&mut self) {
        self.raw("m.actif = TRUE");
        self.raw("m.deleted_at IS NULL");
    }

    fn window(&mut self, column: &str, window: &TimeWindow) {
        self.bind(
            |i| format!("{column} >= ${i}"),
            DatabaseValue::DateTime(window.since.naive_utc()),
        );
        self.bind(
            |i| format!("{column} < ${i}"),
            DatabaseValue::DateTime(window.until.naive_utc()),
        );
    }

    fn area(&mut self, area: &AreaFilter, city_column: &str, country_column: &str) {
        match area {
            AreaFilter::None => {}
            AreaFilter::City(city) => {
                self.bind(
                    |i| format!("{city_column} = ${i}"),
                    DatabaseValue::String(city.clone()),
                );
            }
            AreaFilter::Country(country) => {
                self.bind(
                    |i| format!("{country_column} ILIKE ${i}"),
                    DatabaseValue::String(format!("%{}%", escape_like(country))),
                );
            }
        }
    }

    fn severities(&mut self, column: &str, levels: &[SeverityLevel]) {
        if levels.is_empty() {
            self.raw("FALSE");
            return;
        }
        let start = self.params.len() + 1;
        let placeholders: Vec<String> = (start..start + levels.len())
            .map(|i| format!("${i}"))
            .collect();
        self.frags
            .push(format!("LOWER({column}) IN ({})", placeholders.join(", ")));
        self.params.extend(
            levels
                .iter()
                .map(|l| DatabaseValue::String(l.as_ref().to_string())),
        );
    }

    fn where_clause(&self) -> String {
        if self.frags.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.frags.join(" AND "))
        }
    }
}

/// Escapes `%`, `_` and `\` so a user value is matched literally by `ILIKE`.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn first_count(rows: &[Row], column: &str) -> u64 {
    rows.first()
        .map_or(0, |r| count(r.to_value(column).unwrap_or(0)))
}

fn counts_by_label(rows: &[Row]) -> BTreeMap<String, u64> {
    rows.iter()
        .map(|row| {
            let label: String = row.to_value("periode").unwrap_or_default();
            let cnt: i64 = row.to_value("cnt").unwrap_or(0);
            (label, count(cnt))
        })
        .collect()
}

fn utc(naive: chrono::NaiveDateTime) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(naive, chrono::Utc)
}

/// Counts active migrants created in the window.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn count_active_migrants(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
) -> Result<u64, DbError> {
    let mut f = Filters::new();
    f.active_migrants();
    f.window("m.created_at", window);
    f.area(area, "m.ville_actuelle", "m.pays_actuel");

    let sql = format!(
        "SELECT COUNT(*) AS total FROM migrants m{}",
        f.where_clause()
    );
    let rows = db.query_raw_params(&sql, &f.params).await?;
    Ok(first_count(&rows, "total"))
}

/// Counts internally displaced persons: active migrants still in their
/// country of origin but no longer in their place of birth.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn count_internal_displaced(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
) -> Result<u64, DbError> {
    let mut f = Filters::new();
    f.active_migrants();
    f.raw("m.pays_origine = m.pays_actuel");
    f.raw("COALESCE(m.lieu_naissance, '') <> COALESCE(m.ville_actuelle, '')");
    f.window("m.created_at", window);
    f.area(area, "m.ville_actuelle", "m.pays_actuel");

    let sql = format!(
        "SELECT COUNT(*) AS total FROM migrants m{}",
        f.where_clause()
    );
    let rows = db.query_raw_params(&sql, &f.params).await?;
    Ok(first_count(&rows, "total"))
}

/// Counts permanent-residence geolocations (returns) of active migrants.
///
/// The area filter applies to the geolocation, not the migrant.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn count_returns(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
) -> Result<u64, DbError> {
    let mut f = Filters::new();
    f.active_migrants();
    f.raw("g.deleted_at IS NULL");
    f.bind(
        |i| format!("g.type_mouvement = ${i}"),
        DatabaseValue::String(MovementType::PermanentResidence.as_ref().to_string()),
    );
    f.window("g.created_at", window);
    f.area(area, "g.ville", "g.pays");

    let sql = format!(
        "SELECT COUNT(*) AS total
         FROM geolocalisations g
         JOIN migrants m ON m.id = g.migrant_id{}",
        f.where_clause()
    );
    let rows = db.query_raw_params(&sql, &f.params).await?;
    Ok(first_count(&rows, "total"))
}

/// Groups active migrants by current city, largest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn province_breakdown(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
) -> Result<Vec<ProvinceCount>, DbError> {
    let mut f = Filters::new();
    f.active_migrants();
    f.window("m.created_at", window);
    f.area(area, "m.ville_actuelle", "m.pays_actuel");
    let unknown = f.bind_extra(DatabaseValue::String(UNKNOWN_ZONE.to_string()));

    let sql = format!(
        "SELECT COALESCE(NULLIF(m.ville_actuelle, ''), ${unknown}) AS province, COUNT(*) AS cnt
         FROM migrants m{}
         GROUP BY 1
         ORDER BY cnt DESC, province",
        f.where_clause()
    );
    let rows = db.query_raw_params(&sql, &f.params).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let cnt: i64 = row.to_value("cnt").unwrap_or(0);
            ProvinceCount {
                province: row.to_value("province").unwrap_or_default(),
                count: count(cnt),
            }
        })
        .collect())
}

/// Builds the monthly series over `windows`.
///
/// Runs one grouped query for new migrants, one for returns and one for the
/// running total before the first month, then folds them with
/// [`assemble_monthly_buckets`].
///
/// # Errors
///
/// Returns [`DbError`] if any database query fails.
pub async fn monthly_buckets(
    db: &dyn Database,
    windows: &[MonthWindow],
    area: &AreaFilter,
) -> Result<Vec<MonthlyBucket>, DbError> {
    let (Some(first), Some(last)) = (windows.first(), windows.last()) else {
        return Ok(Vec::new());
    };
    let span = TimeWindow {
        since: first.start,
        until: last.end,
    };

    let mut f = Filters::new();
    f.active_migrants();
    f.window("m.created_at", &span);
    f.area(area, "m.ville_actuelle", "m.pays_actuel");
    let new_sql = format!(
        "SELECT to_char(date_trunc('month', m.created_at), 'YYYY-MM') AS periode, COUNT(*) AS cnt
         FROM migrants m{}
         GROUP BY 1",
        f.where_clause()
    );
    let new_by_month = counts_by_label(&db.query_raw_params(&new_sql, &f.params).await?);

    let mut f = Filters::new();
    f.active_migrants();
    f.raw("g.deleted_at IS NULL");
    f.bind(
        |i| format!("g.type_mouvement = ${i}"),
        DatabaseValue::String(MovementType::PermanentResidence.as_ref().to_string()),
    );
    f.window("g.created_at", &span);
    f.area(area, "g.ville", "g.pays");
    let returns_sql = format!(
        "SELECT to_char(date_trunc('month', g.created_at), 'YYYY-MM') AS periode, COUNT(*) AS cnt
         FROM geolocalisations g
         JOIN migrants m ON m.id = g.migrant_id{}
         GROUP BY 1",
        f.where_clause()
    );
    let returns_by_month = counts_by_label(&db.query_raw_params(&returns_sql, &f.params).await?);

    let mut f = Filters::new();
    f.active_migrants();
    f.bind(
        |i| format!("m.created_at < ${i}"),
        DatabaseValue::DateTime(first.start.naive_utc()),
    );
    f.area(area, "m.ville_actuelle", "m.pays_actuel");
    let baseline_sql = format!(
        "SELECT COUNT(*) AS total FROM migrants m{}",
        f.where_clause()
    );
    let baseline = first_count(
        &db.query_raw_params(&baseline_sql, &f.params).await?,
        "total",
    );

    Ok(assemble_monthly_buckets(
        windows,
        &new_by_month,
        &returns_by_month,
        baseline,
    ))
}

/// Folds per-month counts into buckets with a running cumulative total.
///
/// Months missing from the maps count as zero. `baseline` is the number of
/// migrants created before the first window.
#[must_use]
pub fn assemble_monthly_buckets(
    windows: &[MonthWindow],
    new_by_month: &BTreeMap<String, u64>,
    returns_by_month: &BTreeMap<String, u64>,
    baseline: u64,
) -> Vec<MonthlyBucket> {
    let mut cumulative = baseline;
    windows
        .iter()
        .map(|w| {
            let new_displaced = new_by_month.get(&w.label).copied().unwrap_or(0);
            cumulative += new_displaced;
            MonthlyBucket {
                label: w.label.clone(),
                new_displaced,
                returns: returns_by_month.get(&w.label).copied().unwrap_or(0),
                cumulative_total: cumulative,
            }
        })
        .collect()
}

/// Groups displacement motives of active migrants by motive type tag.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn motive_counts(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
) -> Result<Vec<MotiveCount>, DbError> {
    let mut f = Filters::new();
    f.active_migrants();
    f.raw("d.deleted_at IS NULL");
    f.window("d.created_at", window);
    f.area(area, "m.ville_actuelle", "m.pays_actuel");

    let sql = format!(
        "SELECT COALESCE(TRIM(d.type_motif), '') AS motive_type, COUNT(*) AS cnt
         FROM motifs_deplacement d
         JOIN migrants m ON m.id = d.migrant_id{}
         GROUP BY 1
         ORDER BY cnt DESC, motive_type",
        f.where_clause()
    );
    let rows = db.query_raw_params(&sql, &f.params).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let cnt: i64 = row.to_value("cnt").unwrap_or(0);
            MotiveCount {
                motive_type: row.to_value("motive_type").unwrap_or_default(),
                count: count(cnt),
            }
        })
        .collect())
}

/// Counts geolocations in the window and those outside official sites.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn shelter_occupancy(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
) -> Result<ShelterCounts, DbError> {
    let mut f = Filters::new();
    f.active_migrants();
    f.raw("g.deleted_at IS NULL");
    f.window("g.created_at", window);
    f.area(area, "g.ville", "g.pays");
    let official = f.bind_extra(DatabaseValue::String(
        ShelterType::OfficialSite.as_ref().to_string(),
    ));

    let sql = format!(
        "SELECT COUNT(*) AS total,
                COUNT(*) FILTER (
                    WHERE g.type_hebergement IS NOT NULL
                      AND g.type_hebergement <> ''
                      AND g.type_hebergement <> ${official}
                ) AS off_site
         FROM geolocalisations g
         JOIN migrants m ON m.id = g.migrant_id{}",
        f.where_clause()
    );
    let rows = db.query_raw_params(&sql, &f.params).await?;

    Ok(ShelterCounts {
        total: first_count(&rows, "total"),
        off_site: first_count(&rows, "off_site"),
    })
}

/// Collects the raw demographic counts and known dates of birth.
///
/// Ages are measured at the end of the window.
///
/// # Errors
///
/// Returns [`DbError`] if any database query fails.
pub async fn demographic_raw(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
) -> Result<DemographicRaw, DbError> {
    let child_cutoff = window.birth_cutoff(CHILD_MAX_AGE_YEARS);
    let elderly_cutoff = window.birth_cutoff(ELDERLY_MIN_AGE_YEARS);

    let mut f = Filters::new();
    f.active_migrants();
    f.window("m.created_at", window);
    f.area(area, "m.ville_actuelle", "m.pays_actuel");
    let where_clause = f.where_clause();
    let base_params = f.params.clone();

    let child_idx = f.bind_extra(DatabaseValue::DateTime(
        child_cutoff.and_hms_opt(0, 0, 0).unwrap_or_default(),
    ));
    let elderly_idx = f.bind_extra(DatabaseValue::DateTime(
        elderly_cutoff.and_hms_opt(0, 0, 0).unwrap_or_default(),
    ));

    let counts_sql = format!(
        "SELECT COUNT(*) AS total,
                COUNT(*) FILTER (WHERE UPPER(m.sexe) = 'F') AS female,
                COUNT(*) FILTER (WHERE m.date_naissance > ${child_idx}::timestamp) AS children,
                COUNT(*) FILTER (WHERE m.date_naissance < ${elderly_idx}::timestamp) AS elderly
         FROM migrants m{where_clause}"
    );
    let rows = db.query_raw_params(&counts_sql, &f.params).await?;

    let dates_sql = format!(
        "SELECT m.date_naissance::timestamp AS birth_date
         FROM migrants m{where_clause} AND m.date_naissance IS NOT NULL"
    );
    let date_rows = db.query_raw_params(&dates_sql, &base_params).await?;
    let birth_dates = date_rows
        .iter()
        .filter_map(|row| {
            let naive: Option<chrono::NaiveDateTime> = row.to_value("birth_date").unwrap_or(None);
            naive.map(|n| n.date())
        })
        .collect();

    Ok(DemographicRaw {
        total: first_count(&rows, "total"),
        female: first_count(&rows, "female"),
        children: first_count(&rows, "children"),
        elderly: first_count(&rows, "elderly"),
        birth_dates,
    })
}

/// Ranks zones by open alerts of the given severities, most alerts first.
///
/// The zone of an alert is the city of the migrant's latest geolocation,
/// falling back to the migrant's current city.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn risk_zone_counts(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
    severities: &[SeverityLevel],
    limit: u32,
) -> Result<Vec<ZoneAlertCount>, DbError> {
    let mut f = Filters::new();
    f.active_migrants();
    f.raw("a.deleted_at IS NULL");
    f.bind(
        |i| format!("LOWER(a.statut) = ${i}"),
        DatabaseValue::String(AlertStatus::Active.as_ref().to_string()),
    );
    f.severities("a.niveau_gravite", severities);
    f.window("a.created_at", window);
    f.area(
        area,
        "COALESCE(NULLIF(g.ville, ''), m.ville_actuelle)",
        "m.pays_actuel",
    );
    let unknown = f.bind_extra(DatabaseValue::String(UNKNOWN_ZONE.to_string()));
    let limit_idx = f.bind_extra(DatabaseValue::Int64(i64::from(limit)));

    let sql = format!(
        "SELECT COALESCE(NULLIF(g.ville, ''), NULLIF(m.ville_actuelle, ''), ${unknown}) AS zone,
                COUNT(*) AS cnt
         FROM alertes a
         JOIN migrants m ON m.id = a.migrant_id
         LEFT JOIN LATERAL (
             SELECT gg.ville
             FROM geolocalisations gg
             WHERE gg.migrant_id = m.id AND gg.deleted_at IS NULL
             ORDER BY gg.created_at DESC, gg.id DESC
             LIMIT 1
         ) g ON TRUE{}
         GROUP BY 1
         ORDER BY cnt DESC, zone
         LIMIT ${limit_idx}",
        f.where_clause()
    );
    let rows = db.query_raw_params(&sql, &f.params).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let cnt: i64 = row.to_value("cnt").unwrap_or(0);
            ZoneAlertCount {
                zone: row.to_value("zone").unwrap_or_default(),
                alert_count: count(cnt),
            }
        })
        .collect())
}

/// Groups returns by `(birth place, return city)`, busiest routes first.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn return_trend_counts(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
    limit: u32,
) -> Result<Vec<ReturnRouteCount>, DbError> {
    let mut f = Filters::new();
    f.active_migrants();
    f.raw("g.deleted_at IS NULL");
    f.bind(
        |i| format!("g.type_mouvement = ${i}"),
        DatabaseValue::String(MovementType::PermanentResidence.as_ref().to_string()),
    );
    f.window("g.created_at", window);
    f.area(area, "g.ville", "g.pays");
    let unknown = f.bind_extra(DatabaseValue::String(UNKNOWN_ZONE.to_string()));
    let limit_idx = f.bind_extra(DatabaseValue::Int64(i64::from(limit)));

    let sql = format!(
        "SELECT COALESCE(NULLIF(m.lieu_naissance, ''), ${unknown}) AS origin_zone,
                COALESCE(NULLIF(g.ville, ''), ${unknown}) AS return_zone,
                COUNT(*) AS cnt
         FROM geolocalisations g
         JOIN migrants m ON m.id = g.migrant_id{}
         GROUP BY 1, 2
         ORDER BY cnt DESC, origin_zone, return_zone
         LIMIT ${limit_idx}",
        f.where_clause()
    );
    let rows = db.query_raw_params(&sql, &f.params).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let cnt: i64 = row.to_value("cnt").unwrap_or(0);
            ReturnRouteCount {
                origin_zone: row.to_value("origin_zone").unwrap_or_default(),
                return_zone: row.to_value("return_zone").unwrap_or_default(),
                count: count(cnt),
            }
        })
        .collect())
}

/// Lists open alerts of the given severities, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database query fails.
pub async fn recent_alerts(
    db: &dyn Database,
    window: &TimeWindow,
    area: &AreaFilter,
    severities: &[SeverityLevel],
    limit: u32,
) -> Result<Vec<AlertRow>, DbError> {
    let mut f = Filters::new();
    f.active_migrants();
    f.raw("a.deleted_at IS NULL");
    f.bind(
        |i| format!("LOWER(a.statut) = ${i}"),
        DatabaseValue::String(AlertStatus::Active.as_ref().to_string()),
    );
    f.severities("a.niveau_gravite", severities);
    f.window("a.created_at", window);
    f.area(area, "m.ville_actuelle", "m.pays_actuel");
    let unknown = f.bind_extra(DatabaseValue::String(UNKNOWN_ZONE.to_string()));
    let limit_idx = f.bind_extra(DatabaseValue::Int64(i64::from(limit)));

    let sql = format!(
        "SELECT a.id::bigint AS id,
                a.migrant_id::bigint AS migrant_id,
                COALESCE(NULLIF(m.ville_actuelle, ''), ${unknown}) AS zone,
                COALESCE(a.type_alerte, '') AS alert_type,
                LOWER(a.niveau_gravite) AS severity,
                a.created_at,
                a.description
         FROM alertes a
         JOIN migrants m ON m.id = a.migrant_id{}
         ORDER BY a.created_at DESC, a.id DESC
         LIMIT ${limit_idx}",
        f.where_clause()
    );
    let rows = db.query_raw_params(&sql, &f.params).await?;

    let mut alerts = Vec::with_capacity(rows.len());
    for row in &rows {
        let severity: String = row.to_value("severity").unwrap_or_default();
        let severity = severity.parse().map_err(|_| DbError::Conversion {
            message: format!("Unknown alert severity '{severity}'"),
        })?;
        let created_at: chrono::NaiveDateTime = row.to_value("created_at").unwrap_or_default();

        alerts.push(AlertRow {
            id: row.to_value("id").unwrap_or(0),
            migrant_id: row.to_value("migrant_id").unwrap_or(0),
            zone: row.to_value("zone").unwrap_or_default(),
            alert_type: row.to_value("alert_type").unwrap_or_default(),
            severity,
            created_at: utc(created_at),
            description: row.to_value("description").unwrap_or(None),
        });
    }

    Ok(alerts)
}
