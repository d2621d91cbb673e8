//! Vulnerability and needs indicators.

use chrono::Datelike as _;
use idp_watch_database::Primitive;
use idp_watch_database_models::{DemographicRaw, ShelterCounts};
use idp_watch_indicators_models::{ProfilDemographique, VulnerabiliteBesoins};

use crate::{IndicatorRequest, IndicatorsError, percent, round2};

/// Builds the vulnerability and needs indicators.
///
/// # Errors
///
/// Returns [`IndicatorsError::Query`] if any primitive fails.
pub async fn build(req: &IndicatorRequest<'_>) -> Result<VulnerabiliteBesoins, IndicatorsError> {
    let window = &req.period.window;

    let (raw, shelter) = tokio::try_join!(
        req.run(
            Primitive::DemographicRaw,
            req.store.demographic_raw(window, req.area),
        ),
        req.run(
            Primitive::ShelterOccupancy,
            req.store.shelter_occupancy(window, req.area),
        ),
    )?;

    Ok(VulnerabiliteBesoins {
        profil_demographique: profile(&raw, window.until.year()),
        acces_services_base: req.config.basic_services.into(),
        taux_occupation_abris: occupancy_rate(shelter),
        deplaces_hors_sites: shelter.off_site,
    })
}

/// Normalises raw demographic counts. Ages are whole years at `year`.
#[must_use]
pub fn profile(raw: &DemographicRaw, year: i32) -> ProfilDemographique {
    ProfilDemographique {
        pourcentage_femmes: percent(raw.female, raw.total),
        pourcentage_enfants: percent(raw.children, raw.total),
        pourcentage_personnes_agees: percent(raw.elderly, raw.total),
        age_moyen: mean_age(raw, year),
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_age(raw: &DemographicRaw, year: i32) -> f64 {
    if raw.birth_dates.is_empty() {
        return 0.0;
    }
    let sum: i64 = raw
        .birth_dates
        .iter()
        .map(|born| i64::from(year - born.year()))
        .sum();
    round2(sum as f64 / raw.birth_dates.len() as f64)
}

/// Share of located persons housed in a structure other than off-site
/// shelter.
#[must_use]
pub fn occupancy_rate(shelter: ShelterCounts) -> f64 {
    percent(shelter.total.saturating_sub(shelter.off_site), shelter.total)
}
