//! Cause indicators.
//!
//! Motives are categorised by their type tag: each tag belongs to exactly
//! one [`MotiveFamily`], unknown tags to [`MotiveFamily::Other`]. The
//! boolean factor flags on the motive row are not used, so a motive is
//! never counted in two families.

use std::collections::BTreeMap;

use idp_watch_database::Primitive;
use idp_watch_database_models::MotiveCount;
use idp_watch_displacement_models::MotiveFamily;
use idp_watch_indicators_models::{CausesDeplacements, DetailMotif, MotifPieSlice};

use crate::{IndicatorRequest, IndicatorsError, percent, round2, share};

/// Tolerance on the family percentage total.
const SUM_TOLERANCE: f64 = 0.5;

/// Builds the cause indicators.
///
/// # Errors
///
/// Returns [`IndicatorsError::Query`] if the primitive fails and
/// [`IndicatorsError::Invariant`] if the family percentages do not add up.
pub async fn build(req: &IndicatorRequest<'_>) -> Result<CausesDeplacements, IndicatorsError> {
    let counts = fetch(req).await?;
    let causes = causes(&counts);
    check_total(&causes, counts.iter().map(|c| c.count).sum())?;
    Ok(causes)
}

/// Builds the motive pie chart slices, one per family in display order,
/// and the number of motives counted.
///
/// # Errors
///
/// Returns [`IndicatorsError::Query`] if the primitive fails.
pub async fn build_pie(
    req: &IndicatorRequest<'_>,
) -> Result<(Vec<MotifPieSlice>, u64), IndicatorsError> {
    let counts = fetch(req).await?;
    Ok(pie(&counts))
}

async fn fetch(req: &IndicatorRequest<'_>) -> Result<Vec<MotiveCount>, IndicatorsError> {
    req.run(
        Primitive::MotiveCounts,
        req.store.motive_counts(&req.period.window, req.area),
    )
    .await
}

/// Computes the per-tag details and the family percentages.
///
/// Family percentages accumulate the unrounded tag shares and are rounded
/// once, so they stay within rounding error of 100.
#[must_use]
pub fn causes(counts: &[MotiveCount]) -> CausesDeplacements {
    let total: u64 = counts.iter().map(|c| c.count).sum();
    let mut families: BTreeMap<MotiveFamily, f64> = BTreeMap::new();
    let mut details = Vec::with_capacity(counts.len());

    for c in counts {
        *families
            .entry(MotiveFamily::classify(&c.motive_type))
            .or_default() += share(c.count, total);
        details.push(DetailMotif {
            type_motif: c.motive_type.clone(),
            nombre: c.count,
            pourcentage: percent(c.count, total),
        });
    }

    let family = |f: MotiveFamily| round2(families.get(&f).copied().unwrap_or(0.0));

    CausesDeplacements {
        pourcentage_conflits_armes: family(MotiveFamily::ArmedConflicts),
        pourcentage_catastrophes: family(MotiveFamily::Disasters),
        pourcentage_persecution: family(MotiveFamily::Persecution),
        pourcentage_violence_generalisee: family(MotiveFamily::GeneralisedViolence),
        pourcentage_autres: family(MotiveFamily::Other),
        details_motifs: details,
    }
}

/// Aggregates tag counts into one slice per family.
#[must_use]
pub fn pie(counts: &[MotiveCount]) -> (Vec<MotifPieSlice>, u64) {
    let total: u64 = counts.iter().map(|c| c.count).sum();
    let mut by_family: BTreeMap<MotiveFamily, u64> = BTreeMap::new();
    for c in counts {
        *by_family
            .entry(MotiveFamily::classify(&c.motive_type))
            .or_default() += c.count;
    }

    let slices = MotiveFamily::all()
        .iter()
        .map(|&family| {
            let nombre = by_family.get(&family).copied().unwrap_or(0);
            MotifPieSlice {
                categorie: family,
                libelle: family.label().to_string(),
                couleur: family.color().to_string(),
                nombre,
                pourcentage: percent(nombre, total),
            }
        })
        .collect();

    (slices, total)
}

fn check_total(causes: &CausesDeplacements, total: u64) -> Result<(), IndicatorsError> {
    let sum: f64 = MotiveFamily::all()
        .iter()
        .map(|f| causes.family_percent(*f))
        .sum();
    let expected = if total == 0 { 0.0 } else { 100.0 };

    if (sum - expected).abs() > SUM_TOLERANCE {
        return Err(IndicatorsError::Invariant {
            message: format!("family percentages sum to {sum} over {total} motives"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone as _, Utc};
    use idp_watch_database::MemoryStore;
    use idp_watch_database_models::{AreaFilter, MigrantRecord, MotiveRecord};

    use super::*;
    use crate::{IndicatorsConfig, Period};

    fn count(motive_type: &str, count: u64) -> MotiveCount {
        MotiveCount {
            motive_type: motive_type.to_string(),
            count,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn no_motives_means_all_zero() {
        let c = causes(&[]);
        for family in MotiveFamily::all() {
            assert!(close(c.family_percent(*family), 0.0));
        }
        assert!(c.details_motifs.is_empty());
        assert!(check_total(&c, 0).is_ok());
    }

    #[test]
    fn unknown_tags_accumulate_into_other() {
        let c = causes(&[count("economique", 3), count("war", 1)]);
        assert!(close(c.pourcentage_autres, 75.0));
        assert!(close(c.pourcentage_conflits_armes, 25.0));
    }

    #[test]
    fn uneven_shares_still_sum_to_hundred() {
        let c = causes(&[
            count("war", 1),
            count("flood", 1),
            count("insecurity", 1),
            count("drought", 1),
            count("economique", 1),
            count("famille", 1),
            count("criminality", 1),
        ]);
        let sum: f64 = MotiveFamily::all()
            .iter()
            .map(|f| c.family_percent(*f))
            .sum();
        assert!((sum - 100.0).abs() <= SUM_TOLERANCE);
        assert!(check_total(&c, 7).is_ok());
    }

    #[test]
    fn broken_total_is_an_invariant_error() {
        let mut c = causes(&[count("war", 1)]);
        c.pourcentage_conflits_armes = 50.0;
        assert!(matches!(
            check_total(&c, 1),
            Err(IndicatorsError::Invariant { .. })
        ));
    }

    #[test]
    fn pie_has_one_slice_per_family() {
        let (slices, total) = pie(&[count("war", 3), count("armed_conflict", 1), count("", 1)]);
        assert_eq!(total, 5);
        assert_eq!(slices.len(), 5);
        assert_eq!(slices[0].categorie, MotiveFamily::ArmedConflicts);
        assert_eq!(slices[0].nombre, 4);
        assert!(close(slices[0].pourcentage, 80.0));
        assert_eq!(slices[0].libelle, "Conflits armés");
        assert_eq!(slices[4].categorie, MotiveFamily::Other);
        assert_eq!(slices[4].nombre, 1);
        assert!(slices[1..4].iter().all(|s| s.nombre == 0));
    }

    #[tokio::test]
    async fn five_motives_split_by_family() {
        let mut store = MemoryStore::new();
        store.add_migrant(MigrantRecord::new(1, now() - chrono::Duration::days(3)));
        let tags = [
            "armed_conflict",
            "armed_conflict",
            "flood",
            "religious_persecution",
            "criminality",
        ];
        for (id, tag) in (1..).zip(tags) {
            store.add_motive(MotiveRecord::new(
                id,
                1,
                now() - chrono::Duration::days(2),
                tag,
            ));
        }

        let config = IndicatorsConfig::default();
        let period = Period::new(12, now());
        let c = build(&IndicatorRequest {
            store: &store,
            period: &period,
            area: &AreaFilter::None,
            config: &config,
        })
        .await
        .unwrap();

        assert!(close(c.pourcentage_conflits_armes, 40.0));
        assert!(close(c.pourcentage_catastrophes, 20.0));
        assert!(close(c.pourcentage_persecution, 20.0));
        assert!(close(c.pourcentage_violence_generalisee, 20.0));
        assert!(close(c.pourcentage_autres, 0.0));
        assert_eq!(c.details_motifs[0].type_motif, "armed_conflict");
        assert_eq!(c.details_motifs[0].nombre, 2);
        assert!(close(c.details_motifs[0].pourcentage, 40.0));
    }
}
