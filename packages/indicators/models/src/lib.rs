#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Response documents published by the displacement indicator endpoints.
//!
//! Field names are French and snake_case because the dashboard reads them
//! verbatim. Timestamps serialize as RFC 3339.

use chrono::{DateTime, Utc};
use idp_watch_displacement_models::{
    MotiveFamily, RiskLevel, SeverityLevel, ThreatType, TrendDirection,
};
use serde::{Deserialize, Serialize};

/// Share of active migrants in one current city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepartitionProvince {
    /// City name.
    pub province: String,
    /// Active migrants in the city.
    pub nombre: u64,
    /// Share of the breakdown total, in percent.
    pub pourcentage: f64,
}

/// One calendar month of the displacement series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionMensuelle {
    /// `YYYY-MM` label.
    pub periode: String,
    /// Migrants registered during the month.
    pub nouveaux_deplaces: u64,
    /// Returns recorded during the month.
    pub retours: u64,
    /// Migrants registered before the end of the month.
    pub total_cumule: u64,
}

/// Volume and localisation indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeLocalisation {
    /// Displaced persons. Equal to `nombre_total_migrants`; the dashboard
    /// shows both.
    pub nombre_total_pdi: u64,
    /// Active migrants registered in the window.
    pub nombre_total_migrants: u64,
    /// Of which displaced inside their country of origin.
    pub deplaces_internes: u64,
    /// Returns to a permanent residence in the window.
    pub retournes: u64,
    /// Breakdown by current city, largest first.
    pub repartition_provinces: Vec<RepartitionProvince>,
    /// Monthly series, oldest first.
    pub evolution_mensuelle: Vec<EvolutionMensuelle>,
}

/// Count and share of one motive type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailMotif {
    /// Motive type tag as recorded.
    pub type_motif: String,
    /// Motives with this tag.
    pub nombre: u64,
    /// Share of all motives, in percent.
    pub pourcentage: f64,
}

/// Cause indicators: one percentage per motive family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausesDeplacements {
    /// Armed conflicts.
    pub pourcentage_conflits_armes: f64,
    /// Natural disasters.
    pub pourcentage_catastrophes: f64,
    /// Persecution.
    pub pourcentage_persecution: f64,
    /// Generalised violence.
    pub pourcentage_violence_generalisee: f64,
    /// Everything else.
    pub pourcentage_autres: f64,
    /// Per-tag detail, most frequent first.
    pub details_motifs: Vec<DetailMotif>,
}

impl CausesDeplacements {
    /// Percentage published for `family`.
    #[must_use]
    pub const fn family_percent(&self, family: MotiveFamily) -> f64 {
        match family {
            MotiveFamily::ArmedConflicts => self.pourcentage_conflits_armes,
            MotiveFamily::Disasters => self.pourcentage_catastrophes,
            MotiveFamily::Persecution => self.pourcentage_persecution,
            MotiveFamily::GeneralisedViolence => self.pourcentage_violence_generalisee,
            MotiveFamily::Other => self.pourcentage_autres,
        }
    }
}

/// Demographic make-up of the registered population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilDemographique {
    /// Women, in percent.
    pub pourcentage_femmes: f64,
    /// Under 18, in percent.
    pub pourcentage_enfants: f64,
    /// Over 65, in percent.
    pub pourcentage_personnes_agees: f64,
    /// Mean age in years over known dates of birth.
    pub age_moyen: f64,
}

/// Access to basic services, in percent of the population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccesServicesBase {
    /// Drinking water.
    pub eau_potable: f64,
    /// Health care.
    pub soins_sante: f64,
    /// Schooling.
    pub education: f64,
    /// Decent housing.
    pub logement: f64,
}

/// Vulnerability and needs indicators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VulnerabiliteBesoins {
    /// Demographic profile.
    pub profil_demographique: ProfilDemographique,
    /// Basic services access.
    pub acces_services_base: AccesServicesBase,
    /// Share of located persons housed in a structure, in percent.
    pub taux_occupation_abris: f64,
    /// Located persons outside official sites.
    pub deplaces_hors_sites: u64,
}

/// A zone ranked by open high-severity alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRisque {
    /// City.
    pub zone: String,
    /// Risk level from the alert count.
    pub niveau_risque: RiskLevel,
    /// Threat tag.
    pub type_menace: ThreatType,
    /// Rough estimate: alert count times the configured multiplier.
    pub population_a_risque: u64,
}

/// Returns on one origin → return route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TendanceRetour {
    /// Birth place.
    pub zone_origine: String,
    /// City returned to.
    pub zone_retour: String,
    /// Returns on the route.
    pub nombre_retours: u64,
    /// Direction from the return count.
    pub tendance: TrendDirection,
}

/// An open alert surfaced on the overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertePrecoce {
    /// Current city of the migrant concerned.
    pub zone: String,
    /// Alert type tag.
    pub type_alerte: String,
    /// Severity level.
    pub niveau_gravite: SeverityLevel,
    /// When the alert was raised.
    pub date_detection: DateTime<Utc>,
    /// Free-form description.
    pub description: Option<String>,
}

/// Dynamics and alert indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamiquesAlerte {
    /// High-risk zones, most alerts first.
    pub zones_haut_risque: Vec<ZoneRisque>,
    /// Busiest return routes.
    pub tendances_retour: Vec<TendanceRetour>,
    /// Newest open alerts.
    pub alertes_precoces: Vec<AlertePrecoce>,
    /// Migrants registered over the last days, regardless of the period.
    pub mouvements_massifs_recents: u64,
}

/// `GET /api/overview/indicateurs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicateursDeplacementResponse {
    /// Volume and localisation.
    pub volume_localisation: VolumeLocalisation,
    /// Causes.
    pub causes_deplacements: CausesDeplacements,
    /// Vulnerability and needs.
    pub vulnerabilite_besoins: VulnerabiliteBesoins,
    /// Dynamics and alerts.
    pub dynamiques_alerte: DynamiquesAlerte,
    /// Generation instant.
    pub date_generation: DateTime<Utc>,
    /// `"<N> derniers mois"`.
    pub periode_analyse: String,
}

/// An open alert in the real-time feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlerteTempsReel {
    /// Alert id.
    pub id: i64,
    /// Migrant the alert was raised for.
    pub migrant_id: i64,
    /// Current city of the migrant.
    pub zone: String,
    /// Alert type tag.
    pub type_alerte: String,
    /// Severity level.
    pub niveau_gravite: SeverityLevel,
    /// When the alert was raised.
    pub date_detection: DateTime<Utc>,
    /// Free-form description.
    pub description: Option<String>,
}

/// `GET /api/overview/alertes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertesTempsReelResponse {
    /// Alerts, newest first.
    pub alertes: Vec<AlerteTempsReel>,
    /// Number of alerts returned.
    pub nombre_total: u64,
    /// Severity levels the feed was filtered on.
    pub niveaux: Vec<SeverityLevel>,
    /// Look-back in days.
    pub periode_jours: u32,
    /// Generation instant.
    pub date_mise_a_jour: DateTime<Utc>,
}

/// `GET /api/overview/repartition`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepartitionResponse {
    /// Breakdown by current city, largest first.
    pub repartition_provinces: Vec<RepartitionProvince>,
    /// Generation instant.
    pub date_mise_a_jour: DateTime<Utc>,
    /// `"<N> derniers mois"`.
    pub periode_analyse: String,
}

/// One slice of the motive pie chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifPieSlice {
    /// Motive family.
    pub categorie: MotiveFamily,
    /// French label.
    pub libelle: String,
    /// Hex colour.
    pub couleur: String,
    /// Motives in the family.
    pub nombre: u64,
    /// Share of all motives, in percent.
    pub pourcentage: f64,
}

/// `GET /api/overview/motifs-pie`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifPieChartResponse {
    /// One slice per family, in display order.
    pub donnees: Vec<MotifPieSlice>,
    /// Motives counted.
    pub total_motifs: u64,
    /// `"<N> derniers mois"`.
    pub periode_analyse: String,
    /// Generation instant.
    pub date_generation: DateTime<Utc>,
}
