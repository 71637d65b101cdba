use serde::{Deserialize, Serialize};

use shared_models::DoctorId;

/// A doctor as listed by the search endpoint. Field names follow the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: DoctorId,
    #[serde(rename = "nom")]
    pub last_name: String,
    #[serde(rename = "prenom")]
    pub first_name: String,
    #[serde(rename = "specialite")]
    pub specialty: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(rename = "hopital", default)]
    pub hospital: Option<String>,
    #[serde(rename = "telephone", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(rename = "nombreConsultations", default)]
    pub consultation_count: Option<i64>,
}

impl DoctorSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

/// Denormalized copy of a doctor's public fields, captured when a booking draft
/// is created so the draft can outlive the page that loaded the doctor list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSnapshot {
    pub id: DoctorId,
    #[serde(rename = "nom")]
    pub last_name: String,
    #[serde(rename = "prenom")]
    pub first_name: String,
    #[serde(rename = "specialite")]
    pub specialty: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(rename = "hopital", default)]
    pub hospital: Option<String>,
    #[serde(rename = "telephone", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(
        rename = "nombreConsultations",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub consultation_count: Option<i64>,
}

impl DoctorSnapshot {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

impl From<&DoctorSummary> for DoctorSnapshot {
    fn from(doctor: &DoctorSummary) -> Self {
        Self {
            id: doctor.id,
            last_name: doctor.last_name.clone(),
            first_name: doctor.first_name.clone(),
            specialty: doctor.specialty.clone(),
            city: doctor.city.clone(),
            hospital: doctor.hospital.clone(),
            phone: doctor.phone.clone(),
            rating: doctor.rating,
            consultation_count: doctor.consultation_count,
        }
    }
}

impl From<DoctorSummary> for DoctorSnapshot {
    fn from(doctor: DoctorSummary) -> Self {
        Self::from(&doctor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialty: String,
    pub city: Option<String>,
}

impl DoctorSearchQuery {
    pub fn new(specialty: impl Into<String>) -> Self {
        Self {
            specialty: specialty.into(),
            city: None,
        }
    }

    pub fn in_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Query-string form used by the search endpoint and by return routes.
    pub fn to_query_string(&self) -> String {
        let mut parts = vec![format!("specialite={}", urlencoding::encode(self.specialty.trim()))];
        if let Some(city) = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            parts.push(format!("city={}", urlencoding::encode(city)));
        }
        parts.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_deserializes_backend_names() {
        let doctor: DoctorSummary = serde_json::from_value(json!({
            "id": 7,
            "nom": "Alaoui",
            "prenom": "Youssef",
            "specialite": "Cardiologie",
            "city": "Rabat",
            "rating": 4.5
        }))
        .unwrap();

        assert_eq!(doctor.id, 7);
        assert_eq!(doctor.full_name(), "Alaoui Youssef");
        assert_eq!(doctor.hospital, None);

        let snapshot = DoctorSnapshot::from(&doctor);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["specialite"], "Cardiologie");
        assert!(value.get("nombreConsultations").is_none());
    }

    #[test]
    fn test_query_string_encodes_and_skips_blank_city() {
        let query = DoctorSearchQuery::new("Médecine générale").in_city("  ");
        assert_eq!(query.to_query_string(), "specialite=M%C3%A9decine%20g%C3%A9n%C3%A9rale");

        let query = DoctorSearchQuery::new("Cardiologie").in_city("Casablanca");
        assert_eq!(query.to_query_string(), "specialite=Cardiologie&city=Casablanca");
    }
}
