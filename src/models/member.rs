use serde::{Deserialize, Serialize};

pub type MemberId = i64;
pub type DependentId = i64;

/// Участник из справочника. Сервер уже отфильтровал тех, кто не может
/// бронировать (например, без активного кода).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Иждивенец ("гость") участника.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependent {
    pub id: DependentId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub relation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDetails {
    pub member: Member,
    #[serde(default)]
    pub dependents: Vec<Dependent>,
}

impl MemberDetails {
    pub fn has_dependent(&self, id: DependentId) -> bool {
        self.dependents.iter().any(|d| d.id == id)
    }
}
