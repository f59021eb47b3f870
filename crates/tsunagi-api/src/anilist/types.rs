use serde::Deserialize;

use crate::traits::AiringSchedule;

/// GraphQL envelope. AniList returns `data` alongside `errors` on partial failures.
#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    pub status: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct AiringScheduleResponse {
    #[serde(rename = "AiringSchedule")]
    pub airing_schedule: Option<AiringScheduleNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringScheduleNode {
    pub id: u64,
    pub episode: u32,
    pub airing_at: i64,
}

impl AiringScheduleNode {
    pub fn into_schedule(self) -> AiringSchedule {
        AiringSchedule {
            id: self.id,
            episode: self.episode,
            airing_at: self.airing_at,
        }
    }
}
