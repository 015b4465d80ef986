use serde::{Deserialize, Serialize};

/// A shortened link. `short_code` is always `codec::encode(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: u64,
    pub short_code: String,
    pub long_url: String,
    pub owner_id: Option<u64>,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

/// One page of an owner's links plus the owner's total link count
#[derive(Debug, Clone, Serialize)]
pub struct LinkPage {
    pub links: Vec<Link>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    pub total_links: u64,
    pub total_requests: u64,
}
